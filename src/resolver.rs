use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::cache::{ComputingCache, ComputingCacheBuilder};
use crate::context::ResolutionContext;
use crate::error::MustachioResult;
use crate::value::{Object, Value};

/// Maps a context object and a name to a value.
///
/// The engine keeps its resolvers sorted by descending priority and asks them
/// in turn until one answers. Resolvers are shared by every render thread.
pub trait Resolver: Send + Sync {
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Higher priorities are asked first.
    fn priority(&self) -> i32;

    /// Looks up `name` on `context_object`.
    ///
    /// `context_object` is `None` for the last, context-free attempt made
    /// once every frame of the execution context has been tried.
    ///
    /// # Errors
    /// Errors abort the render and are returned to its caller unchanged.
    fn resolve(
        &self,
        context_object: Option<&Value>,
        name: &str,
        resolution: &mut ResolutionContext,
    ) -> MustachioResult<Option<Value>>;

    /// Called after this resolver answered for the leading part of a key.
    ///
    /// The returned hint is stored with the tag and tried before the resolver
    /// chain on later renders.
    fn create_hint(&self, _context_object: &Value, _name: &str) -> Option<Arc<dyn Hint>> {
        None
    }
}

/// A shortcut for resolving one name on context objects of a known shape.
///
/// A hint must return exactly what the resolver chain would return for the
/// same context object, or `None` when it does not apply to it.
pub trait Hint: Send + Sync {
    /// # Errors
    /// Errors abort the render and are returned to its caller unchanged.
    fn resolve(
        &self,
        context_object: &Value,
        name: &str,
        resolution: &mut ResolutionContext,
    ) -> MustachioResult<Option<Value>>;
}

/// Resolves `this` and `.` to the context object itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThisResolver;

impl ThisResolver {
    pub const PRIORITY: i32 = 1000;
}

struct ThisHint;

impl Hint for ThisHint {
    fn resolve(&self, context_object: &Value, _: &str, _: &mut ResolutionContext) -> MustachioResult<Option<Value>> {
        Ok(Some(context_object.clone()))
    }
}

impl Resolver for ThisResolver {
    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn resolve(
        &self,
        context_object: Option<&Value>,
        name: &str,
        _: &mut ResolutionContext,
    ) -> MustachioResult<Option<Value>> {
        if name == "this" || name == "." {
            return Ok(context_object.cloned());
        }
        Ok(None)
    }

    fn create_hint(&self, _: &Value, _: &str) -> Option<Arc<dyn Hint>> {
        Some(Arc::new(ThisHint))
    }
}

/// Metadata pushed below each element while a section iterates over a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IterationMeta {
    position: usize,
    len: usize,
}

impl IterationMeta {
    pub const fn new(position: usize, len: usize) -> Self {
        Self { position, len }
    }

    /// 1-based index of the current element.
    pub const fn index(&self) -> usize {
        self.position.saturating_add(1)
    }

    /// 0-based index of the current element.
    pub const fn position(&self) -> usize {
        self.position
    }

    pub const fn has_next(&self) -> bool {
        self.index() < self.len
    }

    pub const fn is_first(&self) -> bool {
        self.position == 0
    }

    pub const fn is_last(&self) -> bool {
        !self.has_next()
    }

    pub const fn is_odd(&self) -> bool {
        self.index() % 2 == 1
    }

    /// Wraps the metadata for the context frame pushed below a list element.
    pub(crate) fn frame(self) -> Value {
        Value::object(IterationFrame(self))
    }
}

/// Context frame holding [`IterationMeta`]. It has no members of its own, so
/// lookups of bare names like `index` fall through to outer frames.
struct IterationFrame(IterationMeta);

impl Object for IterationFrame {
    fn type_name(&self) -> &'static str {
        "IterationFrame"
    }

    fn member_names(&self) -> &'static [&'static str] {
        &[]
    }

    fn member(&self, _: usize) -> Option<Value> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Object for IterationMeta {
    fn type_name(&self) -> &'static str {
        "IterationMeta"
    }

    fn member_names(&self) -> &'static [&'static str] {
        &["index", "position", "hasNext", "isFirst", "isLast", "isOdd", "isEven"]
    }

    fn member(&self, index: usize) -> Option<Value> {
        let value = match index {
            0 => Value::from(self.index()),
            1 => Value::from(self.position),
            2 => Value::Bool(self.has_next()),
            3 => Value::Bool(self.is_first()),
            4 => Value::Bool(self.is_last()),
            5 => Value::Bool(self.is_odd()),
            6 => Value::Bool(!self.is_odd()),
            _ => return None,
        };
        Some(value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Exposes [`IterationMeta`] under the configured alias, e.g.
/// `{{iter.index}}`, plus the flat `iterIndex` and `iterHasNext` keys.
#[derive(Debug, Clone)]
pub struct IterationMetaResolver {
    alias: String,
}

impl IterationMetaResolver {
    pub const PRIORITY: i32 = 900;

    pub fn new<S: Into<String>>(alias: S) -> Self {
        Self { alias: alias.into() }
    }
}

impl Resolver for IterationMetaResolver {
    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn resolve(
        &self,
        context_object: Option<&Value>,
        name: &str,
        _: &mut ResolutionContext,
    ) -> MustachioResult<Option<Value>> {
        let Some(value) = context_object else {
            return Ok(None);
        };
        let Some(IterationFrame(meta)) = value
            .as_object()
            .and_then(|object| object.as_any().downcast_ref::<IterationFrame>())
        else {
            return Ok(None);
        };
        let resolved = if name == self.alias {
            Some(Value::object(*meta))
        } else if name == "iterIndex" {
            Some(Value::from(meta.index()))
        } else if name == "iterHasNext" {
            Some(Value::Bool(meta.has_next()))
        } else {
            None
        };
        Ok(resolved)
    }
}

/// Looks names up as keys of map values.
#[derive(Debug, Default, Clone, Copy)]
pub struct MapResolver;

impl MapResolver {
    pub const PRIORITY: i32 = 700;
}

struct MapHint;

impl Hint for MapHint {
    fn resolve(&self, context_object: &Value, name: &str, _: &mut ResolutionContext) -> MustachioResult<Option<Value>> {
        Ok(context_object.as_map().and_then(|map| map.get(name)).cloned())
    }
}

impl Resolver for MapResolver {
    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn resolve(
        &self,
        context_object: Option<&Value>,
        name: &str,
        _: &mut ResolutionContext,
    ) -> MustachioResult<Option<Value>> {
        Ok(context_object
            .and_then(Value::as_map)
            .and_then(|map| map.get(name))
            .cloned())
    }

    fn create_hint(&self, _: &Value, _: &str) -> Option<Arc<dyn Hint>> {
        Some(Arc::new(MapHint))
    }
}

/// Resolves numeric names as indexes into list values, e.g. `items.0`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ListIndexResolver;

impl ListIndexResolver {
    pub const PRIORITY: i32 = 600;
}

impl Resolver for ListIndexResolver {
    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn resolve(
        &self,
        context_object: Option<&Value>,
        name: &str,
        _: &mut ResolutionContext,
    ) -> MustachioResult<Option<Value>> {
        let Some(items) = context_object.and_then(Value::as_list) else {
            return Ok(None);
        };
        Ok(name
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index))
            .cloned())
    }
}

/// Key of the member lookup memo. Member names are fixed per type, so the
/// name list rides along for the computation but takes no part in equality.
#[derive(Clone)]
struct MemberKey {
    type_id: TypeId,
    name: String,
    members: &'static [&'static str],
}

impl PartialEq for MemberKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name == other.name
    }
}

impl Eq for MemberKey {}

impl Hash for MemberKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.name.hash(state);
    }
}

/// Resolves names against the members of [`Object`] values.
///
/// Member lookups are memoized per `(type, name)`.
pub struct ReflectionResolver {
    members: ComputingCache<MemberKey, Option<usize>, Infallible>,
}

impl ReflectionResolver {
    pub const PRIORITY: i32 = 500;

    pub fn new() -> Self {
        Self {
            members: ComputingCacheBuilder::new("reflection-members").build(|key: &MemberKey| {
                Ok(key.members.iter().position(|member| *member == key.name))
            }),
        }
    }

    fn member_index(&self, object: &dyn Object, name: &str) -> Option<usize> {
        let key = MemberKey {
            type_id: Any::type_id(object.as_any()),
            name: name.to_string(),
            members: object.member_names(),
        };
        let Ok(index) = self.members.get(&key);
        index
    }

    /// Number of memoized `(type, name)` lookups.
    pub fn memoized_lookups(&self) -> usize {
        self.members.size()
    }
}

impl Default for ReflectionResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReflectionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectionResolver")
            .field("members", &self.members)
            .finish()
    }
}

struct ReflectionHint {
    type_id: TypeId,
    index: usize,
}

impl Hint for ReflectionHint {
    fn resolve(&self, context_object: &Value, _: &str, _: &mut ResolutionContext) -> MustachioResult<Option<Value>> {
        let Some(object) = context_object.as_object() else {
            return Ok(None);
        };
        if Any::type_id(object.as_any()) != self.type_id {
            return Ok(None);
        }
        Ok(object.member(self.index))
    }
}

impl Resolver for ReflectionResolver {
    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn resolve(
        &self,
        context_object: Option<&Value>,
        name: &str,
        _: &mut ResolutionContext,
    ) -> MustachioResult<Option<Value>> {
        let Some(object) = context_object.and_then(Value::as_object) else {
            return Ok(None);
        };
        Ok(self
            .member_index(object.as_ref(), name)
            .and_then(|index| object.member(index)))
    }

    fn create_hint(&self, context_object: &Value, name: &str) -> Option<Arc<dyn Hint>> {
        let object = context_object.as_object()?;
        let index = self.member_index(object.as_ref(), name)?;
        Some(Arc::new(ReflectionHint {
            type_id: Any::type_id(object.as_any()),
            index,
        }))
    }
}

/// Answers the context-free lookup with data registered on the engine.
#[derive(Debug, Default, Clone)]
pub struct GlobalDataResolver {
    data: BTreeMap<String, Value>,
}

impl GlobalDataResolver {
    pub const PRIORITY: i32 = 0;

    pub const fn new(data: BTreeMap<String, Value>) -> Self {
        Self { data }
    }
}

impl Resolver for GlobalDataResolver {
    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn resolve(
        &self,
        context_object: Option<&Value>,
        name: &str,
        _: &mut ResolutionContext,
    ) -> MustachioResult<Option<Value>> {
        if context_object.is_some() {
            return Ok(None);
        }
        Ok(self.data.get(name).cloned())
    }
}
