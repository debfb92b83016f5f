use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::MustachioResult;

/// A node of the data graph a template is rendered against.
///
/// Values are cheap to clone; compound variants share their contents through
/// an `Arc`, so a value can be handed to any number of render threads.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Arc<str>),
    List(Arc<[Value]>),
    Map(Arc<BTreeMap<String, Value>>),
    Lambda(Arc<dyn Lambda>),
    Object(Arc<dyn Object>),
}

impl Value {
    /// Builds a map value from `(key, value)` pairs.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Map(Arc::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// Builds a list value.
    pub fn list<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    pub fn lambda<L: Lambda + 'static>(lambda: L) -> Self {
        Self::Lambda(Arc::new(lambda))
    }

    pub fn object<O: Object + 'static>(object: O) -> Self {
        Self::Object(Arc::new(object))
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether a section over this value renders nothing.
    ///
    /// `Null`, `false` and empty lists are falsy; everything else, including
    /// empty strings, empty maps and zero, is truthy.
    pub fn is_falsy(&self) -> bool {
        match self {
            Self::Null | Self::Bool(false) => true,
            Self::List(items) => items.is_empty(),
            Self::Bool(true)
            | Self::Int(_)
            | Self::Float(_)
            | Self::String(_)
            | Self::Map(_)
            | Self::Lambda(_)
            | Self::Object(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<dyn Object>> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Short name of the variant, used in debug output and logging.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Lambda(_) => "lambda",
            Self::Object(_) => "object",
        }
    }
}

/// The string form written when a value is interpolated.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::String(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", key, value)?;
                }
                f.write_str("}")
            }
            Self::Lambda(_) => f.write_str("<lambda>"),
            Self::Object(object) => object.fmt_display(f),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::List(items) => f.debug_list().entries(items.iter()).finish(),
            Self::Map(map) => f.debug_map().entries(map.iter()).finish(),
            Self::Lambda(_) => f.write_str("Lambda"),
            Self::Object(object) => write!(f, "Object({})", object.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Float(value as f64), Self::Int)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(Arc::from(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::list(value)
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Value {
    fn from(value: BTreeMap<String, V>) -> Self {
        Self::map(value)
    }
}

impl<V: Into<Value>> From<HashMap<String, V>> for Value {
    fn from(value: HashMap<String, V>) -> Self {
        Self::map(value)
    }
}

#[cfg(feature = "serde")]
impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            serde_json::Value::String(s) => Self::from(s),
            serde_json::Value::Array(items) => Self::list(items),
            serde_json::Value::Object(map) => Self::map(map),
        }
    }
}

/// How the body of a section is handed to a [`Lambda`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum InputType {
    /// The raw, unprocessed source text between the section tags.
    Literal,
    /// The section body rendered against the current context.
    Processed,
}

/// A callable placed in the data graph.
///
/// As a section value the lambda receives the section body (see
/// [`InputType`]); as an interpolated value it receives an empty string.
pub trait Lambda: Send + Sync {
    /// # Errors
    /// Any error is propagated unchanged to the render caller.
    fn invoke(&self, text: &str) -> MustachioResult<String>;

    fn input_type(&self) -> InputType {
        InputType::Literal
    }

    /// If true the returned text is compiled as a template and rendered
    /// against the current context.
    fn is_return_value_interpolated(&self) -> bool {
        true
    }
}

/// Lambdas can be built from plain closures; such lambdas take literal input
/// and have their results interpolated.
impl<F> Lambda for F
where
    F: Fn(&str) -> MustachioResult<String> + Send + Sync,
{
    fn invoke(&self, text: &str) -> MustachioResult<String> {
        self(text)
    }
}

/// A host object exposing named members, resolved by
/// [`ReflectionResolver`](crate::resolver::ReflectionResolver).
///
/// Member names are fixed per concrete type: every instance of a type must
/// return the same `member_names`, which lets member lookups be memoized by
/// type.
pub trait Object: Send + Sync + Any {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn member_names(&self) -> &'static [&'static str];

    /// Returns the member at `index` in [`Object::member_names`].
    fn member(&self, index: usize) -> Option<Value>;

    fn fmt_display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }

    fn as_any(&self) -> &dyn Any;
}
