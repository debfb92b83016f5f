use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::engine::MustachioEngine;
use crate::error::{MustachioError, MustachioResult};
use crate::segment::{HintSlot, Segment, ValueKey};
use crate::value::Value;

pub type ReleaseError = Box<dyn Error + Send + Sync>;

type ReleaseCallback = Box<dyn FnOnce() -> Result<(), ReleaseError>>;

/// Collects the release callbacks registered while one key is resolved.
///
/// Callbacks run exactly once, in registration order, when the context is
/// released or dropped. A failing callback is logged and does not stop the
/// ones after it.
#[derive(Default)]
pub struct ResolutionContext {
    callbacks: Vec<ReleaseCallback>,
}

impl ResolutionContext {
    pub fn register_release_callback<F>(&mut self, callback: F)
    where
        F: FnOnce() -> Result<(), ReleaseError> + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Runs every pending callback and returns the failures.
    pub fn release(&mut self) -> Vec<ReleaseError> {
        let mut failures = Vec::new();
        for callback in self.callbacks.drain(..) {
            if let Err(error) = callback() {
                tracing::warn!(%error, "release callback failed");
                failures.push(error);
            }
        }
        failures
    }
}

impl Drop for ResolutionContext {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ResolutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("pending_callbacks", &self.callbacks.len())
            .finish()
    }
}

/// The outcome of resolving a key.
///
/// Holds the release callbacks registered during resolution; they run when
/// the wrapper is released or dropped, so keep it alive while the value is in
/// use.
#[derive(Debug)]
pub struct ValueWrapper {
    value: Option<Value>,
    resolution: ResolutionContext,
}

impl ValueWrapper {
    pub const fn is_found(&self) -> bool {
        self.value.is_some()
    }

    pub const fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Runs the release callbacks now; see [`ResolutionContext::release`].
    pub fn release(mut self) -> Vec<ReleaseError> {
        self.resolution.release()
    }
}

enum FrameKind {
    Root,
    ContextObject(Value),
    TemplateInvocation(Arc<str>),
    Overrides(HashMap<String, Arc<[Segment]>>),
}

struct Frame {
    kind: FrameKind,
    parent: Option<Rc<Frame>>,
}

/// The scope stack of one render call.
///
/// Every push returns a new context linked to its parent; frames are never
/// changed in place, so sibling scopes can share an ancestor. Contexts belong
/// to the render call that created them and are not `Send`.
#[derive(Clone)]
pub struct ExecutionContext<'e> {
    engine: &'e MustachioEngine,
    frame: Rc<Frame>,
}

impl<'e> ExecutionContext<'e> {
    pub fn new(engine: &'e MustachioEngine) -> Self {
        Self {
            engine,
            frame: Rc::new(Frame {
                kind: FrameKind::Root,
                parent: None,
            }),
        }
    }

    pub const fn engine(&self) -> &'e MustachioEngine {
        self.engine
    }

    fn push(&self, kind: FrameKind) -> Self {
        Self {
            engine: self.engine,
            frame: Rc::new(Frame {
                kind,
                parent: Some(Rc::clone(&self.frame)),
            }),
        }
    }

    /// Innermost frame first.
    fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(Some(self.frame.as_ref()), |frame| frame.parent.as_deref())
    }

    pub fn push_context_object(&self, value: Value) -> Self {
        self.push(FrameKind::ContextObject(value))
    }

    /// Records that `template_name` is being rendered.
    ///
    /// # Errors
    /// Fails with [`MustachioError::RecursiveInvocationLimitExceeded`] when
    /// the template already appears more often in the invocation chain than
    /// the configured recursion limit allows.
    pub fn push_template_invocation(&self, template_name: &str) -> MustachioResult<Self> {
        let limit = self.engine.configuration().recursion_limit;
        let depth = self
            .frames()
            .filter(|frame| {
                matches!(&frame.kind, FrameKind::TemplateInvocation(name) if &**name == template_name)
            })
            .count();
        if depth > limit {
            return Err(MustachioError::RecursiveInvocationLimitExceeded {
                limit,
                template_name: template_name.to_string(),
            });
        }
        Ok(self.push(FrameKind::TemplateInvocation(Arc::from(template_name))))
    }

    /// Pushes the override sections of an extend tag.
    pub fn push_overrides(&self, overrides: HashMap<String, Arc<[Segment]>>) -> Self {
        self.push(FrameKind::Overrides(overrides))
    }

    /// Finds the override for an extend section.
    ///
    /// The outermost definition wins, so a template extending a template that
    /// itself extends a third one overrides both of them.
    pub fn get_override(&self, name: &str) -> Option<Arc<[Segment]>> {
        self.frames()
            .filter_map(|frame| match &frame.kind {
                FrameKind::Overrides(overrides) => overrides.get(name),
                FrameKind::Root | FrameKind::ContextObject(_) | FrameKind::TemplateInvocation(_) => None,
            })
            .last()
            .map(Arc::clone)
    }

    /// Resolves a key against this context.
    ///
    /// The leading part is looked up on each context object from the
    /// innermost frame outwards, then once without a context object. Every
    /// further part is looked up on the value found for the part before it.
    ///
    /// # Errors
    /// Resolver and hint errors are returned unchanged; callbacks registered
    /// before the error still run.
    pub fn get_value(&self, key: &ValueKey) -> MustachioResult<ValueWrapper> {
        let mut resolution = ResolutionContext::default();
        let Some((leading, rest)) = key.parts().split_first() else {
            return Ok(ValueWrapper {
                value: None,
                resolution,
            });
        };

        let mut value = self.resolve_leading(leading, key.hint(), &mut resolution)?;
        for part in rest {
            let Some(current) = value.take() else {
                break;
            };
            value = self.resolve_with_chain(Some(&current), part, None, &mut resolution)?;
        }
        Ok(ValueWrapper { value, resolution })
    }

    fn resolve_leading(
        &self,
        name: &str,
        slot: &HintSlot,
        resolution: &mut ResolutionContext,
    ) -> MustachioResult<Option<Value>> {
        let slot = self.engine.configuration().hints_enabled.then_some(slot);
        let hint = slot.and_then(HintSlot::get);

        for frame in self.frames() {
            let FrameKind::ContextObject(context_object) = &frame.kind else {
                continue;
            };
            if let Some(hint) = &hint {
                if let Some(value) = hint.resolve(context_object, name, resolution)? {
                    return Ok(Some(value));
                }
            }
            if let Some(value) = self.resolve_with_chain(Some(context_object), name, slot, resolution)? {
                return Ok(Some(value));
            }
        }
        self.resolve_with_chain(None, name, None, resolution)
    }

    /// Asks the resolvers in priority order. When `slot` is given the
    /// answering resolver's hint replaces the one stored in it.
    fn resolve_with_chain(
        &self,
        context_object: Option<&Value>,
        name: &str,
        slot: Option<&HintSlot>,
        resolution: &mut ResolutionContext,
    ) -> MustachioResult<Option<Value>> {
        for resolver in self.engine.resolvers() {
            let Some(value) = resolver.resolve(context_object, name, resolution)? else {
                continue;
            };
            if let (Some(slot), Some(context_object)) = (slot, context_object) {
                let hint = resolver.create_hint(context_object, name);
                tracing::trace!(
                    resolver = resolver.name(),
                    name,
                    installed = hint.is_some(),
                    "hint replaced"
                );
                slot.set(hint);
            }
            return Ok(Some(value));
        }
        Ok(None)
    }
}

impl fmt::Debug for ExecutionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frames: Vec<&str> = self
            .frames()
            .map(|frame| match &frame.kind {
                FrameKind::Root => "root",
                FrameKind::ContextObject(value) => value.kind(),
                FrameKind::TemplateInvocation(name) => &**name,
                FrameKind::Overrides(_) => "overrides",
            })
            .collect();
        f.debug_struct("ExecutionContext")
            .field("frames", &frames)
            .finish_non_exhaustive()
    }
}
