use std::borrow::Cow;

use crate::error::{MustachioError, MustachioResult};
use crate::segment::Origin;
use crate::value::Value;

/// Splits a tag key into the parts resolved one after another.
pub trait KeySplitter: Send + Sync {
    fn split(&self, key: &str) -> Vec<String>;
}

/// Splits on `.`, collapsing repeated dots. A lone `.` and `this` stay whole
/// so they keep referring to the current context object.
#[derive(Debug, Default, Clone, Copy)]
pub struct DotKeySplitter;

impl KeySplitter for DotKeySplitter {
    fn split(&self, key: &str) -> Vec<String> {
        if key == "." || key == "this" {
            return vec![key.to_string()];
        }
        key.split('.')
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Escapes interpolated values.
pub trait TextSupport: Send + Sync {
    fn escape_html<'a>(&self, input: &'a str) -> Cow<'a, str>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlTextSupport;

impl TextSupport for HtmlTextSupport {
    fn escape_html<'a>(&self, input: &'a str) -> Cow<'a, str> {
        if !input.contains(['&', '<', '>', '"', '\'']) {
            return Cow::Borrowed(input);
        }
        let mut escaped = String::with_capacity(input.len() + 16);
        for c in input.chars() {
            match c {
                '&' => escaped.push_str("&amp;"),
                '<' => escaped.push_str("&lt;"),
                '>' => escaped.push_str("&gt;"),
                '"' => escaped.push_str("&quot;"),
                '\'' => escaped.push_str("&#39;"),
                c => escaped.push(c),
            }
        }
        Cow::Owned(escaped)
    }
}

/// Decides what a value tag renders when its key resolves to nothing.
pub trait MissingValueHandler: Send + Sync {
    /// Returns a substitute value, `None` to render nothing, or an error to
    /// abort the render.
    ///
    /// # Errors
    /// Implementation defined; [`ThrowingMissingValueHandler`] always fails.
    fn handle(&self, key: &str, origin: &Origin) -> MustachioResult<Option<Value>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpMissingValueHandler;

impl MissingValueHandler for NoOpMissingValueHandler {
    fn handle(&self, _key: &str, _origin: &Origin) -> MustachioResult<Option<Value>> {
        Ok(None)
    }
}

/// Strict mode: every unresolved value tag fails the render.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThrowingMissingValueHandler;

impl MissingValueHandler for ThrowingMissingValueHandler {
    fn handle(&self, key: &str, origin: &Origin) -> MustachioResult<Option<Value>> {
        Err(MustachioError::MissingValue {
            key: key.to_string(),
            template_name: origin.template.to_string(),
            line: origin.line,
        })
    }
}
