use std::fmt;
use std::sync::Arc;

use crate::template::Template;
use crate::value::Value;

/// `MustachioInterface` is the trait of a Mustache template engine: templates
/// are located by name, compiled once, cached, and rendered any number of
/// times from any number of threads.
pub trait MustachioInterface {
    /// `get_template` returns the compiled template called `name`, compiling
    /// it on first use.
    ///
    /// # Errors
    /// - If no locator knows the template.
    /// - If the source cannot be read or does not compile.
    fn get_template<N: AsRef<str>>(&self, name: N) -> crate::MustachioResult<Arc<Template>>;

    /// `compile_template` compiles `source` without locating or caching it.
    ///
    /// # Errors
    /// - If the source does not compile.
    fn compile_template<N: AsRef<str>, S: AsRef<str>>(
        &self,
        name: N,
        source: S,
    ) -> crate::MustachioResult<Template>;

    /// `render` renders the template called `name` against `data`.
    ///
    /// # Errors
    /// - If the template cannot be obtained, see [`Self::get_template`].
    /// - If a partial or extend tag references a missing template.
    /// - If the recursion limit is exceeded.
    /// - If a value is missing and the missing value handler is strict.
    /// - If a resolver or lambda fails.
    fn render<N: AsRef<str>, D: Into<Value>>(&self, name: N, data: D) -> crate::MustachioResult<String>;

    /// `render_to` works like [`Self::render`] but appends to `sink`.
    ///
    /// # Errors
    /// See [`Self::render`]; additionally if writing to the sink fails.
    fn render_to<N: AsRef<str>, D: Into<Value>>(
        &self,
        name: N,
        data: D,
        sink: &mut dyn fmt::Write,
    ) -> crate::MustachioResult<()>;

    /// `invalidate_templates` drops every cached template whose name matches
    /// `predicate`; the next request compiles it again.
    fn invalidate_templates<P: Fn(&str) -> bool>(&self, predicate: P);

    /// `get_template_source` returns the source of `name` as located, without
    /// compiling it.
    ///
    /// # Errors
    /// - If a locator fails or the source cannot be read.
    fn get_template_source<N: AsRef<str>>(&self, name: N) -> crate::MustachioResult<Option<String>>;
}
