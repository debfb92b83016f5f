use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::cache::{ComputingCache, ComputingCacheBuilder};
use crate::compiler::Compiler;
use crate::config::Configuration;
use crate::error::{MustachioError, MustachioResult, ParseError};
use crate::interface::MustachioInterface;
use crate::locator::{MapTemplateLocator, TemplateLocator, read_source};
use crate::resolver::{
    GlobalDataResolver, IterationMetaResolver, ListIndexResolver, MapResolver, ReflectionResolver, Resolver,
    ThisResolver,
};
use crate::support::{
    DotKeySplitter, HtmlTextSupport, KeySplitter, MissingValueHandler, NoOpMissingValueHandler, TextSupport,
};
use crate::tag::Delimiters;
use crate::template::Template;
use crate::value::Value;

/// Name given to templates compiled from interpolated lambda results.
const LAMBDA_TEMPLATE_NAME: &str = "<lambda>";

/// `MustachioEngine` is the primary implementation of the
/// `MustachioInterface` trait.
///
/// The engine owns the resolver chain, the template locators and the caches
/// of compiled templates. It is immutable once built and can be shared
/// between threads; every render call builds its own execution context.
///
/// # Examples
///
/// ```
/// use mustachio::{MustachioEngineBuilder, MustachioInterface, Value};
///
/// let engine = MustachioEngineBuilder::new()
///     .add_template("greeting", "Hello {{foo}} and {{bar.name}}!")
///     .build()
///     .unwrap();
///
/// let data = Value::map([
///     ("foo", Value::from("me")),
///     ("bar", Value::map([("name", "Edgar")])),
/// ]);
/// assert_eq!(engine.render("greeting", data).unwrap(), "Hello me and Edgar!");
/// ```
pub struct MustachioEngine {
    configuration: Configuration,
    compiler: Compiler,
    resolvers: Vec<Arc<dyn Resolver>>,
    locators: Arc<[Arc<dyn TemplateLocator>]>,
    missing_value_handler: Arc<dyn MissingValueHandler>,
    text_support: Arc<dyn TextSupport>,
    templates: Option<ComputingCache<String, Arc<Template>, MustachioError>>,
    lambda_templates: ComputingCache<(Delimiters, String), Arc<Template>, ParseError>,
}

impl MustachioEngine {
    pub fn builder() -> MustachioEngineBuilder {
        MustachioEngineBuilder::new()
    }

    pub const fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// The resolver chain, highest priority first.
    pub fn resolvers(&self) -> &[Arc<dyn Resolver>] {
        &self.resolvers
    }

    pub fn key_splitter(&self) -> &dyn KeySplitter {
        self.compiler.key_splitter.as_ref()
    }

    pub fn missing_value_handler(&self) -> &dyn MissingValueHandler {
        self.missing_value_handler.as_ref()
    }

    pub fn text_support(&self) -> &dyn TextSupport {
        self.text_support.as_ref()
    }

    /// Number of compiled templates currently cached.
    pub fn cached_templates(&self) -> usize {
        self.templates.as_ref().map_or(0, ComputingCache::size)
    }

    /// Compiles the result of an interpolated lambda, starting from the
    /// delimiters active at the lambda's tag.
    pub(crate) fn lambda_template(&self, delimiters: &Delimiters, source: &str) -> MustachioResult<Arc<Template>> {
        Ok(self
            .lambda_templates
            .get(&(delimiters.clone(), source.to_string()))?)
    }
}

/// Asks the locators in order and reads the first source found.
fn locate_source(locators: &[Arc<dyn TemplateLocator>], name: &str) -> MustachioResult<Option<String>> {
    for locator in locators {
        if let Some(reader) = locator.locate(name)? {
            tracing::debug!(template = name, priority = locator.priority(), "template located");
            return read_source(name, reader).map(Some);
        }
    }
    Ok(None)
}

fn load_template(
    locators: &[Arc<dyn TemplateLocator>],
    compiler: &Compiler,
    name: &str,
) -> MustachioResult<Arc<Template>> {
    let source = locate_source(locators, name)?.ok_or_else(|| MustachioError::TemplateNotFound {
        template_name: name.to_string(),
    })?;
    Ok(Arc::new(compiler.compile(name, &source)?))
}

impl MustachioInterface for MustachioEngine {
    fn get_template<N: AsRef<str>>(&self, name: N) -> MustachioResult<Arc<Template>> {
        let name = name.as_ref();
        match &self.templates {
            Some(cache) => cache.get(&name.to_string()),
            None => load_template(&self.locators, &self.compiler, name),
        }
    }

    fn compile_template<N: AsRef<str>, S: AsRef<str>>(&self, name: N, source: S) -> MustachioResult<Template> {
        Ok(self.compiler.compile(name.as_ref(), source.as_ref())?)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(template = name.as_ref()))]
    fn render<N: AsRef<str>, D: Into<Value>>(&self, name: N, data: D) -> MustachioResult<String> {
        self.get_template(name.as_ref())?.render(self, data)
    }

    fn render_to<N: AsRef<str>, D: Into<Value>>(
        &self,
        name: N,
        data: D,
        sink: &mut dyn fmt::Write,
    ) -> MustachioResult<()> {
        self.get_template(name.as_ref())?
            .render_to(self, data, sink)
    }

    fn invalidate_templates<P: Fn(&str) -> bool>(&self, predicate: P) {
        if let Some(cache) = &self.templates {
            cache.invalidate(|name| predicate(name));
        }
    }

    fn get_template_source<N: AsRef<str>>(&self, name: N) -> MustachioResult<Option<String>> {
        locate_source(&self.locators, name.as_ref())
    }
}

impl fmt::Debug for MustachioEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolvers: Vec<&str> = self.resolvers.iter().map(|r| r.name()).collect();
        f.debug_struct("MustachioEngine")
            .field("configuration", &self.configuration)
            .field("resolvers", &resolvers)
            .field("locators", &self.locators.len())
            .field("templates", &self.templates)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`MustachioEngine`].
///
/// Resolvers and locators are registered explicitly. The built-in resolvers
/// are added unless [`MustachioEngineBuilder::omit_builtin_resolvers`] is
/// called; templates added with [`MustachioEngineBuilder::add_template`] are
/// served before any registered locator.
pub struct MustachioEngineBuilder {
    configuration: Configuration,
    resolvers: Vec<Arc<dyn Resolver>>,
    locators: Vec<Arc<dyn TemplateLocator>>,
    templates: MapTemplateLocator,
    global_data: BTreeMap<String, Value>,
    missing_value_handler: Arc<dyn MissingValueHandler>,
    text_support: Arc<dyn TextSupport>,
    key_splitter: Arc<dyn KeySplitter>,
    builtin_resolvers: bool,
}

impl MustachioEngineBuilder {
    pub fn new() -> Self {
        Self {
            configuration: Configuration::default(),
            resolvers: Vec::new(),
            locators: Vec::new(),
            templates: MapTemplateLocator::new(i32::MAX),
            global_data: BTreeMap::new(),
            missing_value_handler: Arc::new(NoOpMissingValueHandler),
            text_support: Arc::new(HtmlTextSupport),
            key_splitter: Arc::new(DotKeySplitter),
            builtin_resolvers: true,
        }
    }

    pub fn configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn add_resolver<R: Resolver + 'static>(mut self, resolver: R) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    pub fn add_template_locator<L: TemplateLocator + 'static>(mut self, locator: L) -> Self {
        self.locators.push(Arc::new(locator));
        self
    }

    pub fn add_template<N: Into<String>, S: Into<String>>(mut self, name: N, source: S) -> Self {
        self.templates.insert(name, source);
        self
    }

    /// Data resolvable from every template when no context object has it.
    pub fn add_global_data<N: Into<String>, V: Into<Value>>(mut self, name: N, value: V) -> Self {
        self.global_data.insert(name.into(), value.into());
        self
    }

    pub fn missing_value_handler<H: MissingValueHandler + 'static>(mut self, handler: H) -> Self {
        self.missing_value_handler = Arc::new(handler);
        self
    }

    pub fn text_support<T: TextSupport + 'static>(mut self, text_support: T) -> Self {
        self.text_support = Arc::new(text_support);
        self
    }

    pub fn key_splitter<K: KeySplitter + 'static>(mut self, key_splitter: K) -> Self {
        self.key_splitter = Arc::new(key_splitter);
        self
    }

    pub fn omit_builtin_resolvers(mut self) -> Self {
        self.builtin_resolvers = false;
        self
    }

    /// # Errors
    /// Fails if the configuration is not usable, e.g. invalid delimiters.
    pub fn build(self) -> MustachioResult<MustachioEngine> {
        let configuration = self.configuration;
        let compiler = Compiler {
            delimiters: configuration.delimiters()?,
            remove_standalone_lines: configuration.remove_standalone_lines,
            remove_unnecessary_segments: configuration.remove_unnecessary_segments,
            key_splitter: self.key_splitter,
        };

        let mut resolvers = self.resolvers;
        if self.builtin_resolvers {
            resolvers.push(Arc::new(ThisResolver));
            resolvers.push(Arc::new(IterationMetaResolver::new(
                configuration.iteration_metadata_alias.as_str(),
            )));
            resolvers.push(Arc::new(MapResolver));
            resolvers.push(Arc::new(ListIndexResolver));
            resolvers.push(Arc::new(ReflectionResolver::new()));
            resolvers.push(Arc::new(GlobalDataResolver::new(self.global_data)));
        }
        // Stable: registration order breaks ties.
        resolvers.sort_by_key(|resolver| std::cmp::Reverse(resolver.priority()));

        let mut locators = self.locators;
        if !self.templates.is_empty() {
            locators.push(Arc::new(self.templates));
        }
        locators.sort_by_key(|locator| std::cmp::Reverse(locator.priority()));
        let locators: Arc<[Arc<dyn TemplateLocator>]> = Arc::from(locators);

        let templates = configuration.template_cache_enabled.then(|| {
            let locators = Arc::clone(&locators);
            let compiler = compiler.clone();
            ComputingCacheBuilder::new("templates")
                .expiration(configuration.template_cache_expiration())
                .build(move |name: &String| load_template(&locators, &compiler, name))
        });

        let lambda_compiler = compiler.clone();
        let lambda_templates = ComputingCacheBuilder::new("lambda-templates")
            .max_size(Some(configuration.lambda_cache_max_size))
            .build(move |(delimiters, source): &(Delimiters, String)| {
                lambda_compiler
                    .compile_with_delimiters(LAMBDA_TEMPLATE_NAME, source, delimiters.clone())
                    .map(Arc::new)
            });

        tracing::info!(
            resolvers = resolvers.len(),
            locators = locators.len(),
            template_cache = configuration.template_cache_enabled,
            "mustachio engine built"
        );

        Ok(MustachioEngine {
            configuration,
            compiler,
            resolvers,
            locators,
            missing_value_handler: self.missing_value_handler,
            text_support: self.text_support,
            templates,
            lambda_templates,
        })
    }
}

impl Default for MustachioEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
