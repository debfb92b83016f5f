use std::collections::BTreeMap;
use std::io::Read;

use crate::error::{MustachioError, MustachioResult};

/// Finds template sources by name.
///
/// The engine asks its locators in descending priority order and compiles the
/// first source found. Locators are only consulted when a template is
/// compiled, never while rendering a cached one.
pub trait TemplateLocator: Send + Sync {
    fn priority(&self) -> i32 {
        0
    }

    /// Opens the source of `name`, or returns `None` if this locator does not
    /// know the template.
    ///
    /// # Errors
    /// Any error stops the lookup; later locators are not asked.
    fn locate(&self, name: &str) -> MustachioResult<Option<Box<dyn Read + '_>>>;
}

/// Reads a located stream to the end.
pub(crate) fn read_source(name: &str, mut reader: Box<dyn Read + '_>) -> MustachioResult<String> {
    let mut source = String::new();
    reader
        .read_to_string(&mut source)
        .map_err(|error| MustachioError::TemplateLoad {
            template_name: name.to_string(),
            message: error.to_string(),
        })?;
    Ok(source)
}

/// Serves template sources held in memory.
#[derive(Debug, Clone, Default)]
pub struct MapTemplateLocator {
    priority: i32,
    templates: BTreeMap<String, String>,
}

impl MapTemplateLocator {
    pub fn new(priority: i32) -> Self {
        Self {
            priority,
            templates: BTreeMap::new(),
        }
    }

    pub fn with_template<N: Into<String>, S: Into<String>>(mut self, name: N, source: S) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert<N: Into<String>, S: Into<String>>(&mut self, name: N, source: S) -> &mut Self {
        self.templates.insert(name.into(), source.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}

impl TemplateLocator for MapTemplateLocator {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn locate(&self, name: &str) -> MustachioResult<Option<Box<dyn Read + '_>>> {
        Ok(self
            .templates
            .get(name)
            .map(|source| Box::new(source.as_bytes()) as Box<dyn Read + '_>))
    }
}
