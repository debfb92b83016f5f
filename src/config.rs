use std::time::Duration;

use crate::error::{MustachioError, MustachioResult};
use crate::tag::{DEFAULT_END_DELIMITER, DEFAULT_START_DELIMITER, Delimiters};

/// Engine configuration.
///
/// Read once when the engine is built; rendering never changes it. With the
/// `serde` feature enabled every key is optional when deserializing and falls
/// back to its default.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Configuration {
    pub start_delimiter: String,
    pub end_delimiter: String,
    /// How many times a template may appear again in its own chain of
    /// partial/extend invocations. Zero forbids any self-reference.
    pub recursion_limit: usize,
    pub remove_standalone_lines: bool,
    /// Drop comment and delimiter-switch segments from compiled trees.
    pub remove_unnecessary_segments: bool,
    pub skip_value_escaping: bool,
    pub template_cache_enabled: bool,
    /// `None` keeps compiled templates until they are invalidated.
    pub template_cache_expiration_timeout_ms: Option<u64>,
    pub iteration_metadata_alias: String,
    pub hints_enabled: bool,
    pub lambda_cache_max_size: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            start_delimiter: DEFAULT_START_DELIMITER.to_string(),
            end_delimiter: DEFAULT_END_DELIMITER.to_string(),
            recursion_limit: 10,
            remove_standalone_lines: true,
            remove_unnecessary_segments: true,
            skip_value_escaping: false,
            template_cache_enabled: true,
            template_cache_expiration_timeout_ms: None,
            iteration_metadata_alias: "iter".to_string(),
            hints_enabled: true,
            lambda_cache_max_size: 64,
        }
    }
}

impl Configuration {
    /// # Errors
    /// Fails if the configured delimiters are not usable.
    pub fn delimiters(&self) -> MustachioResult<Delimiters> {
        Delimiters::new(self.start_delimiter.as_str(), self.end_delimiter.as_str()).map_err(|kind| {
            MustachioError::InvalidConfiguration {
                message: kind.to_string(),
            }
        })
    }

    pub fn template_cache_expiration(&self) -> Option<Duration> {
        self.template_cache_expiration_timeout_ms
            .map(Duration::from_millis)
    }
}
