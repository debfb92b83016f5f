pub type MustachioResult<T> = std::result::Result<T, MustachioError>;

/// The problem found while compiling a template.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// A tag was opened but its closing delimiter never appeared.
    UnterminatedTag {
        /// Describes what was expected, e.g. "'}}'"
        expected: String,
    },
    /// A tag whose content cannot be used, e.g. an empty key.
    InvalidTag {
        content: String,
        reason: String,
    },
    InvalidDelimiters {
        content: String,
    },
    /// A section end tag that does not close the innermost open section.
    InvalidSectionEnd {
        expected: Option<String>,
        found: String,
    },
    UnterminatedSection {
        name: String,
    },
    NestedExtendNotSupported {
        name: String,
    },
    DuplicateExtendSection {
        name: String,
    },
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnterminatedTag { expected } => {
                write!(f, "Unterminated tag (expected {})", expected)
            }
            Self::InvalidTag { content, reason } => {
                write!(f, "Invalid tag '{}': {}", content, reason)
            }
            Self::InvalidDelimiters { content } => {
                write!(f, "Invalid delimiters tag '{}'", content)
            }
            Self::InvalidSectionEnd {
                expected: Some(expected),
                found,
            } => {
                write!(
                    f,
                    "Invalid section end: expected '{}', found '{}'",
                    expected, found
                )
            }
            Self::InvalidSectionEnd {
                expected: None,
                found,
            } => {
                write!(f, "Invalid section end: no open section for '{}'", found)
            }
            Self::UnterminatedSection { name } => {
                write!(f, "Section '{}' is never closed", name)
            }
            Self::NestedExtendNotSupported { name } => {
                write!(f, "Nested extend of '{}' is not supported", name)
            }
            Self::DuplicateExtendSection { name } => {
                write!(f, "Extend section '{}' is defined more than once", name)
            }
        }
    }
}

impl std::error::Error for ParseErrorKind {}

impl ParseErrorKind {
    /// A short, stable problem code for the error.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnterminatedTag { .. } => "MUSTACHE_TAG_NOT_TERMINATED",
            Self::InvalidTag { .. } => "MUSTACHE_TAG_INVALID",
            Self::InvalidDelimiters { .. } => "INVALID_DELIMITERS",
            Self::InvalidSectionEnd { .. } => "INVALID_SECTION_END",
            Self::UnterminatedSection { .. } => "UNTERMINATED_SECTION",
            Self::NestedExtendNotSupported { .. } => "NESTED_EXTEND_NOT_SUPPORTED",
            Self::DuplicateExtendSection { .. } => "DUPLICATE_EXTEND_SECTION",
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParseError {
    pub template: String,
    pub line: usize,
    pub column: usize,
    pub kind: ParseErrorKind,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Parse error in template '{}' at line {}, column {}: [{}] {}",
            self.template,
            self.line,
            self.column,
            self.kind.code(),
            self.kind
        )
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MustachioError {
    TemplateNotFound {
        template_name: String,
    },
    /// A locator found the template but reading its source failed.
    TemplateLoad {
        template_name: String,
        message: String,
    },
    MissingValue {
        key: String,
        template_name: String,
        line: usize,
    },
    RecursiveInvocationLimitExceeded {
        limit: usize,
        template_name: String,
    },
    /// A partial or extend tag names a template that does not exist.
    InvalidReference {
        reference: String,
        template_name: String,
        line: usize,
    },
    Resolver {
        message: String,
    },
    Lambda {
        message: String,
    },
    RenderError {
        message: String,
    },
    /// The engine was built from an unusable configuration.
    InvalidConfiguration {
        message: String,
    },
    Parse(ParseError),
}

impl std::fmt::Display for MustachioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TemplateNotFound { template_name } => {
                write!(f, "Template not found: {}", template_name)
            }
            Self::TemplateLoad {
                template_name,
                message,
            } => {
                write!(f, "Unable to load template {}: {}", template_name, message)
            }
            Self::MissingValue {
                key,
                template_name,
                line,
            } => {
                write!(
                    f,
                    "No value for key '{}' found in template {} on line {}",
                    key, template_name, line
                )
            }
            Self::RecursiveInvocationLimitExceeded {
                limit,
                template_name,
            } => {
                write!(
                    f,
                    "Recursive invocation limit of {} exceeded by template {}",
                    limit, template_name
                )
            }
            Self::InvalidReference {
                reference,
                template_name,
                line,
            } => {
                write!(
                    f,
                    "Template '{}' referenced from {} on line {} does not exist",
                    reference, template_name, line
                )
            }
            Self::Resolver { message } => {
                write!(f, "Resolver error: {}", message)
            }
            Self::Lambda { message } => {
                write!(f, "Lambda error: {}", message)
            }
            Self::RenderError { message } => {
                write!(f, "Rendering error: {}", message)
            }
            Self::InvalidConfiguration { message } => {
                write!(f, "Invalid configuration: {}", message)
            }
            Self::Parse(parse_error) => {
                write!(f, "{}", parse_error)
            }
        }
    }
}

impl std::error::Error for MustachioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(parse_error) => Some(parse_error),
            Self::TemplateNotFound { .. }
            | Self::TemplateLoad { .. }
            | Self::MissingValue { .. }
            | Self::RecursiveInvocationLimitExceeded { .. }
            | Self::InvalidReference { .. }
            | Self::Resolver { .. }
            | Self::Lambda { .. }
            | Self::RenderError { .. }
            | Self::InvalidConfiguration { .. } => None,
        }
    }
}

impl From<ParseError> for MustachioError {
    fn from(error: ParseError) -> Self {
        Self::Parse(error)
    }
}

impl From<std::fmt::Error> for MustachioError {
    fn from(_: std::fmt::Error) -> Self {
        Self::RenderError {
            message: "failed to write to the output sink".to_string(),
        }
    }
}
