use crate::error::ParseErrorKind;

pub const DEFAULT_START_DELIMITER: &str = "{{";
pub const DEFAULT_END_DELIMITER: &str = "}}";

/// The active pair of tag delimiters.
///
/// Only a delimiter-switch tag changes them, and it does so by producing a new
/// value that applies from that point forward.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Delimiters {
    start: String,
    end: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            start: DEFAULT_START_DELIMITER.to_string(),
            end: DEFAULT_END_DELIMITER.to_string(),
        }
    }
}

impl Delimiters {
    /// # Errors
    /// Fails if either delimiter is empty, contains whitespace or contains `=`.
    pub fn new<S: Into<String>, E: Into<String>>(start: S, end: E) -> Result<Self, ParseErrorKind> {
        let start = start.into();
        let end = end.into();
        let valid = |d: &str| !d.is_empty() && !d.contains('=') && !d.contains(char::is_whitespace);
        if !valid(&start) || !valid(&end) {
            return Err(ParseErrorKind::InvalidDelimiters {
                content: format!("{} {}", start, end),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn end(&self) -> &str {
        &self.end
    }

    pub fn is_default(&self) -> bool {
        self.start == DEFAULT_START_DELIMITER && self.end == DEFAULT_END_DELIMITER
    }

    /// Parses the raw buffer of a delimiter-switch tag, e.g. `=<% %>=`.
    pub(crate) fn from_switch_tag(buffer: &str) -> Result<Self, ParseErrorKind> {
        let invalid = || ParseErrorKind::InvalidDelimiters {
            content: buffer.to_string(),
        };
        let inner = buffer
            .strip_prefix('=')
            .and_then(|rest| rest.strip_suffix('='))
            .ok_or_else(invalid)?;
        let mut parts = inner.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(start), Some(end), None) => Self::new(start, end).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TagType {
    Variable,
    UnescapeVariable,
    Section,
    InvertedSection,
    SectionEnd,
    Comment,
    Partial,
    Delimiter,
    Extend,
    ExtendSection,
}

impl TagType {
    /// Dispatches on the first character of the captured tag buffer.
    pub(crate) fn classify(buffer: &str) -> Self {
        match buffer.chars().next() {
            Some('#') => Self::Section,
            Some('^') => Self::InvertedSection,
            Some('/') => Self::SectionEnd,
            Some('!') => Self::Comment,
            Some('>') => Self::Partial,
            Some('=') => Self::Delimiter,
            Some('&' | '{') => Self::UnescapeVariable,
            Some('<') => Self::Extend,
            Some('$') => Self::ExtendSection,
            _ => Self::Variable,
        }
    }

    /// Tags that may stand alone on a line and have that line elided.
    pub const fn is_standalone_candidate(self) -> bool {
        !matches!(self, Self::Variable | Self::UnescapeVariable)
    }
}

/// A classified tag; only lives until the segment tree is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub ty: TagType,
    pub content: String,
    pub line: usize,
    pub column: usize,
    /// Byte offset of the start delimiter in the source.
    pub offset: usize,
    /// Byte offset right after the end delimiter.
    pub end_offset: usize,
}

/// Extracts the content of a tag from its raw buffer.
///
/// Sigil-led tags lose the sigil and surrounding whitespace; triple-mustache
/// buffers lose the enclosing braces; comments and delimiter switches keep
/// the buffer as captured.
pub(crate) fn extract_content(ty: TagType, buffer: &str) -> Result<String, ParseErrorKind> {
    let content = match ty {
        TagType::Variable => buffer.trim(),
        TagType::Comment | TagType::Delimiter => return Ok(buffer.to_string()),
        TagType::UnescapeVariable => match buffer.strip_prefix('{') {
            Some(rest) => rest.strip_suffix('}').unwrap_or(rest).trim(),
            None => buffer.get(1..).unwrap_or_default().trim(),
        },
        TagType::Section
        | TagType::InvertedSection
        | TagType::SectionEnd
        | TagType::Partial
        | TagType::Extend
        | TagType::ExtendSection => buffer.get(1..).unwrap_or_default().trim(),
    };
    if content.is_empty() && ty != TagType::SectionEnd {
        return Err(ParseErrorKind::InvalidTag {
            content: buffer.to_string(),
            reason: "tag has no key".to_string(),
        });
    }
    if content.contains(char::is_whitespace) && ty != TagType::SectionEnd {
        return Err(ParseErrorKind::InvalidTag {
            content: buffer.to_string(),
            reason: "key must not contain whitespace".to_string(),
        });
    }
    Ok(content.to_string())
}
