use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::resolver::Hint;
use crate::tag::Delimiters;

/// Where a segment came from, for error messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    pub template: Arc<str>,
    pub line: usize,
}

/// Holds the hint manufactured for the leading part of a key.
///
/// The slot is the only interior mutability in a compiled tree. It is shared
/// by every thread rendering the template, so it stores `Arc`s and swaps them
/// under a lock.
#[derive(Default)]
pub struct HintSlot(RwLock<Option<Arc<dyn Hint>>>);

impl HintSlot {
    pub fn get(&self) -> Option<Arc<dyn Hint>> {
        self.0.read().clone()
    }

    pub fn set(&self, hint: Option<Arc<dyn Hint>>) {
        *self.0.write() = hint;
    }

    pub fn is_set(&self) -> bool {
        self.0.read().is_some()
    }
}

impl fmt::Debug for HintSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HintSlot").field(&self.is_set()).finish()
    }
}

/// A key as written in a tag, pre-split into parts at compile time.
#[derive(Debug)]
pub struct ValueKey {
    pub(crate) key: String,
    pub(crate) parts: Vec<String>,
    pub(crate) hint: HintSlot,
}

impl ValueKey {
    pub(crate) fn new(key: String, parts: Vec<String>) -> Self {
        Self {
            key,
            parts,
            hint: HintSlot::default(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn hint(&self) -> &HintSlot {
        &self.hint
    }
}

/// A node of a compiled template.
///
/// Trees are immutable once compiled: children are only reachable through
/// shared slices, so nothing can rearrange a tree while it is rendered.
#[derive(Debug)]
pub enum Segment {
    Text(String),
    LineSeparator(String),
    Value {
        key: ValueKey,
        unescape: bool,
        origin: Origin,
        id: usize,
        delimiters: Arc<Delimiters>,
    },
    Section {
        key: ValueKey,
        children: Vec<Segment>,
        origin: Origin,
        /// The unprocessed source between the section tags, for lambdas.
        literal: String,
        delimiters: Arc<Delimiters>,
    },
    InvertedSection {
        key: ValueKey,
        children: Vec<Segment>,
        origin: Origin,
    },
    Partial {
        name: String,
        origin: Origin,
        indentation: Option<String>,
    },
    Extend {
        name: String,
        children: Vec<Segment>,
        origin: Origin,
    },
    ExtendSection {
        name: String,
        children: Arc<[Segment]>,
        origin: Origin,
    },
    /// Retained only when unnecessary segments are kept; renders nothing.
    Comment(String),
    /// Retained only when unnecessary segments are kept; renders nothing.
    Delimiters(String),
}

impl Segment {
    pub fn children(&self) -> &[Segment] {
        match self {
            Self::Section { children, .. }
            | Self::InvertedSection { children, .. }
            | Self::Extend { children, .. } => children,
            Self::ExtendSection { children, .. } => children,
            Self::Text(_)
            | Self::LineSeparator(_)
            | Self::Value { .. }
            | Self::Partial { .. }
            | Self::Comment(_)
            | Self::Delimiters(_) => &[],
        }
    }

    /// Writes this segment and its children as an indented tree.
    pub(crate) fn write_tree(&self, f: &mut dyn fmt::Write, depth: usize) -> fmt::Result {
        writeln!(f, "{:indent$}{}", "", self, indent = depth * 2)?;
        for child in self.children() {
            child.write_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "TEXT {:?}", text),
            Self::LineSeparator(text) => write!(f, "LINE_SEPARATOR {:?}", text),
            Self::Value {
                key, unescape, id, ..
            } => {
                let kind = if *unescape { "UNESCAPE_VALUE" } else { "VALUE" };
                write!(f, "{} {} #{}", kind, key.key(), id)
            }
            Self::Section { key, .. } => write!(f, "SECTION {}", key.key()),
            Self::InvertedSection { key, .. } => write!(f, "INVERTED_SECTION {}", key.key()),
            Self::Partial { name, .. } => write!(f, "PARTIAL {}", name),
            Self::Extend { name, .. } => write!(f, "EXTEND {}", name),
            Self::ExtendSection { name, .. } => write!(f, "EXTEND_SECTION {}", name),
            Self::Comment(content) => write!(f, "COMMENT {:?}", content),
            Self::Delimiters(content) => write!(f, "DELIMITERS {}", content),
        }
    }
}
