use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{ParseError, ParseErrorKind};
use crate::parser::{ParseResult, Token, tokenize};
use crate::segment::{Origin, Segment, ValueKey};
use crate::support::KeySplitter;
use crate::tag::{Delimiters, Tag, TagType};
use crate::template::Template;

static NEXT_VALUE_ID: AtomicUsize = AtomicUsize::new(0);

/// The engine settings that shape a compiled tree.
#[derive(Clone)]
pub(crate) struct Compiler {
    pub(crate) delimiters: Delimiters,
    pub(crate) remove_standalone_lines: bool,
    pub(crate) remove_unnecessary_segments: bool,
    pub(crate) key_splitter: Arc<dyn KeySplitter>,
}

impl Compiler {
    pub(crate) fn compile(&self, name: &str, source: &str) -> ParseResult<Template> {
        self.compile_with_delimiters(name, source, self.delimiters.clone())
    }

    /// Compiles `source` starting from `delimiters` instead of the
    /// configured ones.
    pub(crate) fn compile_with_delimiters(
        &self,
        name: &str,
        source: &str,
        delimiters: Delimiters,
    ) -> ParseResult<Template> {
        let tokens = tokenize(name, source, delimiters, self.remove_standalone_lines)?;
        let segments = SegmentTreeBuilder::new(
            name,
            source,
            self.key_splitter.as_ref(),
            self.remove_unnecessary_segments,
        )
        .build(tokens)?;
        let template = Template::new(name, segments);
        tracing::debug!(template = name, id = template.id(), "template compiled");
        Ok(template)
    }
}

/// A block tag waiting for its end tag.
struct OpenBlock {
    tag: Tag,
    delimiters: Arc<Delimiters>,
    children: Vec<Segment>,
}

/// Builds a segment tree out of the descriptor stream produced by the parser.
pub(crate) struct SegmentTreeBuilder<'a> {
    template: Arc<str>,
    source: &'a str,
    key_splitter: &'a dyn KeySplitter,
    remove_unnecessary_segments: bool,
    stack: Vec<OpenBlock>,
    root: Vec<Segment>,
}

impl<'a> SegmentTreeBuilder<'a> {
    pub(crate) fn new(
        template: &str,
        source: &'a str,
        key_splitter: &'a dyn KeySplitter,
        remove_unnecessary_segments: bool,
    ) -> Self {
        Self {
            template: Arc::from(template),
            source,
            key_splitter,
            remove_unnecessary_segments,
            stack: Vec::new(),
            root: Vec::new(),
        }
    }

    fn error(&self, tag: &Tag, kind: ParseErrorKind) -> ParseError {
        ParseError {
            template: self.template.to_string(),
            line: tag.line,
            column: tag.column,
            kind,
        }
    }

    fn origin(&self, tag: &Tag) -> Origin {
        Origin {
            template: Arc::clone(&self.template),
            line: tag.line,
        }
    }

    fn value_key(&self, key: String) -> ValueKey {
        let parts = self.key_splitter.split(&key);
        ValueKey::new(key, parts)
    }

    fn current(&mut self) -> &mut Vec<Segment> {
        match self.stack.last_mut() {
            Some(block) => &mut block.children,
            None => &mut self.root,
        }
    }

    pub(crate) fn build(mut self, tokens: Vec<Token<'_>>) -> ParseResult<Vec<Segment>> {
        for token in tokens {
            match token {
                Token::Text { text, .. } => self.current().push(Segment::Text(text.to_string())),
                Token::LineSeparator { text, .. } => {
                    self.current().push(Segment::LineSeparator(text.to_string()));
                }
                Token::Tag {
                    tag,
                    delimiters,
                    indentation,
                } => self.tag(tag, delimiters, indentation)?,
            }
        }

        if let Some(open) = self.stack.last() {
            return Err(self.error(
                &open.tag,
                ParseErrorKind::UnterminatedSection {
                    name: open.tag.content.clone(),
                },
            ));
        }
        Ok(self.root)
    }

    fn tag(
        &mut self,
        tag: Tag,
        delimiters: Arc<Delimiters>,
        indentation: Option<String>,
    ) -> ParseResult<()> {
        match tag.ty {
            TagType::Variable | TagType::UnescapeVariable => {
                let segment = Segment::Value {
                    origin: self.origin(&tag),
                    unescape: tag.ty == TagType::UnescapeVariable,
                    id: NEXT_VALUE_ID.fetch_add(1, Ordering::Relaxed),
                    key: self.value_key(tag.content),
                    delimiters,
                };
                self.current().push(segment);
            }
            TagType::Section | TagType::InvertedSection | TagType::ExtendSection => {
                self.stack.push(OpenBlock {
                    tag,
                    delimiters,
                    children: Vec::new(),
                });
            }
            TagType::Extend => {
                // Only one level of inheritance per compile unit.
                if self.stack.iter().any(|open| open.tag.ty == TagType::Extend) {
                    return Err(self.error(
                        &tag,
                        ParseErrorKind::NestedExtendNotSupported {
                            name: tag.content.clone(),
                        },
                    ));
                }
                self.stack.push(OpenBlock {
                    tag,
                    delimiters,
                    children: Vec::new(),
                });
            }
            TagType::SectionEnd => self.close(tag)?,
            TagType::Partial => {
                let segment = Segment::Partial {
                    origin: self.origin(&tag),
                    name: tag.content,
                    indentation,
                };
                self.current().push(segment);
            }
            TagType::Comment => {
                if !self.remove_unnecessary_segments {
                    self.current().push(Segment::Comment(tag.content));
                }
            }
            TagType::Delimiter => {
                if !self.remove_unnecessary_segments {
                    self.current().push(Segment::Delimiters(tag.content));
                }
            }
        }
        Ok(())
    }

    fn close(&mut self, end: Tag) -> ParseResult<()> {
        let Some(open) = self.stack.pop() else {
            return Err(self.error(
                &end,
                ParseErrorKind::InvalidSectionEnd {
                    expected: None,
                    found: end.content.clone(),
                },
            ));
        };
        if open.tag.content != end.content {
            return Err(self.error(
                &end,
                ParseErrorKind::InvalidSectionEnd {
                    expected: Some(open.tag.content.clone()),
                    found: end.content.clone(),
                },
            ));
        }

        let origin = self.origin(&open.tag);
        let segment = match open.tag.ty {
            TagType::Section => Segment::Section {
                literal: self
                    .source
                    .get(open.tag.end_offset..end.offset)
                    .unwrap_or_default()
                    .to_string(),
                key: self.value_key(open.tag.content),
                children: open.children,
                origin,
                delimiters: open.delimiters,
            },
            TagType::InvertedSection => Segment::InvertedSection {
                key: self.value_key(open.tag.content),
                children: open.children,
                origin,
            },
            TagType::Extend => Segment::Extend {
                name: open.tag.content,
                children: open.children,
                origin,
            },
            TagType::ExtendSection => {
                let in_extend = self
                    .stack
                    .last()
                    .is_some_and(|parent| parent.tag.ty == TagType::Extend);
                if in_extend {
                    let duplicate = self.current().iter().any(|sibling| {
                        matches!(sibling, Segment::ExtendSection { name, .. } if *name == open.tag.content)
                    });
                    if duplicate {
                        return Err(self.error(
                            &open.tag,
                            ParseErrorKind::DuplicateExtendSection {
                                name: open.tag.content.clone(),
                            },
                        ));
                    }
                }
                Segment::ExtendSection {
                    name: open.tag.content,
                    children: Arc::from(open.children),
                    origin,
                }
            }
            TagType::Variable
            | TagType::UnescapeVariable
            | TagType::SectionEnd
            | TagType::Comment
            | TagType::Partial
            | TagType::Delimiter => unreachable!("only block tags are pushed on the stack"),
        };
        self.current().push(segment);
        Ok(())
    }
}
