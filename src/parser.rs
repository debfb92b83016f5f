use std::sync::Arc;

use crate::{
    error::{ParseError, ParseErrorKind},
    tag::{Delimiters, Tag, TagType, extract_content},
};

pub(crate) type ParseResult<T> = Result<T, ParseError>;

/// A typed descriptor emitted by the scanner, consumed by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    /// Literal text; never contains a line separator.
    Text { text: &'a str, line: usize },
    LineSeparator { text: &'a str, line: usize },
    Tag {
        tag: Tag,
        /// The delimiters in effect when the tag was opened.
        delimiters: Arc<Delimiters>,
        /// Leading whitespace of a standalone partial tag.
        indentation: Option<String>,
    },
}

impl Token<'_> {
    fn as_whitespace_text(&self) -> Option<&str> {
        match self {
            Token::Text { text, .. } if text.chars().all(char::is_whitespace) => Some(text),
            Token::Text { .. } | Token::LineSeparator { .. } | Token::Tag { .. } => None,
        }
    }
}

struct Parser<'a> {
    template: &'a str,
    input: &'a str,
    pos: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// The starting location of the current line
    line_start_pos: usize,
    delimiters: Arc<Delimiters>,
}

impl<'a> Parser<'a> {
    fn new(template: &'a str, input: &'a str, delimiters: Delimiters) -> Self {
        Parser {
            template,
            input,
            pos: 0,
            line: 1,
            line_start_pos: 0,
            delimiters: Arc::new(delimiters),
        }
    }

    #[inline]
    fn current_column(&self) -> usize {
        self.pos - self.line_start_pos + 1
    }

    #[inline]
    fn error_at(&self, line: usize, column: usize, kind: ParseErrorKind) -> ParseError {
        ParseError {
            template: self.template.to_string(),
            line,
            column,
            kind,
        }
    }

    /// Advances the parser position by char_len bytes, correctly handling
    /// multi-byte characters. Updates line and column numbers if a newline is
    /// encountered.
    #[inline]
    fn advance_by_char(&mut self, current_char: char, char_len: usize) {
        if current_char == '\n' {
            self.line += 1;
            self.line_start_pos = self.pos + char_len;
        }
        self.pos += char_len;
    }

    /// Advances the parser position by `len` bytes.
    /// This method assumes that the consumed string does NOT contain newlines.
    #[inline]
    fn advance_bytes_no_newline(&mut self, len: usize) {
        self.pos += len;
    }

    /// Advances over `s`, which may span lines.
    fn advance_over(&mut self, s: &str) {
        for c in s.chars() {
            self.advance_by_char(c, c.len_utf8());
        }
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Peek if the remaining input starts with `s`
    fn peek(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn line_separator_len(&self) -> Option<usize> {
        if self.peek("\r\n") {
            Some(2)
        } else if self.peek("\n") {
            Some(1)
        } else {
            None
        }
    }

    fn push_text(&self, start: usize, tokens: &mut Vec<Token<'a>>) {
        let input = self.input;
        if start < self.pos {
            tokens.push(Token::Text {
                text: &input[start..self.pos],
                line: self.line,
            });
        }
    }

    /// Scans the whole input into text, line separator and tag tokens.
    fn scan(&mut self) -> ParseResult<Vec<Token<'a>>> {
        let input = self.input;
        let mut tokens = Vec::new();
        let mut text_start = self.pos;

        while !self.eof() {
            if self.peek(self.delimiters.start()) {
                self.push_text(text_start, &mut tokens);
                let token = self.scan_tag()?;
                tokens.push(token);
                text_start = self.pos;
                continue;
            }

            if let Some(len) = self.line_separator_len() {
                self.push_text(text_start, &mut tokens);
                tokens.push(Token::LineSeparator {
                    text: &input[self.pos..self.pos + len],
                    line: self.line,
                });
                self.advance_bytes_no_newline(len - 1);
                self.advance_by_char('\n', 1);
                text_start = self.pos;
                continue;
            }

            let current_char = input[self.pos..].chars().next().unwrap_or_default();
            self.advance_by_char(current_char, current_char.len_utf8());
        }

        self.push_text(text_start, &mut tokens);
        Ok(tokens)
    }

    /// Scans one tag starting at the current start delimiter.
    ///
    /// Delimiter switches are applied immediately so the rest of the input is
    /// scanned with the new pair; the switch itself is still emitted as a tag.
    fn scan_tag(&mut self) -> ParseResult<Token<'a>> {
        let input = self.input;
        let offset = self.pos;
        let line = self.line;
        let column = self.current_column();
        let delimiters = Arc::clone(&self.delimiters);

        self.advance_bytes_no_newline(delimiters.start().len());

        // Triple mustache is only recognised with the default delimiters.
        let triple = delimiters.is_default() && self.peek("{");
        let close = if triple {
            format!("}}{}", delimiters.end())
        } else {
            delimiters.end().to_string()
        };

        let Some(buffer_len) = input[self.pos..].find(close.as_str()) else {
            return Err(self.error_at(
                line,
                column,
                ParseErrorKind::UnterminatedTag {
                    expected: format!("'{}'", close),
                },
            ));
        };
        let raw = &input[self.pos..self.pos + buffer_len];
        // The closing brace of a triple mustache belongs to the buffer.
        let buffer = if triple {
            &input[self.pos..self.pos + buffer_len + 1]
        } else {
            raw
        };
        self.advance_over(raw);
        self.advance_bytes_no_newline(close.len());

        let trimmed = buffer.trim();
        let ty = TagType::classify(trimmed);
        let content = match ty {
            TagType::Comment => buffer.to_string(),
            TagType::Delimiter => {
                let switched = Delimiters::from_switch_tag(trimmed)
                    .map_err(|kind| self.error_at(line, column, kind))?;
                tracing::trace!(
                    template = self.template,
                    start = switched.start(),
                    end = switched.end(),
                    "delimiters switched"
                );
                self.delimiters = Arc::new(switched);
                trimmed.to_string()
            }
            TagType::Variable
            | TagType::UnescapeVariable
            | TagType::Section
            | TagType::InvertedSection
            | TagType::SectionEnd
            | TagType::Partial
            | TagType::Extend
            | TagType::ExtendSection => {
                extract_content(ty, trimmed).map_err(|kind| self.error_at(line, column, kind))?
            }
        };

        Ok(Token::Tag {
            tag: Tag {
                ty,
                content,
                line,
                column,
                offset,
                end_offset: self.pos,
            },
            delimiters,
            indentation: None,
        })
    }
}

/// Removes the whitespace and line separator around every standalone tag.
///
/// A line is standalone when it holds exactly one tag, that tag is not an
/// interpolation, and every other token on the line is whitespace. A
/// standalone partial keeps its leading whitespace as indentation.
fn remove_standalone_lines(tokens: Vec<Token<'_>>) -> Vec<Token<'_>> {
    let mut keep = vec![true; tokens.len()];
    let mut indentation = Vec::new();
    let mut line_start = 0;

    while line_start < tokens.len() {
        let line_end = tokens[line_start..]
            .iter()
            .position(|t| matches!(t, Token::LineSeparator { .. }))
            .map_or(tokens.len(), |i| line_start + i + 1);
        let line = &tokens[line_start..line_end];

        let mut tag_index = None;
        let mut tag_count = 0;
        let mut standalone = true;
        for (i, token) in line.iter().enumerate() {
            match token {
                Token::Tag { tag, .. } => {
                    tag_count += 1;
                    standalone &= tag.ty.is_standalone_candidate();
                    tag_index = Some(line_start + i);
                }
                Token::Text { .. } => standalone &= token.as_whitespace_text().is_some(),
                Token::LineSeparator { .. } => {}
            }
        }

        if let (true, 1, Some(tag_index)) = (standalone, tag_count, tag_index) {
            if let Some(Token::Tag { tag, .. }) = tokens.get(tag_index) {
                if tag.ty == TagType::Partial {
                    let leading: Vec<&str> = tokens[line_start..tag_index]
                        .iter()
                        .filter_map(Token::as_whitespace_text)
                        .collect();
                    if !leading.is_empty() {
                        indentation.push((tag_index, leading.concat()));
                    }
                }
            }
            for (i, flag) in keep.iter_mut().enumerate().take(line_end).skip(line_start) {
                *flag = i == tag_index;
            }
        }

        line_start = line_end;
    }

    let mut indentation = indentation.into_iter().peekable();
    tokens
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep[*i])
        .map(|(i, token)| match token {
            Token::Tag {
                tag,
                delimiters,
                indentation: _,
            } if indentation.peek().is_some_and(|(at, _)| *at == i) => Token::Tag {
                tag,
                delimiters,
                indentation: indentation.next().map(|(_, s)| s),
            },
            other => other,
        })
        .collect()
}

/// Scans `input` into a descriptor stream, optionally eliding standalone lines.
pub(crate) fn tokenize<'a>(
    template: &'a str,
    input: &'a str,
    delimiters: Delimiters,
    standalone_lines: bool,
) -> ParseResult<Vec<Token<'a>>> {
    if input.is_empty() {
        return Ok(Vec::new());
    }
    let mut parser = Parser::new(template, input, delimiters);
    let tokens = parser.scan()?;
    if standalone_lines {
        Ok(remove_standalone_lines(tokens))
    } else {
        Ok(tokens)
    }
}
