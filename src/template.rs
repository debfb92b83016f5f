use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::context::ExecutionContext;
use crate::engine::MustachioEngine;
use crate::error::{MustachioError, MustachioResult};
use crate::interface::MustachioInterface;
use crate::resolver::IterationMeta;
use crate::segment::{Origin, Segment, ValueKey};
use crate::tag::Delimiters;
use crate::value::{InputType, Lambda, Value};

static NEXT_TEMPLATE_ID: AtomicUsize = AtomicUsize::new(0);

/// A compiled template.
///
/// Immutable and shared between render threads; obtain one through
/// [`MustachioInterface::get_template`] or
/// [`MustachioInterface::compile_template`].
#[derive(Debug)]
pub struct Template {
    name: String,
    id: usize,
    segments: Vec<Segment>,
}

impl Template {
    pub(crate) fn new(name: &str, segments: Vec<Segment>) -> Self {
        Self {
            name: name.to_string(),
            id: NEXT_TEMPLATE_ID.fetch_add(1, Ordering::Relaxed),
            segments,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unique among all templates compiled by this process.
    pub const fn id(&self) -> usize {
        self.id
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Renders this template against `data`.
    ///
    /// # Errors
    /// See [`MustachioInterface::render`].
    pub fn render<D: Into<Value>>(&self, engine: &MustachioEngine, data: D) -> MustachioResult<String> {
        let mut output = String::new();
        self.render_to(engine, data, &mut output)?;
        Ok(output)
    }

    /// Renders this template against `data`, appending to `sink`.
    ///
    /// # Errors
    /// See [`MustachioInterface::render`].
    pub fn render_to<D: Into<Value>>(
        &self,
        engine: &MustachioEngine,
        data: D,
        sink: &mut dyn fmt::Write,
    ) -> MustachioResult<()> {
        let context = ExecutionContext::new(engine)
            .push_template_invocation(&self.name)?
            .push_context_object(data.into());
        render_segments(&self.segments, &context, &mut Output::new(sink))
    }

    /// The segment tree in a readable form, one segment per line.
    pub fn debug_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TEMPLATE {} #{}", self.name, self.id)?;
        for segment in &self.segments {
            segment.write_tree(f, 1)?;
        }
        Ok(())
    }
}

/// An append-only sink that indents lines rendered inside standalone
/// partials.
pub(crate) struct Output<'w> {
    sink: &'w mut dyn fmt::Write,
    indentation: Vec<String>,
    at_line_start: bool,
}

impl<'w> Output<'w> {
    pub(crate) fn new(sink: &'w mut dyn fmt::Write) -> Self {
        Self {
            sink,
            indentation: Vec::new(),
            at_line_start: true,
        }
    }

    pub(crate) fn write_text(&mut self, text: &str) -> fmt::Result {
        if text.is_empty() {
            return Ok(());
        }
        if self.at_line_start {
            for indentation in &self.indentation {
                self.sink.write_str(indentation)?;
            }
            self.at_line_start = false;
        }
        self.sink.write_str(text)
    }

    pub(crate) fn write_line_separator(&mut self, separator: &str) -> fmt::Result {
        self.sink.write_str(separator)?;
        self.at_line_start = true;
        Ok(())
    }

    fn push_indentation(&mut self, indentation: Option<&str>) {
        self.indentation
            .push(indentation.unwrap_or_default().to_string());
    }

    fn pop_indentation(&mut self) {
        self.indentation.pop();
    }
}

pub(crate) fn render_segments(
    segments: &[Segment],
    context: &ExecutionContext<'_>,
    out: &mut Output<'_>,
) -> MustachioResult<()> {
    for segment in segments {
        render_segment(segment, context, out)?;
    }
    Ok(())
}

fn render_segment(segment: &Segment, context: &ExecutionContext<'_>, out: &mut Output<'_>) -> MustachioResult<()> {
    match segment {
        Segment::Text(text) => out.write_text(text)?,
        Segment::LineSeparator(separator) => out.write_line_separator(separator)?,
        Segment::Value {
            key,
            unescape,
            origin,
            delimiters,
            ..
        } => render_value(key, *unescape, origin, delimiters, context, out)?,
        Segment::Section {
            key,
            children,
            literal,
            delimiters,
            ..
        } => render_section(key, children, literal, delimiters, context, out)?,
        Segment::InvertedSection { key, children, .. } => {
            let value = context.get_value(key)?;
            if value.value().is_none_or(Value::is_falsy) {
                render_segments(children, context, out)?;
            }
        }
        Segment::Partial {
            name,
            origin,
            indentation,
        } => {
            let template = referenced_template(context.engine(), name, origin)?;
            let context = context.push_template_invocation(name)?;
            out.push_indentation(indentation.as_deref());
            let rendered = render_segments(template.segments(), &context, out);
            out.pop_indentation();
            rendered?;
        }
        Segment::Extend {
            name,
            children,
            origin,
        } => {
            let template = referenced_template(context.engine(), name, origin)?;
            let overrides: HashMap<String, Arc<[Segment]>> = children
                .iter()
                .filter_map(|child| {
                    if let Segment::ExtendSection { name, children, .. } = child {
                        Some((name.clone(), Arc::clone(children)))
                    } else {
                        None
                    }
                })
                .collect();
            let context = context
                .push_overrides(overrides)
                .push_template_invocation(name)?;
            render_segments(template.segments(), &context, out)?;
        }
        Segment::ExtendSection { name, children, .. } => {
            let segments = context
                .get_override(name)
                .unwrap_or_else(|| Arc::clone(children));
            render_segments(&segments, context, out)?;
        }
        Segment::Comment(_) | Segment::Delimiters(_) => {}
    }
    Ok(())
}

fn referenced_template(engine: &MustachioEngine, name: &str, origin: &Origin) -> MustachioResult<Arc<Template>> {
    engine.get_template(name).map_err(|error| {
        if matches!(error, MustachioError::TemplateNotFound { .. }) {
            MustachioError::InvalidReference {
                reference: name.to_string(),
                template_name: origin.template.to_string(),
                line: origin.line,
            }
        } else {
            error
        }
    })
}

fn render_value(
    key: &ValueKey,
    unescape: bool,
    origin: &Origin,
    delimiters: &Delimiters,
    context: &ExecutionContext<'_>,
    out: &mut Output<'_>,
) -> MustachioResult<()> {
    let engine = context.engine();
    let resolved = context.get_value(key)?;
    let value = match resolved.value() {
        Some(value) => value.clone(),
        None => match engine.missing_value_handler().handle(key.key(), origin)? {
            Some(substitute) => substitute,
            None => return Ok(()),
        },
    };

    let text = if let Value::Lambda(lambda) = &value {
        let result = lambda.invoke("")?;
        if lambda.is_return_value_interpolated() {
            let template = engine.lambda_template(delimiters, &result)?;
            let mut rendered = String::new();
            render_segments(template.segments(), context, &mut Output::new(&mut rendered))?;
            rendered
        } else {
            result
        }
    } else {
        value.to_string()
    };

    if unescape || engine.configuration().skip_value_escaping {
        out.write_text(&text)?;
    } else {
        out.write_text(&engine.text_support().escape_html(&text))?;
    }
    Ok(())
}

fn render_section(
    key: &ValueKey,
    children: &[Segment],
    literal: &str,
    delimiters: &Delimiters,
    context: &ExecutionContext<'_>,
    out: &mut Output<'_>,
) -> MustachioResult<()> {
    let resolved = context.get_value(key)?;
    let Some(value) = resolved.value() else {
        return Ok(());
    };
    if value.is_falsy() {
        return Ok(());
    }

    match value {
        Value::List(items) => {
            for (position, item) in items.iter().enumerate() {
                let scope = context
                    .push_context_object(IterationMeta::new(position, items.len()).frame())
                    .push_context_object(item.clone());
                render_segments(children, &scope, out)?;
            }
        }
        Value::Lambda(lambda) => {
            render_lambda_section(lambda.as_ref(), children, literal, delimiters, context, out)?;
        }
        Value::Bool(_) => render_segments(children, context, out)?,
        Value::Null
        | Value::Int(_)
        | Value::Float(_)
        | Value::String(_)
        | Value::Map(_)
        | Value::Object(_) => {
            render_segments(children, &context.push_context_object(value.clone()), out)?;
        }
    }
    Ok(())
}

fn render_lambda_section(
    lambda: &dyn Lambda,
    children: &[Segment],
    literal: &str,
    delimiters: &Delimiters,
    context: &ExecutionContext<'_>,
    out: &mut Output<'_>,
) -> MustachioResult<()> {
    let input = match lambda.input_type() {
        InputType::Literal => Cow::Borrowed(literal),
        InputType::Processed => {
            let mut rendered = String::new();
            render_segments(children, context, &mut Output::new(&mut rendered))?;
            Cow::Owned(rendered)
        }
    };
    let result = lambda.invoke(&input)?;
    if lambda.is_return_value_interpolated() {
        let template = context.engine().lambda_template(delimiters, &result)?;
        render_segments(template.segments(), context, out)?;
    } else {
        out.write_text(&result)?;
    }
    Ok(())
}
