//! Prompt templates with validated `{placeholder}` substitution.
//!
//! A template is parsed once. Its placeholder set is checked when the chain is
//! planned, and rendering is a single pass over the parsed segments, so text
//! substituted into the prompt is never scanned for placeholders again.

use crate::domain::errors::ConfigurationError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed task description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse `{name}` placeholders; `{{` and `}}` are literal braces.
    pub fn parse(source: &str) -> Result<Self, ConfigurationError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((position, c)) = chars.next() {
            match c {
                '{' if chars.peek().is_some_and(|&(_, next)| next == '{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().is_some_and(|&(_, next)| next == '}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, inner) in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        name.push(inner);
                    }
                    if !closed {
                        return Err(malformed(position, "unclosed '{'"));
                    }
                    if !is_identifier(&name) {
                        return Err(malformed(
                            position,
                            &format!("invalid placeholder name '{name}'"),
                        ));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' => return Err(malformed(position, "unmatched '}'")),
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Distinct placeholder names, in first-seen order.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Placeholder(name) = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Substitute every placeholder through `resolve`.
    ///
    /// A name `resolve` cannot answer is an error; the literal `{name}` is
    /// never left in the output.
    pub fn render<'a, F>(&self, task_name: &str, resolve: F) -> Result<String, ConfigurationError>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Placeholder(name) => {
                    let value = resolve(name).ok_or_else(|| ConfigurationError::UnresolvedPlaceholder {
                        task: task_name.to_string(),
                        placeholder: name.clone(),
                    })?;
                    rendered.push_str(value);
                }
            }
        }
        Ok(rendered)
    }
}

fn malformed(position: usize, reason: &str) -> ConfigurationError {
    ConfigurationError::MalformedTemplate {
        position,
        reason: reason.to_string(),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
