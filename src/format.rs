//! Format templates applied per row by the `fprintf` family of output helpers.
//!
//! Placeholders:
//! - `{}` takes the next field (key fields first, then value fields)
//! - `{N}` takes field `N`, counted from 0 over the same sequence
//! - `{{` and `}}` are literal braces
//!
//! Any other text, including lone braces, is copied as is.

use crate::error::{Error, Result};
use crate::value::Value;
use regex::Regex;
use std::fmt::Write as _;
use std::sync::OnceLock;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Next,
    Index(usize),
}

/// A parsed, reusable format template.
#[derive(Clone, Debug)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{|\}\}|\{(\d*)\}").expect("placeholder pattern is valid"))
}

impl Template {
    /// Parse `source` into literal and placeholder segments.
    ///
    /// # Errors
    /// Returns [`Error::Format`] when a positional index does not fit in `usize`.
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut last = 0;
        for caps in placeholder_re().captures_iter(source) {
            let Some(m) = caps.get(0) else { continue };
            literal.push_str(&source[last..m.start()]);
            last = m.end();
            match m.as_str() {
                "{{" => literal.push('{'),
                "}}" => literal.push('}'),
                _ => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    let digits = caps.get(1).map_or("", |d| d.as_str());
                    if digits.is_empty() {
                        segments.push(Segment::Next);
                    } else {
                        let index = digits.parse().map_err(|_| Error::Format {
                            template: source.to_string(),
                            message: format!("placeholder index {digits} is too large"),
                        })?;
                        segments.push(Segment::Index(index));
                    }
                }
            }
        }
        literal.push_str(&source[last..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render the template against `fields`, appending to `out`.
    ///
    /// # Errors
    /// Returns [`Error::Format`] when a placeholder refers past the last field.
    pub fn render_into<'a>(
        &self,
        out: &mut String,
        fields: impl IntoIterator<Item = &'a Value>,
    ) -> Result<()> {
        let fields: Vec<&Value> = fields.into_iter().collect();
        let mut next = 0;
        for segment in &self.segments {
            let index = match segment {
                Segment::Literal(s) => {
                    out.push_str(s);
                    continue;
                }
                Segment::Next => {
                    next += 1;
                    next - 1
                }
                Segment::Index(i) => *i,
            };
            let field = fields.get(index).ok_or_else(|| Error::Format {
                template: self.source.clone(),
                message: format!("missing field {index} (row has {})", fields.len()),
            })?;
            // Writing into a String cannot fail.
            let _ = write!(out, "{field}");
        }
        Ok(())
    }

    pub fn render<'a>(&self, fields: impl IntoIterator<Item = &'a Value>) -> Result<String> {
        let mut out = String::new();
        self.render_into(&mut out, fields)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_and_positional_placeholders() {
        let t = Template::parse("{} has {1} ({0})").unwrap();
        let fields = [Value::from("apples"), Value::I32(3)];
        assert_eq!(t.render(&fields).unwrap(), "apples has 3 (apples)");
    }

    #[test]
    fn escaped_braces_are_literal() {
        let t = Template::parse("{{{}}}").unwrap();
        assert_eq!(t.render(&[Value::U8(1)]).unwrap(), "{1}");
    }

    #[test]
    fn missing_field_is_an_error() {
        let t = Template::parse("{} {}").unwrap();
        let err = t.render(&[Value::Bool(true)]).unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }
}
