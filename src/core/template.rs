/// Scene text rendering — placeholder substitution against actor
/// identity and scene-local flags.

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::warn;

use crate::schema::actor::{Pronouns, Value};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template parse error: {0}")]
    Parse(String),
}

/// A segment of parsed scene text.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal text, emitted as-is.
    Literal(String),
    /// `{name}` — the actor's display name.
    Name,
    /// `{subject}` / `{object}` / `{possessive}` pronoun forms.
    Pronoun(PronounRole),
    /// `{currency}` — the actor's current balance.
    Currency,
    /// Any other `{key}` — looked up in the session's scene flags.
    Flag(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PronounRole {
    Subject,
    Object,
    Possessive,
}

/// Substitution values supplied by the session at render time.
pub struct RenderContext<'a> {
    pub name: &'a str,
    pub pronouns: Pronouns,
    pub currency: i64,
    pub flags: &'a FxHashMap<String, Value>,
}

/// Parsed scene text — a sequence of segments.
///
/// Syntax:
/// - `{name}`, `{subject}`, `{object}`, `{possessive}`, `{currency}`
///   → actor substitutions
/// - any other `{key}` → scene-flag lookup
/// - `{{` / `}}` → literal braces
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub segments: Vec<Segment>,
}

impl Template {
    pub fn parse(input: &str) -> Result<Template, TemplateError> {
        let mut segments = Vec::new();
        let mut literal_buf = String::new();
        let chars: Vec<char> = input.chars().collect();
        let len = chars.len();
        let mut i = 0;

        while i < len {
            if chars[i] == '{' {
                // Escaped brace
                if i + 1 < len && chars[i + 1] == '{' {
                    literal_buf.push('{');
                    i += 2;
                    continue;
                }

                // Flush any accumulated literal
                if !literal_buf.is_empty() {
                    segments.push(Segment::Literal(literal_buf.clone()));
                    literal_buf.clear();
                }

                let start = i + 1;
                let mut end = start;
                while end < len && chars[end] != '}' {
                    if chars[end] == '{' {
                        return Err(TemplateError::Parse(
                            "nested braces are not allowed".to_string(),
                        ));
                    }
                    end += 1;
                }
                if end == len {
                    return Err(TemplateError::Parse("unclosed brace".to_string()));
                }

                let content: String = chars[start..end].iter().collect();
                if content.is_empty() {
                    return Err(TemplateError::Parse("empty braces".to_string()));
                }

                segments.push(Self::parse_segment(&content));
                i = end + 1;
            } else if chars[i] == '}' {
                if i + 1 < len && chars[i + 1] == '}' {
                    literal_buf.push('}');
                    i += 2;
                    continue;
                }
                return Err(TemplateError::Parse("unmatched closing brace".to_string()));
            } else {
                literal_buf.push(chars[i]);
                i += 1;
            }
        }

        if !literal_buf.is_empty() {
            segments.push(Segment::Literal(literal_buf));
        }

        Ok(Template { segments })
    }

    fn parse_segment(content: &str) -> Segment {
        match content {
            "name" => Segment::Name,
            "subject" => Segment::Pronoun(PronounRole::Subject),
            "object" => Segment::Pronoun(PronounRole::Object),
            "possessive" => Segment::Pronoun(PronounRole::Possessive),
            "currency" => Segment::Currency,
            other => Segment::Flag(other.to_string()),
        }
    }

    /// Render against the given context. Missing flag keys emit the
    /// raw placeholder and log a warning; bad content should be
    /// visible, not invisible.
    pub fn render(&self, ctx: &RenderContext<'_>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Name => out.push_str(ctx.name),
                Segment::Pronoun(PronounRole::Subject) => out.push_str(ctx.pronouns.subject()),
                Segment::Pronoun(PronounRole::Object) => out.push_str(ctx.pronouns.object()),
                Segment::Pronoun(PronounRole::Possessive) => {
                    out.push_str(ctx.pronouns.possessive())
                }
                Segment::Currency => out.push_str(&ctx.currency.to_string()),
                Segment::Flag(key) => match ctx.flags.get(key) {
                    Some(value) => out.push_str(&value.to_string()),
                    None => {
                        warn!(placeholder = %key, "scene text references unknown placeholder");
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                },
            }
        }
        out
    }
}

/// Parse-and-render in one step. Unparseable text is returned as-is
/// with a warning; a typo in one node must not abort the session.
pub fn render_text(text: &str, ctx: &RenderContext<'_>) -> String {
    match Template::parse(text) {
        Ok(template) => template.render(ctx),
        Err(err) => {
            warn!(error = %err, "scene text failed to parse; emitting raw");
            text.to_string()
        }
    }
}
