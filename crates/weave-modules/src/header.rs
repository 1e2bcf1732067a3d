//! Module metadata header parsing.
//!
//! A module file may begin with a fenced header:
//!
//! ```text
//! ---
//! priority: 20
//! keywords: refactor, multi-file
//! min_complexity: medium
//! requires_tags: filesystem
//! requires_state: tool_call_count >= 6, has_plan = true
//! ---
//! body text…
//! ```
//!
//! Recognized keys compile to a conjunction of trigger clauses. Unknown keys
//! warn and are ignored; malformed values reject the whole file. A file with
//! no header is a valid, ungated module.

use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use weave_core::types::ComplexityTier;

use crate::predicate::{CompareOp, Predicate, StateCondition};

/// Priority used when the header does not set one.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Parsed header plus the verbatim body that follows it.
#[derive(Debug, Clone)]
pub struct ParsedModuleFile {
    /// Render order within a kind; lower first.
    pub priority: i32,
    /// Conjunction of the header's trigger clauses.
    pub predicate: Predicate,
    /// Everything after the closing fence, untouched.
    pub body: String,
}

/// Why a module file's header was rejected.
#[derive(Debug, Error)]
pub enum HeaderError {
    /// The opening `---` fence has no matching close.
    #[error("header opened with `---` but never closed")]
    Unterminated,
    /// A header line is not `key: value`.
    #[error("line {line} is not `key: value`: `{text}`")]
    MalformedLine {
        /// 1-based line number in the file.
        line: usize,
        /// The offending line.
        text: String,
    },
    /// `priority` is not an integer.
    #[error("invalid priority `{value}`")]
    InvalidPriority {
        /// The offending value.
        value: String,
    },
    /// `min_complexity` names no known tier.
    #[error("unknown complexity tier `{value}` (expected low, medium, or high)")]
    UnknownTier {
        /// The offending value.
        value: String,
    },
    /// A `requires_state` condition does not parse.
    #[error("invalid state condition `{value}`: {reason}")]
    InvalidCondition {
        /// The offending condition text.
        value: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Operators ordered so two-character symbols match before their one-character
/// prefixes (`>=` before `=`).
const CONDITION_OPS: &[(&str, CompareOp)] = &[
    ("!=", CompareOp::Ne),
    (">=", CompareOp::Ge),
    ("<=", CompareOp::Le),
    (">", CompareOp::Gt),
    ("<", CompareOp::Lt),
    ("=", CompareOp::Eq),
];

/// Parse a module file into its priority, predicate, and verbatim body.
pub fn parse_module_file(content: &str) -> Result<ParsedModuleFile, HeaderError> {
    let Some(rest) = strip_opening_fence(content) else {
        return Ok(ParsedModuleFile {
            priority: DEFAULT_PRIORITY,
            predicate: Predicate::always(),
            body: content.to_string(),
        });
    };

    let mut consumed = 0;
    let mut closed = false;
    let mut priority = DEFAULT_PRIORITY;
    let mut clauses = Vec::new();

    for (index, line) in rest.split_inclusive('\n').enumerate() {
        consumed += line.len();
        let text = line.trim_end_matches(['\n', '\r']);
        if text == "---" {
            closed = true;
            break;
        }
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once(':') else {
            // The opening fence is line 1, so header lines start at 2.
            return Err(HeaderError::MalformedLine {
                line: index + 2,
                text: trimmed.to_string(),
            });
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "priority" => {
                priority = value.trim().parse().map_err(|_| HeaderError::InvalidPriority {
                    value: value.trim().to_string(),
                })?;
            }
            "keywords" => {
                let keywords = split_list(value);
                if !keywords.is_empty() {
                    clauses.push(Predicate::KeywordAny(keywords));
                }
            }
            "min_complexity" => {
                let tier =
                    ComplexityTier::parse(value).ok_or_else(|| HeaderError::UnknownTier {
                        value: value.trim().to_string(),
                    })?;
                clauses.push(Predicate::MinComplexity(tier));
            }
            "requires_tags" => {
                let tags: std::collections::BTreeSet<String> =
                    split_list(value).into_iter().collect();
                if !tags.is_empty() {
                    clauses.push(Predicate::TagsAll(tags));
                }
            }
            "requires_state" => {
                for part in value.split(',').filter(|part| !part.trim().is_empty()) {
                    clauses.push(Predicate::State(parse_condition(part)?));
                }
            }
            other => {
                warn!(key = other, "ignoring unknown module header key");
            }
        }
    }

    if !closed {
        return Err(HeaderError::Unterminated);
    }

    Ok(ParsedModuleFile {
        priority,
        predicate: Predicate::All(clauses),
        body: rest[consumed..].to_string(),
    })
}

/// The header fence must be the very first line.
fn strip_opening_fence(content: &str) -> Option<&str> {
    content
        .strip_prefix("---\r\n")
        .or_else(|| content.strip_prefix("---\n"))
        .or_else(|| (content == "---").then_some(""))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Parse one `field OP literal` condition. Literals parse as JSON scalars
/// where possible; bare words fall back to strings.
fn parse_condition(text: &str) -> Result<StateCondition, HeaderError> {
    let trimmed = text.trim();
    for (symbol, op) in CONDITION_OPS {
        let Some(index) = trimmed.find(symbol) else {
            continue;
        };
        let field = trimmed[..index].trim();
        let literal = trimmed[index + symbol.len()..].trim();
        if field.is_empty() {
            return Err(HeaderError::InvalidCondition {
                value: trimmed.to_string(),
                reason: "missing field name".to_string(),
            });
        }
        if literal.is_empty() {
            return Err(HeaderError::InvalidCondition {
                value: trimmed.to_string(),
                reason: "missing literal".to_string(),
            });
        }
        let value = serde_json::from_str(literal)
            .unwrap_or_else(|_| Value::String(literal.to_string()));
        return Ok(StateCondition {
            field: field.to_string(),
            op: *op,
            value,
        });
    }
    Err(HeaderError::InvalidCondition {
        value: trimmed.to_string(),
        reason: "no comparison operator".to_string(),
    })
}
