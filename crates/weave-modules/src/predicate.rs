//! Trigger predicates: tagged boolean-expression trees.
//!
//! Headers compile to a conjunction ([`Predicate::All`]) of leaf clauses, but
//! the tree is fully recursive so callers can build nested combinations.
//! Evaluation never fails: a missing session-state field or a type-mismatched
//! comparison is an unmet condition, not an error.

use std::collections::BTreeSet;

use serde_json::Value;
use weave_core::types::{ComplexityTier, SessionState};

/// Inputs one predicate evaluation reads.
#[derive(Debug, Clone, Copy)]
pub struct TriggerContext<'a> {
    /// Classified (or overridden) tier for the request.
    pub complexity: ComplexityTier,
    /// Lowercased user prompt, matched by keyword clauses.
    pub prompt_lower: &'a str,
    /// Union of capability tags across the request's available inventories.
    pub tags: &'a BTreeSet<String>,
    /// Host session state.
    pub state: &'a SessionState,
}

/// Comparison operator in a session-state condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `<`
    Lt,
}

/// A single `field OP literal` condition over session state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateCondition {
    /// Session-state field the condition reads.
    pub field: String,
    /// How the field is compared.
    pub op: CompareOp,
    /// Literal the field is compared against.
    pub value: Value,
}

impl StateCondition {
    /// Evaluate against the session state. Missing fields and ordered
    /// comparisons on non-numbers are unmet.
    pub fn holds(&self, state: &SessionState) -> bool {
        let Some(actual) = state.get(&self.field) else {
            return false;
        };
        match self.op {
            CompareOp::Eq => values_equal(actual, &self.value),
            CompareOp::Ne => !values_equal(actual, &self.value),
            CompareOp::Ge | CompareOp::Le | CompareOp::Gt | CompareOp::Lt => {
                let (Some(lhs), Some(rhs)) = (actual.as_f64(), self.value.as_f64()) else {
                    return false;
                };
                ordered_holds(self.op, lhs, rhs)
            }
        }
    }
}

fn ordered_holds(op: CompareOp, lhs: f64, rhs: f64) -> bool {
    match op {
        CompareOp::Ge => lhs >= rhs,
        CompareOp::Le => lhs <= rhs,
        CompareOp::Gt => lhs > rhs,
        CompareOp::Lt => lhs < rhs,
        CompareOp::Eq | CompareOp::Ne => false,
    }
}

/// Numbers compare numerically so `6` and `6.0` are equal; everything else
/// uses JSON value equality.
fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return (x - y).abs() < f64::EPSILON;
    }
    a == b
}

/// Boolean expression tree deciding whether a module triggers.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Every child holds. Empty = always true (an ungated module).
    All(Vec<Predicate>),
    /// At least one child holds. Empty = never.
    Any(Vec<Predicate>),
    /// The child does not hold.
    Not(Box<Predicate>),
    /// Any of the (lowercase) keywords occurs in the prompt.
    KeywordAny(Vec<String>),
    /// The request tier is at least this.
    MinComplexity(ComplexityTier),
    /// Every tag is present in the aggregated capability set.
    TagsAll(BTreeSet<String>),
    /// A session-state comparison.
    State(StateCondition),
}

impl Predicate {
    /// An always-true predicate (no gates).
    pub fn always() -> Self {
        Self::All(Vec::new())
    }

    /// Evaluate the tree against a trigger context.
    pub fn evaluate(&self, ctx: &TriggerContext<'_>) -> bool {
        match self {
            Self::All(children) => children.iter().all(|child| child.evaluate(ctx)),
            Self::Any(children) => children.iter().any(|child| child.evaluate(ctx)),
            Self::Not(child) => !child.evaluate(ctx),
            Self::KeywordAny(keywords) => keywords
                .iter()
                .any(|keyword| ctx.prompt_lower.contains(keyword.as_str())),
            Self::MinComplexity(min) => ctx.complexity >= *min,
            Self::TagsAll(tags) => tags.iter().all(|tag| ctx.tags.contains(tag)),
            Self::State(condition) => condition.holds(ctx.state),
        }
    }
}
