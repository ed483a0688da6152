//! Value predicates: textual matchers and natural-order comparisons.

use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

use crate::error::{LinkedQlError, Result};
use crate::step::ValueFilter;
use crate::value::Value;

/// A compiled `Filter` predicate.
#[derive(Debug, Clone)]
pub enum TextMatcher {
    Regex { regex: Regex, include_iris: bool },
    Like { regex: Regex, pattern: String },
}

impl TextMatcher {
    pub fn compile(filter: &ValueFilter, size_limit: usize) -> Result<Self> {
        match filter {
            ValueFilter::RegExp {
                pattern,
                include_iris,
            } => Ok(TextMatcher::Regex {
                regex: build_regex(pattern, size_limit)?,
                include_iris: *include_iris,
            }),
            ValueFilter::Like { pattern } => Ok(TextMatcher::Like {
                regex: build_regex(&like_to_regex(pattern), size_limit)?,
                pattern: pattern.clone(),
            }),
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            TextMatcher::Regex {
                regex,
                include_iris,
            } => match value {
                Value::Iri(iri) if *include_iris => regex.is_match(iri),
                other => other.text().map(|t| regex.is_match(t)).unwrap_or(false),
            },
            TextMatcher::Like { regex, .. } => match value {
                Value::Iri(iri) => regex.is_match(iri),
                other => other.text().map(|t| regex.is_match(t)).unwrap_or(false),
            },
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TextMatcher::Regex {
                regex,
                include_iris,
            } => format!("regexp /{}/ include_iris={include_iris}", regex.as_str()),
            TextMatcher::Like { pattern, .. } => format!("like {pattern:?}"),
        }
    }
}

fn build_regex(pattern: &str, size_limit: usize) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .size_limit(size_limit)
        .build()
        .map_err(|e| LinkedQlError::malformed(format!("invalid pattern {pattern:?}: {e}")))
}

/// Translate a SQL LIKE pattern into an anchored regular expression.
pub fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("^(?s)");
    let mut literal = String::new();
    let flush = |literal: &mut String, out: &mut String| {
        if !literal.is_empty() {
            out.push_str(&regex::escape(literal));
            literal.clear();
        }
    };
    for c in pattern.chars() {
        match c {
            '%' => {
                flush(&mut literal, &mut out);
                out.push_str(".*");
            }
            '_' => {
                flush(&mut literal, &mut out);
                out.push('.');
            }
            c => literal.push(c),
        }
    }
    flush(&mut literal, &mut out);
    out.push('$');
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    LessThan,
    GreaterThan,
    LessThanEquals,
    GreaterThanEquals,
}

impl CompareOp {
    pub fn name(self) -> &'static str {
        match self {
            CompareOp::LessThan => "LessThan",
            CompareOp::GreaterThan => "GreaterThan",
            CompareOp::LessThanEquals => "LessThanEquals",
            CompareOp::GreaterThanEquals => "GreaterThanEquals",
        }
    }

    fn accepts(self, ord: Ordering) -> bool {
        match self {
            CompareOp::LessThan => ord == Ordering::Less,
            CompareOp::GreaterThan => ord == Ordering::Greater,
            CompareOp::LessThanEquals => ord != Ordering::Greater,
            CompareOp::GreaterThanEquals => ord != Ordering::Less,
        }
    }

    /// Check the operand once, at compile time.
    pub fn check_operand(self, operand: &Value) -> Result<()> {
        if operand.is_orderable() {
            Ok(())
        } else {
            Err(LinkedQlError::TypeMismatch {
                operation: self.name(),
                detail: format!("operand {operand} has no natural ordering"),
            })
        }
    }

    /// `candidate <op> operand`. Values of a different comparison class
    /// never match; unorderable candidates are a type mismatch.
    pub fn evaluate(self, candidate: &Value, operand: &Value) -> Result<bool> {
        match candidate.natural_cmp(operand) {
            Ok(Some(ord)) => Ok(self.accepts(ord)),
            Ok(None) => Ok(false),
            Err(e) => Err(LinkedQlError::TypeMismatch {
                operation: self.name(),
                detail: e.to_string(),
            }),
        }
    }
}
