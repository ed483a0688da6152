//! Value model shared by the store and the query compiler.
//!
//! A [`Value`] is either an identifier (IRI, blank node) or a literal. Values
//! carry two orderings:
//!
//! - a **total order** (`Ord`), used to sort result sets: kinds are ranked
//!   first, then compared within the kind (numerics numerically);
//! - a **natural comparison** ([`Value::natural_cmp`]), used by comparison
//!   filters, which is only defined inside a comparison class.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_INT: &str = "http://www.w3.org/2001/XMLSchema#int";
pub const XSD_LONG: &str = "http://www.w3.org/2001/XMLSchema#long";
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
pub const XSD_FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";
pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

/// A node value in the graph: identifier or literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Iri(String),
    BlankNode(String),
    String(String),
    LangString { value: String, language: String },
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Literal with a datatype that has no dedicated variant.
    Typed { lexical: String, datatype: String },
}

/// Returned by [`Value::natural_cmp`] when a value has no natural ordering.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("value {0} has no natural ordering")]
pub struct NotOrderable(pub String);

/// Comparison classes for [`Value::natural_cmp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareClass<'a> {
    Iri,
    Text,
    Numeric,
    Bool,
    Typed(&'a str),
    None,
}

impl Value {
    pub fn iri(iri: impl Into<String>) -> Self {
        Value::Iri(iri.into())
    }

    pub fn blank(label: impl Into<String>) -> Self {
        Value::BlankNode(label.into())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn lang_string(value: impl Into<String>, language: impl Into<String>) -> Self {
        Value::LangString {
            value: value.into(),
            language: language.into(),
        }
    }

    pub fn int(i: i64) -> Self {
        Value::Int(i)
    }

    pub fn float(f: f64) -> Self {
        Value::Float(f)
    }

    /// Build a literal from its RDF parts, mapping well-known XSD datatypes
    /// onto the dedicated variants.
    ///
    /// Numeric or boolean lexical forms that fail to parse are kept as
    /// [`Value::Typed`] rather than rejected.
    pub fn from_literal(lexical: &str, datatype: Option<&str>, language: Option<&str>) -> Self {
        if let Some(language) = language {
            return Value::lang_string(lexical, language);
        }
        let Some(datatype) = datatype else {
            return Value::string(lexical);
        };
        let typed = || Value::Typed {
            lexical: lexical.to_string(),
            datatype: datatype.to_string(),
        };
        match datatype {
            XSD_STRING => Value::string(lexical),
            RDF_LANG_STRING => Value::string(lexical),
            XSD_INTEGER | XSD_INT | XSD_LONG => {
                lexical.trim().parse::<i64>().map(Value::Int).unwrap_or_else(|_| typed())
            }
            XSD_DOUBLE | XSD_FLOAT | XSD_DECIMAL => lexical
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or_else(|_| typed()),
            XSD_BOOLEAN => match lexical.trim() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => typed(),
            },
            _ => typed(),
        }
    }

    pub fn is_iri(&self) -> bool {
        matches!(self, Value::Iri(_))
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Value::BlankNode(_))
    }

    /// Lexical text of string-like literals (`String`, `LangString`).
    pub fn text(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::LangString { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Identifier text as used in `@id` positions.
    pub fn identifier(&self) -> String {
        match self {
            Value::Iri(iri) => iri.clone(),
            Value::BlankNode(label) => format!("_:{label}"),
            Value::String(s) => s.clone(),
            Value::LangString { value, .. } => value.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Typed { lexical, .. } => lexical.clone(),
        }
    }

    /// JSON-LD-like rendering of this value.
    pub fn to_json_ld(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Value::Iri(iri) => json!({ "@id": iri }),
            Value::BlankNode(label) => json!({ "@id": format!("_:{label}") }),
            Value::String(s) => json!(s),
            Value::LangString { value, language } => {
                json!({ "@value": value, "@language": language })
            }
            Value::Int(i) => json!(i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| json!({ "@value": f.to_string(), "@type": XSD_DOUBLE })),
            Value::Bool(b) => json!(b),
            Value::Typed { lexical, datatype } => json!({ "@value": lexical, "@type": datatype }),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Value::Iri(_) => 0,
            Value::BlankNode(_) => 1,
            Value::String(_) => 2,
            Value::LangString { .. } => 3,
            Value::Bool(_) => 4,
            Value::Int(_) | Value::Float(_) => 5,
            Value::Typed { .. } => 6,
        }
    }

    fn compare_class(&self) -> CompareClass<'_> {
        match self {
            Value::Iri(_) => CompareClass::Iri,
            Value::BlankNode(_) => CompareClass::None,
            Value::String(_) | Value::LangString { .. } => CompareClass::Text,
            Value::Int(_) | Value::Float(_) => CompareClass::Numeric,
            Value::Bool(_) => CompareClass::Bool,
            Value::Typed { datatype, .. } => CompareClass::Typed(datatype),
        }
    }

    /// Whether this value can ever take part in a natural comparison.
    pub fn is_orderable(&self) -> bool {
        match self {
            Value::BlankNode(_) => false,
            Value::Float(f) => !f.is_nan(),
            _ => true,
        }
    }

    /// Natural comparison used by `LessThan` and friends.
    ///
    /// `Ok(None)` means the two values live in different comparison classes
    /// (an IRI against an integer, say) and no comparison filter matches.
    /// Blank nodes and NaN are not orderable at all.
    pub fn natural_cmp(&self, other: &Value) -> Result<Option<Ordering>, NotOrderable> {
        for v in [self, other] {
            if !v.is_orderable() {
                return Err(NotOrderable(v.to_string()));
            }
        }
        if self.compare_class() != other.compare_class() {
            return Ok(None);
        }
        let ord = match (self, other) {
            (Value::Iri(a), Value::Iri(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Typed { lexical: a, .. }, Value::Typed { lexical: b, .. }) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => match x.partial_cmp(&y) {
                    Some(ord) => ord,
                    None => return Err(NotOrderable(a.to_string())),
                },
                _ => match (a.text(), b.text()) {
                    (Some(x), Some(y)) => x.cmp(y),
                    _ => return Ok(None),
                },
            },
        };
        Ok(Some(ord))
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Iri(a), Value::Iri(b)) => a == b,
            (Value::BlankNode(a), Value::BlankNode(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (
                Value::LangString {
                    value: a,
                    language: la,
                },
                Value::LangString {
                    value: b,
                    language: lb,
                },
            ) => a == b && la == lb,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (
                Value::Typed {
                    lexical: a,
                    datatype: da,
                },
                Value::Typed {
                    lexical: b,
                    datatype: db,
                },
            ) => a == b && da == db,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Iri(s) | Value::BlankNode(s) | Value::String(s) => s.hash(state),
            Value::LangString { value, language } => {
                value.hash(state);
                language.hash(state);
            }
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Typed { lexical, datatype } => {
                lexical.hash(state);
                datatype.hash(state);
            }
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        let rank = self.kind_rank().cmp(&other.kind_rank());
        if rank != Ordering::Equal {
            return rank;
        }
        match (self, other) {
            (Value::Iri(a), Value::Iri(b))
            | (Value::BlankNode(a), Value::BlankNode(b))
            | (Value::String(a), Value::String(b)) => a.cmp(b),
            (
                Value::LangString {
                    value: a,
                    language: la,
                },
                Value::LangString {
                    value: b,
                    language: lb,
                },
            ) => a.cmp(b).then_with(|| la.cmp(lb)),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            // Mixed numerics: numeric order, ties broken Int-before-Float so
            // the order stays consistent with `Eq`.
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b).then(Ordering::Less),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)).then(Ordering::Greater),
            (
                Value::Typed {
                    lexical: a,
                    datatype: da,
                },
                Value::Typed {
                    lexical: b,
                    datatype: db,
                },
            ) => da.cmp(db).then_with(|| a.cmp(b)),
            _ => Ordering::Equal,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Iri(iri) => write!(f, "<{iri}>"),
            Value::BlankNode(label) => write!(f, "_:{label}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::LangString { value, language } => write!(f, "{value:?}@{language}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Typed { lexical, datatype } => write!(f, "{lexical:?}^^<{datatype}>"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
