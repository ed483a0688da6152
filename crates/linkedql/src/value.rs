//! Identifier forms accepted by `Entities`.

pub use linkedql_quadstore::Value;

use crate::error::{LinkedQlError, Result};

/// An entity reference: an IRI or a blank node label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityIdentifier {
    Iri(String),
    BlankNode(String),
}

impl EntityIdentifier {
    /// Parse the textual form: `_:label` is a blank node, `<iri>` and bare
    /// text are IRIs.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Some(label) = text.strip_prefix("_:") {
            return EntityIdentifier::BlankNode(label.to_string());
        }
        let iri = text
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .unwrap_or(text);
        EntityIdentifier::Iri(iri.to_string())
    }

    /// Convert to a store value, rejecting empty identifiers.
    pub fn to_value(&self) -> Result<Value> {
        match self {
            EntityIdentifier::Iri(iri) if iri.is_empty() => {
                Err(LinkedQlError::malformed("entity identifier has an empty IRI"))
            }
            EntityIdentifier::BlankNode(label) if label.is_empty() => Err(
                LinkedQlError::malformed("entity identifier has an empty blank node label"),
            ),
            EntityIdentifier::Iri(iri) => Ok(Value::iri(iri.clone())),
            EntityIdentifier::BlankNode(label) => Ok(Value::blank(label.clone())),
        }
    }
}

impl From<&str> for EntityIdentifier {
    fn from(text: &str) -> Self {
        EntityIdentifier::parse(text)
    }
}
