//! N-Quads / N-Triples loading.
//!
//! Parsing is done by Sophia; terms are read through Sophia's `Term`
//! accessors and converted into store [`Value`]s.

use anyhow::{anyhow, Context, Result};
use sophia::api::prelude::{QuadSource, Term, TermKind, TripleSource};
use sophia::api::quad::Quad as _;
use sophia::api::triple::Triple as _;
use std::path::Path;

use crate::{Quad, QuadStore, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdfFormat {
    NTriples,
    NQuads,
}

impl RdfFormat {
    /// Guess the format from a file extension (`.nt`, `.nq`).
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "nt" => Some(RdfFormat::NTriples),
            "nq" | "nquads" => Some(RdfFormat::NQuads),
            _ => None,
        }
    }
}

/// A parsed term the store cannot hold in the position it appeared in.
#[derive(Debug, thiserror::Error)]
enum TermError {
    #[error("unsupported RDF term kind {0:?}")]
    Unsupported(TermKind),
    #[error("expected IRI or blank node, got literal {0:?}")]
    LiteralNode(String),
}

impl QuadStore {
    /// Load N-Quads text. Returns the number of new (non-duplicate) quads.
    pub fn load_nquads(&mut self, text: &str) -> Result<usize> {
        self.load_bytes(text.as_bytes(), RdfFormat::NQuads)
    }

    /// Load N-Triples text. Returns the number of new (non-duplicate) quads.
    pub fn load_ntriples(&mut self, text: &str) -> Result<usize> {
        self.load_bytes(text.as_bytes(), RdfFormat::NTriples)
    }

    /// Load a `.nt` / `.nq` file.
    pub fn load_path(&mut self, path: &Path) -> Result<usize> {
        let format = RdfFormat::from_path(path)
            .ok_or_else(|| anyhow!("unsupported RDF file extension: {}", path.display()))?;
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        self.load_bytes(&bytes, format)
    }

    pub fn load_bytes(&mut self, bytes: &[u8], format: RdfFormat) -> Result<usize> {
        let quads = parse_quads(bytes, format)?;
        let total = quads.len();
        let mut added = 0usize;
        for quad in quads {
            if self.add_quad(quad) {
                added += 1;
            }
        }
        tracing::debug!(?format, total, added, "loaded quads");
        Ok(added)
    }
}

fn parse_quads(bytes: &[u8], format: RdfFormat) -> Result<Vec<Quad>> {
    let reader = std::io::BufReader::new(std::io::Cursor::new(bytes));
    let mut out: Vec<Quad> = Vec::new();

    match format {
        RdfFormat::NTriples => {
            sophia::turtle::parser::nt::parse_bufread(reader)
                .try_for_each_triple(|t| -> std::result::Result<(), TermError> {
                    out.push(Quad::new(
                        node_value(&t.s())?,
                        node_value(&t.p())?,
                        term_value(&t.o())?,
                    ));
                    Ok(())
                })
                .map_err(|e| anyhow!("failed to parse N-Triples: {e}"))?;
        }
        RdfFormat::NQuads => {
            sophia::turtle::parser::nq::parse_bufread(reader)
                .try_for_each_quad(|q| -> std::result::Result<(), TermError> {
                    out.push(Quad {
                        subject: node_value(&q.s())?,
                        predicate: node_value(&q.p())?,
                        object: term_value(&q.o())?,
                        label: q.g().map(|g| node_value(&g)).transpose()?,
                    });
                    Ok(())
                })
                .map_err(|e| anyhow!("failed to parse N-Quads: {e}"))?;
        }
    }
    Ok(out)
}

fn term_value<T: Term + ?Sized>(term: &T) -> std::result::Result<Value, TermError> {
    match term.kind() {
        TermKind::Iri => match term.iri() {
            Some(iri) => Ok(Value::iri(iri.as_str())),
            None => Err(TermError::Unsupported(TermKind::Iri)),
        },
        TermKind::BlankNode => match term.bnode_id() {
            Some(id) => Ok(Value::blank(id.as_str())),
            None => Err(TermError::Unsupported(TermKind::BlankNode)),
        },
        TermKind::Literal => {
            let lexical = term.lexical_form().map(|l| l.to_string()).unwrap_or_default();
            let datatype = term.datatype();
            let language = term.language_tag();
            Ok(Value::from_literal(
                &lexical,
                datatype.as_ref().map(|dt| dt.as_str()),
                language.as_ref().map(|tag| tag.as_str()),
            ))
        }
        other => Err(TermError::Unsupported(other)),
    }
}

fn node_value<T: Term + ?Sized>(term: &T) -> std::result::Result<Value, TermError> {
    let value = term_value(term)?;
    if value.is_iri() || value.is_blank() {
        Ok(value)
    } else {
        Err(TermError::LiteralNode(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LITERALS_NQ: &str = r#"
<http://x/a> <http://x/name> "chat"@fr <http://x/g> .
<http://x/a> <http://x/age> "42"^^<http://www.w3.org/2001/XMLSchema#integer> .
<http://x/a> <http://x/says> "say \"hi\"\n" .
_:b0 <http://x/knows> <http://x/a> .
"#;

    #[test]
    fn converts_sophia_terms() {
        let quads = parse_quads(LITERALS_NQ.as_bytes(), RdfFormat::NQuads).unwrap();
        let objects: Vec<&Value> = quads.iter().map(|q| &q.object).collect();
        assert_eq!(
            objects,
            vec![
                &Value::lang_string("chat", "fr"),
                &Value::int(42),
                &Value::string("say \"hi\"\n"),
                &Value::iri("http://x/a"),
            ]
        );
        assert_eq!(quads[0].label, Some(Value::iri("http://x/g")));
        assert_eq!(quads[1].label, None);
        assert_eq!(quads[3].subject, Value::blank("b0"));
    }

    #[test]
    fn native_literals_map_to_values() {
        assert_eq!(term_value("Alice").unwrap(), Value::string("Alice"));
        assert_eq!(term_value(&42i32).unwrap(), Value::int(42));
        assert_eq!(term_value(&true).unwrap(), Value::Bool(true));
    }

    #[test]
    fn literal_subjects_are_rejected() {
        assert!(matches!(
            node_value("Alice"),
            Err(TermError::LiteralNode(_))
        ));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(
            RdfFormat::from_path(Path::new("data.nq")),
            Some(RdfFormat::NQuads)
        );
        assert_eq!(
            RdfFormat::from_path(Path::new("data.NT")),
            Some(RdfFormat::NTriples)
        );
        assert_eq!(RdfFormat::from_path(Path::new("data.ttl")), None);
    }
}
