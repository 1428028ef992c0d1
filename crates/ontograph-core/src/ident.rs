//! Validated identifiers for labels, relationship types and property keys.
//!
//! Graph query languages cannot parameterise labels or relationship types, so
//! they end up in statement text, always backtick-quoted. An [`Ident`] can only
//! be obtained through [`Ident::parse`] (syntax check) and, for labels and
//! types, through a [`Vocabulary`] built from the schema's declared names.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ItemError;
use crate::schema::SchemaModel;

static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\p{Cc}\s][^\p{Cc}]*$").expect("valid identifier regex"));

/// A syntactically safe identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ident(String);

impl Ident {
    /// Validate identifier syntax: non-empty, no control characters, no
    /// leading whitespace. Any script is accepted (`航班`, `朋友`).
    pub fn parse(name: &str) -> Result<Self, ItemError> {
        if IDENT_RE.is_match(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(ItemError::InvalidIdentifier {
                name: name.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Backtick-quoted form for statement text. Embedded backticks are doubled.
    pub fn quoted(&self) -> String {
        format!("`{}`", self.0.replace('`', "``"))
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Ident {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Allow-list of labels and relationship types declared by a schema.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    labels: BTreeSet<String>,
    relationship_types: BTreeSet<String>,
}

impl Vocabulary {
    /// Collect every label and relationship type the schema declares:
    /// constraint and index labels, node labels, and relationship types.
    ///
    /// Labels carried by the schema's own node records count as declared, so
    /// a node is never rejected for its own labels. The allow-list gates
    /// endpoint selector labels, spot check labels and relationship types
    /// that nothing in the schema introduces.
    pub fn from_schema(schema: &SchemaModel) -> Self {
        let mut labels = BTreeSet::new();
        let mut relationship_types = BTreeSet::new();

        for c in &schema.constraints {
            labels.insert(c.label.clone());
        }
        for i in &schema.indexes {
            labels.insert(i.label.clone());
        }
        for node in &schema.nodes {
            labels.extend(node.labels.iter().cloned());
        }
        for kind in &schema.relationship_kinds {
            relationship_types.insert(kind.rel_type.clone());
        }
        for rel in &schema.relationships {
            relationship_types.insert(rel.rel_type.clone());
        }

        Self {
            labels,
            relationship_types,
        }
    }

    /// Validate a node label against the allow-list.
    pub fn label(&self, name: &str) -> Result<Ident, ItemError> {
        if !self.labels.contains(name) {
            return Err(ItemError::UndeclaredIdentifier {
                kind: "label".to_string(),
                name: name.to_string(),
            });
        }
        Ident::parse(name)
    }

    /// Validate a relationship type against the allow-list.
    pub fn relationship_type(&self, name: &str) -> Result<Ident, ItemError> {
        if !self.relationship_types.contains(name) {
            return Err(ItemError::UndeclaredIdentifier {
                kind: "relationship type".to_string(),
                name: name.to_string(),
            });
        }
        Ident::parse(name)
    }

    /// Property keys are not declared by schemas; only their syntax is checked.
    pub fn property(&self, name: &str) -> Result<Ident, ItemError> {
        Ident::parse(name)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn relationship_types(&self) -> impl Iterator<Item = &str> {
        self.relationship_types.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ident_syntax() {
        assert!(Ident::parse("Flight").is_ok());
        assert!(Ident::parse("_internal_2").is_ok());
        assert!(Ident::parse("2Fast").is_ok());
        assert!(Ident::parse("航班").is_ok());
        assert!(Ident::parse("朋友").is_ok());
        assert!(Ident::parse("has space").is_ok());
        assert!(Ident::parse("").is_err());
        assert!(Ident::parse(" Flight").is_err());
        assert!(Ident::parse("Flight\nDELETE").is_err());
        assert!(Ident::parse("Flight\u{0}").is_err());
    }

    #[test]
    fn test_quoted() {
        let ident = Ident::parse("FlightDelayedEvent").unwrap();
        assert_eq!(ident.quoted(), "`FlightDelayedEvent`");

        let hostile = Ident::parse("Flight`) DETACH DELETE (n").unwrap();
        assert_eq!(hostile.quoted(), "`Flight``) DETACH DELETE (n`");
    }

    #[test]
    fn test_vocabulary_rejects_undeclared() {
        let schema = SchemaModel::from_json_str(
            r#"{
                "schema": {"constraints": [{"label": "Flight", "property": "flightId"}]},
                "data": {
                    "nodes": [{"label": ["Event", "FlightDelayedEvent"], "properties": {"eventId": "E1"}}],
                    "relationships": [{"type": "IMPACTS", "from": {"label": "Event", "eventId": "E1"}, "to": {"label": "Flight", "flightId": "F1"}}]
                }
            }"#,
        )
        .unwrap();
        let vocab = Vocabulary::from_schema(&schema);

        assert!(vocab.label("Flight").is_ok());
        assert!(vocab.label("FlightDelayedEvent").is_ok());
        assert!(vocab.relationship_type("IMPACTS").is_ok());

        // Gate appears nowhere in the schema.
        let err = vocab.label("Gate").unwrap_err();
        assert_eq!(err.kind(), "undeclared_identifier");
        assert!(vocab.relationship_type("TRIGGERS").is_err());
    }
}
