//! Cypher statement construction.
//!
//! Statement text is assembled only from [`Ident`]s and fixed keywords. Every
//! value travels as a parameter.

use std::collections::BTreeMap;

use neo4rs::{BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType, Query};
use ontograph_core::{Ident, PropertyMap, PropertyValue};

use crate::store::{NodeKey, NodeMatch, NodeRef, NodeWrite, RelationshipKey, RelationshipWrite, WriteMode};

/// Parameterised Cypher statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    text: String,
    params: BTreeMap<String, PropertyValue>,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &BTreeMap<String, PropertyValue> {
        &self.params
    }

    pub fn into_query(self) -> Query {
        self.params
            .into_iter()
            .fold(Query::new(self.text), |q, (name, value)| q.param(&name, to_bolt(value)))
    }
}

fn to_bolt(value: PropertyValue) -> BoltType {
    match value {
        PropertyValue::Null => BoltType::Null(BoltNull),
        PropertyValue::Bool(b) => BoltType::Boolean(BoltBoolean::new(b)),
        PropertyValue::Int(i) => BoltType::Integer(BoltInteger::new(i)),
        PropertyValue::Float(x) => BoltType::Float(BoltFloat::new(x)),
        PropertyValue::String(s) => BoltType::String(BoltString::new(&s)),
        PropertyValue::List(items) => BoltType::List(BoltList {
            value: items.into_iter().map(to_bolt).collect(),
        }),
        PropertyValue::Map(map) => BoltType::Map(props_to_bolt(map)),
    }
}

fn props_to_bolt(map: PropertyMap) -> BoltMap {
    BoltMap {
        value: map
            .into_iter()
            .map(|(k, v)| (BoltString::new(&k), to_bolt(v)))
            .collect(),
    }
}

/// `(var:`Label` {`p`: $prefix0, ...})` plus the parameters it needs.
fn node_pattern(var: &str, selector: &NodeMatch, prefix: &str) -> (String, Vec<(String, PropertyValue)>) {
    let mut params = Vec::new();
    let props: Vec<String> = selector
        .properties
        .iter()
        .enumerate()
        .map(|(i, (key, value))| {
            let name = format!("{}{}", prefix, i);
            params.push((name.clone(), value.clone()));
            format!("{}: ${}", key.quoted(), name)
        })
        .collect();

    let pattern = if props.is_empty() {
        format!("({}:{})", var, selector.label.quoted())
    } else {
        format!("({}:{} {{{}}})", var, selector.label.quoted(), props.join(", "))
    };
    (pattern, params)
}

fn with_params(mut stmt: Statement, params: Vec<(String, PropertyValue)>) -> Statement {
    for (name, value) in params {
        stmt = stmt.param(&name, value);
    }
    stmt
}

fn label_suffix<'a>(labels: impl Iterator<Item = &'a Ident>) -> String {
    labels.map(|l| format!(":{}", l.quoted())).collect()
}

pub fn find_node(key: &NodeKey) -> Statement {
    Statement::new(format!(
        "MATCH (n:{} {{{}: $key}}) RETURN elementId(n) AS id LIMIT 1",
        key.label.quoted(),
        key.property.quoted()
    ))
    .param("key", key.value.clone())
}

pub fn match_nodes(selector: &NodeMatch) -> Statement {
    let (pattern, params) = node_pattern("n", selector, "m");
    with_params(
        Statement::new(format!("MATCH {} RETURN elementId(n) AS id", pattern)),
        params,
    )
}

pub fn upsert_node(node: &NodeWrite, mode: WriteMode) -> Statement {
    let mut text = format!(
        "MERGE (n:{} {{{}: $key}})",
        node.key.label.quoted(),
        node.key.property.quoted()
    );
    let extra = label_suffix(node.extra_labels());
    if !extra.is_empty() {
        text.push_str(&format!(" SET n{}", extra));
    }
    match mode {
        WriteMode::Replace => text.push_str(" SET n = $props"),
        WriteMode::Patch => text.push_str(" SET n += $props"),
    }
    text.push_str(" RETURN elementId(n) AS id");

    Statement::new(text)
        .param("key", node.key.value.clone())
        .param("props", node.properties.clone())
}

pub fn create_node(node: &NodeWrite) -> Statement {
    Statement::new(format!(
        "CREATE (n{}) SET n = $props RETURN elementId(n) AS id",
        label_suffix(node.labels.iter())
    ))
    .param("props", node.properties.clone())
}

fn endpoints_clause() -> &'static str {
    "MATCH (a) WHERE elementId(a) = $from MATCH (b) WHERE elementId(b) = $to"
}

fn endpoint_params(stmt: Statement, from: &NodeRef, to: &NodeRef) -> Statement {
    stmt.param("from", from.0.as_str()).param("to", to.0.as_str())
}

pub fn find_relationship(key: &RelationshipKey) -> Statement {
    let mut text = format!(
        "{} MATCH (a)-[r:{}]->(b)",
        endpoints_clause(),
        key.rel_type.quoted()
    );
    if let Some(d) = &key.discriminator {
        text.push_str(&format!(" WHERE r.{} = $disc", d.property.quoted()));
    }
    text.push_str(" RETURN count(r) AS count");

    let stmt = endpoint_params(Statement::new(text), &key.from, &key.to);
    match &key.discriminator {
        Some(d) => stmt.param("disc", d.value.clone()),
        None => stmt,
    }
}

pub fn upsert_relationship(rel: &RelationshipWrite) -> Statement {
    let key = &rel.key;
    let identity = match &key.discriminator {
        Some(d) => format!("[r:{} {{{}: $disc}}]", key.rel_type.quoted(), d.property.quoted()),
        None => format!("[r:{}]", key.rel_type.quoted()),
    };
    let text = format!("{} MERGE (a)-{}->(b) SET r = $props", endpoints_clause(), identity);

    let stmt = endpoint_params(Statement::new(text), &key.from, &key.to).param("props", rel.properties.clone());
    match &key.discriminator {
        Some(d) => stmt.param("disc", d.value.clone()),
        None => stmt,
    }
}

pub fn create_relationship(rel: &RelationshipWrite) -> Statement {
    let text = format!(
        "{} CREATE (a)-[r:{}]->(b) SET r = $props",
        endpoints_clause(),
        rel.key.rel_type.quoted()
    );
    endpoint_params(Statement::new(text), &rel.key.from, &rel.key.to).param("props", rel.properties.clone())
}

pub fn constraint_exists(name: &Ident, label: &Ident, property: &Ident) -> Statement {
    Statement::new(
        "SHOW CONSTRAINTS YIELD name, labelsOrTypes, properties \
         WHERE name = $name OR ($label IN labelsOrTypes AND $property IN properties) \
         RETURN count(*) AS count",
    )
    .param("name", name.as_str())
    .param("label", label.as_str())
    .param("property", property.as_str())
}

pub fn create_constraint(name: &Ident, label: &Ident, property: &Ident) -> Statement {
    Statement::new(format!(
        "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS UNIQUE",
        name.quoted(),
        label.quoted(),
        property.quoted()
    ))
}

pub fn index_exists(name: &Ident, label: &Ident, property: &Ident) -> Statement {
    Statement::new(
        "SHOW INDEXES YIELD name, labelsOrTypes, properties \
         WHERE name = $name OR ($label IN labelsOrTypes AND properties = [$property]) \
         RETURN count(*) AS count",
    )
    .param("name", name.as_str())
    .param("label", label.as_str())
    .param("property", property.as_str())
}

pub fn create_index(name: &Ident, label: &Ident, property: &Ident) -> Statement {
    Statement::new(format!(
        "CREATE INDEX {} IF NOT EXISTS FOR (n:{}) ON (n.{})",
        name.quoted(),
        label.quoted(),
        property.quoted()
    ))
}

pub fn count_nodes(label: &Ident) -> Statement {
    Statement::new(format!("MATCH (n:{}) RETURN count(n) AS count", label.quoted()))
}

pub fn count_relationships(rel_type: &Ident) -> Statement {
    Statement::new(format!("MATCH ()-[r:{}]->() RETURN count(r) AS count", rel_type.quoted()))
}

pub fn count_all_nodes() -> Statement {
    Statement::new("MATCH (n) RETURN count(n) AS count")
}

pub fn count_all_relationships() -> Statement {
    Statement::new("MATCH ()-[r]->() RETURN count(r) AS count")
}

pub fn clear_all() -> Statement {
    Statement::new("MATCH (n) DETACH DELETE n")
}

pub fn node_exists(selector: &NodeMatch) -> Statement {
    let (pattern, params) = node_pattern("n", selector, "n");
    with_params(
        Statement::new(format!("MATCH {} RETURN count(n) AS count", pattern)),
        params,
    )
}

pub fn relationship_exists(rel_type: &Ident, from: &NodeMatch, to: &NodeMatch) -> Statement {
    let (a, a_params) = node_pattern("a", from, "a");
    let (b, b_params) = node_pattern("b", to, "b");
    let stmt = Statement::new(format!(
        "MATCH {}-[r:{}]->{} RETURN count(r) AS count",
        a,
        rel_type.quoted(),
        b
    ));
    with_params(with_params(stmt, a_params), b_params)
}

pub fn longest_chain(rel_type: &Ident, label: &Ident, root: Option<&NodeMatch>, limit: u32) -> Statement {
    let (end, params) = match root {
        Some(root) => node_pattern("e", root, "e"),
        None => ("(e)".to_string(), Vec::new()),
    };
    let stmt = Statement::new(format!(
        "MATCH p = (s:{})-[:{}*1..{}]->{} RETURN max(length(p)) AS depth",
        label.quoted(),
        rel_type.quoted(),
        limit.max(1),
        end
    ));
    with_params(stmt, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Discriminator;

    fn ident(s: &str) -> Ident {
        Ident::parse(s).unwrap()
    }

    fn flight_write() -> NodeWrite {
        let mut props = PropertyMap::new();
        props.insert("flightId".into(), "CA123".into());
        props.insert("status".into(), "Delayed".into());
        NodeWrite {
            key: NodeKey {
                label: ident("Flight"),
                property: ident("flightId"),
                value: "CA123".into(),
            },
            labels: vec![ident("Flight"), ident("Scheduled")],
            properties: props,
        }
    }

    #[test]
    fn test_upsert_node_replace() {
        let stmt = upsert_node(&flight_write(), WriteMode::Replace);
        assert_eq!(
            stmt.text(),
            "MERGE (n:`Flight` {`flightId`: $key}) SET n:`Scheduled` SET n = $props RETURN elementId(n) AS id"
        );
        assert_eq!(stmt.params()["key"], PropertyValue::from("CA123"));
        assert!(matches!(stmt.params()["props"], PropertyValue::Map(_)));
    }

    #[test]
    fn test_upsert_node_patch() {
        let mut write = flight_write();
        write.labels.truncate(1);
        let stmt = upsert_node(&write, WriteMode::Patch);
        assert_eq!(
            stmt.text(),
            "MERGE (n:`Flight` {`flightId`: $key}) SET n += $props RETURN elementId(n) AS id"
        );
    }

    #[test]
    fn test_upsert_relationship_with_discriminator() {
        let rel = RelationshipWrite {
            key: RelationshipKey {
                rel_type: ident("TRIGGERS"),
                from: NodeRef("4:a:1".into()),
                to: NodeRef("4:a:2".into()),
                discriminator: Some(Discriminator {
                    property: ident("actionType"),
                    value: "NOTIFY".into(),
                }),
            },
            properties: PropertyMap::new(),
        };
        let stmt = upsert_relationship(&rel);
        assert!(stmt
            .text()
            .ends_with("MERGE (a)-[r:`TRIGGERS` {`actionType`: $disc}]->(b) SET r = $props"));
        assert_eq!(stmt.params()["disc"], PropertyValue::from("NOTIFY"));
        assert_eq!(stmt.params()["from"], PropertyValue::from("4:a:1"));

        let find = find_relationship(&rel.key);
        assert!(find.text().contains("WHERE r.`actionType` = $disc"));
    }

    #[test]
    fn test_values_never_in_text() {
        let selector = NodeMatch {
            label: ident("Flight"),
            properties: vec![(ident("flightId"), "x'}) DETACH DELETE n //".into())],
        };
        let stmt = match_nodes(&selector);
        assert_eq!(stmt.text(), "MATCH (n:`Flight` {`flightId`: $m0}) RETURN elementId(n) AS id");
        assert!(!stmt.text().contains("DELETE"));
    }

    #[test]
    fn test_schema_statements() {
        let stmt = create_constraint(&ident("flight_flightId_unique"), &ident("Flight"), &ident("flightId"));
        assert_eq!(
            stmt.text(),
            "CREATE CONSTRAINT `flight_flightId_unique` IF NOT EXISTS FOR (n:`Flight`) REQUIRE n.`flightId` IS UNIQUE"
        );
        let stmt = create_index(&ident("flight_status_index"), &ident("Flight"), &ident("status"));
        assert_eq!(
            stmt.text(),
            "CREATE INDEX `flight_status_index` IF NOT EXISTS FOR (n:`Flight`) ON (n.`status`)"
        );
    }

    #[test]
    fn test_longest_chain_with_root() {
        let root = NodeMatch {
            label: ident("OntologyClass"),
            properties: vec![(ident("name"), "O_Object".into())],
        };
        let stmt = longest_chain(&ident("INHERITANCE"), &ident("OntologyClass"), Some(&root), 7);
        assert_eq!(
            stmt.text(),
            "MATCH p = (s:`OntologyClass`)-[:`INHERITANCE`*1..7]->(e:`OntologyClass` {`name`: $e0}) RETURN max(length(p)) AS depth"
        );
    }
}
