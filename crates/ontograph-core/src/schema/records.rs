//! Tabular (CSV) node and relationship records.
//!
//! Node files: `id` (or `id:ID`), `name`, `label`, `properties`, `version`.
//! Relationship files: `startId` (`:START_ID`), `endId` (`:END_ID`),
//! `type` (`:TYPE`), `properties`, `version`.
//!
//! Tabular sources carry no constraints. Every node is identified by
//! `node_id` (the `id` column), and a `{label, node_id}` constraint is
//! synthesized for each primary label seen.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use csv::StringRecord;
use tracing::{debug, info};

use super::model::{ConstraintSpec, EndpointSelector, NodeSpec, RelationshipSpec, SchemaModel};
use crate::error::{DecodeError, DecodeResult, ItemError};
use crate::property::{PropertyMap, PropertyValue};
use crate::stats::ItemFailure;

/// Key property used by tabular sources.
pub const NODE_ID_PROPERTY: &str = "node_id";

struct NodeColumns {
    id: usize,
    name: Option<usize>,
    label: usize,
    properties: Option<usize>,
    version: Option<usize>,
}

struct RelationshipColumns {
    start: usize,
    end: usize,
    rel_type: usize,
    properties: Option<usize>,
    version: Option<usize>,
}

fn column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

fn required(headers: &StringRecord, names: &[&str], file: &str) -> DecodeResult<usize> {
    column(headers, names)
        .ok_or_else(|| DecodeError::malformed(format!("{}: missing column '{}'", file, names[0])))
}

fn field<'r>(record: &'r StringRecord, index: usize, name: &str) -> Result<&'r str, ItemError> {
    record
        .get(index)
        .map(str::trim)
        .ok_or_else(|| ItemError::parse(format!("missing column '{}'", name)))
}

fn optional_field(record: &StringRecord, index: Option<usize>) -> &str {
    index.and_then(|i| record.get(i)).map(str::trim).unwrap_or("")
}

/// Parse the serialized `properties` column. Blank and `{}` mean "no properties".
fn parse_properties(raw: &str) -> Result<PropertyMap, ItemError> {
    if raw.is_empty() || raw == "{}" {
        return Ok(PropertyMap::new());
    }
    serde_json::from_str(raw).map_err(|e| ItemError::parse(format!("bad properties: {}", e)))
}

/// Accumulates tabular records into a [`SchemaModel`].
#[derive(Default)]
pub struct RecordSet {
    model: SchemaModel,
    labels_by_id: BTreeMap<String, String>,
    labels: BTreeSet<String>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read node records from any CSV source.
    pub fn read_nodes<R: std::io::Read>(&mut self, reader: R, source: &str) -> DecodeResult<usize> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = rdr.headers()?.clone();
        let cols = NodeColumns {
            id: required(&headers, &["id", "id:ID"], source)?,
            name: column(&headers, &["name"]),
            label: required(&headers, &["label", ":LABEL"], source)?,
            properties: column(&headers, &["properties"]),
            version: column(&headers, &["version"]),
        };

        let mut count = 0;
        for (index, record) in rdr.records().enumerate() {
            let item = format!("{} record {}", source, index + 1);
            let decoded = record
                .map_err(|e| ItemError::parse(e.to_string()))
                .and_then(|record| self.decode_node(&record, &cols));
            match decoded {
                Ok(spec) => {
                    count += 1;
                    self.model.nodes.push(spec);
                }
                Err(error) => self.model.rejected.push(ItemFailure::new(item, error)),
            }
        }
        debug!(source, count, "Read node records");
        Ok(count)
    }

    /// Read relationship records from any CSV source.
    ///
    /// Endpoints resolve against the node records read so far, so all node
    /// sources must be read first.
    pub fn read_relationships<R: std::io::Read>(&mut self, reader: R, source: &str) -> DecodeResult<usize> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = rdr.headers()?.clone();
        let cols = RelationshipColumns {
            start: required(&headers, &["startId", ":START_ID"], source)?,
            end: required(&headers, &["endId", ":END_ID"], source)?,
            rel_type: required(&headers, &["type", ":TYPE"], source)?,
            properties: column(&headers, &["properties"]),
            version: column(&headers, &["version"]),
        };

        let mut count = 0;
        for (index, record) in rdr.records().enumerate() {
            let item = format!("{} record {}", source, index + 1);
            let decoded = record
                .map_err(|e| ItemError::parse(e.to_string()))
                .and_then(|record| self.decode_relationship(&record, &cols));
            match decoded {
                Ok(spec) => {
                    count += 1;
                    self.model.relationships.push(spec);
                }
                Err(error) => self.model.rejected.push(ItemFailure::new(item, error)),
            }
        }
        debug!(source, count, "Read relationship records");
        Ok(count)
    }

    fn decode_node(&mut self, record: &StringRecord, cols: &NodeColumns) -> Result<NodeSpec, ItemError> {
        let id = field(record, cols.id, "id")?;
        if id.is_empty() {
            return Err(ItemError::parse("empty id"));
        }
        let labels: Vec<String> = field(record, cols.label, "label")?
            .split(':')
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect();
        let mut properties = parse_properties(optional_field(record, cols.properties))?;
        let version = optional_field(record, cols.version).to_string();

        properties.insert(NODE_ID_PROPERTY.to_string(), id.into());
        let name = optional_field(record, cols.name);
        if !name.is_empty() {
            properties.insert("name".to_string(), name.into());
        }
        if !version.is_empty() {
            properties.insert("version".to_string(), version.as_str().into());
        }

        let spec = NodeSpec::new(labels, properties, version)?;
        if let Some(primary) = spec.primary_label() {
            self.labels_by_id.insert(id.to_string(), primary.to_string());
            self.labels.insert(primary.to_string());
        }
        Ok(spec)
    }

    fn decode_relationship(&self, record: &StringRecord, cols: &RelationshipColumns) -> Result<RelationshipSpec, ItemError> {
        let start = field(record, cols.start, "startId")?;
        let end = field(record, cols.end, "endId")?;
        let rel_type = field(record, cols.rel_type, "type")?;
        if rel_type.is_empty() {
            return Err(ItemError::parse("empty relationship type"));
        }
        let mut properties = parse_properties(optional_field(record, cols.properties))?;
        let version = optional_field(record, cols.version).to_string();
        if !version.is_empty() {
            properties.insert("version".to_string(), version.as_str().into());
        }

        Ok(RelationshipSpec {
            rel_type: rel_type.to_string(),
            from: self.endpoint(start)?,
            to: self.endpoint(end)?,
            properties,
            discriminator: None,
            version,
        })
    }

    fn endpoint(&self, id: &str) -> Result<EndpointSelector, ItemError> {
        match self.labels_by_id.get(id) {
            Some(label) => Ok(EndpointSelector::by_key(
                label.as_str(),
                NODE_ID_PROPERTY,
                PropertyValue::from(id),
            )),
            None => Err(ItemError::EndpointNotFound {
                selector: format!("({{{}: {}}})", NODE_ID_PROPERTY, id),
                matches: 0,
            }),
        }
    }

    /// Finish: declare the synthesized `node_id` constraints.
    pub fn finish(mut self) -> SchemaModel {
        self.model.constraints = self
            .labels
            .iter()
            .map(|label| ConstraintSpec {
                label: label.clone(),
                property: NODE_ID_PROPERTY.to_string(),
                name: None,
            })
            .collect();
        self.model
    }
}

fn csv_files(dir: &Path, prefix: &str) -> DecodeResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| DecodeError::io(dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(prefix))
        })
        .collect();
    files.sort();
    Ok(files)
}

impl SchemaModel {
    /// Load a directory of `nodes*.csv` and `rels*.csv` files.
    ///
    /// All node files are read (in file-name order) before any relationship file.
    pub fn load_csv_dir(dir: &Path) -> DecodeResult<Self> {
        let node_files = csv_files(dir, "nodes")?;
        let rel_files = csv_files(dir, "rels")?;
        if node_files.is_empty() && rel_files.is_empty() {
            return Err(DecodeError::UnsupportedSource(format!(
                "{}: no nodes*.csv or rels*.csv files",
                dir.display()
            )));
        }

        let mut records = RecordSet::new();
        for path in &node_files {
            let file = std::fs::File::open(path).map_err(|e| DecodeError::io(path, e))?;
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("nodes.csv");
            let count = records.read_nodes(file, name)?;
            info!(file = name, count, "Loaded node records");
        }
        for path in &rel_files {
            let file = std::fs::File::open(path).map_err(|e| DecodeError::io(path, e))?;
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("rels.csv");
            let count = records.read_relationships(file, name)?;
            info!(file = name, count, "Loaded relationship records");
        }
        Ok(records.finish())
    }
}
