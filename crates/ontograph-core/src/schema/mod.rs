//! Schema model and the decoders that produce it.

pub mod document;
pub mod model;
pub mod records;

use std::path::Path;

use crate::error::{DecodeError, DecodeResult};

pub use model::{
    ConstraintSpec, EndpointSelector, IndexSpec, NodeSpec, RelationshipKind, RelationshipSpec,
    SchemaMetadata, SchemaModel,
};

/// Load an import source: a JSON schema document, or a directory of CSV records.
pub fn load_source(path: &Path) -> DecodeResult<SchemaModel> {
    if !path.exists() {
        return Err(DecodeError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "source not found"),
        ));
    }

    if path.is_dir() {
        return SchemaModel::load_csv_dir(path);
    }

    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => SchemaModel::load_document(path),
        _ => Err(DecodeError::UnsupportedSource(format!(
            "{}: expected a .json schema document or a CSV directory",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_source_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("flight.json");
        std::fs::write(&doc, r#"{"data": {"nodes": [{"label": "Flight", "properties": {"flightId": "F1"}}]}}"#).unwrap();

        let model = load_source(&doc).unwrap();
        assert_eq!(model.nodes.len(), 1);

        let other = dir.path().join("flight.yaml");
        std::fs::write(&other, "x: 1").unwrap();
        assert!(matches!(load_source(&other), Err(DecodeError::UnsupportedSource(_))));

        assert!(matches!(
            load_source(&dir.path().join("missing.json")),
            Err(DecodeError::Io { .. })
        ));
    }
}
