//! Workflow document loading: parse one or more YAML files and deep-merge
//! them left-to-right ("later document wins at the leaf") before
//! deserializing the result into a [`WorkflowDoc`].

use std::path::Path;

use serde_yaml::Value;
use wfe_core::{Error, Result};

use crate::model::WorkflowDoc;

pub fn load_workflow<P: AsRef<Path>>(paths: &[P]) -> Result<WorkflowDoc> {
    if paths.is_empty() {
        return Err(Error::Config("no workflow file given".to_string()));
    }

    let mut merged = Value::Mapping(Default::default());
    for path in paths {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let doc: Value = serde_yaml::from_str(&text)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;
        merged = deep_merge(merged, doc);
    }

    serde_yaml::from_value(merged).map_err(|e| Error::Config(format!("invalid workflow document: {e}")))
}

/// Mappings merge key-by-key, recursively; anything else — scalars,
/// sequences, a mapping meeting a non-mapping — is replaced outright by
/// the overlay.
fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (k, v) in overlay_map {
                let merged = match base_map.remove(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => v,
                };
                base_map.insert(k, merged);
            }
            Value::Mapping(base_map)
        }
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn single_document_round_trips() {
        let f = write_temp("name: demo\njobs: []\n");
        let doc = load_workflow(&[f.path()]).unwrap();
        assert_eq!(doc.name, "demo");
        assert!(doc.jobs.is_empty());
    }

    #[test]
    fn later_document_overrides_leaf_values() {
        let base = write_temp("name: demo\nvars:\n  a: \"1\"\n  b: \"2\"\n");
        let overlay = write_temp("vars:\n  b: \"99\"\n");
        let doc = load_workflow(&[base.path(), overlay.path()]).unwrap();
        assert_eq!(doc.vars.get("a").unwrap(), "1");
        assert_eq!(doc.vars.get("b").unwrap(), "99");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load_workflow(&["/nonexistent/path.yaml"]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn no_paths_is_rejected() {
        let err = load_workflow::<&str>(&[]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
