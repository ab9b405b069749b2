//! Loading resources from YAML manifests

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// Parse every document of a YAML stream into JSON values
///
/// Empty documents are skipped and `kind: List` documents are flattened into
/// their items.
pub fn load_yaml_values(yaml: &str) -> Result<Vec<Value>> {
    let mut values = Vec::new();

    for document in serde_yaml::Deserializer::from_str(yaml) {
        let value = Value::deserialize(document)
            .map_err(|e| Error::InvalidRequest(format!("Failed to parse YAML: {}", e)))?;

        match value {
            Value::Null => {}
            Value::Object(ref obj) if obj.get("kind").and_then(|k| k.as_str()) == Some("List") => {
                if let Some(Value::Array(items)) = obj.get("items") {
                    values.extend(items.iter().cloned());
                }
            }
            value => values.push(value),
        }
    }

    Ok(values)
}

/// Parse every document of a YAML stream as `K`
///
/// ```
/// use kube_resource_client::load::load_yaml;
/// use k8s_openapi::api::core::v1::ConfigMap;
///
/// let maps: Vec<ConfigMap> = load_yaml(
///     "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: settings\n",
/// )
/// .unwrap();
/// assert_eq!(maps[0].metadata.name.as_deref(), Some("settings"));
/// ```
pub fn load_yaml<K: DeserializeOwned>(yaml: &str) -> Result<Vec<K>> {
    load_yaml_values(yaml)?
        .into_iter()
        .map(|value| serde_json::from_value(value).map_err(Error::Decode))
        .collect()
}

/// Read a YAML manifest file and parse every document as `K`
pub fn load_yaml_file<K: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<K>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::InvalidRequest(format!("Failed to read manifest {:?}: {}", path, e))
    })?;
    load_yaml(&content)
}
