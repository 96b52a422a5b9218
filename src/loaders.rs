//! Loading of YAML metadata files found in projects.

use std::fs;
use std::path::Path;

use log::debug;
use serde::Deserialize;
use serde_yaml::Value;

use crate::errors::{AnsibleCompatError, Result};

/// Load a YAML document from `path`.
pub fn yaml_from_file(path: &Path) -> Result<Value> {
    debug!("Loading YAML file: {}", path.display());
    let content = fs::read_to_string(path)
        .map_err(|e| AnsibleCompatError::io(format!("Failed to read {}", path.display()), e))?;
    serde_yaml::from_str(&content).map_err(|source| AnsibleCompatError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Return `namespace/name` of the collection rooted at `path`, if any.
pub fn colpath_from_path(path: &Path) -> Result<Option<String>> {
    let galaxy_file = path.join("galaxy.yml");
    if !galaxy_file.exists() {
        return Ok(None);
    }

    let galaxy = yaml_from_file(&galaxy_file)?;
    let mut parts = Vec::with_capacity(2);
    for key in ["namespace", "name"] {
        match galaxy.get(key) {
            Some(Value::String(s)) => parts.push(s.clone()),
            _ => {
                return Err(AnsibleCompatError::InvalidPrerequisite(format!(
                    "{} is missing the following mandatory field {}",
                    galaxy_file.display(),
                    key
                )))
            }
        }
    }
    Ok(Some(parts.join("/")))
}

/// The parts of a collection's `MANIFEST.json` the runtime cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionManifest {
    pub collection_info: CollectionInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionInfo {
    pub namespace: String,
    pub name: String,
    pub version: String,
}

pub fn manifest_from_file(path: &Path) -> Result<CollectionManifest> {
    let content = fs::read_to_string(path)
        .map_err(|e| AnsibleCompatError::io(format!("Failed to read {}", path.display()), e))?;
    serde_json::from_str(&content).map_err(|source| AnsibleCompatError::Json {
        path: path.to_path_buf(),
        source,
    })
}
