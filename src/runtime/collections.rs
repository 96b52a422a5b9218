use std::path::PathBuf;

use itertools::Itertools;
use log::{debug, info};

use super::Runtime;
use crate::config::render;
use crate::errors::{AnsibleCompatError, Result};
use crate::loaders::manifest_from_file;
use crate::prerun::expand_user;
use crate::version::AnsibleVersion;

impl Runtime {
    /// Check that collection `name` is installed, optionally at `version` or newer.
    ///
    /// Returns the version found and the directory of the collection. When
    /// `install` is set, a missing or outdated collection is installed first.
    pub fn require_collection(
        &self,
        name: &str,
        version: Option<&str>,
        install: bool,
    ) -> Result<(Option<AnsibleVersion>, PathBuf)> {
        let (namespace, collection) = match name.split_once('.') {
            Some((ns, coll)) if !ns.is_empty() && !coll.is_empty() => (ns, coll),
            _ => {
                return Err(AnsibleCompatError::InvalidPrerequisite(format!(
                    "Invalid collection name supplied: {}",
                    name
                )))
            }
        };

        let config = self.config()?;
        let mut paths = match config.collections_path() {
            Ok(paths) if !paths.is_empty() => paths,
            _ => {
                let value = config
                    .collections_path_value()
                    .map(render)
                    .unwrap_or_else(|| "None".to_string());
                return Err(AnsibleCompatError::InvalidPrerequisite(format!(
                    "Unable to determine ansible collection paths. ({})",
                    value
                )));
            }
        };

        let destination = self.cache_dir.as_ref().map(|dir| dir.join("collections"));
        if let Some(destination) = &destination {
            let destination = destination.to_string_lossy().into_owned();
            if !paths.contains(&destination) {
                paths.insert(0, destination);
            }
        }

        for path in &paths {
            let collpath = expand_user(path)
                .join("ansible_collections")
                .join(namespace)
                .join(collection);
            if !collpath.exists() {
                continue;
            }
            debug!("Found collection {} at {}", name, collpath.display());

            let mpath = collpath.join("MANIFEST.json");
            if !mpath.exists() {
                return Err(AnsibleCompatError::InvalidPrerequisite(format!(
                    "Found collection at '{}' but missing MANIFEST.json, cannot get info.",
                    collpath.display()
                )));
            }
            let manifest = manifest_from_file(&mpath)?;
            let found = AnsibleVersion::parse(&manifest.collection_info.version)
                .map_err(AnsibleCompatError::InvalidPrerequisite)?;

            if let Some(required) = version {
                let required_version =
                    AnsibleVersion::parse(required).map_err(AnsibleCompatError::InvalidPrerequisite)?;
                if found < required_version {
                    if install {
                        info!(
                            "Found {} collection {} but {} or newer is required, upgrading",
                            name, found, required
                        );
                        self.install_collection(
                            &format!("{}:>={}", name, required),
                            destination.as_deref(),
                            false,
                        )?;
                        return self.require_collection(name, version, false);
                    }
                    return Err(AnsibleCompatError::InvalidPrerequisite(format!(
                        "Found {} collection {} but {} or newer is required.",
                        name, found, required
                    )));
                }
            }
            return Ok((Some(found), collpath));
        }

        if install {
            let spec = match version {
                Some(required) => format!("{}:>={}", name, required),
                None => name.to_string(),
            };
            self.install_collection(&spec, destination.as_deref(), false)?;
            return self.require_collection(name, version, false);
        }

        Err(AnsibleCompatError::InvalidPrerequisite(format!(
            "Collection '{}' not found in '{}'",
            name,
            paths.iter().join(", ")
        )))
    }
}
