//! Installation of collections and requirement files through `ansible-galaxy`.

use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;

use super::Runtime;
use crate::errors::{AnsibleCompatError, Result};
use crate::loaders::yaml_from_file;
use crate::runner::{to_args, CompletedProcess};
use crate::version::AnsibleVersion;

// version part of "ns.name:>=1.0.0,<2.0.0"
static VERSION_SPEC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r":[>=<]*([^,]*)").unwrap());

const RETRY_ATTEMPTS: usize = 3;

impl Runtime {
    /// Install a collection with `ansible-galaxy collection install`.
    ///
    /// `collection` accepts anything galaxy does: `ns.name`, `ns.name:>=1.0`,
    /// a tarball path. In isolated mode the collection lands in the cache
    /// unless `destination` says otherwise.
    pub fn install_collection(
        &self,
        collection: &str,
        destination: Option<&Path>,
        force: bool,
    ) -> Result<()> {
        let mut cmd = to_args(["ansible-galaxy", "collection", "install", "-vvv"]);
        if force {
            cmd.push("--force".to_string());
        }

        // galaxy does not figure out by itself that a range needs pre-releases
        if requests_prerelease(collection) {
            cmd.push("--pre".to_string());
        }

        let destination = destination
            .map(Path::to_path_buf)
            .or_else(|| self.cache_dir.as_ref().map(|dir| dir.join("collections")));
        if let Some(destination) = &destination {
            cmd.push("-p".to_string());
            cmd.push(destination.to_string_lossy().into_owned());
        }
        cmd.push(collection.to_string());

        info!(
            "Running from {} : {}",
            self.project_dir.display(),
            cmd.join(" ")
        );
        let proc = self.run_with_retry(&cmd, true)?;
        if !proc.success() {
            let msg = format!(
                "Command {}, returned {} code:\n{}\n{}",
                cmd.join(" "),
                proc.returncode,
                proc.stdout,
                proc.stderr
            );
            error!("{}", msg);
            return Err(AnsibleCompatError::InvalidPrerequisite(msg));
        }
        Ok(())
    }

    /// Build the collection found at `path` and install the resulting tarball.
    pub fn install_collection_from_disk(&self, path: &Path, destination: Option<&Path>) -> Result<()> {
        let build_dir = tempfile::Builder::new()
            .prefix("ansible-compat-build")
            .tempdir()
            .map_err(|e| AnsibleCompatError::io("Failed to create build directory", e))?;

        let cmd = vec![
            "ansible-galaxy".to_string(),
            "collection".to_string(),
            "build".to_string(),
            "--output-path".to_string(),
            build_dir.path().to_string_lossy().into_owned(),
            "--force".to_string(),
            path.to_string_lossy().into_owned(),
        ];
        info!("Running {}", cmd.join(" "));
        let proc = self.exec(&cmd)?;
        if !proc.success() {
            return Err(AnsibleCompatError::AnsibleCommand {
                proc: Box::new(proc),
            });
        }

        let tarball = find_tarball(build_dir.path())?.ok_or_else(|| {
            AnsibleCompatError::InvalidPrerequisite(format!(
                "Building collection from {} did not produce any archive",
                path.display()
            ))
        })?;
        self.install_collection(&tarball.to_string_lossy(), destination, true)
    }

    /// Install roles and collections listed in a requirements file.
    ///
    /// A missing file is silently ignored. Roles are skipped offline, as are
    /// collections.
    pub fn install_requirements(&self, requirement: &Path, retry: bool, offline: bool) -> Result<()> {
        if !requirement.exists() {
            info!("Requirements file {} not found, skipping", requirement.display());
            return Ok(());
        }

        let reqs = yaml_from_file(requirement)?;
        let (roles, collections) = match &reqs {
            // v1 format: a plain list of roles
            Value::Sequence(_) => (true, None),
            Value::Mapping(map) if map.contains_key("roles") || map.contains_key("collections") => {
                (map.contains_key("roles"), map.get("collections"))
            }
            _ => {
                return Err(AnsibleCompatError::InvalidPrerequisite(format!(
                    "{} file is not a valid Ansible requirements file.",
                    requirement.display()
                )))
            }
        };
        let requirement_arg = requirement.to_string_lossy().into_owned();

        if roles {
            if offline {
                warn!("Skipped installing old role dependencies due to running in offline mode.");
            } else {
                let mut cmd = to_args(["ansible-galaxy", "role", "install", "-vr"]);
                cmd.push(requirement_arg.clone());
                if let Some(cache_dir) = &self.cache_dir {
                    cmd.push("--roles-path".to_string());
                    cmd.push(cache_dir.join("roles").to_string_lossy().into_owned());
                }
                self.run_galaxy(&cmd, retry)?;
            }
        }

        if let Some(collections) = collections.filter(|c| !c.is_null()) {
            if offline {
                warn!("Skipped installing collection dependencies due to running in offline mode.");
                return Ok(());
            }
            let mut cmd = to_args(["ansible-galaxy", "collection", "install", "-v"]);
            if has_git_source(collections) {
                info!("Adding '--pre' to ansible-galaxy collection install because we detected one collection being sourced from git.");
                cmd.push("--pre".to_string());
            }
            cmd.push("-r".to_string());
            cmd.push(requirement_arg);
            if let Some(cache_dir) = &self.cache_dir {
                cmd.push("-p".to_string());
                cmd.push(cache_dir.join("collections").to_string_lossy().into_owned());
            }
            self.run_galaxy(&cmd, retry)?;
        }
        Ok(())
    }

    fn run_galaxy(&self, cmd: &[String], retry: bool) -> Result<()> {
        info!("Running {}", cmd.join(" "));
        let proc = self.run_with_retry(cmd, retry)?;
        if !proc.success() {
            error!("{}\n{}", proc.stdout, proc.stderr);
            return Err(AnsibleCompatError::AnsibleCommand {
                proc: Box::new(proc),
            });
        }
        Ok(())
    }

    fn run_with_retry(&self, cmd: &[String], retry: bool) -> Result<CompletedProcess> {
        let attempts = if retry { RETRY_ATTEMPTS } else { 1 };
        let mut attempt = 1;
        loop {
            let proc = self.exec(cmd)?;
            if proc.success() || attempt >= attempts {
                return Ok(proc);
            }
            warn!(
                "Retrying execution failure {} of {}: {}",
                attempt,
                attempts - 1,
                cmd.join(" ")
            );
            attempt += 1;
        }
    }
}

fn requests_prerelease(collection: &str) -> bool {
    if collection.contains("://") {
        return false;
    }
    VERSION_SPEC_RE
        .captures(collection)
        .and_then(|caps| AnsibleVersion::parse(&caps[1]).ok())
        .map(|version| version.is_prerelease())
        .unwrap_or(false)
}

fn has_git_source(collections: &Value) -> bool {
    collections
        .as_sequence()
        .map(|items| {
            items
                .iter()
                .any(|item| item.get("type").and_then(Value::as_str) == Some("git"))
        })
        .unwrap_or(false)
}

fn find_tarball(dir: &Path) -> Result<Option<PathBuf>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| AnsibleCompatError::io(format!("Failed to read {}", dir.display()), e))?;
    for entry in entries {
        let path = entry
            .map_err(|e| AnsibleCompatError::io(format!("Failed to read {}", dir.display()), e))?
            .path();
        if path.to_string_lossy().ends_with(".tar.gz") {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_prerelease() {
        assert!(requests_prerelease("containers.podman:>=1.0.0rc1"));
        assert!(requests_prerelease("containers.podman:==2.0.0b1,<3"));
        assert!(requests_prerelease("containers.podman:>=1.0.0-beta.1"));
        assert!(!requests_prerelease("containers.podman:>=1.0"));
        assert!(!requests_prerelease("containers.podman"));
        assert!(!requests_prerelease("https://example.com/ns-name-1.0.0rc1.tar.gz"));
    }

    #[test]
    fn test_has_git_source() {
        let reqs: Value = serde_yaml::from_str(
            "- name: https://github.com/acme/col.git\n  type: git\n- name: community.general\n",
        )
        .unwrap();
        assert!(has_git_source(&reqs));

        let reqs: Value = serde_yaml::from_str("- community.general\n").unwrap();
        assert!(!has_git_source(&reqs));
    }

    #[test]
    fn test_find_tarball() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(find_tarball(dir.path()).unwrap(), None);
        fs::write(dir.path().join("acme-goodies-1.0.0.tar.gz"), b"").unwrap();
        assert_eq!(
            find_tarball(dir.path()).unwrap(),
            Some(dir.path().join("acme-goodies-1.0.0.tar.gz"))
        );
    }
}
