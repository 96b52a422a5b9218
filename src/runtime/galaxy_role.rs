use std::fs;
use std::path::Path;

use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;

use super::Runtime;
use crate::constants::invalid_fqrl_message;
use crate::errors::{AnsibleCompatError, Result};
use crate::loaders::yaml_from_file;
use crate::prerun::{absolute, expand_user};

static FQRN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_]+\.[a-z][a-z0-9_]+$").unwrap());

/// What to do when a role's computed full name breaks galaxy rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleNameCheck {
    #[default]
    Error,
    Warn,
    Skip,
}

impl Runtime {
    /// Make the role at `project_dir` reachable under its fully qualified name.
    ///
    /// A symlink named after the role is placed in the cache roles directory
    /// (or `~/.ansible/roles`), pointing at the project.
    pub fn install_galaxy_role(
        &self,
        project_dir: &Path,
        role_name_check: RoleNameCheck,
        ignore_errors: bool,
    ) -> Result<()> {
        let meta_file = project_dir.join("meta").join("main.yml");
        if !meta_file.exists() {
            let msg = format!("Failed to find {}", meta_file.display());
            if ignore_errors {
                warn!("{}", msg);
                return Ok(());
            }
            return Err(AnsibleCompatError::InvalidPrerequisite(msg));
        }

        let meta = yaml_from_file(&meta_file)?;
        let galaxy_info = meta.get("galaxy_info").cloned().unwrap_or(Value::Null);
        let fqrn = role_fqrn(&galaxy_info, project_dir)?;

        match role_name_check {
            RoleNameCheck::Skip => {}
            _ if FQRN_RE.is_match(&fqrn) => {}
            RoleNameCheck::Warn => warn!("{}", invalid_fqrl_message(&fqrn)),
            RoleNameCheck::Error => {
                return Err(AnsibleCompatError::InvalidPrerequisite(invalid_fqrl_message(
                    &fqrn,
                )))
            }
        }

        let roles_dir = self
            .cache_dir
            .clone()
            .unwrap_or_else(|| expand_user("~/.ansible"))
            .join("roles");
        fs::create_dir_all(&roles_dir).map_err(|e| {
            AnsibleCompatError::io(format!("Failed to create {}", roles_dir.display()), e)
        })?;

        let target = absolute(project_dir)?;
        let link_path = roles_dir.join(&fqrn);
        let up_to_date = match fs::read_link(&link_path) {
            Ok(current) => current == target,
            Err(_) => false,
        };
        if !up_to_date {
            if fs::symlink_metadata(&link_path).is_ok() {
                remove_link(&link_path)?;
            }
            make_symlink(&target, &link_path)?;
        }

        info!(
            "Using {} symlink to current repository in order to enable Ansible to find the role using its expected full name.",
            link_path.display()
        );
        Ok(())
    }
}

/// Compute `namespace.role_name` from galaxy_info, falling back to the
/// author for the namespace and to the directory name for the role.
pub(crate) fn role_fqrn(galaxy_info: &Value, project_dir: &Path) -> Result<String> {
    let field = |key: &str| galaxy_info.get(key).and_then(Value::as_str).map(str::to_string);

    let namespace = field("namespace").or_else(|| field("author")).unwrap_or_default();
    let role_name = match field("role_name") {
        Some(name) if !name.is_empty() => name,
        _ => {
            let dir = absolute(project_dir)?;
            let base = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            base.strip_prefix("ansible-role-")
                .or_else(|| base.strip_prefix("ansible-"))
                .unwrap_or(&base)
                .to_string()
        }
    };

    if namespace.is_empty() {
        Ok(role_name)
    } else {
        Ok(format!("{}.{}", namespace, role_name))
    }
}

fn remove_link(path: &Path) -> Result<()> {
    let result = if path.is_dir() && fs::read_link(path).is_err() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| AnsibleCompatError::io(format!("Failed to remove {}", path.display()), e))
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).map_err(|e| {
        AnsibleCompatError::io(format!("Failed to create symlink {}", link.display()), e)
    })
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::windows::fs::symlink_dir(target, link).map_err(|e| {
        AnsibleCompatError::io(format!("Failed to create symlink {}", link.display()), e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn info(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_role_fqrn_from_meta() {
        let dir = TempDir::new().unwrap();
        let fqrn = role_fqrn(&info("namespace: acme\nrole_name: sample\n"), dir.path()).unwrap();
        assert_eq!(fqrn, "acme.sample");
    }

    #[test]
    fn test_role_fqrn_from_directory() {
        let root = TempDir::new().unwrap();
        for (folder, expected) in [
            ("ansible-role-sample", "acme.sample"),
            ("ansible-sample4", "acme.sample4"),
            ("sample3", "acme.sample3"),
        ] {
            let dir = root.path().join(folder);
            fs::create_dir_all(&dir).unwrap();
            assert_eq!(role_fqrn(&info("namespace: acme\n"), &dir).unwrap(), expected);
        }
    }

    #[test]
    fn test_role_fqrn_author_fallback() {
        let dir = TempDir::new().unwrap();
        let fqrn = role_fqrn(&info("author: acme\nrole_name: sample\n"), dir.path()).unwrap();
        assert_eq!(fqrn, "acme.sample");
        let fqrn = role_fqrn(&info("role_name: sample\n"), dir.path()).unwrap();
        assert_eq!(fqrn, "sample");
    }
}
