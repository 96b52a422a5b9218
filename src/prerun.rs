//! Selection of the cache directory used to install roles and collections.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use sha2::{Digest, Sha256};

use crate::env::EnvStore;
use crate::errors::{AnsibleCompatError, Result};

/// Expand a leading `~` to the user's home directory.
pub fn expand_user(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Absolute form of `path`, resolving symlinks when it exists.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    if let Ok(resolved) = fs::canonicalize(path) {
        return Ok(resolved);
    }
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| AnsibleCompatError::io("Failed to read current directory", e))?;
    Ok(cwd.join(path))
}

fn is_writable_dir(path: &Path) -> bool {
    path.is_dir() && tempfile::tempfile_in(path).is_ok()
}

/// Compute the cache directory to use for a project.
///
/// Outside a virtual environment and without isolation this is
/// `$ANSIBLE_HOME` (or `~/.ansible`). Inside a virtual environment it is
/// `$VIRTUAL_ENV/.ansible` (an empty `VIRTUAL_ENV` is ignored). Isolated projects get `<project>/.ansible`, or a
/// per-project directory under the system temp dir when the project itself is
/// not writable. The `roles` and `collections` subdirectories are created so
/// that `ansible-galaxy list` finds usable paths.
pub fn get_cache_dir<E: EnvStore + ?Sized>(
    project_dir: &Path,
    isolated: bool,
    env: &E,
) -> Result<PathBuf> {
    let ansible_home = env.get("ANSIBLE_HOME").unwrap_or_else(|| "~/.ansible".to_string());
    let mut cache_dir = expand_user(&ansible_home);

    // An empty VIRTUAL_ENV counts as unset.
    if let Some(venv) = env.get("VIRTUAL_ENV").filter(|v| !v.is_empty()) {
        let venv_path = PathBuf::from(&venv);
        if !venv_path.exists() {
            return Err(AnsibleCompatError::io(
                format!("VIRTUAL_ENV={} does not exist.", venv),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }
        cache_dir = absolute(&venv_path)?.join(".ansible");
    } else if isolated {
        if is_writable_dir(project_dir) {
            cache_dir = absolute(project_dir)?.join(".ansible");
        } else {
            // e.g. a project at "/" when not running as root
            let digest = Sha256::digest(project_dir.to_string_lossy().as_bytes());
            let checksum = format!("{:x}", digest);
            cache_dir = std::env::temp_dir().join(format!(".ansible-{}", &checksum[..4]));
            warn!(
                "Project directory {} is not writable, using {} as cache",
                project_dir.display(),
                cache_dir.display()
            );
        }
    }

    for name in ["roles", "collections"] {
        let dir = cache_dir.join(name);
        fs::create_dir_all(&dir).map_err(|e| {
            AnsibleCompatError::io(
                format!("Failed to create cache directory {}", dir.display()),
                e,
            )
        })?;
    }

    debug!("Using cache directory {}", cache_dir.display());
    Ok(cache_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MemoryEnv;
    use tempfile::TempDir;

    #[test]
    fn test_expand_user() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_user("~/.ansible"), home.join(".ansible"));
        assert_eq!(expand_user("~"), home);
        assert_eq!(expand_user("/etc/ansible"), PathBuf::from("/etc/ansible"));
    }

    #[test]
    fn test_get_cache_dir_no_isolation_uses_ansible_home() {
        let home = TempDir::new().unwrap();
        let env = MemoryEnv::new().with_var("ANSIBLE_HOME", home.path().to_str().unwrap());
        let cache_dir = get_cache_dir(Path::new("."), false, &env).unwrap();
        assert_eq!(cache_dir, home.path());
        assert!(cache_dir.join("roles").is_dir());
        assert!(cache_dir.join("collections").is_dir());
    }

    #[test]
    fn test_get_cache_dir_isolation_no_venv() {
        let project = TempDir::new().unwrap();
        let env = MemoryEnv::new();
        let cache_dir = get_cache_dir(project.path(), true, &env).unwrap();
        assert_eq!(cache_dir, absolute(project.path()).unwrap().join(".ansible"));
        assert!(cache_dir.join("roles").is_dir());
    }

    #[test]
    fn test_get_cache_dir_relative() {
        let env = MemoryEnv::new();
        let relative = get_cache_dir(Path::new("."), true, &env).unwrap();
        let abs = get_cache_dir(&absolute(Path::new(".")).unwrap(), true, &env).unwrap();
        assert_eq!(relative, abs);
    }

    #[test]
    fn test_get_cache_dir_isolation_missing_project() {
        let env = MemoryEnv::new();
        let cache_dir = get_cache_dir(Path::new("/that/does/not/exist"), true, &env).unwrap();
        assert!(cache_dir.starts_with(std::env::temp_dir()));
        let name = cache_dir.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(".ansible-"));
        assert_eq!(name.len(), ".ansible-".len() + 4);
    }

    #[test]
    fn test_get_cache_dir_virtualenv() {
        let venv = TempDir::new().unwrap();
        let env = MemoryEnv::new().with_var("VIRTUAL_ENV", venv.path().to_str().unwrap());
        let cache_dir = get_cache_dir(Path::new("."), true, &env).unwrap();
        assert_eq!(cache_dir, absolute(venv.path()).unwrap().join(".ansible"));
    }

    #[test]
    fn test_get_cache_dir_empty_virtualenv_is_ignored() {
        let project = TempDir::new().unwrap();
        let env = MemoryEnv::new().with_var("VIRTUAL_ENV", "");
        let cache_dir = get_cache_dir(project.path(), true, &env).unwrap();
        assert_eq!(cache_dir, absolute(project.path()).unwrap().join(".ansible"));
    }

    #[test]
    fn test_get_cache_dir_missing_virtualenv() {
        let env = MemoryEnv::new().with_var("VIRTUAL_ENV", "/that/does/not/exist");
        let err = get_cache_dir(Path::new("."), true, &env).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
