//! The [`Runtime`]: one Ansible installation as seen by a downstream tool.

mod collections;
mod galaxy_role;
mod requirements;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use once_cell::unsync::OnceCell;

use crate::config::{ansible_collections_path, AnsibleConfig};
use crate::constants::{ANSIBLE_DEFAULT_ROLES_PATH, REQUIREMENT_LOCATIONS};
use crate::env::{update_env, EnvStore, SystemEnv};
use crate::errors::{AnsibleCompatError, Result};
use crate::loaders::{colpath_from_path, yaml_from_file};
use crate::prerun::get_cache_dir;
use crate::runner::{to_args, CommandRunner, CompletedProcess, ProcessRunner};
use crate::version::{parse_ansible_version, AnsibleVersion};

pub use galaxy_role::RoleNameCheck;

const MODULE_VERSION_SCRIPT: &str = "import ansible.release; print(ansible.release.__version__)";

/// How a [`Runtime`] should be set up.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    /// Project the runtime works for; defaults to the current directory.
    pub project_dir: Option<PathBuf>,
    /// Install roles and collections in a per-project cache instead of the
    /// user's Ansible directories.
    pub isolated: bool,
    /// Fail unless the detected Ansible is at least this version.
    pub min_required_version: Option<String>,
    /// Also check that the `ansible` Python module matches the CLI.
    pub require_module: bool,
}

/// Options for [`Runtime::prepare_environment`].
#[derive(Debug, Clone)]
pub struct PrepareOptions {
    /// Collections that must be present, with an optional minimum version.
    pub required_collections: BTreeMap<String, Option<String>>,
    pub retry: bool,
    /// Make the project itself (role or collection) visible to Ansible.
    pub install_local: bool,
    pub offline: bool,
    pub role_name_check: RoleNameCheck,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        PrepareOptions {
            required_collections: BTreeMap::new(),
            retry: false,
            install_local: true,
            offline: false,
            role_name_check: RoleNameCheck::Error,
        }
    }
}

pub struct Runtime {
    pub project_dir: PathBuf,
    pub isolated: bool,
    pub cache_dir: Option<PathBuf>,
    runner: Box<dyn CommandRunner>,
    env: Box<dyn EnvStore>,
    version: OnceCell<AnsibleVersion>,
    config: OnceCell<AnsibleConfig>,
}

impl Runtime {
    /// Runtime backed by real processes and the process environment.
    pub fn new(options: RuntimeOptions) -> Result<Self> {
        Self::with_parts(options, Box::new(ProcessRunner), Box::new(SystemEnv))
    }

    /// Runtime with an injected command runner and environment.
    ///
    /// Paths composed by [`Runtime::prepare_ansible_paths`] are written to
    /// `env` only, so `runner` must spawn its commands with that same
    /// environment: `ProcessRunner` goes with `SystemEnv`, while an in-memory
    /// store needs a runner that reads from it.
    pub fn with_parts(
        options: RuntimeOptions,
        runner: Box<dyn CommandRunner>,
        env: Box<dyn EnvStore>,
    ) -> Result<Self> {
        let project_dir = match options.project_dir {
            Some(dir) => dir,
            None => std::env::current_dir()
                .map_err(|e| AnsibleCompatError::io("Failed to read current directory", e))?,
        };

        let cache_dir = if options.isolated {
            Some(get_cache_dir(&project_dir, true, &*env)?)
        } else {
            None
        };

        let runtime = Runtime {
            project_dir,
            isolated: options.isolated,
            cache_dir,
            runner,
            env,
            version: OnceCell::new(),
            config: OnceCell::new(),
        };

        if let Some(min_version) = options.min_required_version.as_deref() {
            let required = parse_version(min_version)?;
            let found = runtime.version()?;
            if *found < required {
                return Err(AnsibleCompatError::missing_ansible(format!(
                    "Found incompatible version of ansible runtime {}, instead of {} or newer.",
                    found, min_version
                )));
            }
        }

        if options.require_module {
            runtime.check_ansible_module()?;
        }

        Ok(runtime)
    }

    /// Execute a command inside the Ansible environment.
    ///
    /// A non-zero exit code is reported through the returned process, not as
    /// an error.
    pub fn exec(&self, args: &[String]) -> Result<CompletedProcess> {
        self.runner.run(args)
    }

    pub fn env(&self) -> &dyn EnvStore {
        &*self.env
    }

    pub fn env_mut(&mut self) -> &mut dyn EnvStore {
        &mut *self.env
    }

    /// Version of the `ansible` executable, detected once and cached.
    pub fn version(&self) -> Result<&AnsibleVersion> {
        self.version.get_or_try_init(|| {
            let proc = self.exec(&to_args(["ansible", "--version"]))?;
            if !proc.success() {
                return Err(AnsibleCompatError::MissingAnsible {
                    msg: "Unable to find a working copy of ansible executable.".to_string(),
                    proc: Some(Box::new(proc)),
                });
            }
            let version = parse_ansible_version(&proc.stdout)
                .map_err(AnsibleCompatError::missing_ansible)?;
            let version = AnsibleVersion::parse(&version).map_err(AnsibleCompatError::missing_ansible)?;
            debug!("Detected ansible version {}", version);
            Ok(version)
        })
    }

    /// Whether the detected version is within `[lower, upper)`.
    pub fn version_in_range(&self, lower: Option<&str>, upper: Option<&str>) -> Result<bool> {
        let version = self.version()?;
        if let Some(lower) = lower {
            if *version < parse_version(lower)? {
                return Ok(false);
            }
        }
        if let Some(upper) = upper {
            if *version >= parse_version(upper)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Effective Ansible configuration, loaded once from `ansible-config dump`.
    pub fn config(&self) -> Result<&AnsibleConfig> {
        self.config.get_or_try_init(|| {
            let proc = self.exec(&to_args(["ansible-config", "dump"]))?;
            if !proc.success() {
                return Err(AnsibleCompatError::InvalidConfig(format!(
                    "Unable to load ansible configuration (exit code: {}): {}",
                    proc.returncode,
                    proc.stderr.trim()
                )));
            }
            Ok(AnsibleConfig::from_dump(&proc.stdout))
        })
    }

    /// Replace the cached configuration.
    pub fn set_config(&mut self, config: AnsibleConfig) {
        self.config = OnceCell::from(config);
    }

    fn check_ansible_module(&self) -> Result<()> {
        let proc = self.exec(&to_args(["python3", "-c", MODULE_VERSION_SCRIPT]))?;
        if !proc.success() {
            return Err(AnsibleCompatError::MissingAnsible {
                msg: "Unable to find Ansible python module.".to_string(),
                proc: Some(Box::new(proc)),
            });
        }

        let module_version = proc.stdout.trim();
        let cli_version = self.version()?;
        let matches = AnsibleVersion::parse(module_version)
            .map(|v| v == *cli_version)
            .unwrap_or(false);
        if !matches {
            return Err(AnsibleCompatError::missing_ansible(format!(
                "Ansible CLI ({}) and python module ({}) versions do not match. \
                 This indicates a broken execution environment.",
                cli_version, module_version
            )));
        }
        Ok(())
    }

    /// Install requirements, expose the project to Ansible and make sure the
    /// required collections are present.
    pub fn prepare_environment(&mut self, options: &PrepareOptions) -> Result<()> {
        if options.offline {
            info!("Offline mode, skipping installation of requirement files");
        } else {
            for location in REQUIREMENT_LOCATIONS {
                let path = self.project_dir.join(location);
                self.install_requirements(&path, options.retry, options.offline)?;
            }
        }

        self.prepare_ansible_paths()?;

        if options.install_local {
            self.install_local(options)?;
        }

        for (name, version) in &options.required_collections {
            self.require_collection(name, version.as_deref(), !options.offline)?;
        }
        Ok(())
    }

    fn install_local(&self, options: &PrepareOptions) -> Result<()> {
        let galaxy_file = self.project_dir.join("galaxy.yml");
        if galaxy_file.exists() {
            self.install_galaxy_dependencies(&galaxy_file, options.offline)?;
            if let Some(colpath) = colpath_from_path(&self.project_dir)? {
                info!("Installing collection {} from current repository", colpath);
                let destination = self.cache_dir.as_ref().map(|dir| dir.join("collections"));
                self.install_collection_from_disk(&self.project_dir, destination.as_deref())?;
            }
        } else if self.project_dir.join("meta").join("main.yml").exists() {
            self.install_galaxy_role(&self.project_dir, options.role_name_check, false)?;
        }
        Ok(())
    }

    /// Install the collections listed under `dependencies` in a galaxy.yml.
    fn install_galaxy_dependencies(&self, galaxy_file: &Path, offline: bool) -> Result<()> {
        let galaxy = yaml_from_file(galaxy_file)?;
        let Some(dependencies) = galaxy.get("dependencies").and_then(|d| d.as_mapping()) else {
            return Ok(());
        };
        if offline {
            warn!("Skipped installing galaxy.yml dependencies due to running in offline mode.");
            return Ok(());
        }

        let destination = self.cache_dir.as_ref().map(|dir| dir.join("collections"));
        for (name, version) in dependencies {
            let (Some(name), Some(version)) = (name.as_str(), version_spec(version)) else {
                warn!("Ignoring malformed galaxy.yml dependency {:?}", name);
                continue;
            };
            info!("Provisioning collection {}:{} from galaxy.yml", name, version);
            self.install_collection(&format!("{}:{}", name, version), destination.as_deref(), false)?;
        }
        Ok(())
    }

    /// Prepend project and cache directories to Ansible's search path variables.
    pub fn prepare_ansible_paths(&mut self) -> Result<()> {
        let mut collections_path = self.config()?.collections_path()?;

        let mut library_paths: Vec<String> = Vec::new();
        let mut roles_path: Vec<String> = Vec::new();
        for (is_library, dir) in [(true, "plugins/modules"), (true, "library"), (false, "roles")] {
            let path = self.project_dir.join(dir);
            if path.exists() {
                let list = if is_library { &mut library_paths } else { &mut roles_path };
                let path = path.to_string_lossy().into_owned();
                if !list.contains(&path) {
                    list.push(path);
                }
            }
        }

        if let Some(cache_dir) = &self.cache_dir {
            let modules = cache_dir.join("modules");
            fs::create_dir_all(&modules).map_err(|e| {
                AnsibleCompatError::io(format!("Failed to create {}", modules.display()), e)
            })?;
            library_paths.push(modules.to_string_lossy().into_owned());
            collections_path.insert(0, cache_dir.join("collections").to_string_lossy().into_owned());
            roles_path.insert(0, cache_dir.join("roles").to_string_lossy().into_owned());
        }

        let collections_var = ansible_collections_path(&*self.env, self.version()?);
        update_env(&mut *self.env, "ANSIBLE_LIBRARY", &library_paths, "");
        update_env(&mut *self.env, collections_var, &collections_path, "");
        update_env(&mut *self.env, "ANSIBLE_ROLES_PATH", &roles_path, ANSIBLE_DEFAULT_ROLES_PATH);

        // Paths changed, so what ansible-config reports did too.
        self.config = OnceCell::new();
        Ok(())
    }

    /// Remove the isolated cache directory, if any.
    pub fn clean(&self) -> Result<()> {
        if let Some(cache_dir) = &self.cache_dir {
            if cache_dir.exists() {
                info!("Removing cache directory {}", cache_dir.display());
                fs::remove_dir_all(cache_dir).map_err(|e| {
                    AnsibleCompatError::io(format!("Failed to remove {}", cache_dir.display()), e)
                })?;
            }
        }
        Ok(())
    }
}

fn parse_version(text: &str) -> Result<AnsibleVersion> {
    AnsibleVersion::parse(text).map_err(AnsibleCompatError::InvalidPrerequisite)
}

fn version_spec(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
