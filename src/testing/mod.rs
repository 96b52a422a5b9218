//! Shared testing utilities for ansible-compat unit and integration tests
//!
//! Provides a scripted command runner standing in for the `ansible*`
//! executables, plus fixture builders for projects, roles and collections.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::errors::Result;
use crate::runner::{CommandRunner, CompletedProcess};

type Handler = Rc<dyn Fn(&[String]) -> CompletedProcess>;

#[derive(Default)]
struct Script {
    handlers: Vec<(Vec<String>, Handler)>,
    calls: Vec<Vec<String>>,
}

/// Command runner answering from a script and recording every call.
///
/// Clones share the same script and call log, so a test can hand one clone
/// to a `Runtime` and inspect the calls through another.
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    script: Rc<RefCell<Script>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` with a fixed result.
    pub fn respond(&self, prefix: &[&str], returncode: i32, stdout: &str, stderr: &str) -> &Self {
        let stdout = stdout.to_string();
        let stderr = stderr.to_string();
        self.respond_with(prefix, move |args| CompletedProcess {
            args: args.to_vec(),
            returncode,
            stdout: stdout.clone(),
            stderr: stderr.clone(),
        })
    }

    /// Answer commands starting with `prefix` by calling `handler`.
    ///
    /// Later registrations take precedence over earlier ones.
    pub fn respond_with<F>(&self, prefix: &[&str], handler: F) -> &Self
    where
        F: Fn(&[String]) -> CompletedProcess + 'static,
    {
        let prefix = prefix.iter().map(|s| s.to_string()).collect();
        self.script
            .borrow_mut()
            .handlers
            .push((prefix, Rc::new(handler)));
        self
    }

    /// Script a working `ansible` of the given version with the given
    /// collection search paths.
    pub fn with_ansible(self, version: &str, collections_paths: &[&str]) -> Self {
        self.respond(&["ansible", "--version"], 0, &ansible_version_output(version), "");
        self.respond(&["ansible-config", "dump"], 0, &config_dump(collections_paths), "");
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.script.borrow().calls.clone()
    }

    /// Calls whose arguments start with `prefix`.
    pub fn calls_matching(&self, prefix: &[&str]) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|call| starts_with(call, prefix))
            .collect()
    }
}

fn starts_with(args: &[String], prefix: &[impl AsRef<str>]) -> bool {
    args.len() >= prefix.len() && prefix.iter().zip(args).all(|(p, a)| p.as_ref() == a)
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, args: &[String]) -> Result<CompletedProcess> {
        let handler = {
            let mut script = self.script.borrow_mut();
            script.calls.push(args.to_vec());
            script
                .handlers
                .iter()
                .rev()
                .find(|(prefix, _)| starts_with(args, prefix.as_slice()))
                .map(|(_, handler)| Rc::clone(handler))
        };

        Ok(match handler {
            Some(handler) => handler(args),
            None => CompletedProcess {
                args: args.to_vec(),
                returncode: crate::runner::COMMAND_NOT_FOUND_RC,
                stdout: String::new(),
                stderr: format!("{}: command not found", args.first().map_or("", |s| s.as_str())),
            },
        })
    }
}

/// What `ansible --version` prints for ansible-core.
pub fn ansible_version_output(version: &str) -> String {
    format!(
        "ansible [core] {}\n  config file = None\n  python version = 3.11.4\n",
        version
    )
}

/// Minimal `ansible-config dump` output.
pub fn config_dump(collections_paths: &[&str]) -> String {
    let paths = collections_paths
        .iter()
        .map(|p| format!("'{}'", p))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "ACTION_WARNINGS(default) = True\n\
         COLLECTIONS_PATHS(default) = [{}]\n\
         DEFAULT_ROLES_PATH(default) = ['~/.ansible/roles', '/usr/share/ansible/roles', '/etc/ansible/roles']\n\
         DEFAULT_GATHER_TIMEOUT(default) = 10\n",
        paths
    )
}

/// Write `content` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Create an installed collection with a MANIFEST.json under `collections_root`.
pub fn create_collection(collections_root: &Path, namespace: &str, name: &str, version: &str) -> PathBuf {
    let manifest = format!(
        r#"{{"collection_info": {{"namespace": "{}", "name": "{}", "version": "{}"}}, "format": 1}}"#,
        namespace, name, version
    );
    let relative = format!("ansible_collections/{}/{}/MANIFEST.json", namespace, name);
    write_file(collections_root, &relative, &manifest)
        .parent()
        .unwrap()
        .to_path_buf()
}

/// Create a role project with the given `galaxy_info` YAML body.
pub fn create_role_project(root: &Path, folder: &str, galaxy_info: &str) -> PathBuf {
    let dir = root.join(folder);
    let meta = format!("galaxy_info:\n{}", indent(galaxy_info));
    write_file(&dir, "meta/main.yml", &meta);
    write_file(&dir, "tasks/main.yml", "- name: noop\n  debug:\n    msg: hi\n");
    dir
}

fn indent(text: &str) -> String {
    text.lines().map(|l| format!("  {}\n", l)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::to_args;

    #[test]
    fn test_scripted_runner_records_calls() {
        let runner = ScriptedRunner::new();
        runner.respond(&["echo"], 0, "hi\n", "");
        let other = runner.clone();

        let proc = runner.run(&to_args(["echo", "x"])).unwrap();
        assert_eq!(proc.stdout, "hi\n");
        assert_eq!(other.calls(), vec![to_args(["echo", "x"])]);
    }

    #[test]
    fn test_scripted_runner_latest_handler_wins() {
        let runner = ScriptedRunner::new();
        runner.respond(&["ansible-galaxy"], 0, "", "");
        runner.respond(&["ansible-galaxy", "role"], 1, "", "nope");

        assert_eq!(runner.run(&to_args(["ansible-galaxy", "role", "install"])).unwrap().returncode, 1);
        assert_eq!(runner.run(&to_args(["ansible-galaxy", "collection"])).unwrap().returncode, 0);
        assert_eq!(runner.run(&to_args(["unknown"])).unwrap().returncode, 127);
        assert_eq!(runner.calls_matching(&["ansible-galaxy"]).len(), 2);
    }

    #[test]
    fn test_create_collection() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = create_collection(dir.path(), "foo", "bar", "1.0.0");
        assert_eq!(path, dir.path().join("ansible_collections/foo/bar"));
        assert!(path.join("MANIFEST.json").is_file());
    }

    #[test]
    fn test_config_dump_parses() {
        let config = crate::config::AnsibleConfig::from_dump(&config_dump(&["/a", "/b"]));
        assert_eq!(config.collections_path().unwrap(), vec!["/a", "/b"]);
    }
}
