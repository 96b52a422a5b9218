//! Compatibility layer for tools that need to work with several Ansible
//! versions: version detection, environment preparation and installation of
//! roles and collections, all done by driving the `ansible*` executables.

pub mod cli;
pub mod config;
pub mod constants;
pub mod env;
pub mod errors;
pub mod loaders;
pub mod prerun;
pub mod roles;
pub mod runner;
pub mod runtime;
#[doc(hidden)]
pub mod testing;
pub mod version;

pub use config::AnsibleConfig;
pub use env::{update_env, EnvStore, MemoryEnv, SystemEnv};
pub use errors::{AnsibleCompatError, Result};
pub use runner::{CommandRunner, CompletedProcess, ProcessRunner};
pub use runtime::{PrepareOptions, RoleNameCheck, Runtime, RuntimeOptions};
pub use version::AnsibleVersion;
