//! Environment access and composition of colon-delimited search paths.
//!
//! Ansible locates modules, roles and collections through variables such as
//! `ANSIBLE_LIBRARY` or `ANSIBLE_ROLES_PATH`. The runtime prepends its own
//! directories to them before spawning `ansible*` commands, which inherit the
//! resulting environment.

use std::collections::HashMap;

use log::debug;

/// Separator used by Ansible for path-like variables.
pub const PATH_SEPARATOR: &str = ":";

/// Key-value view of an environment.
///
/// `None` means the variable is unset, which is different from a variable
/// that is set to the empty string.
pub trait EnvStore {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&mut self, name: &str, value: &str);

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// The real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEnv;

impl EnvStore for SystemEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var_os(name).map(|v| v.to_string_lossy().into_owned())
    }

    fn set(&mut self, name: &str, value: &str) {
        std::env::set_var(name, value);
    }
}

/// Environment kept in memory, never touching the process table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryEnv {
    vars: HashMap<String, String>,
}

impl MemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.vars.remove(name)
    }
}

impl EnvStore for MemoryEnv {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: &str) {
        self.vars.insert(name.to_string(), value.to_string());
    }
}

impl<T: EnvStore + ?Sized> EnvStore for Box<T> {
    fn get(&self, name: &str) -> Option<String> {
        (**self).get(name)
    }

    fn set(&mut self, name: &str, value: &str) {
        (**self).set(name, value)
    }
}

/// Compute the new value of a path-like variable.
///
/// Returns `None` when the variable must be left alone, which is the case
/// whenever `value` is empty. Otherwise the segments of `value` are joined
/// and placed in front of the base: the old value when it is non-empty, else
/// `default`. Segments are used verbatim, so `["", ""]` yields `":"`.
pub fn compose(old_value: Option<&str>, value: &[String], default: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }

    let new_part = value.join(PATH_SEPARATOR);
    let base = match old_value {
        Some(old) if !old.is_empty() => old,
        _ => default,
    };

    if base.is_empty() {
        Some(new_part)
    } else {
        Some(format!("{}{}{}", new_part, PATH_SEPARATOR, base))
    }
}

/// Prepend `value` to the variable `name` held by `env`.
///
/// A preexisting value always takes priority over `default`, which is only
/// used to seed a variable that is unset (or empty). Calling this twice with
/// the same segments prepends them twice.
pub fn update_env<E: EnvStore + ?Sized>(env: &mut E, name: &str, value: &[String], default: &str) {
    let old_value = env.get(name);
    if let Some(result) = compose(old_value.as_deref(), value, default) {
        debug!("Setting {}={}", name, result);
        env.set(name, &result);
    }
}
