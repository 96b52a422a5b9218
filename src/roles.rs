//! Validation of role names.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z\d_]+$").unwrap());

// Role names end up as Python identifiers inside Ansible, so keywords are out.
const PYTHON_KEYWORDS: [&str; 35] = [
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise",
    "return", "try", "while", "with", "yield",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub namespace: String,
    pub name: String,
}

impl Role {
    /// Split `namespace.name`; anything without exactly one dot is a bare name.
    pub fn new(name: &str) -> Self {
        match name.split_once('.') {
            Some((namespace, role)) if !role.contains('.') => Role {
                namespace: namespace.to_string(),
                name: role.to_string(),
            },
            _ => Role {
                namespace: String::new(),
                name: name.to_string(),
            },
        }
    }

    /// Whether both parts are valid galaxy names.
    ///
    /// A missing namespace makes the role invalid.
    pub fn is_valid(&self) -> bool {
        [&self.namespace, &self.name]
            .iter()
            .all(|part| is_valid_part(part))
    }
}

fn is_valid_part(part: &str) -> bool {
    NAME_RE.is_match(part)
        && !part.starts_with(|c: char| c.is_ascii_digit())
        && !PYTHON_KEYWORDS.contains(&part)
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.namespace, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_validation() {
        let cases = [
            ("x.y.z", false),      // more than one dot
            ("foo-bar", false),    // dash not allowed
            ("foo_bar", false),    // missing namespace
            ("ns.foo-bar", false), // dash not allowed
            ("ns.foo_bar", true),
            ("for.foo", false), // python keyword
            ("ns.for", false),  // python keyword
            ("ns.1role", false),
        ];
        for (name, expected) in cases {
            assert_eq!(Role::new(name).is_valid(), expected, "role {}", name);
        }
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::new("acme.sample").to_string(), "acme.sample");
        assert_eq!(Role::new("sample").to_string(), "sample");
        assert_eq!(Role::new("x.y.z").to_string(), "x.y.z");
    }
}
