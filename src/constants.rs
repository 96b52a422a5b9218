//! Constants shared by the runtime, the installers and the CLI.

/// Oldest ansible-core release this layer knows how to drive.
pub const ANSIBLE_MIN_VERSION: &str = "2.12";

/// Value Ansible itself uses for `DEFAULT_ROLES_PATH` when nothing is configured.
pub const ANSIBLE_DEFAULT_ROLES_PATH: &str =
    "~/.ansible/roles:/usr/share/ansible/roles:/etc/ansible/roles";

pub const INVALID_CONFIG_RC: i32 = 2;
pub const ANSIBLE_MISSING_RC: i32 = 4;
pub const INVALID_PREREQUISITES_RC: i32 = 10;

/// Requirement files looked up (relative to the project) by `prepare_environment`.
pub const REQUIREMENT_LOCATIONS: [&str; 6] = [
    "requirements.yml",
    "roles/requirements.yml",
    "collections/requirements.yml",
    // https://docs.ansible.com/ansible/latest/dev_guide/testing_integration.html#non-destructive-tests
    "tests/requirements.yml",
    "tests/integration/requirements.yml",
    "tests/unit/requirements.yml",
];

pub const MSG_INVALID_FQRL: &str = "\
Computed fully qualified role name of {} does not follow current galaxy requirements.
Please edit meta/main.yml and assure we can correctly determine full role name:

galaxy_info:
role_name: my_name  # if absent directory name hosting role is used instead
namespace: my_galaxy_namespace  # if absent, author is used instead

Namespace: https://galaxy.ansible.com/docs/contributing/namespaces.html#galaxy-namespace-limitations
Role: https://galaxy.ansible.com/docs/contributing/creating_role.html#role-names

As an alternative, you can add 'role-name' to either skip_list or warn_list.
";

/// Render `MSG_INVALID_FQRL` for a given role name.
pub fn invalid_fqrl_message(fqrn: &str) -> String {
    MSG_INVALID_FQRL.replacen("{}", fqrn, 1)
}
