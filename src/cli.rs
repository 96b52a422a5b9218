use clap::{Arg, ArgAction, Command};

fn common_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("project-dir")
            .long("project-dir")
            .help("Project directory (default: current directory)")
            .value_name("DIR"),
    )
    .arg(
        Arg::new("isolated")
            .long("isolated")
            .help("Install roles and collections in a per-project cache")
            .action(ArgAction::SetTrue),
    )
    .arg(
        Arg::new("verbose")
            .short('v')
            .action(ArgAction::Count)
            .help("Increase verbosity (up to -vvv)"),
    )
}

pub fn build_cli() -> Command {
    Command::new("ansible-compat")
        .about("Prepare Ansible environments for linters and test runners")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(common_args(
            Command::new("version").about("Print the detected Ansible version"),
        ))
        .subcommand(common_args(
            Command::new("prepare")
                .about("Install requirements and expose the project to Ansible")
                .arg(
                    Arg::new("offline")
                        .long("offline")
                        .help("Do not download anything")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("no-install-local")
                        .long("no-install-local")
                        .help("Do not install the project itself as a role or collection")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("retry")
                        .long("retry")
                        .help("Retry failed ansible-galaxy invocations")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("require")
                        .long("require")
                        .help("Collection that must be present, as NAME or NAME:MIN_VERSION")
                        .value_name("COLLECTION")
                        .action(ArgAction::Append),
                ),
        ))
        .subcommand(common_args(
            Command::new("install-collection")
                .about("Install a collection with ansible-galaxy")
                .arg(
                    Arg::new("name")
                        .help("Collection to install, e.g. containers.podman:>=1.0")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("dest")
                        .long("dest")
                        .help("Destination directory")
                        .value_name("DIR"),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help("Reinstall even if already present")
                        .action(ArgAction::SetTrue),
                ),
        ))
        .subcommand(common_args(
            Command::new("install-requirements")
                .about("Install roles and collections from a requirements file")
                .arg(
                    Arg::new("file")
                        .help("Requirements file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("offline")
                        .long("offline")
                        .help("Do not download anything")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("retry")
                        .long("retry")
                        .help("Retry failed ansible-galaxy invocations")
                        .action(ArgAction::SetTrue),
                ),
        ))
        .subcommand(common_args(
            Command::new("require-collection")
                .about("Check that a collection is installed")
                .arg(
                    Arg::new("name")
                        .help("Collection name, e.g. community.general")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("min-version")
                        .long("min-version")
                        .help("Minimum version required")
                        .value_name("VERSION"),
                )
                .arg(
                    Arg::new("install")
                        .long("install")
                        .help("Install the collection when missing or outdated")
                        .action(ArgAction::SetTrue),
                ),
        ))
}

/// Split `NAME[:MIN_VERSION]` as given to `prepare --require`.
pub fn parse_requirement(value: &str) -> (String, Option<String>) {
    match value.split_once(':') {
        Some((name, version)) if !version.is_empty() => (name.to_string(), Some(version.to_string())),
        Some((name, _)) => (name.to_string(), None),
        None => (value.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_cli_subcommands() {
        let cmd = build_cli();
        let subcommands: Vec<_> = cmd.get_subcommands().map(|s| s.get_name()).collect();
        for name in [
            "version",
            "prepare",
            "install-collection",
            "install-requirements",
            "require-collection",
        ] {
            assert!(subcommands.contains(&name), "missing {}", name);
        }
    }

    #[test]
    fn test_prepare_args() {
        let matches = build_cli()
            .try_get_matches_from([
                "ansible-compat",
                "prepare",
                "--isolated",
                "--require",
                "community.general:5.0.0",
                "--require",
                "ansible.posix",
                "-vv",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert!(sub.get_flag("isolated"));
        assert_eq!(sub.get_count("verbose"), 2);
        let required: Vec<_> = sub.get_many::<String>("require").unwrap().collect();
        assert_eq!(required, ["community.general:5.0.0", "ansible.posix"]);
    }

    #[test]
    fn test_parse_requirement() {
        assert_eq!(
            parse_requirement("community.general:5.0.0"),
            ("community.general".to_string(), Some("5.0.0".to_string()))
        );
        assert_eq!(parse_requirement("ansible.posix"), ("ansible.posix".to_string(), None));
        assert_eq!(parse_requirement("ansible.posix:"), ("ansible.posix".to_string(), None));
    }
}
