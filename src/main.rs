use ansible_compat::cli::{self, parse_requirement};
use ansible_compat::{AnsibleCompatError, PrepareOptions, Runtime, RuntimeOptions};

use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use env_logger::Builder;
use log::{debug, LevelFilter};
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() {
    let matches = cli::build_cli().get_matches();

    let log_level = match matches.subcommand() {
        Some((_, sub_matches)) => match sub_matches.get_count("verbose") {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        },
        _ => LevelFilter::Warn,
    };

    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .filter_level(log_level)
        .init();

    if let Err(e) = run(&matches) {
        eprintln!("{} {:#}", "ERROR:".red().bold(), e);
        let code = e
            .downcast_ref::<AnsibleCompatError>()
            .map_or(1, AnsibleCompatError::code);
        std::process::exit(code);
    }
}

fn runtime_from(sub_matches: &ArgMatches) -> Result<Runtime> {
    let options = RuntimeOptions {
        project_dir: sub_matches.get_one::<String>("project-dir").map(PathBuf::from),
        isolated: sub_matches.get_flag("isolated"),
        ..Default::default()
    };
    debug!("Creating runtime with {:?}", options);
    Ok(Runtime::new(options)?)
}

fn run(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("version", sub_matches)) => {
            let runtime = runtime_from(sub_matches)?;
            println!("{}", runtime.version()?);
        }
        Some(("prepare", sub_matches)) => {
            let mut runtime = runtime_from(sub_matches)?;
            let options = PrepareOptions {
                required_collections: sub_matches
                    .get_many::<String>("require")
                    .into_iter()
                    .flatten()
                    .map(|s| parse_requirement(s))
                    .collect(),
                retry: sub_matches.get_flag("retry"),
                install_local: !sub_matches.get_flag("no-install-local"),
                offline: sub_matches.get_flag("offline"),
                ..Default::default()
            };
            runtime
                .prepare_environment(&options)
                .context("Failed to prepare environment")?;
            println!(
                "{} Ansible {} ready for {}",
                "OK".green().bold(),
                runtime.version()?,
                runtime.project_dir.display()
            );
        }
        Some(("install-collection", sub_matches)) => {
            let runtime = runtime_from(sub_matches)?;
            let name = sub_matches
                .get_one::<String>("name")
                .context("missing collection name")?;
            let dest = sub_matches.get_one::<String>("dest").map(Path::new);
            runtime.install_collection(name, dest, sub_matches.get_flag("force"))?;
            println!("{} Installed {}", "OK".green().bold(), name);
        }
        Some(("install-requirements", sub_matches)) => {
            let runtime = runtime_from(sub_matches)?;
            let file = sub_matches
                .get_one::<String>("file")
                .context("missing requirements file")?;
            runtime.install_requirements(
                Path::new(file),
                sub_matches.get_flag("retry"),
                sub_matches.get_flag("offline"),
            )?;
            println!("{} Installed requirements from {}", "OK".green().bold(), file);
        }
        Some(("require-collection", sub_matches)) => {
            let runtime = runtime_from(sub_matches)?;
            let name = sub_matches
                .get_one::<String>("name")
                .context("missing collection name")?;
            let min_version = sub_matches.get_one::<String>("min-version").map(String::as_str);
            let (version, path) =
                runtime.require_collection(name, min_version, sub_matches.get_flag("install"))?;
            match version {
                Some(version) => println!("{} {} {} at {}", "OK".green().bold(), name, version, path.display()),
                None => println!("{} {} at {}", "OK".green().bold(), name, path.display()),
            }
        }
        _ => unreachable!("subcommand_required is set"),
    }
    Ok(())
}
