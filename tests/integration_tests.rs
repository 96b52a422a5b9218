use ansible_compat::testing::{create_collection, write_file, ScriptedRunner};
use ansible_compat::{
    update_env, CompletedProcess, EnvStore, MemoryEnv, PrepareOptions, Runtime, RuntimeOptions,
};
use anyhow::Result;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_update_env_stacks_path_extra() {
    let mut env = MemoryEnv::new().with_var("PATH_EXTRA", "/usr/bin");

    update_env(&mut env, "PATH_EXTRA", &strings(&["/opt/tools"]), "");
    assert_eq!(env.get("PATH_EXTRA").as_deref(), Some("/opt/tools:/usr/bin"));

    update_env(&mut env, "PATH_EXTRA", &[], "");
    assert_eq!(env.get("PATH_EXTRA").as_deref(), Some("/opt/tools:/usr/bin"));

    update_env(&mut env, "ROLES", &strings(&["a", "b"]), "/etc/ansible/roles");
    assert_eq!(env.get("ROLES").as_deref(), Some("a:b:/etc/ansible/roles"));
}

#[test]
fn test_prepare_isolated_collection_project() -> Result<()> {
    let project = TempDir::new()?;
    let system = TempDir::new()?;
    let system_collections = system.path().to_string_lossy().into_owned();
    create_collection(system.path(), "community", "general", "6.2.0");
    write_file(
        project.path(),
        "galaxy.yml",
        "namespace: acme\nname: demo\nversion: 1.0.0\n",
    );

    let runner = ScriptedRunner::new().with_ansible("2.15.0", &[system_collections.as_str()]);
    runner.respond_with(&["ansible-galaxy", "collection", "build"], |args| {
        // args: ansible-galaxy collection build --output-path <dir> --force <path>
        let output = std::path::Path::new(&args[4]).join("acme-demo-1.0.0.tar.gz");
        std::fs::write(&output, b"").unwrap();
        CompletedProcess {
            args: args.to_vec(),
            returncode: 0,
            stdout: format!("Created collection for acme.demo at {}\n", output.display()),
            stderr: String::new(),
        }
    });
    runner.respond(&["ansible-galaxy", "collection", "install"], 0, "", "");

    let mut runtime = Runtime::with_parts(
        RuntimeOptions {
            project_dir: Some(project.path().to_path_buf()),
            isolated: true,
            ..Default::default()
        },
        Box::new(runner.clone()),
        Box::new(MemoryEnv::new()),
    )?;

    let mut options = PrepareOptions::default();
    options
        .required_collections
        .insert("community.general".to_string(), Some("5.0.0".to_string()));
    runtime.prepare_environment(&options)?;

    let cache_dir = runtime.cache_dir.clone().expect("isolated runtime has a cache");
    assert!(cache_dir.join("collections").is_dir());
    assert!(cache_dir.join("roles").is_dir());

    let collections = runtime.env().get("ANSIBLE_COLLECTIONS_PATH").unwrap_or_default();
    assert!(collections.starts_with(&cache_dir.join("collections").to_string_lossy().into_owned()));
    assert!(collections.ends_with(&system_collections));
    assert_eq!(runner.calls_matching(&["ansible-galaxy", "collection", "build"]).len(), 1);
    let installs = runner.calls_matching(&["ansible-galaxy", "collection", "install"]);
    assert_eq!(installs.len(), 1);
    assert!(installs[0].last().unwrap().ends_with("acme-demo-1.0.0.tar.gz"));

    runtime.clean()?;
    assert!(!cache_dir.exists());
    Ok(())
}

#[test]
fn test_missing_ansible_exit_code() {
    let project = TempDir::new().unwrap();
    let runtime = Runtime::with_parts(
        RuntimeOptions {
            project_dir: Some(project.path().to_path_buf()),
            ..Default::default()
        },
        Box::new(ScriptedRunner::new()),
        Box::new(MemoryEnv::new()),
    )
    .unwrap();

    let err = runtime.version().unwrap_err();
    assert_eq!(err.code(), 4);
    assert_eq!(err.process().map(|p| p.returncode), Some(127));
}
