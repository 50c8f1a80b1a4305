//! Integration tests: CLI commands driven against the in-memory cluster.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use seaman_cli::{commands, Cli, CliError};
use seaman_executor::{ExecutorError, Manager, ManagerConfig, MemoryBackend};

const SETTINGS: &str = "\
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
data:
  mode: blue
";

const WORKER: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: worker
spec:
  replicas: 1
";

fn write_manifests(dir: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create manifest dir");
        }
        fs::write(path, content).expect("write manifest");
    }
}

fn manager() -> Manager<MemoryBackend> {
    Manager::new(MemoryBackend::new(), ManagerConfig::default())
}

async fn run(manager: &Manager<MemoryBackend>, args: &[&str]) -> Result<String, CliError> {
    let cli = Cli::try_parse_from(std::iter::once("able-seaman").chain(args.iter().copied()))
        .expect("arguments parse");
    let mut out = Vec::new();
    commands::execute(manager, &cli.command, &mut out).await?;
    Ok(String::from_utf8(out).expect("utf-8 output"))
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[tokio::test]
async fn package_prints_release_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_manifests(dir.path(), &[("settings.yaml", SETTINGS)]);
    let path = path_arg(dir.path());

    let output = run(&manager(), &["package", "web", &path]).await.expect("package");
    let value: serde_json::Value = serde_json::from_str(&output).expect("valid JSON");
    assert_eq!(value["name"], "web");
    assert_eq!(value["objects"][0]["metadata"]["name"], "settings");
}

#[tokio::test]
async fn deploy_walks_directories_and_reports_steps() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_manifests(
        dir.path(),
        &[("base/settings.yaml", SETTINGS), ("apps/worker.yaml", WORKER)],
    );
    let manager = manager();
    let path = path_arg(dir.path());

    let output = run(&manager, &["deploy", "web", &path]).await.expect("deploy");
    assert_eq!(
        output,
        "release web installed at revision 1\n\
         + ConfigMap/v1/settings\n\
         + Deployment.apps/v1/worker\n"
    );

    let output = run(&manager, &["deploy", "web", &path]).await.expect("redeploy");
    assert_eq!(output, "release web unchanged at revision 1\n");
}

#[tokio::test]
async fn plan_then_upgrade_then_rollback() {
    let dir = tempfile::tempdir().expect("tempdir");
    let v1 = dir.path().join("v1.yaml");
    let v2 = dir.path().join("v2.yaml");
    fs::write(&v1, SETTINGS).expect("write v1");
    let upgraded = format!("{}---\n{WORKER}", SETTINGS.replace("blue", "green"));
    fs::write(&v2, upgraded).expect("write v2");
    let manager = manager();

    run(&manager, &["deploy", "web", &path_arg(&v1)]).await.expect("install");

    let plan = run(&manager, &["plan", "web", &path_arg(&v2)]).await.expect("plan");
    assert_eq!(plan, "+ Deployment.apps/v1/worker\n~ ConfigMap/v1/settings\n");

    let upgrade = run(&manager, &["deploy", "web", &path_arg(&v2)]).await.expect("upgrade");
    assert!(upgrade.starts_with("release web upgraded to revision 2\n"), "{upgrade}");

    let rollback = run(&manager, &["rollback", "web"]).await.expect("rollback");
    let expected = "release web rolled back to the contents of revision 1 as revision 3\n";
    assert!(rollback.starts_with(expected), "{rollback}");
    assert!(rollback.contains("- Deployment.apps/v1/worker"), "{rollback}");

    let status = run(&manager, &["status", "web"]).await.expect("status");
    assert!(status.contains("revision: 3"), "{status}");
    assert!(status.contains("history:"), "{status}");
}

#[tokio::test]
async fn plan_for_unchanged_release_says_up_to_date() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_manifests(dir.path(), &[("settings.yaml", SETTINGS)]);
    let manager = manager();
    let path = path_arg(dir.path());

    run(&manager, &["deploy", "web", &path]).await.expect("install");
    let output = run(&manager, &["plan", "web", &path]).await.expect("plan");
    assert_eq!(output, "release web is up to date\n");
}

#[tokio::test]
async fn verify_and_delete_report_results() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_manifests(dir.path(), &[("settings.yaml", SETTINGS)]);
    let manager = manager();

    run(&manager, &["deploy", "web", &path_arg(dir.path())]).await.expect("install");

    let verified = run(&manager, &["verify", "web"]).await.expect("verify");
    assert_eq!(verified, "release web matches the cluster\n");

    let deleted = run(&manager, &["delete", "web"]).await.expect("delete");
    assert_eq!(deleted, "release web deleted\n- ConfigMap/v1/settings\n");

    let status = run(&manager, &["status", "web"]).await.expect("status");
    assert_eq!(status, "release web is not deployed\n");
}

#[tokio::test]
async fn verify_of_unknown_release_fails() {
    let result = run(&manager(), &["verify", "web"]).await;
    assert!(
        matches!(result, Err(CliError::Executor(ExecutorError::NoDeployedRelease(_)))),
        "got {result:?}"
    );
}

#[tokio::test]
async fn missing_manifest_path_fails() {
    let missing = PathBuf::from("/nonexistent/seaman/manifests");
    let result = run(&manager(), &["deploy", "web", &path_arg(&missing)]).await;
    assert!(matches!(result, Err(CliError::Core(_))), "got {result:?}");
}
