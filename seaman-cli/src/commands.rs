//! Command implementations.
//!
//! Every command writes its human-readable result to `out`; diagnostics go
//! through `tracing`.

use std::io::Write;
use std::path::PathBuf;

use seaman_core::{Release, ReleaseName, ReleaseState};
use seaman_executor::{ClusterBackend, DeployOutcome, Manager};

use crate::cli::{Command, ManifestArgs};
use crate::CliError;

/// Build a release from manifest files and directories.
///
/// # Errors
/// Returns [`CliError::Core`] if a path is missing or a manifest is invalid.
pub fn load_release(name: &ReleaseName, paths: &[PathBuf]) -> Result<Release, CliError> {
    let mut release = Release::new(name.clone());
    for path in paths {
        release.ingest_path(path)?;
    }
    tracing::debug!(release = %name, objects = release.objects.len(), "manifests loaded");
    Ok(release)
}

/// `package`: print the release as JSON. Needs no cluster.
///
/// # Errors
/// See [`load_release`]; output failures give [`CliError::Output`].
pub fn package(args: &ManifestArgs, out: &mut impl Write) -> Result<(), CliError> {
    let release = load_release(&args.release, &args.paths)?;
    serde_json::to_writer_pretty(&mut *out, &release)?;
    writeln!(out)?;
    Ok(())
}

/// Run `command` against the cluster behind `manager`.
///
/// # Errors
/// Propagates manifest, cluster and output errors.
pub async fn execute<B: ClusterBackend>(
    manager: &Manager<B>,
    command: &Command,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        Command::Package(args) => package(args, out),

        Command::Plan(args) => {
            let release = load_release(&args.release, &args.paths)?;
            let plan = manager.plan(&release).await?;
            if plan.is_empty() {
                writeln!(out, "release {} is up to date", release.name)?;
            } else {
                write!(out, "{plan}")?;
            }
            Ok(())
        }

        Command::Deploy(args) => {
            let release = load_release(&args.release, &args.paths)?;
            match manager.deploy(&release).await? {
                DeployOutcome::Unchanged { revision } => {
                    writeln!(out, "release {} unchanged at revision {revision}", release.name)?;
                }
                DeployOutcome::Installed { revision, plan } => {
                    writeln!(out, "release {} installed at revision {revision}", release.name)?;
                    write!(out, "{plan}")?;
                }
                DeployOutcome::Upgraded { revision, plan } => {
                    writeln!(out, "release {} upgraded to revision {revision}", release.name)?;
                    write!(out, "{plan}")?;
                }
            }
            Ok(())
        }

        Command::Rollback(args) => {
            let outcome = manager.rollback(&args.release).await?;
            writeln!(
                out,
                "release {} rolled back to the contents of revision {} as revision {}",
                args.release, outcome.restored, outcome.revision
            )?;
            write!(out, "{}", outcome.plan)?;
            Ok(())
        }

        Command::Delete(args) => {
            match manager.delete(&args.release).await? {
                Some(plan) => {
                    writeln!(out, "release {} deleted", args.release)?;
                    write!(out, "{plan}")?;
                }
                None => writeln!(out, "release {} is not deployed", args.release)?,
            }
            Ok(())
        }

        Command::Verify(args) => {
            manager.verify(&args.release).await?;
            writeln!(out, "release {} matches the cluster", args.release)?;
            Ok(())
        }

        Command::Status(args) => {
            match manager.status(&args.release).await? {
                Some(state) => write_status(&args.release, &state, out)?,
                None => writeln!(out, "release {} is not deployed", args.release)?,
            }
            Ok(())
        }
    }
}

fn write_status(
    name: &ReleaseName,
    state: &ReleaseState,
    out: &mut impl Write,
) -> std::io::Result<()> {
    let current = &state.current;
    writeln!(out, "release:  {name}")?;
    writeln!(out, "revision: {}", current.number)?;
    writeln!(out, "deployed: {}", current.deployed_at.to_rfc3339())?;
    writeln!(out, "digest:   {}", current.digest)?;
    writeln!(out, "objects:  {}", current.objects.len())?;
    if !state.history.is_empty() {
        writeln!(out, "history:")?;
        for revision in &state.history {
            writeln!(
                out,
                "  {:>4}  {}  {}",
                revision.number,
                revision.deployed_at.to_rfc3339(),
                revision.digest
            )?;
        }
    }
    Ok(())
}
