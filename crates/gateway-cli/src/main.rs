use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gateway_admission::validate_request;
use gateway_config::ConfigCatalog;
use gateway_repo_cache::RepoConfigCache;
use gateway_resolver::resolve;
use gateway_types::refs::{GitRefs, Pull};
use gateway_types::request::{ExecutionType, JobExecutionRequest, PodSpecOptions};

#[derive(Parser, Debug)]
#[command(name = "gateway-cli", version)]
#[command(about = "Offline diagnostics for the job execution gateway's config and resolution pipeline")]
struct Cli {
    /// Path to the gateway YAML configuration file.
    #[arg(long, default_value = "gateway.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the config file and report how many job definitions it carries.
    Validate,
    /// Run validateRequest + resolve against the loaded config, without
    /// creating anything — useful for checking a job-name/branch match
    /// before wiring up a real trigger surface.
    Resolve {
        /// Name of the job to resolve.
        job_name: String,
        /// Which execution type to resolve as.
        #[arg(long, value_enum, default_value = "periodic")]
        execution_type: CliExecutionType,
        /// org/repo, required for presubmit/postsubmit.
        #[arg(long)]
        org: Option<String>,
        #[arg(long)]
        repo: Option<String>,
        #[arg(long, default_value = "main")]
        base_ref: String,
        #[arg(long, default_value = "0000000000000000000000000000000000000000")]
        base_sha: String,
        /// Pull-request head SHA; presubmit requires at least one.
        #[arg(long)]
        pull_sha: Option<String>,
    },
    /// Print config path and environment diagnostics.
    Doctor,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum CliExecutionType {
    Periodic,
    Presubmit,
    Postsubmit,
}

impl From<CliExecutionType> for ExecutionType {
    fn from(value: CliExecutionType) -> Self {
        match value {
            CliExecutionType::Periodic => ExecutionType::Periodic,
            CliExecutionType::Presubmit => ExecutionType::Presubmit,
            CliExecutionType::Postsubmit => ExecutionType::Postsubmit,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = gateway_config::load_from_file(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let catalog = ConfigCatalog::new(config);

    match cli.cmd {
        Commands::Validate => run_validate(&catalog),
        Commands::Resolve {
            job_name,
            execution_type,
            org,
            repo,
            base_ref,
            base_sha,
            pull_sha,
        } => run_resolve(
            &catalog,
            job_name,
            execution_type.into(),
            org,
            repo,
            base_ref,
            base_sha,
            pull_sha,
        ),
        Commands::Doctor => run_doctor(&cli.config),
    }
}

fn run_validate(catalog: &ConfigCatalog) -> Result<()> {
    let snapshot = catalog.snapshot();
    println!("periodics: {}", catalog.all_periodics().len());
    println!("presubmit repos: {}", snapshot.presubmits.len());
    println!("postsubmit repos: {}", snapshot.postsubmits.len());
    println!("allowed clients: {}", snapshot.allowed_clients.len());
    println!("allowed clusters: {:?}", catalog.allowed_clusters());
    println!("pubsub triggers: {}", catalog.pubsub_triggers().len());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_resolve(
    catalog: &ConfigCatalog,
    job_name: String,
    execution_type: ExecutionType,
    org: Option<String>,
    repo: Option<String>,
    base_ref: String,
    base_sha: String,
    pull_sha: Option<String>,
) -> Result<()> {
    let refs = match execution_type {
        ExecutionType::Periodic => None,
        ExecutionType::Presubmit | ExecutionType::Postsubmit => {
            let org = org.context("--org is required for presubmit/postsubmit")?;
            let repo = repo.context("--repo is required for presubmit/postsubmit")?;
            let pulls = match pull_sha {
                Some(sha) => vec![Pull {
                    number: 1,
                    author: String::new(),
                    sha,
                    title: String::new(),
                    link: String::new(),
                }],
                None => vec![],
            };
            Some(GitRefs {
                org,
                repo,
                base_ref,
                base_sha,
                clone_uri: None,
                pulls,
            })
        }
    };

    let request = JobExecutionRequest {
        job_name,
        execution_type,
        refs,
        pod_spec_options: PodSpecOptions::default(),
    };

    validate_request(&request).context("request failed validation")?;
    if execution_type == ExecutionType::Presubmit {
        request
            .validate_presubmit_has_pull()
            .context("presubmit requests require at least one pull")?;
    }

    // No RepoConfigCache wired here: this command resolves against the
    // static catalog only, matching the fallback path `resolve` takes when
    // the in-repo config fetcher is absent.
    let cache: Option<&RepoConfigCache> = None;
    let resolved = resolve(catalog, cache, &request).context("resolve failed")?;

    println!("{}", serde_json::to_string_pretty(&resolved.spec)?);
    Ok(())
}

fn run_doctor(config_path: &PathBuf) -> Result<()> {
    println!("config: {}", config_path.display());
    print_cmd_version("rustc");
    Ok(())
}

fn print_cmd_version(cmd: &str) {
    match Command::new(cmd).arg("--version").output() {
        Ok(out) if out.status.success() => {
            let version = String::from_utf8_lossy(&out.stdout).trim().to_string();
            println!("{cmd}: {version}");
        }
        Ok(out) => {
            tracing::warn!(
                cmd,
                stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                "--version failed"
            );
        }
        Err(e) => {
            tracing::warn!(cmd, error = %e, "unable to run --version");
        }
    }
}
