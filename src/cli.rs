use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use crate::config::{Config, Credentials};
use crate::gocd::GoCdClient;
use crate::handlers::{HandlerRegistry, PipelineCreateHandler, RunContext};
use crate::manifest::Manifest;

#[derive(Parser)]
#[command(name = "pipewright")]
#[command(author, version, about = "Declarative GoCD pipeline reconciler", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a pipewright config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the platform toward the state described by a manifest
    Apply {
        /// Manifest file describing the desired state
        #[arg(short, long, default_value = "serve.yml")]
        manifest: PathBuf,

        /// GoCD server base URL (overrides config)
        #[arg(short, long, env = "GOCD_SERVER")]
        server: Option<String>,

        /// Credentials file path (overrides config)
        #[arg(long)]
        credentials: Option<PathBuf>,

        /// Current source-control branch, checked against each section's
        /// allow-list
        #[arg(short, long)]
        branch: Option<String>,

        /// Delete the managed resources instead of asserting them
        #[arg(long, default_value_t = false)]
        purge: bool,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Apply {
                manifest,
                server,
                credentials,
                branch,
                purge,
            } => {
                self.execute_apply(
                    manifest,
                    server.as_deref(),
                    credentials.as_deref(),
                    branch.as_deref(),
                    *purge,
                )
                .await
            }
        }
    }

    async fn execute_apply(
        &self,
        manifest_path: &std::path::Path,
        server: Option<&str>,
        credentials_path: Option<&std::path::Path>,
        branch: Option<&str>,
        purge: bool,
    ) -> Result<()> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(server) = server {
            config.server.base_url = server.to_string();
        }
        if let Some(path) = credentials_path {
            config.server.credentials_file = path.to_path_buf();
        }

        info!("reconciling manifest {} against {}", manifest_path.display(), config.server.base_url);

        let credentials = Credentials::load(&config.server.credentials_file)?;
        let client = GoCdClient::new(
            &config.server.base_url,
            credentials,
            config.server.insecure_skip_verify,
        )?;

        let mut manifest = Manifest::load(manifest_path)?;
        if let Some(branch) = branch {
            manifest.overlay_args([("branch", branch)]);
        }

        let registry = HandlerRegistry::new()
            .register("gocd.pipeline.create", PipelineCreateHandler::new(client));

        let ctx = RunContext {
            branch: branch.map(str::to_string),
            purge,
        };
        let ran = registry.run_all(&manifest, &ctx).await?;
        info!("{ran} manifest section(s) reconciled");

        Ok(())
    }
}
