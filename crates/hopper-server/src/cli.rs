/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Command line interface for `hopper-server`.

use std::future::IntoFuture;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hopper::{Database, DAL};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::{generate_default_config_toml, ConfigLoader, HopperConfig, Validate};
use crate::telemetry;
use crate::AppState;

#[derive(Debug, Parser)]
#[command(name = "hopper-server", version, about = "Multi-tenant job queue server")]
pub struct Cli {
    /// Configuration file (defaults to $HOPPER_CONFIG or the search path)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database URL, overriding the configuration file
    #[arg(long, global = true, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to bind
        #[arg(long, env = "HOPPER_BIND")]
        bind: Option<String>,

        /// Port to listen on
        #[arg(short, long, env = "HOPPER_PORT")]
        port: Option<u16>,
    },

    /// Apply pending database migrations and exit
    Migrate,

    /// Inspect or generate configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a default configuration file
    Generate {
        /// Output path; prints to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Load and validate the configuration
    Validate,

    /// Print the effective configuration with tokens redacted
    Show,
}

impl Cli {
    /// Loads the configuration and applies command line overrides.
    pub fn load_config(&self) -> Result<HopperConfig> {
        let mut config = ConfigLoader::new()
            .load_or_default(self.config.as_deref())
            .context("Failed to load configuration")?;

        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
        if let Commands::Serve { bind, port } = &self.command {
            if let Some(bind) = bind {
                config.server.bind_address = bind.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Serve { .. } => serve(cli.load_config()?, cli.verbose).await,
        Commands::Migrate => {
            let config = cli.load_config()?;
            let _guard = telemetry::init_tracing(&config.logging, cli.verbose)?;
            connect(&config).await.map(|_| ())
        }
        Commands::Config(command) => run_config_command(&cli, command),
    }
}

/// Opens the database and brings its schema up to date.
async fn connect(config: &HopperConfig) -> Result<Database> {
    let db = Database::new_with_schema(
        &config.database.url,
        config.database.pool_size,
        config.database.schema.as_deref(),
    )
    .context("Failed to configure database")?;

    db.run_migrations()
        .await
        .context("Failed to run database migrations")?;

    info!(
        backend = db.backend().name(),
        schema = ?db.schema(),
        "Database ready"
    );
    Ok(db)
}

async fn serve(config: HopperConfig, verbose: bool) -> Result<()> {
    let _guard = telemetry::init_tracing(&config.logging, verbose)?;
    let metrics = telemetry::install_metrics_recorder()?;

    let db = connect(&config).await?;
    let app = AppState::new(DAL::new(db), &config)
        .with_metrics(metrics)
        .into_router();

    let address = config.listen_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Hopper listening on {}", address);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = stop_rx.await;
        })
        .into_future();
    let mut server = tokio::spawn(server);

    tokio::select! {
        result = &mut server => {
            return result.context("Server task panicked")?.context("Server error");
        }
        _ = shutdown_signal() => {}
    }

    info!("Shutdown requested, draining connections");
    let _ = stop_tx.send(());

    let timeout = Duration::from_secs(config.server.graceful_shutdown_timeout_secs);
    match tokio::time::timeout(timeout, server).await {
        Ok(result) => result.context("Server task panicked")?.context("Server error")?,
        Err(_) => warn!(
            "Connections still open after {}s; exiting anyway",
            timeout.as_secs()
        ),
    }

    info!("Hopper stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn run_config_command(cli: &Cli, command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Generate { output, force } => {
            let content = generate_default_config_toml()
                .context("Failed to render default configuration")?;
            match output {
                Some(path) => write_config(path, &content, *force),
                None => {
                    print!("{}", content);
                    Ok(())
                }
            }
        }
        ConfigCommands::Validate => {
            cli.load_config()?;
            println!("Configuration is valid");
            Ok(())
        }
        ConfigCommands::Show => {
            let mut config = cli.load_config()?;
            config.auth.producer_token = "<redacted>".to_string();
            config.auth.worker_token = "<redacted>".to_string();
            print!(
                "{}",
                toml::to_string_pretty(&config).context("Failed to render configuration")?
            );
            Ok(())
        }
    }
}

fn write_config(path: &Path, content: &str, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
