// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use k8s_microservice::config::Config;
use k8s_microservice::engine::MicroserviceReconciler;
use k8s_microservice::kubernetes::create_client;
use k8s_microservice::types::MicroserviceSpec;

/// Reconcile a microservice (Deployment + Service) against a Kubernetes cluster
#[derive(Parser, Debug)]
#[command(name = "k8s-microservice", version, about, long_about = None)]
struct Cli {
    /// Namespace holding the microservice, overrides PROJECT_NAMESPACE
    #[arg(long, short)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the Deployment and Service described by a spec file
    Create {
        #[arg(long, short)]
        file: PathBuf,
    },
    /// Print the current state of a microservice as YAML
    Read { name: String },
    /// Apply a spec file to an existing microservice
    Update {
        name: String,
        #[arg(long, short)]
        file: PathBuf,
    },
    /// Delete a microservice and wait until both objects are gone
    Delete { name: String },
}

fn load_spec(path: &Path) -> Result<MicroserviceSpec> {
    let document = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read spec file {}", path.display()))?;
    Ok(MicroserviceSpec::from_yaml(&document)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(namespace) = cli.namespace {
        config.namespace = namespace;
    }
    info!("Configuration loaded: namespace={}", config.namespace);

    let client = create_client(&config).await?;
    let reconciler = MicroserviceReconciler::new(client, config.lifecycle_settings());
    let namespace = config.namespace.as_str();

    match cli.command {
        Command::Create { file } => {
            let spec = load_spec(&file)?;
            let id = reconciler.create(&spec, namespace).await?;
            println!("{}", id);
        }
        Command::Read { name } => {
            let view = reconciler.read(&name, namespace).await?;
            print!("{}", serde_yaml::to_string(&view)?);
        }
        Command::Update { name, file } => {
            let spec = load_spec(&file)?;
            let view = reconciler.update(&name, namespace, &spec).await?;
            print!("{}", serde_yaml::to_string(&view)?);
        }
        Command::Delete { name } => {
            reconciler.delete(&name, namespace).await?;
            info!("Microservice {}/{} is gone", namespace, name);
        }
    }

    Ok(())
}
