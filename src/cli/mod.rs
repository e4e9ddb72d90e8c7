//! # esgctl
//!
//! Command-line interface for the kube-esg namespace lifecycle job.
//!
//! ```bash
//! # List managed namespaces and their schedules
//! esgctl list
//!
//! # Show one namespace
//! esgctl status team-a
//!
//! # Push the deadline out by SHUTDOWN_DAYS
//! esgctl extend team-a --actor alice@example.com
//!
//! # Get notified before team-a is deactivated
//! esgctl subscribe team-a --actor alice@example.com
//! esgctl unsubscribe team-a --actor alice@example.com
//!
//! # Run one reconciliation pass from a workstation
//! esgctl run
//! ```
//!
//! Policy (offset, limits, reserved pattern, target label) is read from the
//! same environment variables as the job, so both agree on which namespaces
//! are managed.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kube_esg::config::{ControllerConfig, LifecycleConfig};
use kube_esg::controller::actions::NamespaceActions;
use kube_esg::controller::store::ClusterStore;
use kube_esg::observability::logging::env_filter;
use kube_esg::runtime::initialization::{create_client, create_store, install_crypto_provider};
use std::sync::Arc;

mod extend;
mod list;
mod run;
mod status;
mod subscribe;

#[derive(Parser)]
#[command(name = "esgctl")]
#[command(
    about = "kube-esg namespace lifecycle CLI",
    long_about = None,
    after_help = "\
Examples:
  esgctl list
  esgctl extend team-a --actor alice@example.com
  esgctl subscribe team-a --actor alice@example.com --output json
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Kubeconfig context to use instead of the current one
    #[arg(short, long, global = true)]
    context: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// List managed namespaces
    List,
    /// Show the lifecycle state of a namespace
    Status {
        #[arg(value_name = "NAMESPACE")]
        name: String,
    },
    /// Reset the shutdown deadline to now plus SHUTDOWN_DAYS
    Extend {
        #[arg(value_name = "NAMESPACE")]
        name: String,

        /// Identity recorded as the schedule owner
        #[arg(long, env = "ESG_ACTOR")]
        actor: String,
    },
    /// Subscribe to shutdown notifications
    Subscribe {
        #[arg(value_name = "NAMESPACE")]
        name: String,

        #[arg(long, env = "ESG_ACTOR")]
        actor: String,
    },
    /// Unsubscribe from shutdown notifications
    Unsubscribe {
        #[arg(value_name = "NAMESPACE")]
        name: String,

        #[arg(long, env = "ESG_ACTOR")]
        actor: String,
    },
    /// Run a single reconciliation pass
    Run,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    install_crypto_provider();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter("warn"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let controller_config = ControllerConfig::from_env();
    let lifecycle_config = Arc::new(LifecycleConfig::from_env());
    let client = create_client(cli.context.as_deref())
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;
    let store: Arc<dyn ClusterStore> = create_store(client, &controller_config);

    let actions = NamespaceActions::new(Arc::clone(&store), Arc::clone(&lifecycle_config))
        .context("Invalid RESERVED_NAMESPACE_PATTERN")?;

    match cli.command {
        Commands::List => list::list_command(&actions, cli.output).await,
        Commands::Status { name } => status::status_command(&actions, &name, cli.output).await,
        Commands::Extend { name, actor } => {
            extend::extend_command(&actions, &name, &actor, cli.output).await
        }
        Commands::Subscribe { name, actor } => {
            subscribe::subscribe_command(&actions, &name, &actor, cli.output).await
        }
        Commands::Unsubscribe { name, actor } => {
            subscribe::unsubscribe_command(&actions, &name, &actor, cli.output).await
        }
        Commands::Run => {
            run::run_command(store, lifecycle_config, &controller_config, cli.output).await
        }
    }
}

/// Print `value` as pretty JSON
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

/// Dash for empty cells
pub(crate) fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
