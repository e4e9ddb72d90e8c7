//! # Initialization
//!
//! Startup for the job binary: rustls crypto provider, tracing, metrics
//! registration, Kubernetes client and the reconciler.

use crate::config::{ControllerConfig, LifecycleConfig};
use crate::controller::reconciler::Reconciler;
use crate::controller::store::{ClusterStore, KubeStore};
use crate::observability;
use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::sync::Arc;
use tracing::{debug, info};

pub struct InitializationResult {
    pub controller_config: ControllerConfig,
    pub lifecycle_config: Arc<LifecycleConfig>,
    pub reconciler: Arc<Reconciler>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("controller_config", &self.controller_config)
            .field("lifecycle_config", &self.lifecycle_config)
            .finish_non_exhaustive()
    }
}

/// Install ring as the process-wide rustls provider.
/// Must run before the first TLS connection.
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }
}

/// Client for the in-cluster service account, or the given kubeconfig context
///
/// # Errors
///
/// Returns an error if no usable configuration is found.
pub async fn create_client(context: Option<&str>) -> Result<Client> {
    let Some(context) = context else {
        return Client::try_default()
            .await
            .context("Failed to create Kubernetes client");
    };

    let kubeconfig = Kubeconfig::read().context("Failed to read kubeconfig")?;
    let options = KubeConfigOptions {
        context: Some(context.to_string()),
        ..KubeConfigOptions::default()
    };
    let config = Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .with_context(|| format!("Failed to load kubeconfig context '{context}'"))?;
    Client::try_from(config).context("Failed to create Kubernetes client")
}

/// Store over the live cluster with the configured per-call timeout
#[must_use]
pub fn create_store(client: Client, config: &ControllerConfig) -> Arc<dyn ClusterStore> {
    Arc::new(KubeStore::new(client, config.request_timeout_duration()))
}

/// Initialize the job runtime
///
/// # Errors
///
/// Returns an error if logging, metrics, the Kubernetes client or the
/// namespace filter cannot be set up.
pub async fn initialize() -> Result<InitializationResult> {
    install_crypto_provider();

    let controller_config = ControllerConfig::from_env();
    observability::init_tracing(&controller_config)?;

    info!("Starting kube-esg namespace lifecycle job");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    if controller_config.enable_metrics {
        observability::metrics::register_metrics()?;
    }

    let lifecycle_config = Arc::new(LifecycleConfig::from_env());
    info!(
        shutdown_days = lifecycle_config.shutdown_days,
        reserved_pattern = %lifecycle_config.reserved_namespace_pattern,
        own_namespace = lifecycle_config.own_namespace.as_deref().unwrap_or("<unset>"),
        target_label = lifecycle_config.target_label_name.as_deref().unwrap_or("<unset>"),
        actor = %lifecycle_config.system_actor,
        "Lifecycle configuration loaded"
    );

    let client = create_client(None).await?;
    let store = create_store(client, &controller_config);
    let reconciler = Reconciler::new(store, Arc::clone(&lifecycle_config))
        .context("Invalid RESERVED_NAMESPACE_PATTERN")?
        .with_concurrency(controller_config.max_concurrent_namespaces);

    Ok(InitializationResult {
        controller_config,
        lifecycle_config,
        reconciler: Arc::new(reconciler),
    })
}
