//! # Extend Command

use crate::{print_json, OutputFormat};
use anyhow::{Context, Result};
use chrono::Utc;
use kube_esg::controller::actions::NamespaceActions;

pub async fn extend_command(
    actions: &NamespaceActions,
    name: &str,
    actor: &str,
    output: OutputFormat,
) -> Result<()> {
    let result = actions
        .extend(name, actor, Utc::now())
        .await
        .with_context(|| format!("Failed to extend namespace '{name}'"))?;

    if output == OutputFormat::Json {
        return print_json(&result);
    }

    println!(
        "✅ Namespace '{}' will be shut down after {} (extended by {})",
        result.namespace, result.shutdown_at, result.shutdown_by
    );
    Ok(())
}
