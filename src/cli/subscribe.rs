//! # Subscribe Commands
//!
//! Add or remove the caller from a namespace's notification list.

use crate::{print_json, OutputFormat};
use anyhow::{Context, Result};
use kube_esg::controller::actions::{NamespaceActions, SubscriptionResult};

pub async fn subscribe_command(
    actions: &NamespaceActions,
    name: &str,
    actor: &str,
    output: OutputFormat,
) -> Result<()> {
    let result = actions
        .subscribe(name, actor)
        .await
        .with_context(|| format!("Failed to subscribe to namespace '{name}'"))?;
    print_result("Subscribed to", &result, output)
}

pub async fn unsubscribe_command(
    actions: &NamespaceActions,
    name: &str,
    actor: &str,
    output: OutputFormat,
) -> Result<()> {
    let result = actions
        .unsubscribe(name, actor)
        .await
        .with_context(|| format!("Failed to unsubscribe from namespace '{name}'"))?;
    print_result("Unsubscribed from", &result, output)
}

fn print_result(verb: &str, result: &SubscriptionResult, output: OutputFormat) -> Result<()> {
    if output == OutputFormat::Json {
        return print_json(result);
    }
    println!(
        "✅ {verb} namespace '{}' ({}/{} subscribers)",
        result.namespace, result.count, result.max_allowed
    );
    Ok(())
}
