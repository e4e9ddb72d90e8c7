//! # Status Command

use crate::{or_dash, print_json, OutputFormat};
use anyhow::{Context, Result};
use kube_esg::controller::actions::NamespaceActions;

pub async fn status_command(
    actions: &NamespaceActions,
    name: &str,
    output: OutputFormat,
) -> Result<()> {
    let view = actions
        .view(name)
        .await
        .with_context(|| format!("Failed to get namespace '{name}'"))?;

    if output == OutputFormat::Json {
        return print_json(&view);
    }

    println!("📊 Status for namespace '{}'", view.name);
    println!();
    println!("Schedule:");
    println!("  Shutdown At: {}", or_dash(&view.shutdown_at));
    println!("  Shutdown By: {}", or_dash(&view.shutdown_by));
    println!("  Last Shutdown: {}", or_dash(&view.shutdown_done));
    if let Some(label) = &view.label_value {
        println!("  Label Value: {}", or_dash(label));
    }

    println!();
    println!(
        "Subscribers ({}/{}):",
        view.subscriber_count, view.max_subscribers
    );
    if view.subscribers.is_empty() {
        println!("  (none)");
    }
    for subscriber in &view.subscribers {
        println!("  - {subscriber}");
    }
    Ok(())
}
