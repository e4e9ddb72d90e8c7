//! # List Command
//!
//! Managed namespaces with their schedule and subscriber counts.

use crate::{or_dash, print_json, OutputFormat};
use anyhow::{Context, Result};
use kube_esg::controller::actions::NamespaceActions;

pub async fn list_command(actions: &NamespaceActions, output: OutputFormat) -> Result<()> {
    let listing = actions.list().await.context("Failed to list namespaces")?;

    if output == OutputFormat::Json {
        return print_json(&listing);
    }

    if listing.namespaces.is_empty() {
        println!("No managed namespaces found.");
        return Ok(());
    }

    let label_header = listing.target_label_name.as_deref().unwrap_or("LABEL");
    println!(
        "\n{:<30} {:<12} {:<30} {:<26} {:<12} {:<20}",
        "NAME", "SHUTDOWN AT", "SHUTDOWN BY", "LAST SHUTDOWN", "SUBSCRIBERS", label_header
    );
    println!("{}", "-".repeat(134));

    for ns in &listing.namespaces {
        let subscribers = format!("{}/{}", ns.subscriber_count, ns.max_subscribers);
        println!(
            "{:<30} {:<12} {:<30} {:<26} {:<12} {:<20}",
            ns.name,
            or_dash(&ns.shutdown_at),
            or_dash(&ns.shutdown_by),
            or_dash(&ns.shutdown_done),
            subscribers,
            ns.label_value.as_deref().map_or("-", or_dash),
        );
    }

    println!(
        "\n{} namespace(s), shutdown offset {} day(s)",
        listing.namespaces.len(),
        listing.shutdown_days
    );
    Ok(())
}
