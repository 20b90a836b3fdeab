//! Model listing functionality
//!
//! Lists the configured catalog, or the models a provider offers remotely.

use crate::api::models::fetch_models;
use crate::core::app::App;
use crate::core::providers::Provider;
use chrono::{DateTime, Utc};
use std::error::Error;

pub fn list_catalog(app: &App) {
    let catalog = app.catalog();
    if catalog.is_empty() {
        println!("No models configured. Add one with 'confab add-model <provider> <model>'.");
        if let Some(selected) = app.selected_model() {
            println!("Selected (no API key): {selected}");
        }
        return;
    }

    for entry in catalog {
        let marker = if app.selected_model() == Some(entry.id.as_str()) {
            "*"
        } else {
            " "
        };
        if entry.display_name == entry.id {
            println!("{marker} {} ({})", entry.id, entry.provider.display_name());
        } else {
            println!(
                "{marker} {} - {} ({})",
                entry.id,
                entry.display_name,
                entry.provider.display_name()
            );
        }
    }
}

pub async fn list_remote_models(
    app: &App,
    provider: Provider,
    key: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let secret = match key {
        Some(key) => key.to_string(),
        None => app
            .registry()
            .credentials()
            .values()
            .find(|credential| credential.provider == provider)
            .map(|credential| credential.secret.clone())
            .ok_or_else(|| {
                format!(
                    "No {} API key stored. Pass --key or add a model for this provider first.",
                    provider.display_name()
                )
            })?,
    };

    let dispatcher = app.dispatcher();
    let models = fetch_models(
        dispatcher.client(),
        provider,
        &secret,
        dispatcher.base_url(provider),
    )
    .await?;

    println!("🤖 Available Models for {}", provider.display_name());
    println!();
    if models.is_empty() {
        println!("No models found for this provider.");
        return Ok(());
    }

    for model in models {
        let configured = if app.registry().contains(&model.id) {
            " (configured)"
        } else {
            ""
        };
        println!("  • {}{configured}", model.id);
        if let Some(display_name) = &model.display_name {
            if !display_name.is_empty() && display_name != &model.id {
                println!("    Name: {display_name}");
            }
        }
        if let Some(owned_by) = &model.owned_by {
            if !owned_by.is_empty() && owned_by != "system" {
                println!("    Owner: {owned_by}");
            }
        }
        if let Some(created) = model.created.filter(|created| *created > 0) {
            // Some APIs return milliseconds, others seconds
            let timestamp_secs = if created > 10_000_000_000 {
                created / 1000
            } else {
                created
            };
            if let Some(dt) = DateTime::<Utc>::from_timestamp(timestamp_secs as i64, 0) {
                println!("    Created: {}", dt.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        } else if let Some(created_at) = model.created_at.as_deref().filter(|s| !s.is_empty()) {
            println!("    Created: {created_at}");
        }
    }
    Ok(())
}
