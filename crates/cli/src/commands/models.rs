//! `recurchat models`: List configured backends.

use std::collections::BTreeMap;
use recurchat_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let registry = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || recurchat_backends::build_from_config(&config)).await?
    };

    println!("Configured backends");
    println!("===================");

    if config.backends.is_empty() {
        println!("  (none) — add a [backends.<id>] table to config.toml");
        return Ok(());
    }

    let failures: BTreeMap<&str, &str> = registry.failures().collect();
    let health: BTreeMap<String, _> = registry.health_report().await.into_iter().collect();

    for (model, backend) in &config.backends {
        let marker = if model == &config.default_model { "*" } else { " " };
        let kind = backend.kind();
        match (failures.get(model.as_str()), health.get(model)) {
            (Some(reason), _) => {
                println!("  {marker} {model:<24} {kind:<14} ❌ unavailable");
                println!("      {reason}");
            }
            (None, Some(Ok(true))) => println!("  {marker} {model:<24} {kind:<14} ✅ ready"),
            (None, Some(Ok(false))) => {
                println!("  {marker} {model:<24} {kind:<14} ⚠️  loaded, health check failed")
            }
            (None, Some(Err(e))) => {
                println!("  {marker} {model:<24} {kind:<14} ⚠️  loaded, unreachable");
                println!("      {e}");
            }
            (None, None) => println!("  {marker} {model:<24} {kind:<14} ❓ unknown"),
        }
    }

    if !config.backends.contains_key(&config.default_model) {
        println!(
            "\n  ⚠️  default_model '{}' has no backend entry",
            config.default_model
        );
    }

    Ok(())
}
