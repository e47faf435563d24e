//! `recurchat retrieve`: Print the context snippet for a query.

use std::path::PathBuf;
use recurchat_config::AppConfig;
use recurchat_session::ContextRetriever;

pub async fn run(
    document: PathBuf,
    window: Option<usize>,
    query: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let window = match window {
        Some(w) => w,
        None => AppConfig::load()
            .map_err(|e| format!("Failed to load config: {e}"))?
            .context
            .window,
    };

    let snippet = ContextRetriever::new(window).retrieve(&document, &query);
    if snippet.is_empty() {
        eprintln!("  No matching lines in {}", document.display());
    } else {
        println!("{snippet}");
    }

    Ok(())
}
