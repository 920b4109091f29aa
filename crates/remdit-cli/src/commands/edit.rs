//! Share a file and keep it in sync

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use remdit_core::{Config, HttpNegotiator, SyncEngine, TransportKind, WebSocketTransport};

use crate::output::Output;

/// Upload `file`, print its edit URL, then sync saves until the session ends
pub async fn run(file: &Path, config: &Config, output: &Output) -> Result<()> {
    let file_path = resolve_file(file)?;

    // Only the WebSocket transport has a network backend in this binary
    let server = config.select_server(&[TransportKind::WebSocket])?;
    debug!("Using server {}", server.addr);

    let session = HttpNegotiator::new(server.clone())
        .create_session(&file_path)
        .await?;
    debug!("Session {} created", session.id);

    let transport = WebSocketTransport::connect(&session).await?;
    output.print_session(&session);

    let mut engine = SyncEngine::new(transport, &session.file_path);
    let outcome = engine
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    if let Err(e) = engine.close(&outcome).await {
        debug!("Error closing session: {}", e);
    }

    let stats = engine.stats();
    debug!(
        "Session ended: {} saves applied, {} failed, {} messages discarded",
        stats.saves_applied, stats.saves_failed, stats.messages_discarded
    );

    outcome.context("Session ended with an error")?;
    output.message("Session closed.");
    Ok(())
}

/// Check the file is a regular file and make its path absolute
pub fn resolve_file(file: &Path) -> Result<PathBuf> {
    let metadata = std::fs::metadata(file)
        .with_context(|| format!("File '{}' does not exist", file.display()))?;
    if metadata.is_dir() {
        bail!("'{}' is a directory, not a file", file.display());
    }

    std::path::absolute(file)
        .with_context(|| format!("Failed to resolve path '{}'", file.display()))
}
