//! Wires storage, the upload service and the server together.

use std::sync::Arc;
use std::time::Duration;

use stowage_server::UploadServer;
use stowage_storage::{FsObjectStore, MemoryFileRecords};
use stowage_upload::UploadService;

use crate::config::Config;

/// Runs the server until ctrl-c.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(
        FsObjectStore::new(&config.storage.root, &config.storage.bucket)
            .with_min_part_size(config.storage.min_part_size),
    );
    tracing::info!(
        root = %config.storage.root.display(),
        bucket = %config.storage.bucket,
        "filesystem object store ready"
    );

    let records = Arc::new(MemoryFileRecords::new());
    let service = Arc::new(UploadService::new(config.upload_config(), store, records));

    let server = UploadServer::new(config.server_config(), service);
    let server_run = Arc::clone(&server);
    let mut server_task = tokio::spawn(async move { server_run.run().await });

    // Wait for the server to bind.
    let port = loop {
        if server_task.is_finished() {
            break 0;
        }
        let p = server.port().await;
        if p > 0 {
            break p;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    if port > 0 {
        tracing::info!(port, path = %config.server.path, "stowage ready");
    }

    let finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => None,
        result = &mut server_task => Some(result),
    };
    let result = match finished {
        Some(result) => result,
        None => {
            tracing::info!("SIGINT received, shutting down");
            server.shutdown();
            server_task.await
        }
    };
    result??;

    Ok(())
}
