use crate::config::AppConfig;
use crate::data_structures::{evict_expired, SharedUploads};
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Evict expired uploads forever, once per cleanup interval.
#[instrument(skip(uploads, config), fields(ttl = ?config.upload_ttl, interval = ?config.cleanup_interval))]
pub async fn run(uploads: SharedUploads, config: AppConfig) {
    info!("Starting upload cleanup worker");
    let mut iteration_count: u64 = 0;

    loop {
        tokio::time::sleep(config.cleanup_interval).await;
        iteration_count += 1;

        let removed = sweep(&uploads, &config).await;
        if removed > 0 {
            info!(iteration = iteration_count, removed, "Evicted expired uploads");
        } else {
            debug!(iteration = iteration_count, "No expired uploads");
        }
    }
}

async fn sweep(uploads: &SharedUploads, config: &AppConfig) -> usize {
    let mut store = uploads.lock().await;
    evict_expired(&mut store, config.upload_ttl, Instant::now())
}
