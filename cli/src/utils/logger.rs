use tracing::info;
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use super::date::format_duration;

/// Initialize logging for the command line tool.
///
/// `RUST_LOG` wins when set; otherwise only this crate logs at info level.
pub fn init_logger() -> anyhow::Result<()> {
    let timer = ChronoUtc::rfc_3339();

    let format_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .with_timer(timer)
        .compact();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ganttlab=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(format_layer)
        .try_init()?;

    Ok(())
}

/// Performance timing helper
pub struct Timer {
    start: std::time::Instant,
    name: String,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        Self {
            start: std::time::Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    pub fn log_elapsed(&self) {
        info!(
            elapsed = %format_duration(self.elapsed_ms()),
            "{} completed",
            self.name
        );
    }
}
