//! Log sink setup.
//!
//! Logs go to `MicSwitcher.log` next to the executable, truncated at each
//! start; stderr is used when that file cannot be created.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE: &str = "MicSwitcher.log";
const DEFAULT_FILTER: &str = "mic_switcher_rs=info";

static INIT: Once = Once::new();

/// Path of the log file beside the running executable.
pub fn log_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(LOG_FILE))
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `default_filter` (or `mic_switcher_rs=info`).
/// Only the first call does anything, so the log file is truncated once per
/// process. Nothing is installed when the host already set a subscriber.
pub fn init(default_filter: Option<&str>) {
    init_with(log_path().as_deref(), default_filter);
}

fn init_with(path: Option<&Path>, default_filter: Option<&str>) {
    INIT.call_once(|| {
        if tracing::dispatcher::has_been_set() {
            return;
        }
        install(path, default_filter);
    });
}

fn install(path: Option<&Path>, default_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.unwrap_or(DEFAULT_FILTER).into());

    let file = path.and_then(|path| open_log(path).ok());
    let result = match file {
        Some(file) => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .try_init(),
        None => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    if result.is_ok() {
        tracing::info!("MicSwitcher v{}", env!("CARGO_PKG_VERSION"));
    }
}

fn open_log(path: &Path) -> std::io::Result<File> {
    let mut file = File::create(path)?;
    writeln!(file, "=== MicSwitcher log ===")?;
    Ok(file)
}
