use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "CHRONOS_AGENDA_LOG";
const LOG_FILE: &str = "chronos_agenda.log";

/// Filter directive: `CHRONOS_AGENDA_LOG`, then `RUST_LOG`, then the configured level.
pub fn filter_directive(configured: &str) -> String {
    pick_directive([env::var(LOG_ENV).ok(), env::var("RUST_LOG").ok()], configured)
}

/// First non-blank override wins, else `configured`.
fn pick_directive(overrides: impl IntoIterator<Item = Option<String>>, configured: &str) -> String {
    overrides
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| configured.to_string())
}

/// Sends tracing output to a file in the state dir; the dashboard owns the terminal.
pub fn init_logging(state_dir: &Path, configured: &str) -> Result<PathBuf, Box<dyn std::error::Error + Send + Sync>> {
    fs::create_dir_all(state_dir)?;
    let path = state_dir.join(LOG_FILE);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let filter = EnvFilter::try_new(filter_directive(configured)).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
        .try_init()?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::pick_directive;

    fn set(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn configured_level_used_without_overrides() {
        assert_eq!(pick_directive([None, None], "info"), "info");
        assert_eq!(pick_directive([set("  "), set("")], "info"), "info");
    }

    #[test]
    fn app_variable_beats_rust_log() {
        assert_eq!(pick_directive([None, set("debug")], "warn"), "debug");
        assert_eq!(pick_directive([set("trace"), set("debug")], "warn"), "trace");
        assert_eq!(pick_directive([set(" "), set("chronos_agenda=debug")], "warn"), "chronos_agenda=debug");
    }
}
