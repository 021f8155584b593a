//! log4rs wiring for processes embedding the translator.
//!
//! Application logs go to `app.log`, per-query timing lines (target
//! `odatalite::metrics`) to `metrics.log`, and optionally per-query bench lines to `dev6.log`.

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

use crate::devlog::DEV_TARGET;
use crate::errors::ODataError;

pub const METRICS_TARGET: &str = "odatalite::metrics";

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

/// Initializes logging from a log4rs YAML file.
///
/// # Errors
/// Returns an error if the file cannot be loaded.
pub fn init_path(path: &Path) -> Result<(), ODataError> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())
        .map_err(|e| ODataError::Config(e.to_string()))
}

#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, name: &str, keep: u32) -> Result<RollingFileAppender, ODataError> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{name}.{{}}.log")).display()), keep)
        .map_err(|e| ODataError::Config(e.to_string()))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{name}.log")), Box::new(policy))?)
}

/// Builds the logging config rooted at `dir` (current directory when `None`).
///
/// # Errors
/// Returns an error if an appender cannot be created.
pub fn build_config(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<u32>,
    enable_dev6: bool,
) -> Result<Config, ODataError> {
    let base = dir
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    std::fs::create_dir_all(&base)?;
    let keep = retention.unwrap_or(7);
    let lvl = parse_level(level.unwrap_or("info"));

    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("metrics", Box::new(rolling(&base, "metrics", keep)?)))
        .logger(Logger::builder().appender("metrics").additive(false).build(METRICS_TARGET, lvl));
    builder = if enable_dev6 {
        builder
            .appender(Appender::builder().build("dev6", Box::new(rolling(&base, "dev6", keep)?)))
            .logger(
                Logger::builder()
                    .appender("dev6")
                    .additive(false)
                    .build(DEV_TARGET, LevelFilter::Trace),
            )
    } else {
        builder.logger(Logger::builder().additive(false).build(DEV_TARGET, LevelFilter::Off))
    };
    builder
        .build(Root::builder().appender("app").build(lvl))
        .map_err(|e| ODataError::Config(e.to_string()))
}

/// Configure logging for the process. Later calls are ignored once a logger is installed.
///
/// # Errors
/// Returns an error if the configuration cannot be built.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<u32>,
    enable_dev6: bool,
) -> Result<(), ODataError> {
    let config = build_config(dir, level, retention, enable_dev6)?;
    if let Err(e) = log4rs::init_config(config) {
        log::debug!("logger already initialized: {e}");
    }
    Ok(())
}

/// Configure logging from environment variables if present:
/// - `ODATALITE_LOG_DIR`
/// - `ODATALITE_LOG_LEVEL`
/// - `ODATALITE_LOG_RETENTION`
/// - `ODATALITE_DEV6`
///
/// # Errors
/// Returns an error if the configuration cannot be built.
pub fn configure_from_env() -> Result<(), ODataError> {
    let dir = std::env::var("ODATALITE_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("ODATALITE_LOG_LEVEL").ok();
    let retention =
        std::env::var("ODATALITE_LOG_RETENTION").ok().and_then(|s| s.parse::<u32>().ok());
    let dev6 = std::env::var("ODATALITE_DEV6")
        .is_ok_and(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
    configure_logging(dir.as_deref(), level.as_deref(), retention, dev6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_words() {
        assert_eq!(parse_level("TRACE"), LevelFilter::Trace);
        assert_eq!(parse_level("warn"), LevelFilter::Warn);
        assert_eq!(parse_level("bogus"), LevelFilter::Info);
    }

    #[test]
    fn build_config_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("logs");
        let cfg = build_config(Some(&base), Some("debug"), Some(2), true).unwrap();
        assert!(base.exists());
        assert_eq!(cfg.root().level(), LevelFilter::Debug);
        assert!(cfg.loggers().iter().any(|l| l.name() == DEV_TARGET));
    }
}
