//! Structured logging setup, following the teacher's pattern of a
//! rolling-file `log4rs` configuration scoped to a database directory.

use std::path::{Path, PathBuf};

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";

/// Initializes logging to `{base_dir}/{name}_logs/{name}.log`, rolling at
/// 10 MiB and keeping 7 previous files.
///
/// # Errors
/// Returns an error if the log directory cannot be created or the
/// logging backend fails to initialize.
pub fn init_for_db_in(base_dir: &Path, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut dir = PathBuf::from(base_dir);
    dir.push(format!("{name}_logs"));
    std::fs::create_dir_all(&dir)?;

    let log_path = dir.join(format!("{name}.log"));
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", dir.join(format!("{name}.{{}}.log")).display()), 7)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(10 * 1024 * 1024)), Box::new(roller));
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(log_path, Box::new(policy))?;

    let config = Config::builder()
        .appender(Appender::builder().build("app", Box::new(appender)))
        .build(Root::builder().appender("app").build(LevelFilter::Info))?;
    log4rs::init_config(config)?;
    Ok(())
}

/// Configures logging from `STRATADB_LOG_DIR` / `STRATADB_LOG_LEVEL` /
/// `STRATADB_LOG_RETENTION` environment variables. Silently no-ops if a
/// logger is already installed or the variables are absent/invalid.
pub fn configure_from_env() {
    let Ok(dir) = std::env::var("STRATADB_LOG_DIR") else { return };
    let level = std::env::var("STRATADB_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let retention: u32 =
        std::env::var("STRATADB_LOG_RETENTION").ok().and_then(|s| s.parse().ok()).unwrap_or(7);
    let lvl = match level.to_ascii_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };
    let base = PathBuf::from(dir);
    let _ = std::fs::create_dir_all(&base);
    let Ok(roller) =
        FixedWindowRoller::builder().build(&format!("{}", base.join("app.{}.log").display()), retention)
    else {
        return;
    };
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(10 * 1024 * 1024)), Box::new(roller));
    let Ok(appender) = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join("app.log"), Box::new(policy))
    else {
        return;
    };
    if let Ok(config) = Config::builder()
        .appender(Appender::builder().build("app", Box::new(appender)))
        .build(Root::builder().appender("app").build(lvl))
    {
        let _ = log4rs::init_config(config);
    }
}
