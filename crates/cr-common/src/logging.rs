//! Process-wide tracing setup shared by the API and the trainer.

use std::any::Any;
use std::env;
use std::panic;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Read from `CR_LOG_DIR`, `CR_LOG_FORMAT` (`text`|`json`) and `CR_LOG_INCLUDE_BACKTRACE`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Daily-rotated `<dir>/<app>.log` instead of stdout.
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
    /// Also run the default panic hook (and its backtrace) after logging.
    pub include_backtrace: bool,
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        let format = match env::var("CR_LOG_FORMAT") {
            Ok(value) if value.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            dir: env::var_os("CR_LOG_DIR")
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
            format,
            include_backtrace: env_flag("CR_LOG_INCLUDE_BACKTRACE"),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Routes panics through `tracing` so they land in the same sink as other events.
/// Only the first call per process installs the hook.
pub fn install_tracing_panic_hook(app_name: &'static str) {
    static INSTALLED: OnceLock<()> = OnceLock::new();

    INSTALLED.get_or_init(|| {
        let include_backtrace = LoggingConfig::from_env().include_backtrace;
        let default_hook = panic::take_hook();

        panic::set_hook(Box::new(move |info| {
            let thread = std::thread::current();
            let location = info
                .location()
                .map(|loc| format!("{}:{}", loc.file(), loc.line()))
                .unwrap_or_else(|| "unknown".into());

            tracing::error!(
                application = app_name,
                thread = thread.name().unwrap_or("unnamed"),
                %location,
                panic_message = %panic_message(info.payload()),
                "panic captured"
            );

            if include_backtrace {
                default_hook(info);
            }
        }));
    });
}

fn file_writer(config: &LoggingConfig, app_name: &str) -> Option<BoxMakeWriter> {
    let dir = config.dir.as_ref()?;
    if let Err(err) = std::fs::create_dir_all(dir) {
        eprintln!("cannot create log dir {}: {err}; logging to stdout", dir.display());
        return None;
    }

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, format!("{app_name}.log")));
    let _ = LOG_GUARD.set(guard);
    Some(BoxMakeWriter::new(writer))
}

/// Installs the global subscriber from [`LoggingConfig::from_env`]. Filtering
/// follows `RUST_LOG`, defaulting to `info`. Later calls are no-ops.
pub fn init_tracing_subscriber(app_name: &'static str) {
    init_with(&LoggingConfig::from_env(), app_name);
}

pub fn init_with(config: &LoggingConfig, app_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let writer = file_writer(config, app_name).unwrap_or_else(|| BoxMakeWriter::new(std::io::stdout));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);

    let _ = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
}
