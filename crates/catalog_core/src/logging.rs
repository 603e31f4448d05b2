//! Process-wide file logging for catalog hosts.
//!
//! # Responsibility
//! - Start one rolling file logger per process on host request.
//! - Route panics through the logger with a bounded, single-line payload.
//!
//! # Invariants
//! - Repeating `init_logging` with equal settings is a no-op.
//! - Different settings after a successful start are rejected, never applied.
//! - Nothing here panics on bad input.

use flexi_logger::{
    Cleanup, Criterion, FileSpec, LogSpecification, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};

const FILE_BASENAME: &str = "catalog";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 5;
const PANIC_PAYLOAD_LIMIT: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Eq)]
struct LogSettings {
    level: LevelFilter,
    dir: PathBuf,
}

struct ActiveLogger {
    settings: LogSettings,
    _handle: LoggerHandle,
}

/// Logging bootstrap failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingError {
    UnsupportedLevel(String),
    InvalidDirectory(String),
    /// Logging is already active with a different setting.
    Conflict { active: String, requested: String },
    Backend(String),
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::InvalidDirectory(message) => write!(f, "invalid log directory: {message}"),
            Self::Conflict { active, requested } => write!(
                f,
                "logging already initialized with `{active}`; refusing to switch to `{requested}`"
            ),
            Self::Backend(message) => write!(f, "failed to start logger: {message}"),
        }
    }
}

impl Error for LoggingError {}

/// Starts file logging at `level` under the absolute directory `log_dir`.
///
/// `level` is a case-insensitive level name; `warning` is accepted for `warn`.
///
/// # Errors
/// - `UnsupportedLevel` for unknown names and `off`.
/// - `InvalidDirectory` when `log_dir` is empty, relative, or cannot be created.
/// - `Conflict` when logging is already active with another level or directory.
/// - `Backend` when the logger fails to start.
pub fn init_logging(level: &str, log_dir: impl AsRef<Path>) -> Result<(), LoggingError> {
    let requested = LogSettings {
        level: parse_level(level)?,
        dir: absolute_dir(log_dir.as_ref())?,
    };

    let active = ACTIVE.get_or_try_init(|| start(&requested))?;
    if active.settings.dir != requested.dir {
        return Err(LoggingError::Conflict {
            active: active.settings.dir.display().to_string(),
            requested: requested.dir.display().to_string(),
        });
    }
    if active.settings.level != requested.level {
        return Err(LoggingError::Conflict {
            active: active.settings.level.to_string(),
            requested: requested.level.to_string(),
        });
    }
    Ok(())
}

/// Active level and directory, if logging was started.
pub fn logging_status() -> Option<(LevelFilter, PathBuf)> {
    let settings = &ACTIVE.get()?.settings;
    Some((settings.level, settings.dir.clone()))
}

/// `Debug` in debug builds, `Info` otherwise.
pub fn default_log_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

fn start(settings: &LogSettings) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(&settings.dir).map_err(|err| {
        LoggingError::InvalidDirectory(format!(
            "cannot create `{}`: {err}",
            settings.dir.display()
        ))
    })?;

    let spec = LogSpecification::builder().default(settings.level).build();
    let handle = Logger::with(spec)
        .log_to_file(
            FileSpec::default()
                .directory(&settings.dir)
                .basename(FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| LoggingError::Backend(err.to_string()))?;

    PANIC_HOOK.get_or_init(route_panics_to_log);

    info!(
        "event=catalog_init module=core status=ok platform={} version={} level={} log_dir={}",
        std::env::consts::OS,
        env!("CARGO_PKG_VERSION"),
        settings.level,
        settings.dir.display()
    );

    Ok(ActiveLogger {
        settings: settings.clone(),
        _handle: handle,
    })
}

fn parse_level(raw: &str) -> Result<LevelFilter, LoggingError> {
    let name = raw.trim();
    let parsed = if name.eq_ignore_ascii_case("warning") {
        Ok(LevelFilter::Warn)
    } else {
        name.parse::<LevelFilter>()
    };
    match parsed {
        Ok(LevelFilter::Off) | Err(_) => Err(LoggingError::UnsupportedLevel(name.to_string())),
        Ok(level) => Ok(level),
    }
}

fn absolute_dir(dir: &Path) -> Result<PathBuf, LoggingError> {
    if dir.as_os_str().is_empty() {
        Err(LoggingError::InvalidDirectory("path is empty".to_string()))
    } else if dir.is_relative() {
        Err(LoggingError::InvalidDirectory(format!(
            "`{}` is not an absolute path",
            dir.display()
        )))
    } else {
        Ok(dir.to_path_buf())
    }
}

fn route_panics_to_log() {
    let chained = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info.location().map_or_else(
            || "unknown".to_string(),
            |loc| format!("{}:{}", loc.file(), loc.line()),
        );
        // Payloads can carry catalog text.
        error!(
            "event=panic_captured module=core status=error location={location} payload={}",
            one_line(&panic_text(info), PANIC_PAYLOAD_LIMIT)
        );
        chained(info);
    }));
}

fn panic_text(info: &PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    payload
        .downcast_ref::<&str>()
        .map(|text| text.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "<opaque payload>".to_string())
}

/// Replaces control characters with spaces and caps the result at `limit`
/// characters, marking truncation with `...`.
fn one_line(text: &str, limit: usize) -> String {
    let mut chars = text.chars().map(|ch| if ch.is_control() { ' ' } else { ch });
    let mut line: String = chars.by_ref().take(limit).collect();
    if chars.next().is_some() {
        line.push_str("...");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::{absolute_dir, init_logging, logging_status, one_line, parse_level, LoggingError};
    use log::LevelFilter;
    use std::path::Path;

    #[test]
    fn level_names_parse_case_insensitively_with_warning_alias() {
        assert_eq!(parse_level("INFO"), Ok(LevelFilter::Info));
        assert_eq!(parse_level(" warning "), Ok(LevelFilter::Warn));
        assert_eq!(parse_level("Trace"), Ok(LevelFilter::Trace));
        for rejected in ["loud", "off", ""] {
            assert!(matches!(
                parse_level(rejected),
                Err(LoggingError::UnsupportedLevel(_))
            ));
        }
    }

    #[test]
    fn log_dir_must_be_absolute_and_non_empty() {
        assert!(matches!(
            absolute_dir(Path::new("logs/dev")),
            Err(LoggingError::InvalidDirectory(_))
        ));
        assert!(matches!(
            absolute_dir(Path::new("")),
            Err(LoggingError::InvalidDirectory(_))
        ));
    }

    #[test]
    fn panic_payloads_are_flattened_and_capped() {
        assert_eq!(one_line("a\nb\tc", 10), "a b c");
        assert_eq!(one_line("abcdefghij", 4), "abcd...");
        assert_eq!(one_line("abcd", 4), "abcd");
    }

    #[test]
    fn repeated_init_is_idempotent_and_conflicting_init_is_rejected() {
        let log_dir = tempfile::tempdir().unwrap();
        let other_dir = tempfile::tempdir().unwrap();

        init_logging("info", log_dir.path()).unwrap();
        init_logging("INFO", log_dir.path()).unwrap();

        assert!(matches!(
            init_logging("debug", log_dir.path()),
            Err(LoggingError::Conflict { .. })
        ));
        assert!(matches!(
            init_logging("info", other_dir.path()),
            Err(LoggingError::Conflict { .. })
        ));

        let (level, dir) = logging_status().unwrap();
        assert_eq!(level, LevelFilter::Info);
        assert_eq!(dir, log_dir.path());
    }
}
