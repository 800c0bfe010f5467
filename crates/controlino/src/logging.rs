use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Targets `--log-level` applies to. Other crates only log errors unless
/// `RUST_LOG` says otherwise.
const CONTROLINO_TARGETS: [&str; 4] = [
    "controlino",
    "controlino_transport",
    "controlino_frame",
    "controlino_link",
];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Filter directives: this level for the controlino crates, errors only
    /// for everything else.
    pub fn directives(self) -> String {
        let level = self.as_str();
        std::iter::once("error".to_string())
            .chain(
                CONTROLINO_TARGETS
                    .iter()
                    .map(|target| format!("{target}={level}")),
            )
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A valid `RUST_LOG` replaces the `--log-level` directives entirely.
fn build_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directives()))
}

/// Install the stderr subscriber. Stdout is reserved for command output.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_filter(level))
        .with_ansi(false);

    match format {
        LogFormat::Text => {
            let _ = builder.with_target(false).try_init();
        }
        // JSON records keep their target so RX dumps can be filtered later.
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_scope_level_to_controlino_crates() {
        assert_eq!(
            LogLevel::Trace.directives(),
            "error,controlino=trace,controlino_transport=trace,\
             controlino_frame=trace,controlino_link=trace"
        );
    }

    #[test]
    fn every_level_builds_a_valid_filter() {
        for level in LogLevel::value_variants() {
            assert!(
                EnvFilter::try_new(level.directives()).is_ok(),
                "{level:?} directives should parse"
            );
        }
    }
}
