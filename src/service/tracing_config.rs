use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use super::{AppError, AppResult, LogConfig};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Maps the number of `-v` flags onto a level, starting from `base`.
pub fn verbosity_level(base: LevelFilter, verbose: u8) -> LevelFilter {
    const LADDER: [LevelFilter; 5] = [
        LevelFilter::ERROR,
        LevelFilter::WARN,
        LevelFilter::INFO,
        LevelFilter::DEBUG,
        LevelFilter::TRACE,
    ];
    let start = LADDER.iter().position(|l| *l == base).unwrap_or(2);
    let index = (start + verbose as usize).min(LADDER.len() - 1);
    LADDER[index]
}

/// Installs the global subscriber: diagnostics go to stderr, and additionally
/// to a daily rolling file when `log.directory` is configured.
///
/// `RUST_LOG` takes precedence over `level`. The returned guard must be kept
/// alive for the file writer to flush.
pub fn setup_tracing(level: LevelFilter, log: &LogConfig) -> AppResult<Option<WorkerGuard>> {
    dotenv::dotenv().ok();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match &log.directory {
        Some(directory) => {
            let file_appender = tracing_appender::rolling::daily(directory, &log.file_prefix);
            let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_writer(non_blocking);
            (Some(layer.boxed()), Some(worker_guard))
        }
        None => (None, None),
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .with(filter)
        .try_init()
        .map_err(|e| AppError::IllegalStateError(format!("tracing already initialised: {}", e)))?;

    Ok(guard)
}

/// Stderr-only subscriber for tests; repeated calls are ignored.
pub fn setup_local_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(true)
        .with_test_writer();
    let _ = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(EnvFilter::from_default_env())
        .try_init();
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(LevelFilter::WARN, 0, LevelFilter::WARN)]
    #[case(LevelFilter::WARN, 1, LevelFilter::INFO)]
    #[case(LevelFilter::INFO, 2, LevelFilter::TRACE)]
    #[case(LevelFilter::INFO, 9, LevelFilter::TRACE)]
    fn verbosity_ladder(#[case] base: LevelFilter, #[case] verbose: u8, #[case] expect: LevelFilter) {
        assert_eq!(verbosity_level(base, verbose), expect);
    }

    #[test]
    fn local_tracing_tolerates_repeat_setup() {
        setup_local_tracing();
        setup_local_tracing();
        tracing::info!("still logging after a second setup");
    }
}
