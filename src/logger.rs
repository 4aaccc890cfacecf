use crate::environment::Environment;

use once_cell::sync::OnceCell;

#[cfg(not(feature = "log_file"))]
pub struct LogGuard;
#[cfg(feature = "log_file")]
pub struct LogGuard(tracing_appender::non_blocking::WorkerGuard);

pub(crate) static LOGGER: OnceCell<LogGuard> = OnceCell::new();

/// Initialize logger with custom format and verbosity.
pub fn initialize_logger(environment: &Environment) {
    #[cfg(not(feature = "log_file"))]
    LOGGER.get_or_init(|| {
        use tracing_subscriber::{fmt::format::Format, FmtSubscriber};

        let subscriber = FmtSubscriber::builder()
            // All spans/events with a level higher than the environment verbosity
            // will be written to stdout.
            .with_max_level(environment.verbosity())
            .with_target(false)
            .event_format(Format::default())
            .finish();

        if tracing::subscriber::set_global_default(subscriber).is_err() {
            eprintln!("A global tracing subscriber was already set");
        }

        LogGuard {}
    });

    #[cfg(feature = "log_file")]
    LOGGER.get_or_init(|| {
        use tracing_subscriber::{fmt, fmt::format::Format, layer::SubscriberExt, FmtSubscriber};

        let log_directory = environment.local_base_directory().join("logs");

        let file_appender = tracing_appender::rolling::hourly(log_directory, "log");
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        let file_output = fmt::Layer::default().with_writer(file_writer);

        let console_output = FmtSubscriber::builder()
            .with_max_level(environment.verbosity())
            .with_target(false)
            .event_format(Format::default())
            .finish();

        if tracing::subscriber::set_global_default(console_output.with(file_output)).is_err() {
            eprintln!("A global tracing subscriber was already set");
        }

        // The guard must outlive every log write, so it is kept in LOGGER.
        LogGuard(guard)
    });
}
