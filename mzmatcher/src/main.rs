use std::io;
use std::path::Path;

use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mzmatcher::{MZMatcher, MZMatcherError};

#[cfg(feature = "mimalloc")]
use mimalloc::MiMalloc;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn configure_log(log_file: Option<&Path>) -> io::Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log file has no name"))?;
            std::fs::create_dir_all(directory)?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .compact()
                .with_ansi(false)
                .with_timer(fmt::time::ChronoLocal::rfc_3339())
                .with_writer(writer)
                .with_filter(
                    EnvFilter::builder()
                        .with_default_directive(tracing::Level::DEBUG.into())
                        .from_env_lossy(),
                );
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_timer(fmt::time::ChronoLocal::rfc_3339())
                .with_writer(io::stderr)
                .with_filter(
                    EnvFilter::builder()
                        .with_default_directive(tracing::Level::INFO.into())
                        .from_env_lossy(),
                ),
        )
        .with(file_layer)
        .init();
    Ok(guard)
}

fn main() -> Result<(), MZMatcherError> {
    let args = MZMatcher::parse();

    let mut config = Figment::new()
        .merge(Serialized::defaults(args.clone()))
        .merge(Toml::file("mzmatcher.toml"));
    if let Some(path) = args.config_file.as_ref() {
        config = config.merge(Toml::file_exact(path));
    }
    config = config.merge(Env::prefixed("MZMATCHER_"));
    let driver: MZMatcher = config.extract()?;

    let _guard = configure_log(driver.log_file.as_deref())?;
    driver.main()?;
    Ok(())
}
