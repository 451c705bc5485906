use std::path::Path;

pub const LOG_FILE_BASENAME: &str = "lifeos";
pub const LOG_FILE_SUFFIX: &str = "log";
pub const LOG_ROTATE_SIZE_BYTES: u64 = 100 * 1024 * 1024;
pub const LOG_ROTATE_KEEP_FILES: usize = 30;
pub const LOG_SPEC_ENV: &str = "LIFEOS_LOG";

/// First non-blank value of `LIFEOS_LOG`, then `RUST_LOG`, else the build default.
pub fn log_spec(var: impl Fn(&str) -> Option<String>) -> String {
    let default_spec = if cfg!(debug_assertions) {
        "warn,lifeos_tasks_lib=debug"
    } else {
        "warn,lifeos_tasks_lib=info"
    };
    [LOG_SPEC_ENV, "RUST_LOG"]
        .into_iter()
        .filter_map(|name| var(name))
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default_spec.to_string())
}

#[cfg(all(feature = "app", not(test)))]
pub fn init_logging(data_dir: &Path) -> Result<(), flexi_logger::FlexiLoggerError> {
    use flexi_logger::{
        detailed_format, Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming, WriteMode,
    };

    std::fs::create_dir_all(data_dir)?;
    let spec = log_spec(|name| std::env::var(name).ok());

    Logger::try_with_str(spec)?
        .log_to_file(
            FileSpec::default()
                .directory(data_dir)
                .basename(LOG_FILE_BASENAME)
                .suffix(LOG_FILE_SUFFIX),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .format_for_files(detailed_format)
        .rotate(
            Criterion::Size(LOG_ROTATE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(LOG_ROTATE_KEEP_FILES),
        )
        .duplicate_to_stdout(if cfg!(debug_assertions) {
            Duplicate::Info
        } else {
            Duplicate::None
        })
        .start()?;

    install_panic_hook();

    log::info!(
        "logger initialized dir={} rotate_size_bytes={} keep_files={}",
        data_dir.display(),
        LOG_ROTATE_SIZE_BYTES,
        LOG_ROTATE_KEEP_FILES
    );
    Ok(())
}

/// Log file path for a given data dir, as written by the file logger.
pub fn log_file_path(data_dir: &Path) -> std::path::PathBuf {
    data_dir.join(format!("{LOG_FILE_BASENAME}.{LOG_FILE_SUFFIX}"))
}

/// Text of a panic payload; `panic!` produces either `&str` or `String`.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&str>() {
        *text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.as_str()
    } else {
        "<opaque panic payload>"
    }
}

/// Writes panics (with a backtrace) to the log file, then defers to the previous hook.
#[cfg(all(feature = "app", not(test)))]
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info: &std::panic::PanicHookInfo<'_>| {
        let location = info
            .location()
            .map_or_else(|| "unknown".to_string(), ToString::to_string);
        log::error!(
            "panic at {location}: {}\n{}",
            panic_message(info.payload()),
            std::backtrace::Backtrace::force_capture()
        );
        log::logger().flush();
        previous(info);
    }));
}
