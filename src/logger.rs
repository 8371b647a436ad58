//! Warning and error reporting for decode passes.
//!
//! Non-fatal findings (a column-count disagreement, an unknown character-set
//! code) and per-file CLI failures become `tracing` events. When a log file is
//! configured they are also appended to it, tagged with the dataset that
//! raised them.

use std::cell::RefCell;
use std::fmt::Display;
use std::fs::File;
use std::io::{Result as IoResult, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

static LOG_SINK: OnceLock<Mutex<File>> = OnceLock::new();

thread_local! {
    static DATASET_TAG: RefCell<Option<String>> = const { RefCell::new(None) };
}

fn tagged(message: impl Display) -> String {
    DATASET_TAG.with(|tag| match tag.borrow().as_deref() {
        Some(dataset) => format!("{dataset}: {message}"),
        None => message.to_string(),
    })
}

/// Routes warnings and errors to `path` for the rest of the process, one
/// `warning: ...` or `error: ...` line each. Only the first call installs a
/// file; later calls still create theirs but leave the sink unchanged.
///
/// # Errors
///
/// Returns an error if the file or its parent directory cannot be created.
pub fn set_log_file(path: &Path) -> IoResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let _ = LOG_SINK.set(Mutex::new(file));
    Ok(())
}

/// Tags messages raised on this thread with `dataset` until the returned
/// guard is dropped.
pub fn set_log_prefix(dataset: impl Into<String>) -> LogPrefixGuard {
    let previous = DATASET_TAG.with(|tag| tag.replace(Some(dataset.into())));
    LogPrefixGuard { previous }
}

/// Restores the enclosing dataset tag when dropped.
pub struct LogPrefixGuard {
    previous: Option<String>,
}

impl Drop for LogPrefixGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        DATASET_TAG.with(|tag| {
            tag.replace(previous);
        });
    }
}

fn append_to_sink(level: &str, message: &str) {
    if let Some(sink) = LOG_SINK.get()
        && let Ok(mut file) = sink.lock()
    {
        let _ = writeln!(file, "{level}: {message}");
    }
}

/// Reports a recoverable inconsistency; the pass continues.
pub fn log_warn(message: &str) {
    let message = tagged(message);
    tracing::warn!("{message}");
    append_to_sink("warning", &message);
}

/// Reports a dataset that could not be processed.
pub fn log_error(message: &str) {
    let message = tagged(message);
    tracing::error!("{message}");
    append_to_sink("error", &message);
}
