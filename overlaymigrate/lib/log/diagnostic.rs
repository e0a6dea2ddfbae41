use std::{
    error::Error,
    fmt::Write as _,
    path::{Path, PathBuf},
};

use chrono::{DateTime, SecondsFormat, Utc};
use getset::Getters;
use tokio::{fs::OpenOptions, io::AsyncWriteExt};

use crate::MigrateError;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Appends human-readable failure reports to a file.
///
/// Reporting is a side channel: a report that cannot be written is logged and otherwise ignored.
///
/// # Example
///
/// ```no_run
/// use overlaymigrate::{DiagnosticLog, MigrateError};
///
/// # async fn example(error: MigrateError) {
/// let log = DiagnosticLog::new("/var/log/overlaymigrate.log");
/// log.record_failure("migrate", "/var/lib/docker".as_ref(), &error).await;
/// # }
/// ```
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub with_prefix")]
pub struct DiagnosticLog {
    /// The report file.
    path: PathBuf,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl DiagnosticLog {
    /// Creates a log writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Appends a report of `error`, raised during `phase` on the storage root `root`.
    pub async fn record_failure(&self, phase: &str, root: &Path, error: &MigrateError) {
        let report = format_report(Utc::now(), phase, root, error);
        if let Err(e) = self.append(&report).await {
            tracing::warn!(
                "failed to write diagnostic report to {}: {}",
                self.path.display(),
                e
            );
        } else {
            tracing::debug!("wrote diagnostic report to {}", self.path.display());
        }
    }

    async fn append(&self, report: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(report.as_bytes()).await?;
        file.sync_all().await
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Formats a failure report, one `caused by` line per error in the source chain.
pub fn format_report(
    time: DateTime<Utc>,
    phase: &str,
    root: &Path,
    error: &MigrateError,
) -> String {
    let mut report = format!(
        "[{}] storage migration failed during {} phase (root: {})\n  error: {}\n",
        time.to_rfc3339_opts(SecondsFormat::Secs, true),
        phase,
        root.display(),
        error
    );

    let mut source = error.source();
    while let Some(cause) = source {
        let _ = writeln!(report, "  caused by: {}", cause);
        source = cause.source();
    }

    report
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
