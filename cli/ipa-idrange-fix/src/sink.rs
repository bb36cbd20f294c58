//! Write-back of planned changes.
//!
//! A sink applies one [`ChangeRecord`] at a time. [`apply_all`] walks the
//! whole list, never retries, and keeps going after a failure so every
//! item gets its own outcome.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use idrange_ldif::ChangeRecord;
use serde::Serialize;
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info};

/// Why a single change was not applied.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Rejected {
        program: String,
        status: String,
        stderr: String,
    },
}

/// Destination for directory changes.
#[async_trait]
pub trait WriteBackSink: Send + Sync {
    /// Short description for messages, such as the target path.
    fn describe(&self) -> String;

    /// Apply a single change.
    async fn apply(&self, change: &ChangeRecord) -> Result<(), SinkError>;
}

/// Appends change records to an LDIF file for later `ldapmodify -f`.
pub struct LdifFileSink {
    path: PathBuf,
}

impl LdifFileSink {
    /// Create or truncate `path` and write the header.
    pub async fn create(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await?;
        let header = format!(
            "# ipa-idrange-fix change records\n# generated {}\nversion: 1\n",
            chrono::Utc::now().to_rfc3339()
        );
        file.write_all(header.as_bytes()).await?;
        file.flush().await?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WriteBackSink for LdifFileSink {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn apply(&self, change: &ChangeRecord) -> Result<(), SinkError> {
        let mut file = OpenOptions::new().append(true).open(&self.path).await?;
        let record = format!("\n# {change}\n{}", change.to_ldif());
        file.write_all(record.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Pipes each record into `ldapmodify`, authenticating with SASL EXTERNAL.
pub struct LdapModifySink {
    program: String,
    uri: Option<String>,
}

impl LdapModifySink {
    pub fn new(uri: Option<String>) -> Self {
        Self {
            program: "ldapmodify".to_string(),
            uri,
        }
    }

    /// Use a different executable; tests point this at a stand-in.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec!["-Q".to_string(), "-Y".to_string(), "EXTERNAL".to_string()];
        if let Some(uri) = &self.uri {
            args.push("-H".to_string());
            args.push(uri.clone());
        }
        args
    }
}

#[async_trait]
impl WriteBackSink for LdapModifySink {
    fn describe(&self) -> String {
        match &self.uri {
            Some(uri) => format!("{} -H {uri}", self.program),
            None => self.program.clone(),
        }
    }

    async fn apply(&self, change: &ChangeRecord) -> Result<(), SinkError> {
        debug!(program = %self.program, dn = change.dn(), "running ldapmodify");
        let mut child = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SinkError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(change.to_ldif().as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if output.status.success() {
            return Ok(());
        }
        Err(SinkError::Rejected {
            program: self.program.clone(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Outcome of one change.
#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub range: String,
    pub change: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-item results of a write-back.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    pub items: Vec<ItemOutcome>,
}

impl ApplyReport {
    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn failed(&self) -> usize {
        self.items.iter().filter(|item| !item.succeeded()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

/// Applies every change in order. Failures are recorded, not retried.
pub async fn apply_all(sink: &dyn WriteBackSink, changes: &[ChangeRecord]) -> ApplyReport {
    let mut report = ApplyReport::default();
    for change in changes {
        let result = sink.apply(change).await;
        match &result {
            Ok(()) => info!(range = change.range_name(), "{change}: done"),
            Err(e) => error!(range = change.range_name(), error = %e, "{change}: failed"),
        }
        report.items.push(ItemOutcome {
            range: change.range_name().to_string(),
            change: change.to_string(),
            error: result.err().map(|e| e.to_string()),
        });
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use idrange_engine::{IdRange, RangeKind};

    /// Records applied changes; fails those for the listed ranges.
    struct RecordingSink {
        applied: Mutex<Vec<String>>,
        fail_for: Vec<String>,
    }

    impl RecordingSink {
        fn failing_for(names: &[&str]) -> Self {
            Self {
                applied: Mutex::new(Vec::new()),
                fail_for: names.iter().map(|n| n.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl WriteBackSink for RecordingSink {
        fn describe(&self) -> String {
            "recording".to_string()
        }

        async fn apply(&self, change: &ChangeRecord) -> Result<(), SinkError> {
            self.applied
                .lock()
                .unwrap()
                .push(change.range_name().to_string());
            if self.fail_for.iter().any(|n| n == change.range_name()) {
                return Err(SinkError::Rejected {
                    program: "recording".to_string(),
                    status: "exit status: 19".to_string(),
                    stderr: "Constraint violation".to_string(),
                });
            }
            Ok(())
        }
    }

    fn changes() -> Vec<ChangeRecord> {
        let before = IdRange::new("legacy", RangeKind::Local, 300_000, 100_000).unwrap();
        let after = before
            .clone()
            .with_rid_bases(Some(301_000), Some(100_300_000));
        let fresh = IdRange::new("EXAMPLE.COM_id_range_001", RangeKind::Local, 500_000, 20)
            .unwrap()
            .with_rid_bases(Some(501_000), Some(100_500_000));
        vec![
            ChangeRecord::rid_bases(&before, &after, "dc=example,dc=com").unwrap(),
            ChangeRecord::new_range(&fresh, "dc=example,dc=com"),
        ]
    }

    #[tokio::test]
    async fn failure_does_not_stop_later_items() {
        let sink = RecordingSink::failing_for(&["legacy"]);
        let report = apply_all(&sink, &changes()).await;

        assert_eq!(
            *sink.applied.lock().unwrap(),
            vec!["legacy", "EXAMPLE.COM_id_range_001"]
        );
        assert_eq!(report.total(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.items[0].succeeded());
        assert!(report.items[0]
            .error
            .as_deref()
            .unwrap()
            .contains("Constraint violation"));
        assert!(report.items[1].succeeded());
    }

    #[tokio::test]
    async fn ldif_file_collects_all_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("changes.ldif");
        let sink = LdifFileSink::create(&path).await.unwrap();

        let report = apply_all(&sink, &changes()).await;
        assert!(report.all_succeeded());

        let written = std::fs::read_to_string(sink.path()).unwrap();
        assert!(written.starts_with("# ipa-idrange-fix change records\n# generated "));
        assert!(written.contains("version: 1\n"));
        assert!(written.contains(
            "dn: cn=legacy,cn=ranges,cn=etc,dc=example,dc=com\nchangetype: modify\n"
        ));
        assert!(written.contains("add: ipaBaseRID\nipaBaseRID: 301000\n-\n"));
        assert!(written.contains("changetype: add\n"));
        assert!(written.contains("ipaBaseID: 500000\n"));
        assert_eq!(written.matches("\ndn: ").count(), 2);
    }

    #[tokio::test]
    async fn missing_ldapmodify_is_reported_per_item() {
        let sink = LdapModifySink::new(Some("ldapi://%2Frun%2Fnone".to_string()))
            .with_program("/nonexistent/ldapmodify");
        assert_eq!(
            sink.describe(),
            "/nonexistent/ldapmodify -H ldapi://%2Frun%2Fnone"
        );

        let report = apply_all(&sink, &changes()).await;
        assert_eq!(report.failed(), 2);
        assert!(report.items[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("failed to run /nonexistent/ldapmodify"));
    }

    #[test]
    fn ldapmodify_arguments_use_sasl_external() {
        assert_eq!(LdapModifySink::new(None).args(), vec!["-Q", "-Y", "EXTERNAL"]);
        assert_eq!(
            LdapModifySink::new(Some("ldaps://ipa.example.com".to_string())).args(),
            vec!["-Q", "-Y", "EXTERNAL", "-H", "ldaps://ipa.example.com"]
        );
    }
}
