//! Batch upload of PDF files to the configured bucket.
//!
//! Files are processed one at a time, in the order given. A failure on one
//! file is recorded and the batch moves on to the next.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::progress::{ProgressMode, UploadProgressEvent, UploadProgressReporter};
use crate::storage::{object_key, AwsCredentials, StorageClient};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A file that made it into the bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedObject {
    pub file: String,
    pub key: String,
    pub uri: String,
}

/// A file that did not.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFailure {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct UploadReport {
    pub uploaded: Vec<UploadedObject>,
    pub failures: Vec<UploadFailure>,
}

impl UploadReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Accept only existing regular files with a `.pdf` extension.
pub fn validate_pdf(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::InvalidFile {
            path: path.to_path_buf(),
            reason: "file not found".to_string(),
        });
    }
    if !path.is_file() {
        return Err(Error::InvalidFile {
            path: path.to_path_buf(),
            reason: "not a regular file".to_string(),
        });
    }
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(Error::InvalidFile {
            path: path.to_path_buf(),
            reason: "not a PDF".to_string(),
        });
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn upload_one(client: &StorageClient, prefix: &str, path: &Path) -> Result<UploadedObject> {
    validate_pdf(path)?;
    let name = display_name(path);
    // SigV4 hashes the whole payload, so the file is read fully before signing.
    let bytes = tokio::fs::read(path).await?;
    let key = object_key(prefix, &name);
    client.put_object(&key, bytes, PDF_CONTENT_TYPE).await?;
    Ok(UploadedObject {
        file: name,
        uri: client.object_uri(&key),
        key,
    })
}

/// Upload each file under `prefix`, recording per-file outcomes.
pub async fn upload_files(
    client: &StorageClient,
    prefix: &str,
    paths: &[PathBuf],
    reporter: &dyn UploadProgressReporter,
) -> UploadReport {
    let mut report = UploadReport::default();
    let total = paths.len();

    for (i, path) in paths.iter().enumerate() {
        let name = display_name(path);
        reporter.report(UploadProgressEvent::Started {
            file: name.clone(),
            index: i + 1,
            total,
        });

        match upload_one(client, prefix, path).await {
            Ok(obj) => {
                reporter.report(UploadProgressEvent::Finished {
                    file: name,
                    uri: obj.uri.clone(),
                });
                report.uploaded.push(obj);
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, kind = e.kind(), "upload failed");
                let reason = e.to_string();
                reporter.report(UploadProgressEvent::Failed {
                    file: name.clone(),
                    reason: reason.clone(),
                });
                report.failures.push(UploadFailure { file: name, reason });
            }
        }
    }

    report
}

/// Print the end-of-batch summary to stdout.
pub fn print_report(report: &UploadReport) {
    if !report.uploaded.is_empty() {
        println!("Uploaded successfully:");
        for obj in &report.uploaded {
            println!("- {}", obj.uri);
        }
    }
    if !report.failures.is_empty() {
        println!("Failures:");
        for failure in &report.failures {
            println!("- {}: {}", failure.file, failure.reason);
        }
    }
}

/// Run `docchat upload`.
pub async fn run_upload(
    config: &Config,
    paths: &[PathBuf],
    progress: Option<ProgressMode>,
) -> anyhow::Result<()> {
    if paths.is_empty() {
        eprintln!("Warning: No files selected.");
        return Ok(());
    }

    let creds = AwsCredentials::from_env()?;
    let client = StorageClient::new(&config.storage, creds)?;
    let reporter = progress.unwrap_or_else(ProgressMode::default_for_tty).reporter();

    let report = upload_files(&client, &config.storage.prefix, paths, reporter.as_ref()).await;
    print_report(&report);

    if !report.is_success() {
        anyhow::bail!(
            "{} of {} file(s) failed to upload",
            report.failures.len(),
            paths.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::progress::NoProgress;
    use httpmock::prelude::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<UploadProgressEvent>>);

    impl UploadProgressReporter for Recorder {
        fn report(&self, event: UploadProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn client_for(server: &MockServer) -> StorageClient {
        let config = StorageConfig {
            bucket: "docs".to_string(),
            endpoint_url: Some(server.base_url()),
            max_attempts: 1,
            ..StorageConfig::default()
        };
        StorageClient::new(&config, AwsCredentials::new("id", "secret", None)).unwrap()
    }

    #[test]
    fn validate_accepts_pdf_case_insensitively() {
        let tmp = tempfile::TempDir::new().unwrap();
        let upper = tmp.path().join("SCAN.PDF");
        std::fs::write(&upper, b"%PDF-1.7").unwrap();
        assert!(validate_pdf(&upper).is_ok());
    }

    #[test]
    fn validate_rejects_missing_and_non_pdf() {
        let tmp = tempfile::TempDir::new().unwrap();
        let txt = tmp.path().join("notes.txt");
        std::fs::write(&txt, b"hello").unwrap();

        let err = validate_pdf(&txt).unwrap_err();
        assert!(err.to_string().ends_with("not a PDF"));

        let err = validate_pdf(&tmp.path().join("gone.pdf")).unwrap_err();
        assert!(err.to_string().ends_with("file not found"));

        let err = validate_pdf(tmp.path()).unwrap_err();
        assert!(err.to_string().ends_with("not a regular file"));
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_batch() {
        let server = MockServer::start_async().await;
        let put = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path_contains("/docs/uploads/")
                    .header("content-type", "application/pdf");
                then.status(200);
            })
            .await;

        let tmp = tempfile::TempDir::new().unwrap();
        let first = tmp.path().join("first.pdf");
        let bad = tmp.path().join("bad.docx");
        let second = tmp.path().join("second.pdf");
        std::fs::write(&first, b"%PDF-1.4 one").unwrap();
        std::fs::write(&bad, b"nope").unwrap();
        std::fs::write(&second, b"%PDF-1.4 two").unwrap();

        let recorder = Recorder(Mutex::new(Vec::new()));
        let report = upload_files(
            &client_for(&server),
            "uploads",
            &[first, bad, second],
            &recorder,
        )
        .await;

        assert_eq!(put.hits_async().await, 2);
        assert!(!report.is_success());
        assert_eq!(
            report
                .uploaded
                .iter()
                .map(|o| o.file.as_str())
                .collect::<Vec<_>>(),
            vec!["first.pdf", "second.pdf"]
        );
        for obj in &report.uploaded {
            assert!(obj.key.starts_with("uploads/"));
            assert!(obj.key.ends_with(".pdf"));
            assert_eq!(obj.uri, format!("s3://docs/{}", obj.key));
        }
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].file, "bad.docx");

        let events = recorder.0.lock().unwrap();
        assert_eq!(events.len(), 6);
        assert_eq!(
            events[0],
            UploadProgressEvent::Started {
                file: "first.pdf".to_string(),
                index: 1,
                total: 3
            }
        );
        assert!(matches!(events[3], UploadProgressEvent::Failed { .. }));
    }

    #[tokio::test]
    async fn storage_errors_are_recorded_per_file() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT);
                then.status(403).body(
                    "<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>",
                );
            })
            .await;

        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("a.pdf");
        std::fs::write(&file, b"%PDF").unwrap();

        let report = upload_files(&client_for(&server), "uploads", &[file], &NoProgress).await;
        assert!(report.uploaded.is_empty());
        assert_eq!(report.failures[0].file, "a.pdf");
        assert!(report.failures[0].reason.contains("AccessDenied"));
    }
}
