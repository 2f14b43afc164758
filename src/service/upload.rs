//! Local upload preparation: read each selected file and check it is a PDF.
//!
//! A folder picked for upload routinely contains stray files (`.DS_Store`,
//! scans saved as PNG, half-written downloads). Rejecting them here, with a
//! reason per file, turns them into ordinary rejections in the batch outcome
//! instead of failing the whole upload or wasting a round trip.

use crate::service::{UploadFile, UploadRejection};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How many files are read from disk at once.
const READ_CONCURRENCY: usize = 4;

/// Read `paths` and split them into uploadable PDFs and local rejections.
///
/// Input order is preserved in both lists.
pub async fn prepare_uploads(paths: &[PathBuf]) -> (Vec<UploadFile>, Vec<UploadRejection>) {
    let results: Vec<Result<UploadFile, UploadRejection>> = stream::iter(paths.iter())
        .map(|path| read_pdf(path))
        .buffered(READ_CONCURRENCY)
        .collect()
        .await;

    let mut files = Vec::new();
    let mut rejected = Vec::new();
    for result in results {
        match result {
            Ok(file) => files.push(file),
            Err(rejection) => {
                warn!("Skipping {}: {}", rejection.name, rejection.reason);
                rejected.push(rejection);
            }
        }
    }
    debug!(
        "Prepared {} file(s) for upload, {} rejected locally",
        files.len(),
        rejected.len()
    );
    (files, rejected)
}

/// Read one file, validating existence, permission and PDF magic bytes.
async fn read_pdf(path: &Path) -> Result<UploadFile, UploadRejection> {
    let name = file_name(path);
    let reject = |reason: String| UploadRejection {
        name: name.clone(),
        reason,
    };

    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(reject("file not found".into()));
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(reject("permission denied".into()));
        }
        Err(e) => return Err(reject(e.to_string())),
    };

    if !is_pdf(&bytes) {
        return Err(reject("not a PDF file".into()));
    }

    Ok(UploadFile {
        name: name.clone(),
        bytes,
    })
}

/// Whether `bytes` starts with the `%PDF` magic.
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf(b"%PDF-1.7\n..."));
        assert!(!is_pdf(b"\x89PNG"));
        assert!(!is_pdf(b"%PD"));
        assert!(!is_pdf(b""));
    }

    #[tokio::test]
    async fn splits_valid_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("a.pdf");
        let bad = dir.path().join("notes.txt");
        let missing = dir.path().join("gone.pdf");
        std::fs::File::create(&good)
            .unwrap()
            .write_all(b"%PDF-1.4 body")
            .unwrap();
        std::fs::write(&bad, b"hello").unwrap();

        let (files, rejected) = prepare_uploads(&[good, bad, missing]).await;

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "a.pdf");
        assert_eq!(files[0].bytes, b"%PDF-1.4 body");
        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0].name, "notes.txt");
        assert_eq!(rejected[0].reason, "not a PDF file");
        assert_eq!(rejected[1].reason, "file not found");
    }
}
