//! CV files on local disk under `<UPLOAD_DIR>/cvs`.
//!
//! Stored names look like `cv-<owner uuid>-<millis>-<suffix>.pdf`; the owner
//! is recovered from the name so downloads can be authorised without a
//! lookup table.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::UserId;

const PREFIX: &str = "cv-";
const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Debug, Error)]
pub enum CvStorageError {
    #[error("invalid file name")]
    InvalidName,

    #[error("file not found")]
    NotFound,

    #[error("file exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("only PDF files are allowed")]
    NotPdf,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CvStorageError> for AppError {
    fn from(err: CvStorageError) -> Self {
        match err {
            CvStorageError::InvalidName => AppError::BadRequest("Invalid file name".to_string()),
            CvStorageError::NotFound => AppError::NotFound("File not found".to_string()),
            CvStorageError::TooLarge { limit } => {
                AppError::PayloadTooLarge(format!("File exceeds the {limit} byte limit"))
            }
            CvStorageError::NotPdf => AppError::BadRequest("Only PDF files are allowed".to_string()),
            CvStorageError::Io(e) => AppError::Internal(anyhow::Error::from(e).context("cv storage")),
        }
    }
}

/// Accepts only uploads declared as PDF that also start with the PDF magic.
pub fn is_pdf(content_type: Option<&str>, bytes: &[u8]) -> bool {
    content_type.is_some_and(|ct| ct.eq_ignore_ascii_case("application/pdf"))
        && bytes.starts_with(PDF_MAGIC)
}

#[derive(Debug, Clone)]
pub struct CvStorage {
    dir: PathBuf,
    max_size: usize,
}

impl CvStorage {
    pub fn new(upload_dir: &Path, max_size: usize) -> Self {
        CvStorage {
            dir: upload_dir.join("cvs"),
            max_size,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn file_name_for(owner: UserId, now: DateTime<Utc>) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{PREFIX}{owner}-{}-{}.pdf", now.timestamp_millis(), &suffix[..9])
    }

    /// The account a stored CV belongs to, if `file_name` is one of ours.
    pub fn owner_of(file_name: &str) -> Option<UserId> {
        let rest = file_name.strip_prefix(PREFIX)?;
        rest.get(..36)?.parse().ok()
    }

    /// Maps a client-supplied name to a path inside the CV directory.
    pub fn resolve(&self, file_name: &str) -> Result<PathBuf, CvStorageError> {
        let plain = !file_name.is_empty()
            && !file_name.contains(['/', '\\', '\0'])
            && !file_name.contains("..")
            && file_name.starts_with(PREFIX);
        if !plain {
            return Err(CvStorageError::InvalidName);
        }
        Ok(self.dir.join(file_name))
    }

    /// Validates and writes a new CV for `owner`, returning its file name.
    pub async fn save(
        &self,
        owner: UserId,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, CvStorageError> {
        if bytes.len() > self.max_size {
            return Err(CvStorageError::TooLarge {
                limit: self.max_size,
            });
        }
        if !is_pdf(content_type, bytes) {
            return Err(CvStorageError::NotPdf);
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let file_name = Self::file_name_for(owner, Utc::now());
        tokio::fs::write(self.dir.join(&file_name), bytes).await?;
        debug!(%owner, file = %file_name, size = bytes.len(), "Stored CV");
        Ok(file_name)
    }

    pub async fn read(&self, file_name: &str) -> Result<Vec<u8>, CvStorageError> {
        let path = self.resolve(file_name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(CvStorageError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes a stored CV. A file that is already gone is not an error.
    pub async fn remove(&self, file_name: &str) -> Result<(), CvStorageError> {
        let path = self.resolve(file_name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(file = %file_name, "CV already missing on disk");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDF: &[u8] = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n1 0 obj\n<<>>\nendobj\n";

    fn storage(dir: &tempfile::TempDir, max: usize) -> CvStorage {
        CvStorage::new(dir.path(), max)
    }

    #[test]
    fn test_is_pdf_needs_type_and_magic() {
        assert!(is_pdf(Some("application/pdf"), PDF));
        assert!(!is_pdf(Some("text/plain"), PDF));
        assert!(!is_pdf(Some("application/pdf"), b"GIF89a"));
        assert!(!is_pdf(None, PDF));
    }

    #[test]
    fn test_owner_round_trips_through_file_name() {
        let owner = Uuid::new_v4();
        let name = CvStorage::file_name_for(owner, Utc::now());
        assert!(name.ends_with(".pdf"));
        assert_eq!(CvStorage::owner_of(&name), Some(owner));
        assert_eq!(CvStorage::owner_of("resume.pdf"), None);
        assert_eq!(CvStorage::owner_of("cv-short.pdf"), None);
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let cvs = storage(&dir, 1024);
        for name in ["../secret", "cv-../../etc/passwd", "cv-a/b.pdf", "cv-a\\b.pdf", "notes.pdf", ""] {
            assert!(matches!(cvs.resolve(name), Err(CvStorageError::InvalidName)), "{name}");
        }
        assert!(cvs.resolve("cv-x.pdf").unwrap().starts_with(dir.path()));
    }

    #[tokio::test]
    async fn test_save_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let cvs = storage(&dir, 1024);
        let owner = Uuid::new_v4();

        let name = cvs.save(owner, Some("application/pdf"), PDF).await.unwrap();
        assert_eq!(cvs.read(&name).await.unwrap(), PDF);

        cvs.remove(&name).await.unwrap();
        assert!(matches!(cvs.read(&name).await, Err(CvStorageError::NotFound)));
        // second removal is a no-op
        cvs.remove(&name).await.unwrap();
    }

    #[tokio::test]
    async fn test_save_rejects_oversize_and_non_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let cvs = storage(&dir, 16);
        let owner = Uuid::new_v4();

        let big = [PDF, &[0u8; 32][..]].concat();
        assert!(matches!(
            cvs.save(owner, Some("application/pdf"), &big).await,
            Err(CvStorageError::TooLarge { limit: 16 })
        ));
        assert!(matches!(
            cvs.save(owner, Some("application/pdf"), b"plain text").await,
            Err(CvStorageError::NotPdf)
        ));
    }
}
