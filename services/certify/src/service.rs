//! Certificate issuing and lookup.
//!
//! Issuing runs as one ordered sequence inside the request task:
//!
//! 1. mint a [`CertificateId`] and build the verification URL
//! 2. encode the URL as a QR image and render the PDF in memory
//! 3. stage the PDF in a temp file (written and fsynced)
//! 4. insert the record
//! 5. rename the temp file to `{id}.pdf`
//!
//! A failure before step 5 drops the staged file, which deletes it. A failure
//! in step 5 also removes the record inserted in step 4. The only state a crash
//! can leave behind is a temp file (step 3/4) or a record without a file
//! (between 4 and 5); [`CertificateService::reconcile`] clears both at startup.

use std::io;
use std::sync::Arc;

use certify_id::CertificateId;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::files::CertificateFiles;
use crate::name::CertificateName;
use crate::render::{render_certificate, PdfError, QrError, QrImage};
use crate::store::{CertificateRecord, CertificateStore, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to encode QR code: {0}")]
    Qr(#[from] QrError),

    #[error("failed to render PDF: {0}")]
    Pdf(#[from] PdfError),

    #[error("failed to write certificate file: {0}")]
    Write(#[source] io::Error),

    #[error("failed to save certificate record: {0}")]
    Save(#[source] StoreError),

    #[error("certificate lookup failed: {0}")]
    Lookup(#[source] StoreError),

    #[error("failed to read certificate file: {0}")]
    Read(#[source] io::Error),

    #[error("certificate not found")]
    NotFound,
}

/// Result of a successful issue.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub id: CertificateId,
    pub verification_url: String,
    pub download_url: String,
    pub qr_data_url: String,
}

/// What startup reconciliation cleaned up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Temp files from writes that never committed.
    pub staged_removed: usize,
    /// Records whose PDF never reached its final name.
    pub records_dropped: usize,
}

/// Issues, serves and verifies certificates.
pub struct CertificateService {
    base_url: String,
    files: CertificateFiles,
    store: Arc<dyn CertificateStore>,
}

impl CertificateService {
    /// `base_url` prefixes every link handed out, e.g. `https://certs.example.com`.
    pub fn new(
        base_url: impl Into<String>,
        files: CertificateFiles,
        store: Arc<dyn CertificateStore>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            files,
            store,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn files(&self) -> &CertificateFiles {
        &self.files
    }

    pub fn store(&self) -> &dyn CertificateStore {
        self.store.as_ref()
    }

    /// `{base_url}/verify/{id}`, the text encoded in the QR code.
    pub fn verification_url(&self, id: &CertificateId) -> String {
        format!("{}/verify/{id}", self.base_url)
    }

    pub fn download_url(&self, id: &CertificateId) -> String {
        format!("{}/download/{id}", self.base_url)
    }

    /// Issues a certificate for `name` under a freshly minted id.
    pub async fn issue(&self, name: CertificateName) -> Result<IssuedCertificate, ServiceError> {
        self.issue_as(CertificateId::new(), name).await
    }

    pub(crate) async fn issue_as(
        &self,
        id: CertificateId,
        name: CertificateName,
    ) -> Result<IssuedCertificate, ServiceError> {
        let verification_url = self.verification_url(&id);
        let qr = QrImage::encode(&verification_url)?;
        let pdf = render_certificate(&name, &qr)?;

        let staged = self
            .files
            .stage(&id, &pdf)
            .await
            .map_err(ServiceError::Write)?;

        let record = CertificateRecord {
            id,
            name,
            qr: qr.data_url(),
            issued_at: Utc::now(),
        };
        let qr_data_url = record.qr.clone();
        self.store.put(record).await.map_err(ServiceError::Save)?;

        let path = match staged.commit().await {
            Ok(path) => path,
            Err(e) => {
                self.undo_insert(&id).await;
                return Err(ServiceError::Write(e));
            }
        };

        info!(
            certificate_id = %id,
            path = %path.display(),
            bytes = pdf.len(),
            "Certificate issued"
        );

        Ok(IssuedCertificate {
            id,
            download_url: self.download_url(&id),
            verification_url,
            qr_data_url,
        })
    }

    async fn undo_insert(&self, id: &CertificateId) {
        match self.store.remove(id).await {
            Ok(_) => debug!(certificate_id = %id, "Removed record after failed commit"),
            Err(e) => {
                warn!(certificate_id = %id, error = %e, "Failed to remove record after failed commit")
            }
        }
    }

    /// Looks up an issued certificate.
    pub async fn verify(&self, id: &CertificateId) -> Result<CertificateRecord, ServiceError> {
        self.store
            .get(id)
            .await
            .map_err(ServiceError::Lookup)?
            .ok_or(ServiceError::NotFound)
    }

    /// Returns the PDF bytes of an issued certificate.
    pub async fn download(&self, id: &CertificateId) -> Result<Vec<u8>, ServiceError> {
        self.verify(id).await?;
        self.files.read(id).await.map_err(ServiceError::Read)
    }

    /// Brings files and records back in line after an unclean shutdown.
    ///
    /// Creates the certificate directory if needed, deletes leftover temp
    /// files, and drops records whose PDF is missing.
    pub async fn reconcile(&self) -> Result<ReconcileReport, ServiceError> {
        self.files.ensure_dir().await.map_err(ServiceError::Write)?;

        let staged_removed = self
            .files
            .sweep_staged()
            .await
            .map_err(ServiceError::Write)?;

        let mut records_dropped = 0;
        for id in self.store.ids().await.map_err(ServiceError::Lookup)? {
            if self.files.exists(&id).await.map_err(ServiceError::Read)? {
                continue;
            }
            warn!(certificate_id = %id, "Dropping record with no certificate file");
            if self.store.remove(&id).await.map_err(ServiceError::Save)? {
                records_dropped += 1;
            }
        }

        info!(staged_removed, records_dropped, "Reconciled certificate storage");
        Ok(ReconcileReport {
            staged_removed,
            records_dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::PNG_DATA_URL_PREFIX;
    use crate::store::tests::BrokenStore;
    use crate::store::{MemoryStore, SqliteStore};

    const BASE_URL: &str = "http://localhost:4000";

    struct Fixture {
        _dir: tempfile::TempDir,
        service: CertificateService,
    }

    async fn fixture_with(store: Arc<dyn CertificateStore>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let files = CertificateFiles::new(dir.path().join("certificates"));
        let service = CertificateService::new(format!("{BASE_URL}/"), files, store);
        service.reconcile().await.unwrap();
        Fixture { _dir: dir, service }
    }

    async fn fixture() -> Fixture {
        fixture_with(Arc::new(MemoryStore::new())).await
    }

    fn name(raw: &str) -> CertificateName {
        CertificateName::parse(raw).unwrap()
    }

    fn dir_entries(service: &CertificateService) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(service.files().dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_issue_then_verify_and_download() {
        let f = fixture().await;
        let issued = f.service.issue(name("Jane Doe")).await.unwrap();

        assert_eq!(issued.verification_url, format!("{BASE_URL}/verify/{}", issued.id));
        assert_eq!(issued.download_url, format!("{BASE_URL}/download/{}", issued.id));
        assert!(issued.qr_data_url.starts_with(PNG_DATA_URL_PREFIX));

        let record = f.service.verify(&issued.id).await.unwrap();
        assert_eq!(record.name.as_str(), "Jane Doe");
        assert_eq!(record.qr, issued.qr_data_url);

        let pdf = f.service.download(&issued.id).await.unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
        assert_eq!(dir_entries(&f.service), vec![format!("{}.pdf", issued.id)]);
    }

    #[tokio::test]
    async fn test_qr_encodes_verification_url() {
        let f = fixture().await;
        let issued = f.service.issue(name("Jane Doe")).await.unwrap();

        let decoded = crate::render::qr_tests::decode_data_url(&issued.qr_data_url);
        assert_eq!(decoded, f.service.verification_url(&issued.id));
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let f = fixture().await;
        let id = CertificateId::new();
        assert!(matches!(f.service.verify(&id).await, Err(ServiceError::NotFound)));
        assert!(matches!(f.service.download(&id).await, Err(ServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_verify_is_idempotent() {
        let f = fixture().await;
        let issued = f.service.issue(name("Jane Doe")).await.unwrap();
        let first = f.service.verify(&issued.id).await.unwrap();
        let second = f.service.verify(&issued.id).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_colliding_id_does_not_overwrite() {
        let f = fixture().await;
        let id = CertificateId::new();

        f.service.issue_as(id, name("Jane Doe")).await.unwrap();
        let original_pdf = f.service.download(&id).await.unwrap();

        let err = f.service.issue_as(id, name("Mallory")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Save(StoreError::Duplicate(dup)) if dup == id));

        assert_eq!(f.service.verify(&id).await.unwrap().name.as_str(), "Jane Doe");
        assert_eq!(f.service.download(&id).await.unwrap(), original_pdf);
        assert_eq!(dir_entries(&f.service), vec![format!("{id}.pdf")]);
    }

    #[tokio::test]
    async fn test_store_failure_leaves_no_file() {
        let f = fixture_with(Arc::new(BrokenStore)).await;
        let err = f.service.issue(name("Jane Doe")).await.unwrap_err();

        assert!(matches!(err, ServiceError::Save(_)));
        assert!(dir_entries(&f.service).is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_leaves_no_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        // Directory never created.
        let files = CertificateFiles::new(dir.path().join("missing"));
        let service = CertificateService::new(BASE_URL, files, store.clone());

        let err = service.issue(name("Jane Doe")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Write(_)));
        assert!(store.ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_rename_removes_record() {
        let f = fixture().await;
        let id = CertificateId::new();
        // A stray file from an earlier volatile run blocks the final name.
        std::fs::write(f.service.files().path_for(&id), b"stray").unwrap();

        let err = f.service.issue_as(id, name("Jane Doe")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Write(e) if e.kind() == io::ErrorKind::AlreadyExists));
        assert!(matches!(f.service.verify(&id).await, Err(ServiceError::NotFound)));
        assert_eq!(dir_entries(&f.service), vec![format!("{id}.pdf")]);
    }

    #[tokio::test]
    async fn test_reconcile_cleans_up_after_crash() {
        let dir = tempfile::tempdir().unwrap();
        let files = CertificateFiles::new(dir.path().join("certificates"));
        let store = Arc::new(SqliteStore::open(dir.path().join("certify.db")).unwrap());
        let service = CertificateService::new(BASE_URL, files.clone(), store.clone());
        service.reconcile().await.unwrap();

        let kept = service.issue(name("Jane Doe")).await.unwrap();

        // Crash after the insert but before the rename.
        let lost = CertificateId::new();
        store
            .put(CertificateRecord {
                id: lost,
                name: name("John Roe"),
                qr: String::new(),
                issued_at: Utc::now(),
            })
            .await
            .unwrap();
        std::mem::forget(files.stage(&lost, b"partial").await.unwrap());

        let report = service.reconcile().await.unwrap();
        assert_eq!(
            report,
            ReconcileReport {
                staged_removed: 1,
                records_dropped: 1,
            }
        );
        assert!(service.verify(&kept.id).await.is_ok());
        assert!(matches!(service.verify(&lost).await, Err(ServiceError::NotFound)));
        assert_eq!(dir_entries(&service), vec![format!("{}.pdf", kept.id)]);
    }
}
