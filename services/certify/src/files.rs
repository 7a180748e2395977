//! Certificate file storage.
//!
//! Every issued certificate lives at `{dir}/{id}.pdf`. Writes go through a
//! [`StagedFile`]: bytes land in a hidden temp file next to the target, get
//! fsynced, and only [`StagedFile::commit`] moves them into place. A staged
//! file that is dropped without being committed deletes its temp file, so a
//! failed write never leaves a partial PDF under the final name.

use std::io;
use std::path::{Path, PathBuf};

use certify_id::{CertificateId, Ulid};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const PDF_EXTENSION: &str = "pdf";
const STAGED_SUFFIX: &str = ".pdf.tmp";

/// Directory of issued certificate PDFs.
#[derive(Debug, Clone)]
pub struct CertificateFiles {
    dir: PathBuf,
}

impl CertificateFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the directory (and parents) if missing.
    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Final location of the PDF for `id`.
    pub fn path_for(&self, id: &CertificateId) -> PathBuf {
        self.dir.join(format!("{id}.{PDF_EXTENSION}"))
    }

    /// Writes `bytes` to a fresh temp file and fsyncs it.
    pub async fn stage(&self, id: &CertificateId, bytes: &[u8]) -> io::Result<StagedFile> {
        let staged = StagedFile {
            temp: self.dir.join(format!(".{id}.{}{STAGED_SUFFIX}", Ulid::new())),
            target: self.path_for(id),
            committed: false,
        };

        let mut file = tokio::fs::File::create(&staged.temp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;

        debug!(temp = %staged.temp.display(), len = bytes.len(), "Staged certificate file");
        Ok(staged)
    }

    pub async fn read(&self, id: &CertificateId) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.path_for(id)).await
    }

    pub async fn exists(&self, id: &CertificateId) -> io::Result<bool> {
        tokio::fs::try_exists(self.path_for(id)).await
    }

    /// Deletes temp files left behind by writes that never committed.
    pub async fn sweep_staged(&self) -> io::Result<usize> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') && name.ends_with(STAGED_SUFFIX) {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Fails unless a file can actually be created in the directory.
    ///
    /// Writes and discards an empty staged file, so permission bits, ownership
    /// and read-only mounts are all accounted for. The temp name matches the
    /// staged pattern and is swept at startup if the process dies mid-check.
    pub async fn check_writable(&self) -> io::Result<()> {
        let metadata = tokio::fs::metadata(&self.dir).await?;
        if !metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", self.dir.display()),
            ));
        }

        let check = self.dir.join(format!(".writable.{}{STAGED_SUFFIX}", Ulid::new()));
        tokio::fs::File::create(&check).await?;
        tokio::fs::remove_file(&check).await
    }
}

/// A fully written temp file waiting to be renamed into place.
#[derive(Debug)]
pub struct StagedFile {
    temp: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedFile {
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Moves the temp file to its final name.
    ///
    /// The target is created with a hard link, which fails with
    /// `AlreadyExists` instead of replacing a certificate that is already in
    /// place. The temp name is unlinked afterwards.
    pub async fn commit(mut self) -> io::Result<PathBuf> {
        tokio::fs::hard_link(&self.temp, &self.target).await?;
        self.committed = true;

        if let Err(e) = tokio::fs::remove_file(&self.temp).await {
            // Swept at the next startup.
            warn!(error = %e, temp = %self.temp.display(), "Failed to unlink committed temp file");
        }

        if let Some(parent) = self.target.parent() {
            // The file is in place either way; a failed directory sync only
            // weakens durability of the rename.
            if let Err(e) = sync_dir(parent).await {
                warn!(error = %e, dir = %parent.display(), "Failed to sync certificate directory");
            }
        }

        Ok(self.target.clone())
    }
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.temp) {
            Ok(()) => debug!(temp = %self.temp.display(), "Discarded staged certificate file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(error = %e, temp = %self.temp.display(), "Failed to discard staged certificate file")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn files() -> (tempfile::TempDir, CertificateFiles) {
        let dir = tempfile::tempdir().unwrap();
        let files = CertificateFiles::new(dir.path().join("certificates"));
        files.ensure_dir().await.unwrap();
        (dir, files)
    }

    fn dir_entries(files: &CertificateFiles) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(files.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_stage_then_commit() {
        let (_dir, files) = files().await;
        let id = CertificateId::new();

        let staged = files.stage(&id, b"%PDF-1.5 test").await.unwrap();
        assert!(!files.exists(&id).await.unwrap());
        assert!(staged.temp_path().exists());

        let path = staged.commit().await.unwrap();
        assert_eq!(path, files.path_for(&id));
        assert_eq!(files.read(&id).await.unwrap(), b"%PDF-1.5 test");
        assert_eq!(dir_entries(&files), vec![format!("{id}.pdf")]);
    }

    #[tokio::test]
    async fn test_dropped_stage_leaves_nothing() {
        let (_dir, files) = files().await;
        let id = CertificateId::new();

        let staged = files.stage(&id, b"partial").await.unwrap();
        drop(staged);

        assert!(dir_entries(&files).is_empty());
        assert!(!files.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_refuses_to_overwrite() {
        let (_dir, files) = files().await;
        let id = CertificateId::new();

        files.stage(&id, b"first").await.unwrap().commit().await.unwrap();
        let err = files
            .stage(&id, b"second")
            .await
            .unwrap()
            .commit()
            .await
            .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(files.read(&id).await.unwrap(), b"first");
        assert_eq!(dir_entries(&files), vec![format!("{id}.pdf")]);
    }

    #[tokio::test]
    async fn test_stage_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let files = CertificateFiles::new(dir.path().join("missing"));
        let err = files.stage(&CertificateId::new(), b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_staged_files() {
        let (_dir, files) = files().await;
        let kept = CertificateId::new();
        files.stage(&kept, b"ok").await.unwrap().commit().await.unwrap();

        // Simulate a crash: leak the staged file without running Drop.
        let leaked = files.stage(&CertificateId::new(), b"partial").await.unwrap();
        std::mem::forget(leaked);

        assert_eq!(files.sweep_staged().await.unwrap(), 1);
        assert_eq!(dir_entries(&files), vec![format!("{kept}.pdf")]);
    }

    #[tokio::test]
    async fn test_check_writable() {
        let (dir, files) = files().await;
        files.check_writable().await.unwrap();
        assert!(dir_entries(&files).is_empty());

        let missing = CertificateFiles::new(dir.path().join("nope"));
        assert!(missing.check_writable().await.is_err());

        let plain = dir.path().join("plain-file");
        std::fs::write(&plain, b"x").unwrap();
        let not_dir = CertificateFiles::new(plain);
        assert!(not_dir.check_writable().await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_check_writable_fails_on_read_only_dir() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, files) = files().await;
        std::fs::set_permissions(files.dir(), std::fs::Permissions::from_mode(0o555)).unwrap();

        // Root ignores mode bits; only assert when the OS enforces them.
        let enforced = std::fs::write(files.dir().join("x"), b"x").is_err();
        if enforced {
            assert!(files.check_writable().await.is_err());
        } else {
            files.check_writable().await.unwrap();
        }
        std::fs::set_permissions(files.dir(), std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[tokio::test]
    async fn test_commit_does_not_replace_file_created_after_staging() {
        let (_dir, files) = files().await;
        let id = CertificateId::new();

        let staged = files.stage(&id, b"second").await.unwrap();
        std::fs::write(files.path_for(&id), b"first").unwrap();

        let err = staged.commit().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(files.read(&id).await.unwrap(), b"first");
        assert_eq!(dir_entries(&files), vec![format!("{id}.pdf")]);
    }
}
