//! Local disk storage for uploads.
//!
//! Layout under `storage.upload_dir`:
//!
//! - `public/`: catalogue and site images, served statically at `/uploads`
//! - `prescriptions/`: prescription scans, only reachable through the
//!   authenticated `/prescriptions/{id}/file` route
//!
//! Stored names are generated ids; the client's filename is kept only as
//! metadata.

use std::path::{Component, Path, PathBuf};

use axum::body::Bytes;
use axum::extract::multipart::Field;
use rxdesk_common::{
    config::StorageConfig,
    error::{RxError, RxResult},
    ids,
};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Public,
    Prescriptions,
}

impl Bucket {
    fn dir(self) -> &'static str {
        match self {
            Bucket::Public => "public",
            Bucket::Prescriptions => "prescriptions",
        }
    }

    /// Accepted content types and the extension each is stored under.
    fn extension_for(self, content_type: &str) -> Option<&'static str> {
        match (self, content_type) {
            (_, "image/jpeg") => Some("jpg"),
            (_, "image/png") => Some("png"),
            (_, "image/webp") => Some("webp"),
            (Bucket::Public, "image/gif") => Some("gif"),
            (Bucket::Prescriptions, "image/heic") => Some("heic"),
            (Bucket::Prescriptions, "application/pdf") => Some("pdf"),
            _ => None,
        }
    }
}

/// A file read from a multipart field, not yet written anywhere.
#[derive(Debug)]
pub struct Upload {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Path relative to the upload root, e.g. `public/0190....png`
    pub path: String,
    /// Generated file name (last path segment)
    pub name: String,
    pub original_filename: String,
    pub content_type: String,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    max_bytes: usize,
}

impl LocalStorage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: PathBuf::from(&config.upload_dir),
            max_bytes: config.max_upload_bytes,
        }
    }

    /// Create the bucket directories. Called once at startup.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        for bucket in [Bucket::Public, Bucket::Prescriptions] {
            tokio::fs::create_dir_all(self.root.join(bucket.dir())).await?;
        }
        Ok(())
    }

    /// Directory served at `/uploads`.
    pub fn public_dir(&self) -> PathBuf {
        self.root.join(Bucket::Public.dir())
    }

    /// Drain a multipart file field, enforcing the size limit.
    pub async fn read_field(&self, field: Field<'_>) -> RxResult<Upload> {
        let filename = sanitize_filename(field.file_name().unwrap_or("upload"));
        let content_type = resolve_content_type(field.content_type(), &filename);
        let data = field
            .bytes()
            .await
            .map_err(|e| RxError::validation(format!("Failed to read file: {e}")))?;

        if data.len() > self.max_bytes {
            return Err(RxError::validation(format!(
                "File too large: {} bytes (max {} bytes)",
                data.len(),
                self.max_bytes
            )));
        }
        if data.is_empty() {
            return Err(RxError::validation("File is empty"));
        }

        Ok(Upload {
            filename,
            content_type,
            data,
        })
    }

    pub async fn save(&self, bucket: Bucket, upload: &Upload) -> RxResult<StoredFile> {
        let ext = bucket.extension_for(&upload.content_type).ok_or_else(|| {
            RxError::validation(format!("File type '{}' is not allowed", upload.content_type))
        })?;

        let name = format!("{}.{ext}", ids::generate_id());
        let relative = format!("{}/{name}", bucket.dir());
        let full = self.root.join(&relative);

        tokio::fs::write(&full, &upload.data)
            .await
            .map_err(|e| RxError::Internal(anyhow::anyhow!("write {}: {e}", full.display())))?;

        debug!(path = %relative, size = upload.data.len(), "Stored upload");

        Ok(StoredFile {
            path: relative,
            name,
            original_filename: upload.filename.clone(),
            content_type: upload.content_type.clone(),
            size: upload.data.len(),
        })
    }

    /// Open a stored file for streaming. Returns the handle and its length.
    pub async fn open(&self, relative: &str) -> RxResult<(tokio::fs::File, u64)> {
        let full = self.resolve(relative)?;
        let file = match tokio::fs::File::open(&full).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(RxError::not_found("File")),
            Err(e) => return Err(RxError::Internal(anyhow::anyhow!("open {}: {e}", full.display()))),
        };
        let len = file
            .metadata()
            .await
            .map_err(|e| RxError::Internal(anyhow::anyhow!("stat {}: {e}", full.display())))?
            .len();
        Ok((file, len))
    }

    /// Remove a stored file. Missing files are not an error.
    pub async fn delete(&self, relative: &str) {
        let Ok(full) = self.resolve(relative) else {
            warn!(path = relative, "Refusing to delete path outside upload root");
            return;
        };
        if let Err(e) = tokio::fs::remove_file(&full).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = relative, "Failed to delete upload: {e}");
            }
        }
    }

    fn resolve(&self, relative: &str) -> RxResult<PathBuf> {
        let path = Path::new(relative);
        if !path.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(RxError::not_found("File"));
        }
        Ok(self.root.join(path))
    }
}

/// Absolute URL of a file in the public bucket.
pub fn public_url(base: &str, name: &str) -> String {
    format!("{}/uploads/{name}", base.trim_end_matches('/'))
}

/// Storage path behind a URL produced by [`public_url`], if it is one.
pub fn public_path_from_url(base: &str, url: &str) -> Option<String> {
    let prefix = format!("{}/uploads/", base.trim_end_matches('/'));
    let name = url.strip_prefix(&prefix)?;
    (!name.is_empty() && !name.contains('/')).then(|| format!("{}/{name}", Bucket::Public.dir()))
}

/// Strip path separators and control characters from a client filename.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .take(255)
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Use the declared content type unless it is missing or generic, in which
/// case guess from the filename extension.
fn resolve_content_type(declared: Option<&str>, filename: &str) -> String {
    match declared.map(str::trim) {
        Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_ascii_lowercase(),
        _ => mime_guess::from_path(filename)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn storage(dir: &Path) -> LocalStorage {
        LocalStorage {
            root: dir.to_path_buf(),
            max_bytes: 1024,
        }
    }

    fn temp_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("rxdesk-storage-{name}-{}", ids::generate_id()))
    }

    fn upload(content_type: &str, data: &'static [u8]) -> Upload {
        Upload {
            filename: "scan.pdf".into(),
            content_type: content_type.into(),
            data: Bytes::from_static(data),
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\rx.png"), "rx.png");
        assert_eq!(sanitize_filename("...hidden"), "hidden");
        assert_eq!(sanitize_filename("a\0b\nc.jpg"), "abc.jpg");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[test]
    fn test_public_urls() {
        let url = public_url("https://rx.example.com/", "abc.png");
        assert_eq!(url, "https://rx.example.com/uploads/abc.png");
        assert_eq!(
            public_path_from_url("https://rx.example.com", &url).as_deref(),
            Some("public/abc.png")
        );
        assert_eq!(public_path_from_url("https://rx.example.com", "https://cdn.example.com/x.png"), None);
        assert_eq!(
            public_path_from_url("https://rx.example.com", "https://rx.example.com/uploads/a/../b"),
            None
        );
    }

    #[test]
    fn test_content_type_resolution() {
        assert_eq!(resolve_content_type(Some("IMAGE/PNG"), "x.png"), "image/png");
        assert_eq!(resolve_content_type(None, "scan.pdf"), "application/pdf");
        assert_eq!(
            resolve_content_type(Some("application/octet-stream"), "photo.jpg"),
            "image/jpeg"
        );
        assert_eq!(resolve_content_type(None, "noext"), "application/octet-stream");
    }

    #[test]
    fn test_bucket_type_rules() {
        assert_eq!(Bucket::Prescriptions.extension_for("application/pdf"), Some("pdf"));
        assert_eq!(Bucket::Prescriptions.extension_for("image/heic"), Some("heic"));
        assert_eq!(Bucket::Public.extension_for("application/pdf"), None);
        assert_eq!(Bucket::Public.extension_for("image/gif"), Some("gif"));
        assert_eq!(Bucket::Public.extension_for("application/x-msdownload"), None);
        assert_eq!(Bucket::Prescriptions.extension_for("image/svg+xml"), None);
    }

    #[tokio::test]
    async fn test_save_read_delete() {
        let root = temp_root("roundtrip");
        let storage = storage(&root);
        storage.ensure_dirs().await.unwrap();

        let stored = storage
            .save(Bucket::Prescriptions, &upload("application/pdf", b"%PDF-1.4"))
            .await
            .unwrap();
        assert!(stored.path.starts_with("prescriptions/"));
        assert!(stored.name.ends_with(".pdf"));
        assert_eq!(stored.original_filename, "scan.pdf");

        let (mut file, len) = storage.open(&stored.path).await.unwrap();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await.unwrap();
        assert_eq!(len, 8);
        assert_eq!(contents, b"%PDF-1.4");

        storage.delete(&stored.path).await;
        assert!(matches!(
            storage.open(&stored.path).await,
            Err(RxError::NotFound { .. })
        ));

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_opened_file_streams_as_a_body() {
        let root = temp_root("stream");
        let storage = storage(&root);
        storage.ensure_dirs().await.unwrap();
        let stored = storage
            .save(Bucket::Prescriptions, &upload("image/png", b"\x89PNG\r\n"))
            .await
            .unwrap();

        let (file, len) = storage.open(&stored.path).await.unwrap();
        let body = axum::body::Body::from_stream(tokio_util::io::ReaderStream::new(file));
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        assert_eq!(bytes.len() as u64, len);
        assert_eq!(&bytes[..], b"\x89PNG\r\n");

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_rejects_disallowed_type_and_traversal() {
        let root = temp_root("reject");
        let storage = storage(&root);
        storage.ensure_dirs().await.unwrap();

        let err = storage
            .save(Bucket::Public, &upload("application/x-msdownload", b"MZ"))
            .await
            .unwrap_err();
        assert!(matches!(err, RxError::Validation { .. }));

        assert!(storage.open("../secrets.txt").await.is_err());
        assert!(storage.open("/etc/passwd").await.is_err());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
