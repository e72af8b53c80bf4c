//! Object storage for request photos.
//!
//! An upload is started with [`MediaStore::begin_upload`] and runs on its
//! own task. The returned [`UploadTask`] yields [`UploadProgress`] reports
//! (monotonically non-decreasing, ending at 100%) and then the public URL of
//! the stored object, or the failure that aborted it.

use std::path::{Component, Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default number of bytes written between progress reports.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Invalid object path '{0}'")]
    InvalidPath(String),

    #[error("Upload failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload aborted: {0}")]
    Aborted(String),
}

/// Bytes written so far for one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    /// Completion percentage in `[0, 100]`. An empty upload is 100% done.
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        let ratio = self.bytes_transferred as f64 / self.total_bytes as f64;
        (ratio * 100.0).clamp(0.0, 100.0)
    }
}

/// Handle to an in-flight upload. Dropping it abandons the upload.
pub struct UploadTask {
    progress: mpsc::UnboundedReceiver<UploadProgress>,
    handle: Option<JoinHandle<Result<String, MediaError>>>,
}

impl UploadTask {
    /// Drain progress into `on_progress` and return the object URL.
    pub async fn run<F>(mut self, mut on_progress: F) -> Result<String, MediaError>
    where
        F: FnMut(UploadProgress) + Send,
    {
        while let Some(progress) = self.progress.recv().await {
            on_progress(progress);
        }
        match self.handle.take() {
            Some(handle) => handle
                .await
                .map_err(|e| MediaError::Aborted(e.to_string()))?,
            None => Err(MediaError::Aborted("upload already finished".into())),
        }
    }
}

impl Drop for UploadTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Binary object storage.
pub trait MediaStore: Send + Sync {
    /// Start writing `bytes` under `path`. Must be called inside a tokio runtime.
    fn begin_upload(&self, path: &str, bytes: Vec<u8>) -> Result<UploadTask, MediaError>;

    /// Public URL an object stored at `path` is served from.
    fn public_url(&self, path: &str) -> String;
}

/// Reject absolute paths, `..`, and anything outside `[A-Za-z0-9._/-]`.
pub fn validate_object_path(path: &str) -> Result<(), MediaError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-');
    let all_normal = Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if path.is_empty() || !path.chars().all(allowed) || !all_normal {
        return Err(MediaError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Stores objects as files under a root directory, served at
/// `{public_base_url}/media/{path}`.
pub struct LocalMediaStore {
    root: PathBuf,
    public_base_url: String,
    chunk_size: usize,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Override the progress granularity.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl MediaStore for LocalMediaStore {
    fn begin_upload(&self, path: &str, bytes: Vec<u8>) -> Result<UploadTask, MediaError> {
        validate_object_path(path)?;

        let target = self.root.join(path);
        let url = self.public_url(path);
        let chunk_size = self.chunk_size;
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            write_chunked(&target, &bytes, chunk_size, &tx).await?;
            Ok::<_, MediaError>(url)
        });

        Ok(UploadTask {
            progress: rx,
            handle: Some(handle),
        })
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/media/{path}", self.public_base_url.trim_end_matches('/'))
    }
}

/// Write to `{target}.part` chunk by chunk, then rename into place so a
/// half-written object is never visible under its final name.
async fn write_chunked(
    target: &Path,
    bytes: &[u8],
    chunk_size: usize,
    progress: &mpsc::UnboundedSender<UploadProgress>,
) -> Result<(), MediaError> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut partial = target.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let total_bytes = bytes.len() as u64;
    let report = |bytes_transferred: u64| {
        let _ = progress.send(UploadProgress {
            bytes_transferred,
            total_bytes,
        });
    };

    let result = async {
        let mut file = tokio::fs::File::create(&partial).await?;
        report(0);
        let mut written = 0u64;
        for chunk in bytes.chunks(chunk_size) {
            file.write_all(chunk).await?;
            written += chunk.len() as u64;
            report(written);
        }
        file.flush().await?;
        file.sync_all().await?;
        tokio::fs::rename(&partial, target).await
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&partial).await;
    }
    Ok(result?)
}
