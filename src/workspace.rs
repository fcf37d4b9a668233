//! Per-job filesystem workspace.
//!
//! Every render job gets a uniquely named directory that holds its fetched
//! inputs, intermediate segments and the final output. The directory is
//! removed when the [`Workspace`] is dropped, so cleanup runs on every exit
//! path of the job, including panics. No two jobs ever share a path.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

use crate::error::{RenderError, Result};

#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Allocate a fresh workspace directory under `root`.
    ///
    /// Disk or permission problems surface here, before any process is
    /// launched.
    pub fn create(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix("render_").tempdir_in(root)?;
        tracing::debug!(path = %dir.path().display(), "Created job workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a named artifact inside this workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Stream a remote input to `name` inside the workspace.
    ///
    /// The transfer is capped at `max_bytes`; anything larger is refused
    /// mid-stream. A partial file is left in the workspace and removed with
    /// it.
    pub async fn fetch_input(
        &self,
        client: &reqwest::Client,
        url: &str,
        name: &str,
        max_bytes: u64,
    ) -> Result<PathBuf> {
        let resp = client
            .get(url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| RenderError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if let Some(len) = resp.content_length() {
            if len > max_bytes {
                return Err(RenderError::Fetch {
                    url: url.to_string(),
                    reason: format!("input of {len} bytes exceeds the {max_bytes} byte limit"),
                });
            }
        }

        let dest = self.file(name);
        let mut file = tokio::fs::File::create(&dest).await?;
        let mut stream = resp.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| RenderError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            written += bytes.len() as u64;
            if written > max_bytes {
                return Err(RenderError::Fetch {
                    url: url.to_string(),
                    reason: format!("input exceeds the {max_bytes} byte limit"),
                });
            }
            file.write_all(&bytes).await?;
        }
        file.flush().await?;

        tracing::debug!(url, bytes = written, dest = %dest.display(), "Fetched input");
        Ok(dest)
    }

    /// Remove the workspace now and report failures.
    ///
    /// Dropping a `Workspace` cleans up as well; this variant exists so the
    /// normal path can log a removal error instead of swallowing it.
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(path = %path.display(), error = %e, "Workspace cleanup failed");
        }
    }
}
