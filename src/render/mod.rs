//! Render job orchestration.
//!
//! One render job flows through:
//! 1. Workspace materialization: fetch the audio track and every scene image
//!    into a per-job directory
//! 2. ffmpeg steps via the process runner, all bounded by the same absolute
//!    deadline fixed when the job is created
//! 3. Artifact handoff: the finished MP4 is read out and the workspace is
//!    removed
//!
//! The workspace is owned by the job and dropped on every path, so failed
//! and timed-out jobs leave nothing behind.

pub mod plan;
pub mod request;

pub use request::{RenderRequest, Scene, Size};

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::{LimitsConfig, RenderConfig};
use crate::error::{RenderError, Result};
use crate::runner::{ProcessOutcome, ProcessRunner};
use crate::workspace::Workspace;

/// A materialized render job: identity plus the fixed deadline every ffmpeg
/// step runs against. The deadline is never extended.
#[derive(Debug, Clone, Copy)]
pub struct Job {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub deadline: Instant,
}

impl Job {
    fn new(budget: std::time::Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            deadline: Instant::now() + budget,
        }
    }
}

/// The finished artifact with the facts a client may want to echo back.
#[derive(Debug)]
pub struct RenderedMedia {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub scenes: usize,
}

/// Drives ffmpeg through the segment/concat/mux plan for one request at a
/// time. Shared across handlers; each call owns its job-local state.
#[derive(Debug)]
pub struct Renderer {
    config: RenderConfig,
    limits: LimitsConfig,
    runner: ProcessRunner,
    client: reqwest::Client,
}

impl Renderer {
    pub fn new(config: RenderConfig, limits: LimitsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| RenderError::Internal(format!("http client: {e}")))?;
        let runner = ProcessRunner::new(config.kill_grace);
        Ok(Self {
            config,
            limits,
            runner,
            client,
        })
    }

    /// Render a validated request to a finished MP4.
    pub async fn render(&self, request: &RenderRequest) -> Result<RenderedMedia> {
        let job = Job::new(self.config.job_timeout);
        let started = Instant::now();
        tracing::info!(
            job_id = %job.id,
            created_at = %job.created_at,
            w = request.size.w,
            h = request.size.h,
            fps = request.fps,
            scenes = request.scenes.len(),
            "Render job started"
        );

        let workspace = Workspace::create(&self.config.work_root)?;
        let output = self.run_plan(&job, request, &workspace).await?;

        let bytes = tokio::fs::read(&output).await?;
        workspace.cleanup();

        tracing::info!(
            job_id = %job.id,
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Render job completed"
        );
        Ok(RenderedMedia {
            bytes,
            width: request.size.w,
            height: request.size.h,
            fps: request.fps,
            scenes: request.usable_scenes().count(),
        })
    }

    async fn run_plan(
        &self,
        job: &Job,
        request: &RenderRequest,
        workspace: &Workspace,
    ) -> Result<PathBuf> {
        let Size { w, h } = request.size;
        let max_fetch = self.limits.max_fetch_bytes;

        let audio = workspace
            .fetch_input(&self.client, &request.audio_url(), "audio.mp3", max_fetch)
            .await?;

        let mut segments = Vec::new();
        for (index, (image_url, seconds)) in request.usable_scenes().enumerate() {
            let n = index + 1;
            let image = workspace
                .fetch_input(
                    &self.client,
                    &image_url,
                    &format!("img_{n:02}.jpg"),
                    max_fetch,
                )
                .await?;

            let segment = workspace.file(&format!("seg_{n:02}.mp4"));
            let args = plan::segment_args(&image, &segment, w, h, request.fps, seconds);
            self.run_step(job, &format!("segment {n}"), &args, workspace.path())
                .await?;
            segments.push(segment);
        }
        if segments.is_empty() {
            // validate() guarantees at least one usable scene
            return Err(RenderError::Internal("no segments rendered".to_string()));
        }

        let list = workspace.file("list.txt");
        tokio::fs::write(&list, plan::concat_list(&segments)).await?;
        let concat = workspace.file("concat.mp4");
        self.run_step(job, "concat", &plan::concat_args(&list, &concat), workspace.path())
            .await?;

        let output = workspace.file(&format!("{}.mp4", job.id.simple()));
        self.run_step(
            job,
            "mux",
            &plan::mux_args(&concat, &audio, &output),
            workspace.path(),
        )
        .await?;

        Ok(output)
    }

    /// Run one ffmpeg invocation against the job deadline and fold its
    /// outcome into the error taxonomy.
    async fn run_step(
        &self,
        job: &Job,
        step: &str,
        args: &[String],
        working_dir: &Path,
    ) -> Result<()> {
        tracing::debug!(job_id = %job.id, step, "Running ffmpeg step");
        match self
            .runner
            .run(&self.config.ffmpeg, args, working_dir, job.deadline)
            .await
        {
            ProcessOutcome::Succeeded { .. } => Ok(()),
            ProcessOutcome::FailedExitCode { code, stderr } => {
                tracing::info!(job_id = %job.id, step, code, "ffmpeg step failed");
                Err(RenderError::ToolFailed { code, stderr })
            }
            ProcessOutcome::TimedOut => {
                tracing::warn!(job_id = %job.id, step, "Job deadline exceeded");
                Err(RenderError::Timeout(self.config.job_timeout.as_secs()))
            }
            ProcessOutcome::LaunchError { reason } => Err(RenderError::Launch {
                program: self.config.ffmpeg.clone(),
                reason,
            }),
        }
    }
}
