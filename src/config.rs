use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Limits applied to a request before any resources are allocated.
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    /// Maximum accepted JSON body size in bytes
    pub max_body_bytes: usize,
    /// Maximum number of scenes in one render request
    pub max_scenes: usize,
    /// Maximum size of a single fetched input (audio or image)
    pub max_fetch_bytes: u64,
    /// Maximum output dimension (applies to both width and height)
    pub max_dimension: u32,
    /// Maximum frames per second
    pub max_fps: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 1024 * 1024,
            max_scenes: 64,
            max_fetch_bytes: 512 * 1024 * 1024,
            max_dimension: 4096,
            max_fps: 120,
        }
    }
}

/// Configuration for the ffmpeg render pipeline.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Name or path of the ffmpeg binary
    pub ffmpeg: String,
    /// Directory under which per-job workspaces are created
    pub work_root: PathBuf,
    /// Wall-clock budget for one render job, all ffmpeg steps included
    pub job_timeout: Duration,
    /// How long to wait for a killed child to be reaped
    pub kill_grace: Duration,
    /// Timeout for fetching one remote input
    pub fetch_timeout: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            work_root: std::env::temp_dir(),
            job_timeout: Duration::from_secs(3600),
            kill_grace: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen_addr: SocketAddr,
    /// Worker process count the deployment would run; capacity factor
    pub workers: usize,
    /// Threads per worker; capacity factor
    pub threads_per_worker: usize,
    pub limits: LimitsConfig,
    pub render: RenderConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            // SAFETY: This is a hardcoded valid address that will always parse
            listen_addr: "0.0.0.0:8080"
                .parse()
                .expect("default listen address is valid"),
            workers: 2,
            threads_per_worker: 4,
            limits: LimitsConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_pool(mut self, workers: usize, threads_per_worker: usize) -> Self {
        self.workers = workers;
        self.threads_per_worker = threads_per_worker;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.render.job_timeout = timeout;
        self
    }

    /// Total number of jobs that may render concurrently.
    pub fn pool_capacity(&self) -> usize {
        self.workers.max(1) * self.threads_per_worker.max(1)
    }
}
