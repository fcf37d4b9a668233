use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use renderd::config::ServiceConfig;
use renderd::http::{self, AppState};
use renderd::pool::RenderPool;
use renderd::render::Renderer;
use renderd::shutdown;

#[derive(Parser, Debug)]
#[command(name = "renderd")]
#[command(version)]
#[command(about = "HTTP rendering service that drives ffmpeg under a per-job deadline")]
struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Worker process count the deployment runs; capacity factor
    #[arg(long, default_value_t = 2)]
    workers: usize,

    /// Threads per worker; capacity factor
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Per-job wall-clock timeout in seconds, all ffmpeg steps included
    #[arg(long, default_value_t = 3600)]
    timeout_secs: u64,

    /// ffmpeg binary to invoke
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: String,

    /// Directory for per-job workspaces (defaults to the system temp dir)
    #[arg(long)]
    work_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Diagnostics go unbuffered to stderr for external capture
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let listen_addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    let mut config = ServiceConfig::new(listen_addr)
        .with_pool(args.workers, args.threads)
        .with_job_timeout(Duration::from_secs(args.timeout_secs));
    config.render.ffmpeg = args.ffmpeg;
    if let Some(dir) = args.work_dir {
        config.render.work_root = dir;
    }

    tracing::info!(
        addr = %config.listen_addr,
        capacity = config.pool_capacity(),
        job_timeout_secs = config.render.job_timeout.as_secs(),
        ffmpeg = %config.render.ffmpeg,
        work_root = %config.render.work_root.display(),
        "Starting renderd"
    );

    let renderer = Renderer::new(config.render.clone(), config.limits.clone())?;
    let state = AppState {
        pool: RenderPool::new(config.pool_capacity()),
        renderer: Arc::new(renderer),
        limits: config.limits.clone(),
    };

    let shutdown = shutdown::shutdown_token();
    http::serve(config.listen_addr, state, shutdown).await?;

    Ok(())
}
