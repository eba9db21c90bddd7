// soma_presets - BODY organ daemon
// Preset conversion and selection service accessible via Unix Domain Socket

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use soma_presets::organ::{Organ, PresetOrgan, Response, Stimulus};
use soma_presets::PresetConfig;

/// Upper bound on a single request frame
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "soma_presets", version, about = "SOMA Presets Daemon - XMP Preset Organ")]
struct Args {
    /// Unix socket path for UDS server
    #[arg(long, default_value = "/tmp/soma_presets.sock")]
    socket_path: String,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for persisted presets (overrides `store_dir` from the config)
    #[arg(long)]
    store_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("🎞️ Starting SOMA Presets Daemon");
    info!("   Socket: {}", args.socket_path);

    let mut config = match &args.config {
        Some(path) => PresetConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PresetConfig::default(),
    };
    if let Some(dir) = args.store_dir {
        config.store_dir = Some(dir);
    }
    config.validate().context("Invalid configuration")?;

    // Track startup time for health checks
    let start_time = std::time::Instant::now();

    let organ = Arc::new(PresetOrgan::open(config).context("Failed to open preset repository")?);

    info!(
        "   ✓ Preset repository ready ({} presets)",
        organ.repository().len()
    );

    // Remove old socket if exists
    let socket_path = PathBuf::from(&args.socket_path);
    if socket_path.exists() {
        std::fs::remove_file(&socket_path)
            .context("Failed to remove old socket")?;
    }

    // Create UDS listener
    let listener = UnixListener::bind(&socket_path)
        .context("Failed to bind Unix socket")?;

    info!("   ✓ Listening on {}", args.socket_path);

    // Serve requests
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let organ = Arc::clone(&organ);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, organ, start_time).await {
                        error!("Connection error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Accept error: {}", e);
            }
        }
    }
}

/// Handle a single UDS connection
async fn handle_connection(
    mut stream: UnixStream,
    organ: Arc<PresetOrgan>,
    start_time: std::time::Instant,
) -> Result<()> {
    let mut buffer = vec![0u8; 65536]; // 64KB buffer

    loop {
        // Read request length (4 bytes)
        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("Client disconnected");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_FRAME_BYTES {
            anyhow::bail!("Frame of {} bytes exceeds limit of {}", len, MAX_FRAME_BYTES);
        }
        if len > buffer.len() {
            buffer.resize(len, 0);
        }

        // Read request body
        stream.read_exact(&mut buffer[..len]).await?;

        // Parse stimulus
        let stimulus: Stimulus = serde_json::from_slice(&buffer[..len])
            .context("Failed to parse stimulus")?;

        debug!("Received: op={}", stimulus.op);

        // Handle health check specially (no organ processing needed)
        let response = if stimulus.op == "health" || stimulus.op == "health.check" {
            Response {
                ok: true,
                output: serde_json::json!({
                    "status": "healthy",
                    "organ": "soma_presets",
                    "version": organ.describe().version,
                    "uptime_ms": start_time.elapsed().as_millis() as u64,
                    "presets": organ.repository().len(),
                }),
                latency_ms: 0,
                cost: None,
            }
        } else {
            // Process via Organ trait
            match organ.stimulate(stimulus).await {
                Ok(resp) => resp,
                Err(e) => {
                    error!("Stimulate error: {:?}", e);
                    Response {
                        ok: false,
                        output: serde_json::json!({
                            "error": e.kind(),
                            "message": e.to_string(),
                        }),
                        latency_ms: 0,
                        cost: None,
                    }
                }
            }
        };

        // Serialize response
        let response_bytes = serde_json::to_vec(&response)
            .context("Failed to serialize response")?;

        // Write response length + body
        let len_bytes = (response_bytes.len() as u32).to_be_bytes();
        stream.write_all(&len_bytes).await?;
        stream.write_all(&response_bytes).await?;
        stream.flush().await?;

        debug!("Sent: ok={}, latency={}ms", response.ok, response.latency_ms);
    }
}
