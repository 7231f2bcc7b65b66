//! petmatchd - HTTP service for lost-pet visual identification.

mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use petmatch_ident::{BoxPolicy, Engine, EngineConfig, DEFAULT_FACE_WEIGHT};
use petmatch_vision::{RemoteDetector, RemoteEmbedder, VisionConfig};

/// HTTP service for lost-pet visual identification.
#[derive(Parser, Debug)]
#[command(name = "petmatchd")]
#[command(about = "HTTP service for lost-pet visual identification")]
struct Args {
    /// Listen address
    #[arg(long, default_value = "0.0.0.0:8000")]
    addr: String,

    /// Snapshot directory
    #[arg(long, default_value = "./index_data")]
    index_dir: PathBuf,

    /// Embedding dimension
    #[arg(long, default_value_t = 512)]
    dim: usize,

    /// Base URL of the embedding service
    #[arg(long, default_value = "http://127.0.0.1:8100")]
    embed_url: String,

    /// Base URL of the detection service
    #[arg(long, default_value = "http://127.0.0.1:8200")]
    detect_url: String,

    /// API key for the vision services, if they require one
    #[arg(long)]
    api_key: Option<String>,

    /// Run without a detector (explicit boxes or whole-image fallback only)
    #[arg(long)]
    no_detector: bool,

    /// Reject registrations that do not carry a valid explicit box
    #[arg(long)]
    require_box: bool,

    /// Default face blend weight for search
    #[arg(long, default_value_t = DEFAULT_FACE_WEIGHT)]
    face_weight: f32,

    /// Restore snapshots from the index directory at startup
    #[arg(long)]
    load_snapshot: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let mut embed_cfg = VisionConfig::new(&args.embed_url).with_dimension(args.dim);
    let mut detect_cfg = VisionConfig::new(&args.detect_url);
    if let Some(key) = &args.api_key {
        embed_cfg = embed_cfg.with_api_key(key);
        detect_cfg = detect_cfg.with_api_key(key);
    }

    let embedder = Arc::new(RemoteEmbedder::with_config(embed_cfg));
    let detector = if args.no_detector {
        None
    } else {
        Some(Arc::new(RemoteDetector::with_config(detect_cfg)) as Arc<dyn petmatch_vision::Detector>)
    };

    let register_policy = if args.require_box {
        BoxPolicy::explicit_only()
    } else {
        BoxPolicy {
            use_detector: !args.no_detector,
            ..BoxPolicy::default()
        }
    };
    let search_policy = BoxPolicy {
        use_detector: !args.no_detector,
        ..BoxPolicy::default()
    };

    let engine = Engine::new(
        embedder,
        detector,
        EngineConfig {
            dim: args.dim,
            face_weight: args.face_weight.clamp(0.0, 1.0),
            register_policy,
            search_policy,
            ..EngineConfig::default()
        },
    )?;

    if args.load_snapshot {
        for report in engine.load_snapshot(&args.index_dir) {
            match report.error() {
                Some(e) => warn!(
                    species = %report.species,
                    view = %report.view,
                    "snapshot not restored: {e}"
                ),
                None => info!(
                    species = %report.species,
                    view = %report.view,
                    outcome = ?report.outcome,
                    "snapshot"
                ),
            }
        }
    }

    info!(addr = %args.addr, dim = args.dim, "starting petmatchd");
    server::serve(&args.addr, engine, args.index_dir).await
}
