use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stream_clip::handoff::{
    new_relay_id, DirectStore, FileStorage, LocalRelay, NatsRelay, RelayInbox, RelayStore,
};
use stream_clip::{
    create_router, AppState, ChannelViewerLauncher, Config, DeliveryMode, DeliveryOutcome,
    FileDownloader, FileVideoSource, HandoffStore, HandoffStrategy, MemoryBlobRegistry, Page,
    PageLocation, PassthroughEncoderFactory, PlatformCapabilities, RecordController,
    RelayTransport, ResultDelivery, SessionEnv, VideoSource,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

#[derive(Parser)]
#[command(name = "stream-clip", version, about = "Record clips of a live stream")]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(long, default_value = "config/stream-clip")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a clip, replaying a media file as the live player
    Record(RecordArgs),
}

#[derive(clap::Args)]
struct RecordArgs {
    /// Encoded media file standing in for the live video
    #[arg(long)]
    input: PathBuf,

    #[arg(long)]
    streamer: Option<String>,

    #[arg(long)]
    title: Option<String>,

    /// Stop from the record control after this many seconds
    #[arg(long, default_value_t = 5)]
    seconds: u64,

    /// Navigate the page away after this many seconds instead
    #[arg(long)]
    navigate_after: Option<u64>,

    /// Download immediately, overriding `delivery.fast_rec`
    #[arg(long)]
    fast: bool,

    /// Browser the capability probe runs against
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,
}

/// A page whose player is a replayed file
struct ReplayPage {
    source: Arc<FileVideoSource>,
    streamer: Option<String>,
    title: Option<String>,
    location: Mutex<String>,
}

impl ReplayPage {
    fn navigate(&self, to: &str) {
        if let Ok(mut location) = self.location.lock() {
            *location = to.to_string();
        }
    }
}

impl PageLocation for ReplayPage {
    fn href(&self) -> String {
        self.location
            .lock()
            .map(|location| location.clone())
            .unwrap_or_default()
    }
}

impl Page for ReplayPage {
    fn video_source(&self) -> Option<Arc<dyn VideoSource>> {
        Some(self.source.clone())
    }

    fn streamer_name(&self) -> Option<String> {
        self.streamer.clone()
    }

    fn stream_title(&self) -> Option<String> {
        self.title.clone()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Record(args) => record(cfg, args).await,
    }
}

async fn record(cfg: Config, args: RecordArgs) -> Result<()> {
    let page_blobs = Arc::new(MemoryBlobRegistry::new("page"));

    let strategy = PlatformCapabilities::probe(&args.user_agent).select(cfg.handoff.strategy);
    info!("Handoff strategy: {:?}", strategy);

    let mut relay: Option<Arc<dyn RelayTransport>> = None;
    let store: Arc<dyn HandoffStore> = match strategy {
        HandoffStrategy::Direct => Arc::new(DirectStore::new(
            Arc::new(FileStorage::new(&cfg.handoff.storage_path)),
            page_blobs.clone(),
        )),
        HandoffStrategy::Relay => {
            let transport: Arc<dyn RelayTransport> = match &cfg.handoff.nats_url {
                Some(url) => {
                    // One subject per run so concurrent recorders never share a relay
                    let relay_id = new_relay_id();
                    info!("Relay subject {}", NatsRelay::subject_for(&relay_id));
                    Arc::new(NatsRelay::connect(url, &relay_id).await?)
                }
                None => Arc::new(LocalRelay::new()),
            };
            relay = Some(transport.clone());
            Arc::new(RelayStore::new(transport))
        }
    };

    // The viewer subscribes up front: NATS does not keep messages for it
    let mut inbox = match &relay {
        Some(transport) => Some(RelayInbox::open(transport.as_ref()).await?),
        None => None,
    };

    let mode = if args.fast {
        DeliveryMode::Immediate
    } else {
        DeliveryMode::from_fast_rec(cfg.delivery.fast_rec)
    };

    let downloader = Arc::new(FileDownloader::new(&cfg.delivery.output_dir));
    let (launcher, mut viewer_requests) = ChannelViewerLauncher::new();
    let delivery = Arc::new(
        ResultDelivery::new(mode, page_blobs.clone(), downloader.clone(), Arc::new(launcher.clone()))
            .with_resolver(cfg.recording.duration_resolver())
            .with_mime_type(cfg.recording.mime_type.clone()),
    );

    let page = Arc::new(ReplayPage {
        source: Arc::new(FileVideoSource::new(&args.input).muted()),
        streamer: args.streamer.clone(),
        title: args.title.clone(),
        location: Mutex::new(format!("https://live.example/{}", args.streamer.as_deref().unwrap_or("live"))),
    });

    let env = SessionEnv::new(
        cfg.recording.session_config(),
        Arc::new(PassthroughEncoderFactory),
        store.clone(),
    );
    let controller = RecordController::new(page.clone(), env, delivery.clone());
    let mut reports = controller.reports();

    let session = controller.start().await.context("Failed to start recording")?;
    info!("Recording {} ({:?})", session.id(), controller.control_state());

    match args.navigate_after {
        Some(secs) => {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            page.navigate("https://live.example/elsewhere");
        }
        None => {
            tokio::time::sleep(Duration::from_secs(args.seconds)).await;
            controller.stop().await;
        }
    }

    while reports.borrow_and_update().is_none() {
        reports.changed().await.context("Controller went away")?;
    }
    let report = reports.borrow().clone().context("No stop report")?;
    info!(
        "Stopped ({:?}), delivery: {:?}",
        report.outcome.reason, report.delivery
    );

    if !matches!(report.delivery, Some(DeliveryOutcome::ViewerOpened)) {
        return Ok(());
    }

    // Viewer context
    if viewer_requests.recv().await.is_none() {
        warn!("Viewer request lost");
        return Ok(());
    }

    let viewer = match inbox.as_mut() {
        Some(inbox) => {
            // Separate context: its own object URL table
            let viewer_delivery = ResultDelivery::new(
                DeliveryMode::Viewer,
                Arc::new(MemoryBlobRegistry::new("viewer")),
                downloader.clone(),
                Arc::new(launcher),
            )
            .with_resolver(cfg.recording.duration_resolver())
            .with_mime_type(cfg.recording.mime_type.clone());

            let record = inbox.wait().await?;
            viewer_delivery.open_viewer(record).await?
        }
        None => delivery.open_viewer(store.load().await?).await?,
    };

    let state = AppState::new();
    state.show(viewer).await;

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Viewer at http://{}/record (Ctrl-C to close)", addr);

    axum::serve(listener, create_router(state.clone()))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    state.close().await;
    Ok(())
}
