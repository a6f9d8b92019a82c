use actix_web::{web, App, HttpServer};
use aieyes_surveillance::alerts::{AlertDispatcher, WebhookNotifier};
use aieyes_surveillance::api::{self, AppState};
use aieyes_surveillance::camera::discovery::{resolve_cameras, CameraDiscovery, HttpProbe};
use aieyes_surveillance::camera::worker::WorkerContext;
use aieyes_surveillance::camera::{HttpSourceFactory, SourceFactory};
use aieyes_surveillance::config::{CameraConfig, SurveillanceConfig};
use aieyes_surveillance::detection::HttpDetectionProvider;
use aieyes_surveillance::face::build_face_stage;
use aieyes_surveillance::metrics::Metrics;
use aieyes_surveillance::pipeline::{Annotator, FrameProcessingPipeline};
use aieyes_surveillance::storage::{self, CameraRecord, Storage};
use aieyes_surveillance::surveillance::{ActivityLog, ResultRegistry, SurveillanceOrchestrator};
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::signal;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config/surveillance.yaml")]
    config: String,

    /// Log level, overrides logging.level from the config
    #[arg(short, long)]
    log_level: Option<String>,

    /// Print the default configuration as YAML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    if args.print_config {
        print!("{}", serde_yaml::to_string(&SurveillanceConfig::default())?);
        return Ok(());
    }

    // Load configuration
    let config = load_config(&args.config)?;

    // Initialize logging
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_logging(level, config.logging.enable_structured_logging)?;

    info!("Starting AI Eyes surveillance node {}", config.node_id);

    let handle = Handle::current();
    let metrics = Arc::new(Metrics::new()?);

    // Storage and alert dispatch
    let storage = storage::connect(&config.storage)
        .await
        .context("storage backend")?;
    let notifier = Arc::new(WebhookNotifier::new(
        config.alerts.notification_endpoints.clone(),
        config.alerts.recipients.clone(),
        Duration::from_millis(config.alerts.notification_timeout_ms),
    )?);
    let dispatcher = AlertDispatcher::start(&config.alerts, storage.clone(), notifier, metrics.clone());

    // Detection pipeline
    let detector = Arc::new(HttpDetectionProvider::new(&config.detector, handle.clone())?);
    let faces = build_face_stage(&config.faces, handle.clone())?;
    let annotator = Annotator::load(config.pipeline.font_path.as_deref());
    let pipeline = Arc::new(FrameProcessingPipeline::new(
        detector,
        faces,
        annotator,
        config.pipeline.clone(),
    ));

    // Cameras
    let factory: Arc<dyn SourceFactory> =
        Arc::new(HttpSourceFactory::new(handle.clone(), config.worker.read_timeout())?);
    let cameras = select_cameras(&config, factory.clone(), handle).await?;
    register_cameras(storage.as_ref(), &cameras).await;

    let ctx = WorkerContext {
        pipeline,
        registry: Arc::new(ResultRegistry::new()),
        activity_log: Arc::new(ActivityLog::new(config.alerts.log_capacity)),
        metrics,
        dispatcher,
        config: config.worker.clone(),
        loitering_frames: config.pipeline.loitering_frames(config.worker.frame_interval()),
    };
    info!(
        "Loitering fires after {} stationary analyzed frames",
        ctx.loitering_frames
    );
    let orchestrator = Arc::new(SurveillanceOrchestrator::new(cameras, factory, ctx));

    if config.worker.autostart {
        let orchestrator = orchestrator.clone();
        tokio::task::spawn_blocking(move || orchestrator.start_all());
    }

    // Start HTTP server
    let state = web::Data::new(AppState {
        orchestrator: orchestrator.clone(),
        storage,
        server: config.server.clone(),
    });
    let server = HttpServer::new(move || App::new().app_data(state.clone()).configure(api::configure))
        .bind((config.server.host.clone(), config.server.port))?
        .disable_signals()
        .run();
    let server_handle = server.handle();

    info!(
        "Surveillance dashboard API on http://{}:{}",
        config.server.host, config.server.port
    );

    tokio::pin!(server);
    tokio::select! {
        result = &mut server => result?,
        _ = wait_for_shutdown() => {
            let (_, result) = tokio::join!(server_handle.stop(true), &mut server);
            result?;
        }
    }

    info!("Stopping all cameras");
    let stopped = tokio::task::spawn_blocking(move || orchestrator.stop_all()).await?;
    info!("Shut down AI Eyes surveillance node ({} cameras stopped)", stopped);
    Ok(())
}

fn init_logging(level: &str, structured: bool) -> Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder().with_max_level(log_level);
    if structured {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    Ok(())
}

fn load_config(path: &str) -> Result<SurveillanceConfig> {
    use config::Config;

    let settings = Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(config::Environment::with_prefix("AIEYES").separator("__"))
        .build()?;

    let config: SurveillanceConfig = settings.try_deserialize()?;
    config.check().with_context(|| format!("invalid configuration in {}", path))?;
    Ok(config)
}

async fn select_cameras(
    config: &SurveillanceConfig,
    factory: Arc<dyn SourceFactory>,
    handle: Handle,
) -> Result<Vec<CameraConfig>> {
    if !config.discovery.enabled {
        return Ok(config.cameras.clone());
    }

    info!("Probing {} candidate cameras", config.discovery.candidates.len());
    let probe = Arc::new(HttpProbe::new(
        handle,
        Duration::from_millis(config.discovery.probe_timeout_ms),
    ));
    let discovery = CameraDiscovery::new(config.discovery.clone(), probe, factory);
    let discovered = tokio::task::spawn_blocking(move || discovery.discover()).await?;
    if discovered.is_empty() {
        warn!("No cameras discovered, using configured cameras");
    }
    Ok(resolve_cameras(&config.cameras, discovered))
}

async fn register_cameras(storage: &dyn Storage, cameras: &[CameraConfig]) {
    for camera in cameras {
        if let Err(e) = storage.upsert_camera(CameraRecord::from(camera)).await {
            error!(camera = %camera.id, "Failed to register camera: {}", e);
        }
    }
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
