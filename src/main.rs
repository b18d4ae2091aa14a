//! PTZ Tracker
//!
//! Main entry point: fleet daemon plus one-shot camera utilities.

use anyhow::Context;
use clap::{Parser, Subcommand};
use ptz_tracker::{
    camera_driver::DriverRegistry,
    camera_fleet::{build_aim_controller, CameraFleet, FleetServices},
    config_store::{AimOverrides, CameraProfile, ConfigStore, DEFAULT_CONFIG_PATH},
    geo::UtmProjection,
    ptz_controller::{AimController, PtzPose},
    tracking::{FocusMode, TrackingContext},
    transport::{HttpImageUploader, MqttTransport, Publisher, TopicMap},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const INBOUND_CAPACITY: usize = 256;

#[derive(Parser, Debug)]
#[command(author, version, about = "Aims roadside PTZ cameras at V2X-tracked vehicles", long_about = None)]
struct Cli {
    /// Fleet configuration file
    #[arg(long, global = true, env = "PTZ_TRACKER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Pan bias replacing the configured one, degrees
    #[arg(long, global = true, allow_hyphen_values = true)]
    dp: Option<f64>,

    /// Tilt bias replacing the configured one, degrees
    #[arg(long, global = true, allow_hyphen_values = true)]
    dt: Option<f64>,

    /// Offset added to every computed zoom
    #[arg(long, global = true, allow_hyphen_values = true, default_value_t = 0.0)]
    dz: f64,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the tracking daemon (default)
    Run,
    /// Print a camera's current pose
    Get {
        /// Camera serial or name
        #[arg(long)]
        camera: String,
    },
    /// Move a camera or set its focus target
    Set {
        #[arg(long)]
        camera: String,
        /// Absolute pose `pan,tilt,zoom`, each in [0, 360]
        #[arg(long, conflicts_with = "focus", required_unless_present = "focus")]
        pose: Option<PtzPose>,
        /// `plate://<plate>` or `track://<id>`
        #[arg(long)]
        focus: Option<String>,
    },
    /// Print pan/tilt bias deltas for a ground point in view
    Cali {
        #[arg(long)]
        camera: String,
        /// Easting of the point, metres
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        /// Northing of the point, metres
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ptz_tracker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let overrides = AimOverrides {
        pan_bias: cli.dp,
        tilt_bias: cli.dt,
        zoom_offset: cli.dz,
    };

    let store = match ConfigStore::load(&cli.config) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(path = %cli.config.display(), error = %e, "Configuration rejected");
            return Err(e.into());
        }
    };
    let registry = DriverRegistry::with_builtin_drivers();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_daemon(&store, &registry, overrides).await,
        Command::Get { camera } => {
            let mut aim = camera_controller(&store, &registry, &camera, overrides)?;
            let pose = aim.current_pose().await?;
            println!("p={:.2} t={:.2} z={:.2}", pose.pan, pose.tilt, pose.zoom);
            Ok(())
        }
        Command::Set {
            camera,
            pose,
            focus,
        } => {
            let mut aim = camera_controller(&store, &registry, &camera, overrides)?;
            if let Some(pose) = pose {
                aim.move_absolute(pose).await?;
                return Ok(());
            }
            let target = focus.context("either --pose or --focus is required")?;
            let (mode, value) = FocusMode::parse_target(&target)?;
            let uploader = HttpImageUploader::new(store.config().connection.cloud_addr())?;
            let mut context = TrackingContext::new(
                aim,
                UtmProjection::from_config(store.config().utm_zone),
                None,
                Arc::new(uploader),
            );
            context.set_focus(mode, &value).await;
            Ok(())
        }
        Command::Cali { camera, x, y } => {
            let mut aim = camera_controller(&store, &registry, &camera, overrides)?;
            let (dp, dt) = aim.calibrate(x, y).await?;
            println!("dp={:.4} dt={:.4}", dp, dt);
            Ok(())
        }
    }
}

fn find_camera<'a>(store: &'a ConfigStore, id: &str) -> anyhow::Result<&'a CameraProfile> {
    store
        .camera(id)
        .with_context(|| format!("no camera with serial or name '{}'", id))
}

fn camera_controller(
    store: &ConfigStore,
    registry: &DriverRegistry,
    id: &str,
    overrides: AimOverrides,
) -> anyhow::Result<AimController> {
    let profile = find_camera(store, id)?;
    Ok(build_aim_controller(store.config(), profile, registry, overrides)?)
}

async fn run_daemon(
    store: &ConfigStore,
    registry: &DriverRegistry,
    overrides: AimOverrides,
) -> anyhow::Result<()> {
    let config = store.config();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        cameras = config.cameras.len(),
        config = ?store.path(),
        mqtt = %config.connection.mqtt_addr(),
        "Starting PTZ tracker"
    );

    let (transport, eventloop) = MqttTransport::connect(&config.connection)?;
    let transport = Arc::new(transport);
    let uploader = HttpImageUploader::new(config.connection.cloud_addr())?;

    let fleet = CameraFleet::start(
        config,
        registry,
        overrides,
        FleetServices {
            publisher: Some(transport.clone() as Arc<dyn Publisher>),
            uploader: Arc::new(uploader),
        },
    )?;

    let topics = TopicMap::new(config.group_id.as_deref(), &config.feed);
    let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);

    let mqtt = {
        let transport = transport.clone();
        tokio::spawn(async move { transport.run(eventloop, topics, tx).await })
    };
    let router = tokio::spawn(fleet.run(rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    mqtt.abort();
    if let Err(e) = router.await {
        tracing::error!(error = %e, "Router task failed");
    }

    tracing::info!("PTZ tracker stopped");
    Ok(())
}
