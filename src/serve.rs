use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    str::FromStr as _,
    sync::Arc,
};

use anyhow::Context as _;
use axum::{extract::FromRef, routing::get, Router};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity, log::LevelFilter};
use figment::{Figment, providers::Format as _};
use rand::Rng as _;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

use crate::admin_config::ConfigStore;
use crate::bell::{self, BellProducer};
use crate::config::AppConfig;
use crate::gateway::{Gateway as _, SqliteGateway};
use crate::models::{Session, SESSION_COLLECTION};
use crate::storage::ObjectStore;
pub use crate::error::Error;

/// The application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Parser, Debug, Clone)]
/// Command line arguments.
pub struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "default.toml")]
    pub config: PathBuf,
    /// The verbosity level.
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,
}

#[derive(Clone, FromRef)]
/// The application state, shared across all routes.
pub struct AppState {
    /// The application configuration.
    pub(crate) config: AppConfig,
    /// The document-store gateway.
    pub(crate) gateway: Arc<SqliteGateway>,
    /// Cached access to the moderation configuration document.
    pub(crate) config_store: Arc<ConfigStore<SqliteGateway>>,
    /// Object storage for photos and AR assets.
    pub(crate) objects: Arc<ObjectStore>,
    /// Producer handle for the live notification bell.
    pub(crate) bell: BellProducer,
}

/// Assemble the full router. Shared with the test harness.
pub(crate) fn router(state: AppState) -> Router {
    let media_root = state.config.blob.path.clone();
    Router::new()
        .route("/", get(super::index))
        .nest("/admin", super::endpoints::routes())
        .nest_service("/media", ServeDir::new(media_root))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the application state from a loaded configuration: database pool,
/// schema, seeds and background tasks.
pub(crate) async fn init_state(config: AppConfig) -> anyhow::Result<AppState> {
    tokio::fs::create_dir_all(&config.blob.path)
        .await
        .context("failed to create blob directory")?;

    // `create_if_missing` only creates the file, not its directory.
    if let Some(path) = config.db.strip_prefix("sqlite://") {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("failed to create database directory")?;
            }
        }
    }

    let opts = sqlx::sqlite::SqliteConnectOptions::from_str(&config.db)
        .context("failed to parse database options")?
        .create_if_missing(true);
    let pool = sqlx::SqlitePool::connect_with(opts)
        .await
        .context("failed to connect to database")?;

    let gateway = Arc::new(SqliteGateway::new(pool));
    gateway
        .init_schema()
        .await
        .context("failed to initialize document schema")?;

    let config_store = Arc::new(ConfigStore::new(gateway.clone()));
    if config_store
        .seed_default()
        .await
        .context("failed to seed moderation configuration")?
    {
        info!("seeded default moderation configuration");
    }

    // Determine whether or not this was the first startup (i.e. no admin
    // session exists). If so, create a session token and share it via the
    // console.
    let sessions = gateway
        .fetch_all(SESSION_COLLECTION, &[])
        .await
        .context("failed to check for existing sessions")?;
    if sessions.is_empty() {
        let token = rand::thread_rng()
            .sample_iter(rand::distributions::Alphanumeric)
            .take(32)
            .map(char::from)
            .collect::<String>();

        let session = Session {
            id: token.clone(),
            uid: "root".to_owned(),
            created_at: chrono::Utc::now(),
        };
        gateway
            .create(
                SESSION_COLLECTION,
                serde_json::to_value(&session).context("failed to encode session")?,
            )
            .await
            .context("failed to create admin session")?;

        // N.B: This is a sensitive message, so we're bypassing `tracing` here
        // and logging it directly to console.
        if !config.test {
            println!("=====================================");
            println!("            FIRST STARTUP            ");
            println!("=====================================");
            println!("Use this bearer token for admin access:");
            println!("{token}");
            println!("=====================================");
        }
    }

    let objects = Arc::new(ObjectStore::new(&config.blob, config.host_name.clone()));

    // Spawn the bell fan-out task and the watcher that feeds it from the
    // gateway change feed.
    let (_bell_task, bell) = bell::spawn();
    tokio::spawn(bell::watch(
        gateway.clone(),
        config_store.clone(),
        bell.clone(),
    ));

    Ok(AppState {
        config,
        gateway,
        config_store,
        objects,
        bell,
    })
}

/// The main application entry point.
pub async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    // Set up trace logging to console and account for the user-provided verbosity flag.
    if args.verbosity.log_level_filter() != LevelFilter::Off {
        let lvl = match args.verbosity.log_level_filter() {
            LevelFilter::Error => tracing::Level::ERROR,
            LevelFilter::Warn => tracing::Level::WARN,
            LevelFilter::Info | LevelFilter::Off => tracing::Level::INFO,
            LevelFilter::Debug => tracing::Level::DEBUG,
            LevelFilter::Trace => tracing::Level::TRACE,
        };
        tracing_subscriber::fmt().with_max_level(lvl).init();
    }

    if !args.config.exists() {
        // Not fatal: every setting can come from the environment, but the
        // most likely scenario is a forgotten mount.
        warn!(
            "configuration file {} does not exist",
            args.config.display()
        );
    }

    // Read and parse the user-provided configuration.
    let config: AppConfig = Figment::new()
        .admerge(figment::providers::Toml::file(args.config))
        .admerge(figment::providers::Env::prefixed("CAMPUSMOD_"))
        .extract()
        .context("failed to load configuration")?;

    // Initialize metrics reporting.
    super::metrics::setup(&config.metrics).context("failed to set up metrics exporter")?;

    let addr = config
        .listen_address
        .unwrap_or(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000));

    let state = init_state(config).await?;
    let app = router(state);

    info!("listening on {addr}");
    info!("connect to: http://127.0.0.1:{}", addr.port());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("failed to bind address")?;

    axum::serve(listener, app.into_make_service())
        .await
        .context("failed to serve app")
}
