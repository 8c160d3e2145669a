//! # rxdesk server
//!
//! Main binary. `serve` runs both services in one process:
//! - REST API (HTTP, plus `/uploads` static files)
//! - WebSocket Gateway (real-time events)
//!
//! `migrate` applies the schema and exits; `create-admin` bootstraps the
//! first administrator account.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rxdesk_api::{build_router, AppState};
use rxdesk_common::{
    config::AppConfig,
    gateway_event::GatewayEvent,
    ids,
    models::user::{RegisterRequest, Role},
    validation::validate_request,
};
use rxdesk_db::{repository::users, Database};
use rxdesk_gateway::GatewayState;
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(name = "rxdesk", version, about = "Pharmacy operations backend")]
struct Cli {
    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long, global = true, env = "RXDESK_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the REST API and the gateway (default)
    Serve,
    /// Apply database migrations and exit
    Migrate,
    /// Create an administrator account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long, env = "RXDESK_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "Admin")]
        first_name: String,
        #[arg(long, default_value = "User")]
        last_name: String,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rxdesk=debug,tower_http=debug".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = Arc::new(rxdesk_common::config::init().context("invalid configuration")?);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            let db = Database::connect(&config).await?;
            db.migrate().await
        }
        Command::CreateAdmin {
            email,
            password,
            first_name,
            last_name,
        } => {
            let db = Database::connect(&config).await?;
            db.migrate().await?;
            create_admin(&db, email, password, first_name, last_name).await
        }
    }
}

async fn serve(config: Arc<AppConfig>) -> anyhow::Result<()> {
    tracing::info!("Starting rxdesk v{}", env!("CARGO_PKG_VERSION"));

    let db = Database::connect(&config).await?;
    db.migrate().await?;

    // === Shared event broadcast channel ===
    // The API publishes a GatewayEvent for every change a client should see
    // live; the gateway fans each one out to the sessions in its room.
    let (gateway_tx, _) = broadcast::channel::<GatewayEvent>(config.gateway.broadcast_capacity);

    // === REST API Server ===
    let api_state = AppState::new(config.clone(), db, gateway_tx.clone())?;
    api_state
        .storage
        .ensure_dirs()
        .await
        .with_context(|| format!("cannot create upload dir {}", config.storage.upload_dir))?;
    tracing::info!("Uploads stored under {}", config.storage.upload_dir);
    let api_router = build_router(api_state);

    let host = config.server.host.parse()?;
    let api_addr = SocketAddr::new(host, config.server.port);

    // === WebSocket Gateway ===
    let gateway_router = rxdesk_gateway::build_router(GatewayState::new(&config, gateway_tx));
    let gateway_addr = SocketAddr::new(host, config.server.gateway_port);

    tracing::info!("REST API listening on http://{api_addr}");
    tracing::info!("Gateway listening on ws://{gateway_addr}");

    tokio::try_join!(
        async {
            let listener = tokio::net::TcpListener::bind(api_addr).await?;
            axum::serve(listener, api_router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            Ok::<_, anyhow::Error>(())
        },
        async {
            let listener = tokio::net::TcpListener::bind(gateway_addr).await?;
            axum::serve(listener, gateway_router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            Ok::<_, anyhow::Error>(())
        },
    )?;

    tracing::info!("rxdesk stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}

async fn create_admin(
    db: &Database,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
) -> anyhow::Result<()> {
    // Same rules as self-registration
    let request = RegisterRequest {
        email,
        password,
        first_name,
        last_name,
        phone: None,
        date_of_birth: None,
    };
    validate_request(&request)?;

    if users::find_by_email(&db.pg, &request.email).await?.is_some() {
        bail!("a user with email {} already exists", request.email);
    }

    let password_hash = rxdesk_api::auth::hash_password(&request.password)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
    let admin = users::create_user(
        &db.pg,
        ids::generate_id(),
        users::NewUser {
            email: &request.email,
            password_hash: &password_hash,
            first_name: request.first_name.trim(),
            last_name: request.last_name.trim(),
            phone: None,
            date_of_birth: None,
            role: Role::Admin,
        },
    )
    .await?;

    tracing::info!(user_id = %admin.id, email = %admin.email, "Administrator created");
    Ok(())
}
