use std::{str::FromStr, sync::Arc};

use anyhow::Context;
use axum::{routing::get, Router};
use pack::{auth, chats, config::Config, db, feed, index, meetups, pack as pack_chat, packs, profiles, reactions, realtime::Realtime, safety, AppState};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Arc::new(Config::load()?);

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(config.secure_cookies)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(7)));

    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("opening {}", config.database_url))?;
    db::init(&db_pool).await.map_err(|err| err.0)?;

    let secrets = tokio::fs::read_to_string(&config.oauth_secrets)
        .await
        .with_context(|| format!("reading {}", config.oauth_secrets.display()))?;
    let clients = auth::Clients::from_json(&serde_json::Value::from_str(&secrets)?, &config.public_url)
        .map_err(|err| err.0)?;

    tokio::fs::create_dir_all(&config.media_dir).await?;

    let app_state = AppState {
        db_pool,
        clients,
        realtime: Realtime::new(),
        config: config.clone(),
    };

    let app = Router::new()
        .route("/", get(index::index))
        .route("/pack", get(pack_chat::pack))

        .merge(auth::router())
        .merge(profiles::router())
        .nest("/chats", chats::router())
        .nest("/packs", packs::router())
        .nest("/feed", feed::router())
        .nest("/reactions", reactions::router())
        .nest("/meetups", meetups::router())
        .nest("/safety", safety::router())
        .nest_service("/media", ServeDir::new(&config.media_dir))

        .with_state(app_state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http());

    let address = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Server running on {address}, public at {}", config.public_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
