use std::sync::Arc;

use chapter_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    identity::{GoogleIdentityProvider, IdentityState},
    models::Role,
    repository::{PostgresRepository, Repository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// bootstrap_super_admin
///
/// Promotes the configured account to SUPER_ADMIN. The account must already
/// exist (signed up or provisioned through Google); a missing one is logged
/// and skipped.
async fn bootstrap_super_admin(
    repo: &dyn Repository,
    email: &str,
) -> chapter_portal::error::Result<()> {
    match repo.find_user_by_email(email).await? {
        Some(user) if user.role == Role::SuperAdmin => {
            tracing::debug!(%email, "bootstrap account is already super admin");
        }
        Some(user) => {
            repo.set_user_role(user.id, Role::SuperAdmin).await?;
            tracing::info!(user_id = %user.id, %email, "promoted bootstrap account to super admin");
        }
        None => {
            tracing::warn!(%email, "bootstrap super admin account does not exist yet");
        }
    }
    Ok(())
}

/// main
///
/// Entry point: configuration, logging, database and migrations, optional
/// OAuth provider, then the HTTP server.
#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // 1. Configuration (fail fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load()?;

    // 2. Logging: RUST_LOG wins, otherwise sensible local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "chapter_portal=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database and schema
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    if let Some(email) = &config.bootstrap_super_admin {
        bootstrap_super_admin(repo.as_ref(), email).await?;
    }

    // 4. Identity provider (Google sign-in is optional)
    let identity = config.google_client_id.as_deref().map(|client_id| {
        Arc::new(GoogleIdentityProvider::new(
            client_id,
            &config.google_tokeninfo_url,
        )) as IdentityState
    });
    if identity.is_none() {
        tracing::info!("GOOGLE_CLIENT_ID not set; Google sign-in disabled");
    }

    // 5. Router and server
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState {
        repo,
        identity,
        config,
    });

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app).await?;
    Ok(())
}
