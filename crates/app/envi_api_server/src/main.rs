//! Envi API server binary.
//!
//! Runs migrations, then serves the auth API or bootstraps a user.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use envi_core::auth::queries::{PgCredentialStore, PgTokenLedger};
use envi_core::auth::secret::resolve_jwt_secret;
use envi_core::auth::{
    AuthConfig, DEFAULT_ACCESS_TTL_MINUTES, DEFAULT_BCRYPT_COST, DEFAULT_REFRESH_TTL_MINUTES,
    TokenService,
};
use envi_core::models::auth::Role;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "envi_api_server", about = "Envi API server")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3100")]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/envi"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// JWT signing secret. Falls back to `AUTH_SECRET`, then a generated, persisted secret.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Mark auth cookies `Secure`.
    #[arg(long, env = "AUTH_SECURE_COOKIES", default_value_t = true, action = clap::ArgAction::Set)]
    secure_cookies: bool,

    /// bcrypt work factor for new password hashes.
    #[arg(long, env = "AUTH_BCRYPT_COST", default_value_t = DEFAULT_BCRYPT_COST)]
    bcrypt_cost: u32,

    /// Access token lifetime in minutes.
    #[arg(long, env = "AUTH_ACCESS_TTL_MINUTES", default_value_t = DEFAULT_ACCESS_TTL_MINUTES)]
    access_ttl_minutes: i64,

    /// Refresh token lifetime in minutes.
    #[arg(long, env = "AUTH_REFRESH_TTL_MINUTES", default_value_t = DEFAULT_REFRESH_TTL_MINUTES)]
    refresh_ttl_minutes: i64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,
    /// Create a user with a bcrypt-hashed password.
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long, env = "ENVI_USER_PASSWORD", hide_env_values = true)]
        password: String,
        /// `owner` or `guest`.
        #[arg(long, default_value = "owner", value_parser = parse_role)]
        role: Role,
    },
}

fn parse_role(s: &str) -> Result<Role, String> {
    s.parse()
}

impl Args {
    fn auth_config(&self) -> Result<AuthConfig, String> {
        if self.access_ttl_minutes <= 0 || self.refresh_ttl_minutes <= 0 {
            return Err("token lifetimes must be positive".into());
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err("bcrypt cost must be between 4 and 31".into());
        }
        Ok(AuthConfig {
            jwt_secret: resolve_jwt_secret(self.jwt_secret.as_deref()),
            bcrypt_cost: self.bcrypt_cost,
            access_ttl: chrono::Duration::minutes(self.access_ttl_minutes),
            refresh_ttl: chrono::Duration::minutes(self.refresh_ttl_minutes),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,envi_api=debug,envi_core=debug".into()),
        )
        .init();

    let args = Args::parse();
    let auth = args.auth_config()?;

    info!(max_connections = args.max_connections, "configuring connection pool");

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&args.database_url)
        .await?;

    info!("running database migrations");
    envi_core::migrate::migrate(&pool).await?;

    let service = TokenService::new(
        Arc::new(PgCredentialStore::new(pool.clone())),
        Arc::new(PgTokenLedger::new(pool)),
        auth.clone(),
    );

    match args.command {
        Some(Command::CreateUser {
            username,
            password,
            role,
        }) => {
            let user = service.create_user(&username, &password, role).await?;
            println!("{}", user.id);
            Ok(())
        }
        None | Some(Command::Serve) => {
            let config = envi_api::config::ApiConfig {
                bind_addr: args.bind_addr,
                pg_connection_url: args.database_url,
                secure_cookies: args.secure_cookies,
                auth,
            };
            let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
            let local_addr = listener.local_addr()?;

            let app = envi_api::router(envi_api::AppState { service, config });

            info!(addr = %local_addr, "REST API listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    info!("shutdown signal received");
                })
                .await?;
            Ok(())
        }
    }
}
