mod config;
mod conversation_state;
mod db_types;
mod error;
mod handlers;
mod store;
mod tasks;
mod telegram_types;
mod types;
mod utils;

use crate::config::Config;
use crate::conversation_state::IntakeWorkflow;
use crate::error::handle_error;
use crate::store::{IdentityStore, PgStore};
use crate::types::AppState;

use std::process;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

pub mod consts {
    use std::time::Duration;

    pub const MIN_NAME_CHARS: usize = 5;
    pub const MIN_PHONE_DIGITS: usize = 8;
    // column widths of the users table
    pub const MAX_NAME_CHARS: usize = 200;
    pub const MAX_PHONE_CHARS: usize = 20;
    pub const MAX_EMAIL_CHARS: usize = 150;
    pub const CONFIRM_DATA: &str = "confirm";
    pub const CANCEL_DATA: &str = "cancel";
    pub const HELP_TEXT: &str = "Send /start to register, /register to update your details \
                                 or /cancel to stop a registration in progress.";
    pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
    pub const LONG_POLL_TIMEOUT_SECS: u64 = 30;
    pub const TELEGRAM_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    pub const POLL_ERROR_DELAY: Duration = Duration::from_secs(5);
    pub const DEFAULT_LIST_LIMIT: i64 = 20;
    pub const MAX_LIST_LIMIT: i64 = 100;
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_file(true)
                .with_line_number(true),
        )
        .with(tracing_subscriber::filter::Targets::new().with_targets([
            ("hyper", tracing_subscriber::filter::LevelFilter::OFF),
            ("sqlx", tracing_subscriber::filter::LevelFilter::WARN),
            ("reqwest", tracing_subscriber::filter::LevelFilter::INFO),
            ("registration_bot", tracing_subscriber::filter::LevelFilter::DEBUG),
        ]));
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {e}");
        process::exit(1);
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error=%e, "invalid configuration");
            process::exit(1);
        }
    };
    info!(config=?config, "loaded configuration");

    let store = match PgStore::connect(config.database.clone(), config.database_max_connections)
        .await
    {
        Ok(store) => store,
        Err(e) => {
            error!(error=%e, "cannot start without a database");
            process::exit(1);
        }
    };
    if let Err(e) = store.initialize().await {
        error!(error=%e, "cannot start without the user tables");
        store.close().await;
        process::exit(1);
    }
    let store: Arc<dyn IdentityStore> = Arc::new(store);

    let http_client = reqwest::Client::new();
    let workflow = IntakeWorkflow::new(store.clone(), config.phone_country_code.clone());
    let app_state = Arc::new(AppState {
        bot_token: config.bot_token.clone(),
        http_client,
        store: store.clone(),
        workflow,
    });

    let server = match axum::Server::try_bind(&config.http_addr) {
        Ok(builder) => builder.serve(handlers::router(app_state.clone()).into_make_service()),
        Err(e) => {
            error!(error=%e, addr=%config.http_addr, "failed to bind status server");
            store.close().await;
            process::exit(1);
        }
    };
    info!(addr=%config.http_addr, "status server listening");
    let server = tokio::spawn(async move {
        if let Err(e) = server.await {
            handle_error(e).await;
        }
    });

    let mut exit_code = 0;
    tokio::select! {
        res = tasks::poll_updates(app_state.clone()) => {
            if let Err(e) = res {
                error!(error=%e, "update polling stopped");
                exit_code = 1;
            }
        }
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }

    server.abort();
    store.close().await;
    process::exit(exit_code);
}
