use std::{
    fs::OpenOptions,
    path::Path,
    process::ExitCode,
    sync::{Arc, Mutex},
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use teloxide::Bot;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use finance_bot::{
    AppState, Config,
    bot::{CommandDispatcher, telegram},
    build_router,
    category::seed_default_categories,
    conversation::InMemoryConversationStore,
    db, graceful_shutdown, run_until_stopped,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    if let Err(error) = setup_logging(config.log_file.as_deref()) {
        eprintln!("Could not set up logging: {error}");
        return ExitCode::FAILURE;
    }

    // The bot and the API each get their own connection to the database.
    let api_connection = match db::open(&config.database_url) {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("Could not open database {}: {error}", config.database_url);
            return ExitCode::FAILURE;
        }
    };

    let app_state = match AppState::new(api_connection, config.api_user_id) {
        Ok(state) => state,
        Err(error) => {
            tracing::error!("Could not initialize database: {error}");
            return ExitCode::FAILURE;
        }
    };

    let bot_connection = match db::open(&config.database_url) {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("Could not open database {}: {error}", config.database_url);
            return ExitCode::FAILURE;
        }
    };

    if let Err(error) = seed_default_categories(&bot_connection) {
        tracing::error!("Could not seed default categories: {error}");
        return ExitCode::FAILURE;
    }

    let dispatcher = Arc::new(CommandDispatcher::new(
        Arc::new(Mutex::new(bot_connection)),
        Arc::new(InMemoryConversationStore::new(config.conversation_ttl())),
    ));

    let addr = config.api_address();
    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(app_state));

    tracing::info!("HTTP server listening on {}", addr);
    let server = axum_server::bind(addr)
        .handle(handle.clone())
        .serve(router.into_make_service());

    let bot = telegram::run(Bot::new(config.bot_token), dispatcher);

    match run_until_stopped(server, bot, handle).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("HTTP server stopped with an error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(log_file: Option<&Path>) -> std::io::Result<()> {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(filter::LevelFilter::INFO);

    let debug_log = match log_file {
        Some(path) => {
            let log_file = OpenOptions::new().create(true).append(true).open(path)?;

            Some(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(Arc::new(log_file))
                    .with_filter(filter::LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "finance_bot=debug,server=debug,tower_http=debug,info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_log)
        .with(debug_log)
        .init();

    Ok(())
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Errors are already logged by the handlers.
        .on_failure(());

    router.layer(tracing_layer)
}
