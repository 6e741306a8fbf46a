use std::{future::IntoFuture, process, sync::Arc};

use talkback::{
    application::{
        comments::CommentService,
        error::AppError,
        posts::PostService,
        repos::{CommentsRepo, PostsRepo, StoreHealth},
    },
    cache::{CacheConfig, CommentCache, PostCache, connect_backend},
    config,
    infra::{
        db::{PostgresRepositories, RetryPolicy},
        error::InfraError,
        http::{self, ApiState},
        telemetry,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;

    let cache_config = CacheConfig::from(&settings.cache);
    let backend = connect_backend(&cache_config)
        .await
        .map_err(|err| AppError::from(InfraError::cache(err.to_string())))?;
    info!(
        target = "talkback::serve",
        backend = cache_config.backend.as_str(),
        ttl_seconds = cache_config.ttl.as_secs(),
        "cache backend ready"
    );

    let comment_cache = CommentCache::new(backend.clone(), &cache_config);
    let post_cache = PostCache::new(backend, &cache_config);

    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let health: Arc<dyn StoreHealth> = repositories;

    let state = ApiState {
        comments: Arc::new(CommentService::new(
            comments_repo,
            comment_cache.clone(),
            cache_config.detached_timeout,
        )),
        posts: Arc::new(PostService::new(
            posts_repo,
            post_cache,
            comment_cache,
            cache_config.detached_timeout,
        )),
        health,
        request_timeout: settings.server.request_timeout,
    };

    serve_http(&settings, state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_pool(&settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    info!(target = "talkback::migrate", "migrations applied");
    Ok(())
}

async fn connect_pool(settings: &config::Settings) -> Result<sqlx::PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let pool = connect_pool(settings).await?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let retry = RetryPolicy::from_settings(&settings.retry, &settings.database);
    Ok(Arc::new(PostgresRepositories::new(pool, retry)))
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "talkback::serve", addr = %settings.server.addr, "listening");

    let stopping = Arc::new(Notify::new());
    let signal = {
        let stopping = stopping.clone();
        async move {
            shutdown_signal().await;
            stopping.notify_one();
        }
    };

    let mut server = tokio::spawn(
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(signal)
            .into_future(),
    );

    tokio::select! {
        joined = &mut server => return flatten_server_result(joined),
        _ = stopping.notified() => {}
    }

    info!(
        target = "talkback::serve",
        grace_seconds = settings.server.graceful_shutdown.as_secs(),
        "shutdown requested, draining connections"
    );

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => flatten_server_result(joined),
        Err(_) => {
            warn!(
                target = "talkback::serve",
                "graceful shutdown window elapsed, aborting open connections"
            );
            server.abort();
            Ok(())
        }
    }
}

fn flatten_server_result(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    joined
        .map_err(|err| AppError::unexpected(format!("server task failed: {err}")))?
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "talkback::serve", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(target = "talkback::serve", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
