use anyhow::Context;
use portfolio_bot::alert_checker::AlertChecker;
use portfolio_bot::bot::BotState;
use portfolio_bot::db::{ HoldingsRepository, SeaOrmRepository };
use portfolio_bot::notifier::TelegramNotifier;
use portfolio_bot::price_refresher::PriceRefresher;
use portfolio_bot::services::{
    AlertSettingsService,
    CoinGeckoPriceSource,
    PortfolioService,
    PriceSource,
    ReportService,
};
use portfolio_bot::Config;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use teloxide::Bot;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{ layer::SubscriberExt, util::SubscriberInitExt };

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber
        ::registry()
        .with(
            tracing_subscriber::EnvFilter
                ::try_from_default_env()
                .unwrap_or_else(|_| "portfolio_bot=debug,tower_http=debug".into())
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    tracing::info!(
        "Starting portfolio-bot (refresh every {:?}, alerts every {:?}, direction {})",
        config.refresh_interval,
        config.alert_interval,
        config.alert_direction
    );

    // Initialize database connection
    let db = sea_orm::Database::connect(&config.database_url).await.context("Failed to connect to database")?;

    tracing::info!("Database connected successfully");

    // Run migrations
    migration::Migrator::up(&db, None).await.context("Failed to run migrations")?;

    tracing::info!("Migrations completed successfully");

    let repo: Arc<dyn HoldingsRepository> = Arc::new(SeaOrmRepository::new(db));
    let prices: Arc<dyn PriceSource> = Arc::new(CoinGeckoPriceSource::from_config(&config)?);

    // Initialize services
    let portfolio_service = Arc::new(PortfolioService::new(repo.clone(), prices.clone()));
    let report_service = Arc::new(ReportService::new(repo.clone(), prices.clone()));
    let alert_settings_service = Arc::new(AlertSettingsService::new(repo.clone()));

    let bot = Bot::new(config.telegram_bot_token.clone());
    let notifier = Arc::new(TelegramNotifier::new(bot.clone()));

    // Background loops
    let cancel = CancellationToken::new();

    let refresher = PriceRefresher::new(repo.clone(), prices.clone(), config.refresh_interval);
    let refresher_handle = tokio::spawn(refresher.run(cancel.clone()));

    let checker = AlertChecker::new(
        repo.clone(),
        prices.clone(),
        notifier,
        config.alert_interval,
        config.alert_direction
    );
    let checker_handle = tokio::spawn(checker.run(cancel.clone()));

    // HTTP API
    let app_state = portfolio_bot::api::AppState::new(
        portfolio_service.clone(),
        report_service.clone(),
        alert_settings_service.clone()
    );
    let app = portfolio_bot::api::router(app_state);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        let shutdown = async move { server_cancel.cancelled().await };
        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    // Telegram bot runs until Ctrl-C
    let bot_state = BotState::new(portfolio_service, report_service, alert_settings_service);
    portfolio_bot::bot::run_bot(bot, bot_state).await;

    tracing::info!("Bot stopped, shutting down background tasks");
    cancel.cancel();

    for (name, handle) in [
        ("price refresher", refresher_handle),
        ("alert checker", checker_handle),
        ("http server", server_handle),
    ] {
        if let Err(e) = handle.await {
            tracing::error!("{} task failed: {}", name, e);
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
