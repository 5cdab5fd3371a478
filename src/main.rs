use anyhow::Context;
use bookstore_db::Database;
use bookstore_kernel::{settings::Settings, InitCtx};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load bookstore settings")?;
    bookstore_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.endpoint,
        "bookstore-app bootstrap starting"
    );

    let db = Database::connect(&settings.database.connect_options())
        .await
        .with_context(|| "failed to open document store")?;

    let registry = bookstore_app::bootstrap(&settings, &db).await?;
    let ctx = InitCtx {
        settings: &settings,
        db: &db,
    };
    registry.start_all(&ctx).await?;

    tracing::info!("bookstore-app bootstrap complete");
    bookstore_http::start_server(&registry, &settings).await?;

    registry.stop_all().await?;
    Ok(())
}
