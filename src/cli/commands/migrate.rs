use crate::cli::{utils::output_success, OutputFormat};
use crate::config::AppConfig;
use crate::database::Database;

pub async fn handle(config: AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let db = Database::connect(&config.database).await?;
    let result = db.migrate().await;
    db.close().await;
    result?;

    output_success(output_format, "Database migrations applied", None)
}
