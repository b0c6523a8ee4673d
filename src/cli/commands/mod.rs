pub mod migrate;
pub mod seed;
pub mod serve;

use crate::config::AppConfig;
use crate::database::Database;

/// Connect and, when configured, bring the schema up to date
pub(crate) async fn open_database(config: &AppConfig) -> anyhow::Result<Database> {
    let db = Database::connect(&config.database).await?;
    if config.database.run_migrations {
        db.migrate().await?;
    }
    Ok(db)
}
