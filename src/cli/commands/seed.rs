use std::path::PathBuf;

use anyhow::Context;
use serde_json::json;

use super::open_database;
use crate::cli::{utils::output_success, OutputFormat};
use crate::config::AppConfig;
use crate::database::seed;

pub async fn handle(config: AppConfig, file: PathBuf, output_format: OutputFormat) -> anyhow::Result<()> {
    let db = open_database(&config).await?;
    let result = seed::seed_file(&db, &file).await;
    db.close().await;

    let report = result.with_context(|| format!("seeding from {} failed", file.display()))?;
    output_success(
        output_format,
        "Database seeding completed",
        Some(json!({
            "books_created": report.books_created,
            "books_updated": report.books_updated,
            "chapters_created": report.chapters_created,
            "verses_created": report.verses_created,
            "verses_skipped": report.verses_skipped,
        })),
    )
}
