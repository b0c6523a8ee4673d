mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};

use common::{request, send};

#[tokio::test]
async fn unknown_routes_get_json_404() -> Result<()> {
    let app = common::offline_app()?;

    let res = send(&app, request(Method::GET, "/api/nothing/here", None, None)).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["success"], false);
    assert_eq!(res.body["message"], "Endpoint not found");

    let res = send(&app, request(Method::GET, "/book", None, None)).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn health_reports_without_database() -> Result<()> {
    let app = common::offline_app()?;

    let res = send(&app, request(Method::GET, "/health", None, None)).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "OK");
    assert_eq!(res.body["database"], "unavailable");
    assert!(res.body["uptime"].is_number());
    assert!(res.body["timestamp"].is_string());
    Ok(())
}

#[tokio::test]
async fn health_reports_live_database() -> Result<()> {
    let Some((app, _state)) = common::database_app().await? else {
        return Ok(());
    };

    let res = send(&app, request(Method::GET, "/health", None, None)).await?;
    assert_eq!(res.body["database"], "ok");
    Ok(())
}
