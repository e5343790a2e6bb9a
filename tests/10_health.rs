mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn health_reports_memory_backends() -> Result<()> {
    let server = common::TestServer::start().await?;

    let res = reqwest::get(server.url("/health")).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert!(body["data"]["timestamp"].is_string());
    assert_eq!(body["data"]["storage"]["heroes"]["backend"], "memory");
    assert_eq!(body["data"]["storage"]["users"]["backend"], "memory");
    Ok(())
}

#[tokio::test]
async fn root_describes_the_api() -> Result<()> {
    let server = common::TestServer::start().await?;

    let body: Value = reqwest::get(server.url("/")).await?.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "Hero Registry API");
    assert!(body["data"]["endpoints"]["heroes"].is_string());
    Ok(())
}

#[tokio::test]
async fn unknown_routes_are_404() -> Result<()> {
    let server = common::TestServer::start().await?;

    let res = reqwest::get(server.url("/villains")).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}
