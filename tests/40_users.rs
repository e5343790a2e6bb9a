// User management runs against an in-process router so the test can seed
// an admin directly through the auth service.

use anyhow::{Context, Result};
use hero_registry::app::{router, AppState};
use hero_registry::config::AppConfig;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;

struct Harness {
    base_url: String,
    state: AppState,
    client: reqwest::Client,
}

impl Harness {
    async fn start() -> Result<Self> {
        let mut config = AppConfig::development();
        config.security.bcrypt_cost = 4;
        let state = AppState::in_memory(config)?;

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let app = router(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url,
            state,
            client: reqwest::Client::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn admin_token(&self) -> Result<String> {
        self.state.auth.create_admin("Root", "root@registry.io", "rootpass").await?;
        Ok(self.state.auth.login("root@registry.io", "rootpass").await?.token)
    }

    async fn user_token(&self, name: &str, email: &str) -> Result<(String, String)> {
        let user = self.state.auth.register(name, email, "userpass").await?;
        let token = self.state.auth.login(email, "userpass").await?.token;
        Ok((user.id.to_string(), token))
    }

    async fn call(&self, method: reqwest::Method, path: &str, token: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut req = self.client.request(method, self.url(path)).bearer_auth(token);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await?;
        let status = res.status();
        let body = res.json().await.context("response was not JSON")?;
        Ok((status, body))
    }
}

#[tokio::test]
async fn admin_lists_and_filters_users() -> Result<()> {
    let h = Harness::start().await?;
    let admin = h.admin_token().await?;
    h.user_token("Clark Kent", "clark@planet.com").await?;
    h.user_token("Lois Lane", "lois@planet.com").await?;

    let (status, body) = h.call(reqwest::Method::GET, "/users?limit=2", &admin, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["count"], 2);
    assert!(body["data"][0].get("password_hash").is_none());

    let (status, body) = h.call(reqwest::Method::GET, "/users?role=admin", &admin, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["email"], "root@registry.io");
    Ok(())
}

#[tokio::test]
async fn regular_users_only_see_themselves() -> Result<()> {
    let h = Harness::start().await?;
    let (clark_id, clark) = h.user_token("Clark Kent", "clark@planet.com").await?;
    let (lois_id, _) = h.user_token("Lois Lane", "lois@planet.com").await?;

    let (status, _) = h.call(reqwest::Method::GET, "/users", &clark, None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = h.call(reqwest::Method::GET, &format!("/users/{}", clark_id), &clark, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Clark Kent");

    let (status, body) = h.call(reqwest::Method::GET, &format!("/users/{}", lois_id), &clark, None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Access denied");

    let (status, body) = h
        .call(reqwest::Method::PATCH, &format!("/users/{}", clark_id), &clark, Some(json!({ "role": "admin" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only admins can change role or status");

    let (status, body) = h
        .call(reqwest::Method::PATCH, &format!("/users/{}", clark_id), &clark, Some(json!({ "name": "Superman" })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Superman");

    let (status, body) = h
        .call(
            reqwest::Method::PATCH,
            &format!("/users/{}", clark_id),
            &clark,
            Some(json!({ "email": "LOIS@planet.com" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email already in use");
    Ok(())
}

#[tokio::test]
async fn admin_suspends_and_deletes_users() -> Result<()> {
    let h = Harness::start().await?;
    let admin = h.admin_token().await?;
    let (bruce_id, bruce) = h.user_token("Bruce Wayne", "bruce@wayne.com").await?;

    let (status, body) = h
        .call(reqwest::Method::PATCH, &format!("/users/{}", bruce_id), &admin, Some(json!({ "status": "suspended" })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "suspended");

    let (status, body) = h.call(reqwest::Method::GET, "/auth/me", &bruce, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Account is disabled");

    let (status, _) = h.call(reqwest::Method::DELETE, &format!("/users/{}", bruce_id), &admin, None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = h.call(reqwest::Method::GET, &format!("/users/{}", bruce_id), &admin, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Deleted accounts keep their email reserved.
    let err = h.state.auth.register("Bruce Again", "bruce@wayne.com", "userpass").await;
    assert!(err.is_err());
    Ok(())
}

#[tokio::test]
async fn admin_cannot_delete_self() -> Result<()> {
    let h = Harness::start().await?;
    let admin = h.admin_token().await?;
    let (_, body) = h.call(reqwest::Method::GET, "/auth/me", &admin, None).await?;
    let admin_id = body["data"]["id"].as_str().unwrap_or_default().to_string();

    let (status, body) = h.call(reqwest::Method::DELETE, &format!("/users/{}", admin_id), &admin, None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "You cannot delete your own account");
    Ok(())
}
