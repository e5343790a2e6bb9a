// handlers/public/system.rs - GET / and GET /health

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET / - API info
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Hero Registry API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Hero registry and user accounts over swappable storage strategies",
            "endpoints": {
                "health": "/health (public)",
                "auth": "/auth/register, /auth/login (public), /auth/me (protected)",
                "heroes": "/heroes[/:id] (read public, write protected)",
                "users": "/users[/:id] (protected)",
            }
        }
    }))
}

/// GET /health - liveness of each collection's backend. 503 when any is down.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let (heroes_ok, users_ok) = futures::join!(state.heroes.is_connected(), state.users.is_connected());

    let storage = json!({
        "heroes": { "backend": state.heroes.strategy_name(), "connected": heroes_ok },
        "users": { "backend": state.users.strategy_name(), "connected": users_ok },
    });

    if heroes_ok && users_ok {
        (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "storage": storage
                }
            })),
        )
    } else {
        tracing::warn!("Health check degraded: heroes={}, users={}", heroes_ok, users_ok);
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "storage unavailable",
                "code": "SERVICE_UNAVAILABLE",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "storage": storage
                }
            })),
        )
    }
}
