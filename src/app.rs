use anyhow::Context as _;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::JwtService;
use crate::config::AppConfig;
use crate::database::models::{Hero, User};
use crate::database::strategies::MemoryStrategy;
use crate::database::{build_strategy, Context, DatabaseManager, Strategy};
use crate::handlers::{protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::services::AuthService;

/// Shared by every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub heroes: Arc<Context<Hero>>,
    pub users: Arc<Context<User>>,
    pub jwt: JwtService,
    pub auth: AuthService,
    pub database: Option<DatabaseManager>,
}

impl AppState {
    /// Connect to PostgreSQL when a configured backend needs it and build
    /// both collection strategies.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        config.validate().context("invalid configuration")?;

        let database = if config.needs_database() {
            let manager = DatabaseManager::connect(&config.database)
                .await
                .context("failed to connect to PostgreSQL")?;
            Some(manager)
        } else {
            None
        };
        let pool = database.as_ref().map(DatabaseManager::pool);

        let heroes = build_strategy::<Hero>(config.storage.heroes, pool)
            .await
            .context("failed to initialise hero storage")?;
        let users = build_strategy::<User>(config.storage.users, pool)
            .await
            .context("failed to initialise user storage")?;

        Self::with_strategies(config, heroes, users, database)
    }

    /// Both collections in process memory; nothing is persisted.
    pub fn in_memory(config: AppConfig) -> anyhow::Result<Self> {
        config.validate().context("invalid configuration")?;
        Self::with_strategies(
            config,
            Arc::new(MemoryStrategy::<Hero>::new()),
            Arc::new(MemoryStrategy::<User>::new()),
            None,
        )
    }

    fn with_strategies(
        config: AppConfig,
        heroes: Arc<dyn Strategy<Hero>>,
        users: Arc<dyn Strategy<User>>,
        database: Option<DatabaseManager>,
    ) -> anyhow::Result<Self> {
        let jwt = JwtService::new(&config.security)?;
        let users = Arc::new(Context::new(users));
        let auth = AuthService::new(users.clone(), jwt.clone(), config.security.clone());

        Ok(Self {
            heroes: Arc::new(Context::new(heroes)),
            users,
            jwt,
            auth,
            database,
        })
    }
}

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(public::system::root))
        .route("/health", get(public::system::health))
        .route("/auth/register", post(public::auth::register))
        .route("/auth/login", post(public::auth::login))
        .route("/heroes", get(public::heroes::list))
        .route("/heroes/:id", get(public::heroes::show));

    let protected_routes = Router::new()
        .route("/auth/me", get(protected::auth::me))
        .route("/heroes", post(protected::heroes::create))
        .route(
            "/heroes/:id",
            axum::routing::patch(protected::heroes::update).delete(protected::heroes::delete),
        )
        .route("/users", get(protected::users::list))
        .route(
            "/users/:id",
            get(protected::users::show)
                .patch(protected::users::update)
                .delete(protected::users::delete),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware));

    public_routes
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
