use axum::extract::MatchedPath;
use axum::http::header::AUTHORIZATION;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::{Json, Router};
use migration::MigratorTrait;
use sea_orm::Database;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::Span;
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

use crate::auth::{self, AuthState};
use crate::config::Config;
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};
use crate::task::api::{self as task_api, TaskState};
use crate::task::{InMemoryTaskStore, SeaOrmTaskStore, TaskStore};

#[derive(OpenApi)]
#[openapi(
    paths(
        task_api::list_tasks_handler,
        task_api::get_task_handler,
        task_api::create_task_handler,
        task_api::update_task_handler,
        task_api::delete_task_handler,
        task_api::send_reminders_handler,
    ),
    modifiers(&BearerSecurity),
    tags((name = "Tasks"), (name = "Reminders"))
)]
pub struct ApiDoc;

struct BearerSecurity;

impl utoipa::Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Options that change how the router is assembled.
#[derive(Debug, Clone, Copy)]
pub struct RouterOptions {
    pub reminders_require_auth: bool,
}

impl From<&Config> for RouterOptions {
    fn from(config: &Config) -> Self {
        Self {
            reminders_require_auth: config.reminders_require_auth,
        }
    }
}

/// Builds the full application router.
pub fn create_app(
    auth_state: Arc<AuthState>,
    task_state: Arc<TaskState>,
    options: RouterOptions,
) -> Router {
    let mut protected_routes = task_api::create_protected_router(task_state.clone());
    let mut public_routes = task_api::create_public_router(task_state.clone())
        .route("/health", axum::routing::get(health_check_handler))
        .route(
            "/api-docs/openapi.json",
            axum::routing::get(openapi_handler),
        );

    let reminder_routes = task_api::create_reminder_router(task_state);
    if options.reminders_require_auth {
        protected_routes = protected_routes.merge(reminder_routes);
    } else {
        tracing::warn!("Reminder trigger is open to anonymous callers");
        public_routes = public_routes.merge(reminder_routes);
    }

    let protected_routes = protected_routes.layer(
        ServiceBuilder::new()
            .layer(from_fn_with_state(
                auth_state.clone(),
                auth::auth_user_middleware,
            ))
            .layer(from_fn(auth::require_auth_middleware)),
    );

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetSensitiveRequestHeadersLayer::new([AUTHORIZATION]))
                .layer(TraceLayer::new_for_http().make_span_with(FilteredMakeSpan))
                .layer(CorsLayer::permissive()),
        )
}

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: Config) -> anyhow::Result<()> {
    let server_address = format!("0.0.0.0:{}", &config.port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);

    let store: Arc<dyn TaskStore> = match &config.db_url {
        Some(db_url) => {
            let db = Database::connect(db_url).await?;
            migration::Migrator::up(&db, None).await?;
            tracing::info!("Database migrations applied successfully");
            Arc::new(SeaOrmTaskStore::new(Arc::new(db)))
        }
        None => {
            tracing::warn!("No database configured, tasks are kept in memory");
            Arc::new(InMemoryTaskStore::new())
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    };

    let auth_state = Arc::new(AuthState::from_config(&config));
    let task_state = Arc::new(TaskState::new(store, notifier));

    let app = create_app(auth_state, task_state, RouterOptions::from(&config));

    axum::serve(listener, app).await?;
    Ok(())
}

#[tracing::instrument]
pub async fn health_check_handler() -> &'static str {
    "OK"
}

pub async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Span maker that records the route but never request headers, so bearer
/// tokens stay out of the logs.
#[derive(Clone, Debug)]
pub struct FilteredMakeSpan;

impl<B> MakeSpan<B> for FilteredMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        let matched_path = request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str);
        let authenticated = request.headers().contains_key(AUTHORIZATION);

        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            matched_path,
            authenticated,
        )
    }
}
