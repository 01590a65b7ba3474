pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AdminConfig;
use crate::services::{
    ActionGateway, ActionRegistry, AuditService, ChallengeService, ControlPlaneStore,
    EmailProvider, GrantService, PermissionCatalog,
};
use service_core::error::AppError;
use service_core::middleware::{
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AdminConfig,
    pub store: Arc<dyn ControlPlaneStore>,
    pub email: Arc<dyn EmailProvider>,
    pub registry: ActionRegistry,
    pub grants: GrantService,
    pub challenges: ChallengeService,
    pub audit: AuditService,
    pub gateway: ActionGateway,
}

impl AppState {
    /// Wire the service graph over a store and email provider.
    ///
    /// Fails fast when the built-in action table references a permission
    /// outside the catalog; that is a deployment error, not a runtime one.
    pub fn build(
        config: AdminConfig,
        store: Arc<dyn ControlPlaneStore>,
        email: Arc<dyn EmailProvider>,
    ) -> Result<Self, AppError> {
        let catalog = PermissionCatalog::builtin();
        let registry = ActionRegistry::builtin(&catalog)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e.to_string())))?;

        let grants = GrantService::new(store.clone(), catalog);
        let challenges =
            ChallengeService::new(store.clone(), email.clone(), config.challenge.ttl_minutes);
        let audit = AuditService::new(store.clone());
        let gateway = ActionGateway::new(
            registry.clone(),
            grants.clone(),
            challenges.clone(),
            audit.clone(),
        );

        Ok(Self {
            config,
            store,
            email,
            registry,
            grants,
            challenges,
            audit,
            gateway,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .security
                .allowed_origins
                .iter()
                .map(|o| {
                    o.parse::<HeaderValue>().unwrap_or_else(|e| {
                        tracing::error!("Invalid CORS origin '{}': {}. Using fallback.", o, e);
                        HeaderValue::from_static("*")
                    })
                })
                .collect::<Vec<HeaderValue>>(),
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-admin-api-key"),
            header::HeaderName::from_static("x-admin-id"),
            header::HeaderName::from_static("x-request-id"),
        ]);

    // Every /admin route sits behind the API-key + acting-admin middleware
    let admin_routes = Router::new()
        .route(
            "/admin/permissions",
            get(handlers::permissions::get_permission_catalog),
        )
        .route(
            "/admin/admins/:admin_id/permissions",
            get(handlers::permissions::get_effective_permissions),
        )
        .route(
            "/admin/admins/:admin_id/grants",
            get(handlers::permissions::list_grants).put(handlers::permissions::set_grant),
        )
        .route(
            "/admin/challenges",
            post(handlers::challenges::issue_challenge),
        )
        .route(
            "/admin/notifications",
            get(handlers::notifications::list_notifications),
        )
        .route("/admin/audit", get(handlers::audit::query_audit))
        .route("/admin/users/:user_id/ban", post(handlers::users::ban_user))
        .route(
            "/admin/users/:user_id/unban",
            post(handlers::users::unban_user),
        )
        .route(
            "/admin/users/:user_id/role",
            patch(handlers::users::change_user_role),
        )
        .route("/admin/users/role", post(handlers::users::bulk_change_role))
        .route(
            "/admin/waitlist/:user_id/contact",
            post(handlers::waitlist::contact_waitlisted_user),
        )
        .route(
            "/admin/waitlist/:user_id/promote",
            post(handlers::waitlist::promote_waitlisted_user),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::admin_auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .merge(admin_routes)
        .with_state(state)
        // Add tracing layer
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        // Add security headers middleware
        .layer(from_fn(security_headers_middleware))
        // Add CORS layer
        .layer(cors)
}

/// Service health check
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<axum::Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(axum::Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "database": "up"
        }
    })))
}
