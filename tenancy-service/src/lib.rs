pub mod config;
pub mod db;
pub mod dtos;
pub mod events;
pub mod facade;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::{ip_rate_limit_middleware, IpRateLimit},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{openapi::security::SecurityScheme, Modify, OpenApi};

use crate::config::TenancyConfig;
use crate::facade::{AccountFacade, OrganizationFacade};
use crate::services::{
    AccountDomainService, CapabilitiesService, JwtService, OrganizationDomainService,
    TokenBlacklist,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::metrics::metrics,
        handlers::account::sign_up,
        handlers::account::sign_in,
        handlers::account::create_guest,
        handlers::account::sign_out,
        handlers::account::request_password_reset,
        handlers::account::confirm_password_reset,
        handlers::account::verify_email,
        handlers::account::set_password,
        handlers::account::set_profile_name,
        handlers::account::claim_account,
        handlers::account::capabilities,
        handlers::account::dashboard,
        handlers::organization::get_active_organization,
        handlers::organization::create_organization,
        handlers::organization::rename_organization,
        handlers::organization::switch_organization,
        handlers::organization::invite,
        handlers::organization::resend_invitation,
        handlers::organization::get_invitation,
        handlers::organization::accept_invitation,
        handlers::organization::add_group_member,
        handlers::organization::remove_group_member,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::account::SignUpRequest,
            dtos::account::SignInRequest,
            dtos::account::SessionResponse,
            dtos::account::SetPasswordRequest,
            dtos::account::ProfileNameRequest,
            dtos::account::ClaimAccountRequest,
            dtos::account::AccountMessageResponse,
            dtos::account::PasswordResetRequest,
            dtos::account::PasswordResetConfirm,
            dtos::account::DashboardMember,
            dtos::account::DashboardResponse,
            dtos::organization::OrganizationNameRequest,
            dtos::organization::OrganizationMessageResponse,
            dtos::organization::InviteRequest,
            dtos::organization::InvitationMessageResponse,
            dtos::organization::InvitationDetailsResponse,
            dtos::organization::AcceptInvitationResponse,
            dtos::organization::GroupMemberRequest,
            services::TokenResponse,
            services::CapabilitySet,
            models::AccountResponse,
            models::OrganizationResponse,
            models::GroupResponse,
            models::InvitationResponse,
            models::AccessRight,
            models::MembershipPlan,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Account", description = "Registration, sessions and credentials"),
        (name = "Organization", description = "Organizations, invitations and groups"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: TenancyConfig,
    pub accounts: AccountDomainService,
    pub organizations: OrganizationDomainService,
    pub capabilities: CapabilitiesService,
    pub account_facade: AccountFacade,
    pub organization_facade: OrganizationFacade,
    pub jwt: JwtService,
    pub blacklist: Arc<dyn TokenBlacklist>,
    pub sign_in_rate_limiter: IpRateLimit,
    pub ip_rate_limiter: IpRateLimit,
}

pub fn build_router(state: AppState) -> Router {
    let sign_in_route = Router::new()
        .route("/account/sign-in", post(handlers::account::sign_in))
        .layer(from_fn_with_state(
            state.sign_in_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let session_routes = Router::new()
        .route("/account/sign-out", post(handlers::account::sign_out))
        .route("/account/dashboard", get(handlers::account::dashboard))
        .route("/account/set-password", post(handlers::account::set_password))
        .route("/account/profile-name", post(handlers::account::set_profile_name))
        .route("/account/claim", post(handlers::account::claim_account))
        .route("/account/capabilities", get(handlers::account::capabilities))
        .route(
            "/organization",
            get(handlers::organization::get_active_organization),
        )
        .route(
            "/organization/create",
            post(handlers::organization::create_organization),
        )
        .route(
            "/organization/rename",
            post(handlers::organization::rename_organization),
        )
        .route(
            "/organization/switch/:id",
            post(handlers::organization::switch_organization),
        )
        .route("/organization/invite", post(handlers::organization::invite))
        .route(
            "/organization/invitation/:id/resend",
            post(handlers::organization::resend_invitation),
        )
        .route(
            "/organization/group/:id/add-member",
            post(handlers::organization::add_group_member),
        )
        .route(
            "/organization/group/:id/remove-member",
            post(handlers::organization::remove_group_member),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    // Viewing stays public; a presented session is still validated.
    let invitation_routes = Router::new()
        .route(
            "/organization/invitation/:id",
            get(handlers::organization::get_invitation)
                .post(handlers::organization::accept_invitation),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::optional_auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route("/account/sign-up", post(handlers::account::sign_up))
        .route("/account/guest", post(handlers::account::create_guest))
        .route(
            "/account/password-reset/request",
            post(handlers::account::request_password_reset),
        )
        .route(
            "/account/password-reset/confirm",
            post(handlers::account::confirm_password_reset),
        )
        .route("/account/verify", get(handlers::account::verify_email))
        .merge(sign_in_route)
        .merge(session_routes)
        .merge(invitation_routes)
        .with_state(state.clone())
        // Global IP rate limiting
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(from_fn(middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
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
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config))
}

fn cors_layer(config: &TenancyConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT_LANGUAGE,
        ]);

    // Rejected in production by `TenancyConfig::validate`.
    if config.security.allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins = config
        .security
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect::<Vec<_>>();

    layer.allow_origin(origins)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Service is unhealthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.accounts.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Storage health check failed");
        AppError::from(e)
    })?;

    state.blacklist.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Session revocation store health check failed");
        AppError::InternalError(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "storage": state.accounts.backend(),
            "sessions": "up"
        }
    })))
}
