//! HTTP handlers for tenancy-service.

pub mod account;
pub mod metrics;
pub mod organization;

use axum::http::{header, HeaderMap};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{Iso639_1Code, Organization};
use crate::AppState;

/// First supported language of `Accept-Language`, else English.
pub(crate) fn request_locale(headers: &HeaderMap) -> Iso639_1Code {
    headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            value
                .split(',')
                .filter_map(|tag| tag.split(';').next())
                .find_map(|tag| tag.parse::<Iso639_1Code>().ok())
        })
        .unwrap_or_default()
}

/// The organization the account currently works in.
pub(crate) async fn active_organization(
    state: &AppState,
    account_id: Uuid,
) -> Result<Organization, AppError> {
    state
        .organizations
        .currently_active_organization_of_account(account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No active organization")))
}
