use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use super::request_locale;
use crate::{
    dtos::account::{
        AccountMessageResponse, ClaimAccountRequest, DashboardMember, DashboardResponse,
        PasswordResetConfirm, PasswordResetRequest, ProfileNameRequest, SessionResponse,
        SetPasswordRequest, SignInRequest, SignUpRequest, VerifyEmailQuery,
    },
    dtos::MessageResponse,
    middleware::AuthUser,
    models::{Account, AccountResponse, GroupResponse, InvitationResponse, OrganizationResponse},
    services::CapabilitySet,
    utils::{Password, ValidatedJson},
    AppState,
};

fn session_response(
    state: &AppState,
    account: Account,
    message: &str,
) -> Result<SessionResponse, AppError> {
    let session = state.jwt.issue_session(account.account_id)?;
    Ok(SessionResponse {
        account: AccountResponse::from(account),
        session,
        message: message.to_string(),
    })
}

/// Register with email and password
#[utoipa::path(
    post,
    path = "/account/sign-up",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account registered", body = SessionResponse),
        (status = 400, description = "Invalid email", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Account"
)]
#[tracing::instrument(skip_all)]
pub async fn sign_up(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SignUpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = state
        .accounts
        .register(&req.email, Some(&Password::new(req.password)), false)
        .await?;

    // Registration stands even when the verification mail cannot be sent.
    if let Err(e) = state
        .accounts
        .send_email_verification(account.account_id, &state.config.public_base_url)
        .await
    {
        tracing::warn!(account_id = %account.account_id, error = %e, "Verification mail not sent");
    }

    let res = session_response(
        &state,
        account,
        "Registration successful. Please check your email to verify your account.",
    )?;
    Ok((StatusCode::CREATED, Json(res)))
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/account/sign-in",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    ),
    tag = "Account"
)]
#[tracing::instrument(skip_all)]
pub async fn sign_in(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SignInRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = state
        .accounts
        .sign_in(&req.email, &Password::new(req.password))
        .await?;
    Ok(Json(session_response(&state, account, "Signed in successfully")?))
}

/// Start as a guest without email
#[utoipa::path(
    post,
    path = "/account/guest",
    responses(
        (status = 201, description = "Unregistered account created", body = SessionResponse)
    ),
    tag = "Account"
)]
#[tracing::instrument(skip_all)]
pub async fn create_guest(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let account = state.accounts.create_unregistered_account().await?;
    let res = session_response(&state, account, "Guest account created")?;
    Ok((StatusCode::CREATED, Json(res)))
}

/// Revoke the current session
#[utoipa::path(
    post,
    path = "/account/sign-out",
    responses(
        (status = 200, description = "Signed out", body = MessageResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    ),
    tag = "Account",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all, fields(account_id = %user.account_id))]
pub async fn sign_out(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    state
        .blacklist
        .blacklist_token(&user.claims.jti, user.claims.remaining_seconds())
        .await?;
    tracing::info!("Signed out");
    Ok(Json(MessageResponse::new("Signed out successfully")))
}

/// Request a password reset mail
#[utoipa::path(
    post,
    path = "/account/password-reset/request",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Reset mail sent if the account exists", body = MessageResponse)
    ),
    tag = "Account"
)]
#[tracing::instrument(skip_all)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PasswordResetRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .accounts
        .request_password_reset(&req.email, &state.config.public_base_url)
        .await?;
    Ok(Json(MessageResponse::new(
        "If an account exists for this email, a reset link has been sent.",
    )))
}

/// Set a new password from a reset link
#[utoipa::path(
    post,
    path = "/account/password-reset/confirm",
    request_body = PasswordResetConfirm,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = ErrorResponse)
    ),
    tag = "Account"
)]
#[tracing::instrument(skip_all)]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PasswordResetConfirm>,
) -> Result<impl IntoResponse, AppError> {
    state
        .accounts
        .confirm_password_reset(&req.token, &Password::new(req.new_password))
        .await?;
    Ok(Json(MessageResponse::new("Password has been reset")))
}

/// Verify an email address
#[utoipa::path(
    get,
    path = "/account/verify",
    params(VerifyEmailQuery),
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = ErrorResponse)
    ),
    tag = "Account"
)]
#[tracing::instrument(skip_all)]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<impl IntoResponse, AppError> {
    query.validate()?;
    state.accounts.verify_email(&query.token).await?;
    Ok(Json(MessageResponse::new("Email verified successfully")))
}

/// Replace the generated password of an invited account
#[utoipa::path(
    post,
    path = "/account/set-password",
    request_body = SetPasswordRequest,
    responses(
        (status = 200, description = "Password set", body = AccountMessageResponse),
        (status = 400, description = "Passwords do not match", body = ErrorResponse),
        (status = 409, description = "Password already set", body = ErrorResponse)
    ),
    tag = "Account",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all, fields(account_id = %user.account_id))]
pub async fn set_password(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<SetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = state
        .accounts
        .set_initial_password(
            user.account_id,
            &Password::new(req.password),
            &Password::new(req.password_confirmation),
        )
        .await?;
    Ok(Json(AccountMessageResponse {
        account: account.into(),
        message: "Password set successfully".to_string(),
    }))
}

/// Set or clear the name shown instead of the email
#[utoipa::path(
    post,
    path = "/account/profile-name",
    request_body = ProfileNameRequest,
    responses(
        (status = 200, description = "Profile name updated", body = AccountMessageResponse),
        (status = 422, description = "Name too long", body = ErrorResponse)
    ),
    tag = "Account",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all, fields(account_id = %user.account_id))]
pub async fn set_profile_name(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<ProfileNameRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = state
        .accounts
        .set_display_name(user.account_id, req.display_name.as_deref())
        .await?;
    Ok(Json(AccountMessageResponse {
        account: account.into(),
        message: "Profile name updated".to_string(),
    }))
}

/// Attach an email to a guest account
#[utoipa::path(
    post,
    path = "/account/claim",
    request_body = ClaimAccountRequest,
    responses(
        (status = 200, description = "Account claimed", body = AccountMessageResponse),
        (status = 409, description = "Already registered or email taken", body = ErrorResponse)
    ),
    tag = "Account",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all, fields(account_id = %user.account_id))]
pub async fn claim_account(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<ClaimAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let password = req.password.map(Password::new);
    let account = state
        .accounts
        .claim_unregistered_account(user.account_id, &req.email, password.as_ref())
        .await?;

    if let Err(e) = state
        .accounts
        .send_email_verification(account.account_id, &state.config.public_base_url)
        .await
    {
        tracing::warn!(error = %e, "Verification mail not sent");
    }

    Ok(Json(AccountMessageResponse {
        account: account.into(),
        message: "Account registered. Please check your email to verify it.".to_string(),
    }))
}

/// Capabilities of the signed-in account
#[utoipa::path(
    get,
    path = "/account/capabilities",
    responses(
        (status = 200, description = "Capability flags", body = CapabilitySet)
    ),
    tag = "Account",
    security(("bearer_auth" = []))
)]
pub async fn capabilities(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<CapabilitySet>, AppError> {
    let account = state.accounts.require(user.account_id).await?;
    Ok(Json(state.capabilities.snapshot(Some(&account)).await?))
}

/// Account, organizations and, where permitted, members and groups of the
/// active organization
#[utoipa::path(
    get,
    path = "/account/dashboard",
    responses(
        (status = 200, description = "Dashboard", body = DashboardResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    ),
    tag = "Account",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all, fields(account_id = %user.account_id))]
pub async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: AuthUser,
) -> Result<Json<DashboardResponse>, AppError> {
    let locale = request_locale(&headers);
    let account = state.accounts.require(user.account_id).await?;

    let capabilities = state.capabilities.snapshot(Some(&account)).await?;
    let active_id = account.currently_active_organization_id;

    let organizations = state
        .organizations
        .all_organizations_for_account(account.account_id)
        .await?
        .iter()
        .map(|org| OrganizationResponse::for_viewer(org, account.account_id, active_id, locale))
        .collect::<Vec<_>>();

    let active = state
        .organizations
        .currently_active_organization_of_account(account.account_id)
        .await?;

    let mut members = Vec::new();
    let mut groups = Vec::new();
    let mut pending_invitations = Vec::new();

    if let Some(organization) = &active {
        let organization_id = organization.organization_id;

        if capabilities.can_see_organization_groups_and_members {
            for group in state.organizations.groups(organization_id).await? {
                let member_ids = state.organizations.group_member_ids(group.group_id).await?;
                groups.push(GroupResponse::new(group, member_ids));
            }

            let memberships = state
                .organizations
                .members_of_organization(organization_id)
                .await?;
            let account_ids: Vec<Uuid> = memberships.iter().map(|(id, _)| *id).collect();
            let joins: HashMap<Uuid, DateTime<Utc>> = memberships.into_iter().collect();
            members = state
                .account_facade
                .account_info_by_ids(&account_ids)
                .await?
                .into_iter()
                .map(|info| DashboardMember {
                    is_owner: organization.is_owned_by(info.account_id),
                    is_current_user: info.account_id == account.account_id,
                    group_ids: group_ids_of(&groups, info.account_id),
                    joined_utc: joins
                        .get(&info.account_id)
                        .copied()
                        .unwrap_or(organization.created_utc),
                    account_id: info.account_id,
                    email: info.email,
                    display_name: info.display_name,
                })
                .collect();
            sort_members(&mut members);
        }

        if organization.is_owned_by(account.account_id) {
            pending_invitations = state
                .organizations
                .pending_invitations(organization_id)
                .await?
                .into_iter()
                .map(InvitationResponse::from)
                .collect();
        }
    }

    Ok(Json(DashboardResponse {
        active_organization: active
            .as_ref()
            .map(|org| OrganizationResponse::for_viewer(org, account.account_id, active_id, locale)),
        account: account.into(),
        capabilities,
        organizations,
        members,
        groups,
        pending_invitations,
    }))
}

fn group_ids_of(groups: &[GroupResponse], account_id: Uuid) -> Vec<Uuid> {
    groups
        .iter()
        .filter(|group| group.member_account_ids.contains(&account_id))
        .map(|group| group.group_id)
        .collect()
}

/// Owner first, then by display name ignoring case.
fn sort_members(members: &mut [DashboardMember]) {
    members.sort_by(|a, b| {
        b.is_owner
            .cmp(&a.is_owner)
            .then_with(|| a.display_name.to_lowercase().cmp(&b.display_name.to_lowercase()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str, is_owner: bool) -> DashboardMember {
        DashboardMember {
            account_id: Uuid::new_v4(),
            email: None,
            display_name: name.to_string(),
            is_owner,
            is_current_user: false,
            joined_utc: Utc::now(),
            group_ids: Vec::new(),
        }
    }

    #[test]
    fn owner_sorts_first_then_names_case_insensitively() {
        let mut members = vec![
            member("bob", false),
            member("Zoe", true),
            member("alice", false),
            member("Carl", false),
        ];
        sort_members(&mut members);
        let names: Vec<_> = members.iter().map(|m| m.display_name.as_str()).collect();
        assert_eq!(names, ["Zoe", "alice", "bob", "Carl"]);
    }
}
