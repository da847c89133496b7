use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use super::{active_organization, request_locale};
use crate::{
    dtos::organization::{
        AcceptInvitationResponse, GroupMemberRequest, InvitationDetailsResponse,
        InvitationMessageResponse, InviteRequest, OrganizationMessageResponse,
        OrganizationNameRequest,
    },
    dtos::MessageResponse,
    middleware::{AuthUser, MaybeAuthUser},
    models::{AccessRight, Group, InvitationResponse, Organization, OrganizationResponse},
    services::ServiceError,
    utils::ValidatedJson,
    AppState,
};

fn organization_response(
    organization: &Organization,
    viewer_account_id: Uuid,
    active_organization_id: Option<Uuid>,
    headers: &HeaderMap,
) -> OrganizationResponse {
    OrganizationResponse::for_viewer(
        organization,
        viewer_account_id,
        active_organization_id,
        request_locale(headers),
    )
}

/// Loads a group of the caller's active organization. Groups of other
/// organizations are reported as missing.
async fn group_of_active_organization(
    state: &AppState,
    account_id: Uuid,
    group_id: Uuid,
) -> Result<Group, AppError> {
    let organization = active_organization(state, account_id).await?;
    state
        .organizations
        .get_group_by_id(group_id)
        .await?
        .filter(|group| group.organization_id == organization.organization_id)
        .ok_or_else(|| ServiceError::GroupNotFound.into())
}

/// The active organization of the signed-in account
#[utoipa::path(
    get,
    path = "/organization",
    responses(
        (status = 200, description = "Active organization", body = OrganizationResponse),
        (status = 404, description = "No active organization", body = ErrorResponse)
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn get_active_organization(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: AuthUser,
) -> Result<Json<OrganizationResponse>, AppError> {
    let organization = active_organization(&state, user.account_id).await?;
    Ok(Json(organization_response(
        &organization,
        user.account_id,
        Some(organization.organization_id),
        &headers,
    )))
}

/// Create another organization owned by the signed-in account
#[utoipa::path(
    post,
    path = "/organization/create",
    request_body = OrganizationNameRequest,
    responses(
        (status = 201, description = "Organization created", body = OrganizationMessageResponse),
        (status = 409, description = "Account is a member of another organization", body = ErrorResponse)
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all, fields(account_id = %user.account_id))]
pub async fn create_organization(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<OrganizationNameRequest>,
) -> Result<impl IntoResponse, AppError> {
    let organization = state
        .organizations
        .create_organization(user.account_id, req.name.as_deref())
        .await?;
    let active_id = state
        .account_facade
        .currently_active_organization_id(user.account_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrganizationMessageResponse {
            organization: organization_response(&organization, user.account_id, active_id, &headers),
            message: "Organization created".to_string(),
        }),
    ))
}

/// Rename the active organization
#[utoipa::path(
    post,
    path = "/organization/rename",
    request_body = OrganizationNameRequest,
    responses(
        (status = 200, description = "Organization renamed", body = OrganizationMessageResponse),
        (status = 403, description = "Access denied", body = ErrorResponse)
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all, fields(account_id = %user.account_id))]
pub async fn rename_organization(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<OrganizationNameRequest>,
) -> Result<Json<OrganizationMessageResponse>, AppError> {
    state
        .organizations
        .require_access_right(user.account_id, AccessRight::EditOrganizationName)
        .await?;
    let organization = active_organization(&state, user.account_id).await?;
    let organization = state
        .organizations
        .rename_organization(organization.organization_id, req.name.as_deref())
        .await?;

    Ok(Json(OrganizationMessageResponse {
        organization: organization_response(
            &organization,
            user.account_id,
            Some(organization.organization_id),
            &headers,
        ),
        message: "Organization name has been changed".to_string(),
    }))
}

/// Make another organization the active one
#[utoipa::path(
    post,
    path = "/organization/switch/{id}",
    params(("id" = Uuid, Path, description = "Organization id")),
    responses(
        (status = 200, description = "Active organization switched", body = OrganizationMessageResponse),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse)
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, headers, user), fields(account_id = %user.account_id))]
pub async fn switch_organization(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OrganizationMessageResponse>, AppError> {
    let organization = state
        .organizations
        .switch_organization(user.account_id, id)
        .await?;

    let locale = request_locale(&headers);
    Ok(Json(OrganizationMessageResponse {
        message: format!(
            "Switched to organization \"{}\"",
            state.organizations.organization_name(&organization, Some(locale))
        ),
        organization: organization_response(
            &organization,
            user.account_id,
            Some(organization.organization_id),
            &headers,
        ),
    }))
}

/// Invite an email to the active organization
#[utoipa::path(
    post,
    path = "/organization/invite",
    request_body = InviteRequest,
    responses(
        (status = 201, description = "Invitation sent", body = InvitationMessageResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 409, description = "Already a member", body = ErrorResponse)
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all, fields(account_id = %user.account_id))]
pub async fn invite(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<InviteRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .organizations
        .require_access_right(user.account_id, AccessRight::InviteOrganizationMembers)
        .await?;
    let organization = active_organization(&state, user.account_id).await?;
    let invitation = state
        .organizations
        .invite_email_to_organization(&req.email, organization.organization_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(InvitationMessageResponse {
            message: format!("Invitation sent to {}", invitation.email),
            invitation: InvitationResponse::from(invitation),
        }),
    ))
}

/// Mail a pending invitation again
#[utoipa::path(
    post,
    path = "/organization/invitation/{id}/resend",
    params(("id" = Uuid, Path, description = "Invitation id")),
    responses(
        (status = 200, description = "Invitation resent", body = InvitationMessageResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Invitation not found", body = ErrorResponse)
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user), fields(account_id = %user.account_id))]
pub async fn resend_invitation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<InvitationMessageResponse>, AppError> {
    state
        .organizations
        .require_access_right(user.account_id, AccessRight::InviteOrganizationMembers)
        .await?;
    let organization = active_organization(&state, user.account_id).await?;
    let pending = state
        .organizations
        .get_invitation_by_id(id)
        .await?
        .filter(|invitation| invitation.organization_id == organization.organization_id);
    if pending.is_none() {
        return Err(ServiceError::InvitationNotFound.into());
    }

    let invitation = state.organizations.resend_invitation(id).await?;
    Ok(Json(InvitationMessageResponse {
        message: format!("Invitation resent to {}", invitation.email),
        invitation: InvitationResponse::from(invitation),
    }))
}

/// Invitation as shown to the invitee
#[utoipa::path(
    get,
    path = "/organization/invitation/{id}",
    params(("id" = Uuid, Path, description = "Invitation id")),
    responses(
        (status = 200, description = "Invitation details", body = InvitationDetailsResponse),
        (status = 404, description = "Invitation not found", body = ErrorResponse)
    ),
    tag = "Organization"
)]
pub async fn get_invitation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<InvitationDetailsResponse>, AppError> {
    let invitation = state
        .organizations
        .get_invitation_by_id(id)
        .await?
        .ok_or(ServiceError::InvitationNotFound)?;
    let organization = state
        .organizations
        .get_organization_by_id(invitation.organization_id)
        .await?
        .ok_or(ServiceError::OrganizationNotFound)?;

    let locale = request_locale(&headers);
    let organization_name = state
        .organization_facade
        .organization_name_by_id(organization.organization_id, Some(locale.as_str()))
        .await?
        .ok_or(ServiceError::OrganizationNotFound)?;

    Ok(Json(InvitationDetailsResponse {
        invitation_id: invitation.invitation_id,
        email: invitation.email,
        organization_name,
        owner_name: state.organizations.inviter_name(&organization).await?,
    }))
}

/// Accept an invitation, signed in or not
#[utoipa::path(
    post,
    path = "/organization/invitation/{id}",
    params(("id" = Uuid, Path, description = "Invitation id")),
    responses(
        (status = 200, description = "Invitation accepted", body = AcceptInvitationResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse),
        (status = 404, description = "Invitation not found", body = ErrorResponse),
        (status = 409, description = "Email registered; sign in first", body = ErrorResponse)
    ),
    tag = "Organization",
    security((), ("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, headers, user))]
pub async fn accept_invitation(
    State(state): State<AppState>,
    headers: HeaderMap,
    MaybeAuthUser(user): MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AcceptInvitationResponse>, AppError> {
    let accepted = state
        .organizations
        .accept_invitation(id, user.map(|u| u.account_id))
        .await?;

    let session = if accepted.is_new_account {
        Some(state.jwt.issue_session(accepted.account.account_id)?)
    } else {
        None
    };

    let locale = request_locale(&headers);
    let organization_name = state
        .organizations
        .organization_name(&accepted.organization, Some(locale));

    Ok(Json(AcceptInvitationResponse {
        organization: OrganizationResponse::for_viewer(
            &accepted.organization,
            accepted.account.account_id,
            accepted.account.currently_active_organization_id,
            locale,
        ),
        account: accepted.account.into(),
        session,
        message: format!("You are now a member of \"{}\"", organization_name),
    }))
}

/// Add a member of the active organization to one of its groups
#[utoipa::path(
    post,
    path = "/organization/group/{id}/add-member",
    params(("id" = Uuid, Path, description = "Group id")),
    request_body = GroupMemberRequest,
    responses(
        (status = 200, description = "Member added", body = MessageResponse),
        (status = 403, description = "Access denied or not a member", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse),
        (status = 409, description = "Already in group", body = ErrorResponse)
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user, req), fields(account_id = %user.account_id, member_id = %req.account_id))]
pub async fn add_group_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<GroupMemberRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .organizations
        .require_access_right(user.account_id, AccessRight::MoveOrganizationMembersIntoGroups)
        .await?;
    let group = group_of_active_organization(&state, user.account_id, id).await?;
    state
        .organizations
        .add_account_to_group(req.account_id, group.group_id)
        .await?;
    Ok(Json(MessageResponse::new(format!(
        "Member added to \"{}\"",
        group.group_name
    ))))
}

/// Remove an account from a group of the active organization
#[utoipa::path(
    post,
    path = "/organization/group/{id}/remove-member",
    params(("id" = Uuid, Path, description = "Group id")),
    request_body = GroupMemberRequest,
    responses(
        (status = 200, description = "Member removed", body = MessageResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user, req), fields(account_id = %user.account_id, member_id = %req.account_id))]
pub async fn remove_group_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<GroupMemberRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .organizations
        .require_access_right(user.account_id, AccessRight::MoveOrganizationMembersIntoGroups)
        .await?;
    let group = group_of_active_organization(&state, user.account_id, id).await?;
    state
        .organizations
        .remove_account_from_group(req.account_id, group.group_id)
        .await?;
    Ok(Json(MessageResponse::new(format!(
        "Member removed from \"{}\"",
        group.group_name
    ))))
}
