use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;

use workshop_auth::{
    ActivateProfile, DeactivateProfile, Permission, ProfileCommand, ProfileRole, RegisterUser, UpdateContact,
    UpdateUser, UserAccount, UserCommand, UserProfile,
};
use workshop_core::UserId;
use workshop_infra::projections::{UserQuery, UserReadModel};
use workshop_infra::event_store::StoredEvent;
use workshop_infra::provisioning::ProvisionOutcome;
use workshop_infra::read_model::{Page, Pagination};
use workshop_infra::streams;
use workshop_infra::unique_index::UniqueKey;

use crate::app::dto::{self, ChangeRoleRequest, CreateUserRequest, UpdateUserRequest, UserListParams};
use crate::app::errors::ApiError;
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::routes::common::{authorized, committed, found, parse_id, require};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_user).get(list_users))
        .route("/:id", get(get_user).patch(update_user))
        .route("/:id/role", post(change_role))
        .route("/:id/deactivate", post(deactivate_user))
        .route("/:id/activate", post(activate_user))
}

/// Register the account; the profile follows through the provisioner.
///
/// With an explicit role or phone the profile is provisioned (or aligned)
/// before responding.
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<CreateUserRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let user_id = UserId::new();
    let role: Option<ProfileRole> = dto::parse_opt(body.role.as_deref())?;

    let cmd = UserCommand::Register(RegisterUser {
        tenant_id,
        user_id,
        username: body.username.clone(),
        first_name: body.first_name,
        last_name: body.last_name,
        email: body.email,
        occurred_at: Utc::now(),
    });
    let cmd = authorized(&tenant, &principal, cmd, &[Permission::ACCOUNTS_MANAGE])?;

    let reservation = services
        .unique_keys()
        .reserve(tenant_id, UniqueKey::Username, &body.username, user_id.into())?;

    let committed_events = services.dispatch(tenant_id, user_id.into(), streams::USER, cmd, |_, id| {
        UserAccount::empty(UserId::from(id))
    })?;
    reservation.commit();

    if role.is_some() || body.phone.is_some() {
        services
            .provisioner()
            .ensure_profile(tenant_id, user_id, role, body.phone, Utc::now())?;
    }

    Ok(committed(StatusCode::CREATED, user_id, &committed_events))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(params): ApiQuery<UserListParams>,
) -> Result<Json<Page<UserReadModel>>, ApiError> {
    require(&tenant, &principal, Permission::ACCOUNTS_MANAGE)?;

    let query = UserQuery {
        search: params.search,
        role: dto::parse_opt(params.role.as_deref())?,
        active: params.active,
    };
    let page = Pagination::new(params.limit, params.offset);
    Ok(Json(services.users().list(tenant.tenant_id(), &query, page)))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<UserReadModel>, ApiError> {
    require(&tenant, &principal, Permission::ACCOUNTS_MANAGE)?;
    let user_id: UserId = parse_id(&id, "user")?;
    found(services.users().get(tenant.tenant_id(), &user_id), "user")
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let user_id: UserId = parse_id(&id, "user")?;

    let cmd = UserCommand::Update(UpdateUser {
        tenant_id,
        user_id,
        first_name: body.first_name,
        last_name: body.last_name,
        email: body.email,
        occurred_at: Utc::now(),
    });
    let cmd = authorized(&tenant, &principal, cmd, &[Permission::ACCOUNTS_MANAGE])?;

    let mut events = services.dispatch(tenant_id, user_id.into(), streams::USER, cmd, |_, id| {
        UserAccount::empty(UserId::from(id))
    })?;

    if let Some(phone) = body.phone {
        let phone = Some(phone).filter(|p| !p.trim().is_empty());
        let contact = ProfileCommand::UpdateContact(UpdateContact {
            tenant_id,
            user_id,
            phone,
            occurred_at: Utc::now(),
        });
        events.extend(dispatch_profile(&services, &tenant, user_id, contact)?);
    }

    Ok(committed(StatusCode::OK, user_id, &events))
}

pub async fn change_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ChangeRoleRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let user_id: UserId = parse_id(&id, "user")?;
    let role: ProfileRole = dto::parse_required(&body.role)?;
    require(&tenant, &principal, Permission::ACCOUNTS_MANAGE)?;

    // The account must exist; its profile may still be in flight.
    services.load(tenant_id, user_id.into(), |_, id| UserAccount::empty(UserId::from(id)))?;
    let outcome = services
        .provisioner()
        .ensure_profile(tenant_id, user_id, Some(role), None, Utc::now())?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "id": user_id.to_string(),
            "role": role.as_str(),
            "provisioned": outcome == ProvisionOutcome::Provisioned,
        })),
    )
        .into_response())
}

pub async fn deactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let user_id: UserId = parse_id(&id, "user")?;
    let cmd = ProfileCommand::Deactivate(DeactivateProfile {
        tenant_id: tenant.tenant_id(),
        user_id,
        occurred_at: Utc::now(),
    });
    let cmd = authorized(&tenant, &principal, cmd, &[Permission::ACCOUNTS_MANAGE])?;
    let events = dispatch_profile(&services, &tenant, user_id, cmd)?;
    Ok(committed(StatusCode::OK, user_id, &events))
}

pub async fn activate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let user_id: UserId = parse_id(&id, "user")?;
    let cmd = ProfileCommand::Activate(ActivateProfile {
        tenant_id: tenant.tenant_id(),
        user_id,
        occurred_at: Utc::now(),
    });
    let cmd = authorized(&tenant, &principal, cmd, &[Permission::ACCOUNTS_MANAGE])?;
    let events = dispatch_profile(&services, &tenant, user_id, cmd)?;
    Ok(committed(StatusCode::OK, user_id, &events))
}

fn dispatch_profile(
    services: &AppServices,
    tenant: &TenantContext,
    user_id: UserId,
    cmd: ProfileCommand,
) -> Result<Vec<StoredEvent>, ApiError> {
    let stream_id = user_id.profile_stream_id();
    Ok(services.dispatch(tenant.tenant_id(), stream_id, streams::PROFILE, cmd, move |_, _| {
        UserProfile::empty(user_id)
    })?)
}
