//! Authentication route handlers.
//!
//! Tokens are stateless, so logout only tells the client to drop its token.
//! `POST /api/auth?action=...` routes to the same handlers as the dedicated
//! paths for clients that only speak the action-parameter style.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query, Request, State},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use lumiere_core::{Email, UserId};

use super::Message;
use crate::error::{AppError, JsonBody, Result};
use crate::middleware::RequireUser;
use crate::models::{OrderSummary, User};
use crate::services::auth::{AuthService, ProfileUpdate, Registration, Session};
use crate::services::orders::OrderService;
use crate::state::AppState;

/// Orders shown with the profile.
const PROFILE_ORDER_LIMIT: i64 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct RegisterBody {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileBody {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(alias = "currentPassword")]
    pub current_password: Option<String>,
    #[serde(alias = "newPassword")]
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActionQuery {
    pub action: Option<String>,
}

/// Response to a successful register or login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub user_id: UserId,
    pub name: String,
    pub email: Email,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub message: &'static str,
}

impl AuthResponse {
    fn new(session: Session, message: &'static str) -> Self {
        Self {
            success: true,
            user_id: session.user.id,
            name: session.user.name,
            email: session.user.email,
            token: session.token.token,
            expires_at: session.token.expires_at,
            message,
        }
    }
}

/// The account with its most recent orders.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: User,
    pub orders: Vec<OrderSummary>,
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdated {
    pub success: bool,
    pub message: &'static str,
    pub user: User,
}

/// Create an account and sign in.
#[instrument(skip(state, body))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterBody>,
) -> Result<Json<AuthResponse>> {
    let auth = AuthService::new(state.pool(), state.tokens());
    let session = auth
        .register(&Registration {
            name: &body.name,
            email: &body.email,
            password: &body.password,
            phone: body.phone.as_deref(),
        })
        .await?;

    Ok(Json(AuthResponse::new(session, "Registration successful")))
}

/// Exchange email and password for a token.
#[instrument(skip(state, body))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginBody>,
) -> Result<Json<AuthResponse>> {
    let auth = AuthService::new(state.pool(), state.tokens());
    let session = auth.login(&body.email, &body.password).await?;

    tracing::info!(user_id = %session.user.id, "User logged in");
    Ok(Json(AuthResponse::new(session, "Login successful")))
}

/// Nothing to revoke server-side.
pub async fn logout() -> Json<Message> {
    Json(Message::ok("Logout successful"))
}

/// The signed-in user's account and last orders.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn profile(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<ProfileResponse>> {
    let account = AuthService::new(state.pool(), state.tokens())
        .profile(user.id)
        .await?;
    let orders = OrderService::new(state.pool())
        .history(user.id, Some(PROFILE_ORDER_LIMIT))
        .await?;

    Ok(Json(ProfileResponse {
        user: account,
        orders,
    }))
}

/// Update name, phone, address or password.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    JsonBody(body): JsonBody<UpdateProfileBody>,
) -> Result<Json<ProfileUpdated>> {
    let updated = AuthService::new(state.pool(), state.tokens())
        .update_profile(
            user.id,
            &ProfileUpdate {
                name: body.name.as_deref(),
                phone: body.phone.as_deref(),
                address: body.address.as_deref(),
                current_password: body.current_password.as_deref(),
                new_password: body.new_password.as_deref(),
            },
        )
        .await?;

    Ok(Json(ProfileUpdated {
        success: true,
        message: "Profile updated successfully",
        user: updated,
    }))
}

/// `POST /api/auth?action=register|login|logout|profile|update`.
pub async fn dispatch(
    State(state): State<AppState>,
    Query(query): Query<ActionQuery>,
    request: Request,
) -> Result<Response> {
    let action = query.action.unwrap_or_default();

    match action.as_str() {
        "register" => {
            let body = JsonBody::from_request(request, &state).await?;
            Ok(register(State(state), body).await?.into_response())
        }
        "login" => {
            let body = JsonBody::from_request(request, &state).await?;
            Ok(login(State(state), body).await?.into_response())
        }
        "logout" => Ok(logout().await.into_response()),
        "profile" => {
            let (mut parts, _) = request.into_parts();
            let user = RequireUser::from_request_parts(&mut parts, &state).await?;
            Ok(profile(State(state), user).await?.into_response())
        }
        "update" => {
            let (mut parts, body) = request.into_parts();
            let user = RequireUser::from_request_parts(&mut parts, &state).await?;
            let body = JsonBody::from_request(Request::from_parts(parts, body), &state).await?;
            Ok(update_profile(State(state), user, body)
                .await?
                .into_response())
        }
        _ => Err(AppError::BadRequest("Invalid action".to_owned())),
    }
}
