use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    auth::{self, AuthUser},
    error::{AppError, Result},
    models::{
        AuthResponse, GoogleSignInRequest, NewUser, Role, SignInRequest, SignUpRequest, User,
        UserProfile,
    },
};

const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Issues a token for `user` and answers with the body plus the session cookie.
fn session_response(state: &AppState, user: User, status: StatusCode) -> Result<Response> {
    let token = auth::issue_token(user.id, &state.config)?;
    let cookie = auth::session_cookie(&token, &state.config)?;
    let body = AuthResponse {
        token,
        user: UserProfile::from(user),
    };
    Ok((status, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// signup
///
/// [Public Route] Registers a credentials account with the MEMBER role and
/// signs it in.
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<Response> {
    let email = normalize_email(&payload.email);
    let full_name = payload.full_name.trim().to_string();

    if !email.contains('@') {
        return Err(AppError::BadRequest("A valid email is required".to_string()));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(
            "Password must be at least 6 characters".to_string(),
        ));
    }
    if full_name.is_empty() {
        return Err(AppError::BadRequest("Full name is required".to_string()));
    }

    if state.repo.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict(
            "An account with this email already exists".to_string(),
        ));
    }

    let password_hash = auth::hash_password(payload.password).await?;
    let user = state
        .repo
        .create_user(NewUser {
            email,
            full_name,
            password_hash: Some(password_hash),
            role: Role::Member,
            avatar: None,
        })
        .await?;

    tracing::info!(user_id = %user.id, "account registered");
    session_response(&state, user, StatusCode::CREATED)
}

/// signin
///
/// [Public Route] Email and password login.
#[utoipa::path(
    post,
    path = "/api/auth/signin",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn signin(
    State(state): State<AppState>,
    Json(payload): Json<SignInRequest>,
) -> Result<Response> {
    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let user = state
        .repo
        .find_user_by_email(&normalize_email(&payload.email))
        .await?
        .ok_or_else(invalid)?;

    // OAuth-provisioned accounts have no password to check.
    let Some(hash) = user.password_hash.clone() else {
        return Err(AppError::Unauthorized(
            "Please sign in with Google".to_string(),
        ));
    };

    if !auth::verify_password(payload.password, hash).await? {
        return Err(invalid());
    }

    tracing::info!(user_id = %user.id, "signed in with credentials");
    session_response(&state, user, StatusCode::OK)
}

/// google_signin
///
/// [Public Route] Exchanges a Google ID token for a session. Unknown emails are
/// provisioned as MEMBER accounts without a password.
#[utoipa::path(
    post,
    path = "/api/auth/google",
    request_body = GoogleSignInRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid Google token"),
        (status = 503, description = "Google sign-in not configured")
    )
)]
pub async fn google_signin(
    State(state): State<AppState>,
    Json(payload): Json<GoogleSignInRequest>,
) -> Result<Response> {
    let Some(identity_provider) = state.identity.clone() else {
        return Err(AppError::ServiceUnavailable(
            "Google sign-in is not configured".to_string(),
        ));
    };

    let identity = identity_provider.verify(payload.id_token.trim()).await?;

    let user = match state.repo.find_user_by_email(&identity.email).await? {
        Some(user) => match (&user.avatar, &identity.picture) {
            (None, Some(picture)) => state
                .repo
                .set_user_avatar(user.id, picture)
                .await?
                .unwrap_or(user),
            _ => user,
        },
        None => {
            let full_name = identity.name.clone().unwrap_or_else(|| {
                identity
                    .email
                    .split('@')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            });
            let user = state
                .repo
                .create_user(NewUser {
                    email: identity.email.clone(),
                    full_name,
                    password_hash: None,
                    role: Role::Member,
                    avatar: identity.picture.clone(),
                })
                .await?;
            tracing::info!(user_id = %user.id, "account provisioned from google");
            user
        }
    };

    session_response(&state, user, StatusCode::OK)
}

/// signout
///
/// [Public Route] Expires the session cookie. Bearer tokens simply lapse.
#[utoipa::path(
    post,
    path = "/api/auth/signout",
    responses((status = 204, description = "Session cookie cleared"))
)]
pub async fn signout() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, auth::clear_session_cookie())],
    )
}

/// me
///
/// [Authenticated Route] The session user, with the role as currently stored.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Session user", body = UserProfile),
        (status = 401, description = "No session")
    )
)]
pub async fn me(user: AuthUser, State(state): State<AppState>) -> Result<Json<UserProfile>> {
    let user = state
        .repo
        .get_user(user.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Unauthorized".to_string()))?;
    Ok(Json(UserProfile::from(user)))
}
