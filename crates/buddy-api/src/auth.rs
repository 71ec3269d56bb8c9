use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{info, warn};
use uuid::Uuid;

use buddy_db::models::{UserRow, timestamp};
use buddy_db::queries::NewUser;
use buddy_gateway::connection::{Identified, TokenVerifier};
use buddy_types::api::{
    AuthenticateUserArgs, Claims, RegisterUserArgs, SessionGrant, SessionUser, ValidateSessionArgs,
};
use buddy_types::messages;
use buddy_types::models::{Role, User};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, AppStateInner, db_call};

const MAX_USERNAME_CHARS: usize = 32;

/// The caller of a request, resolved from its session token. Handlers take
/// this explicitly instead of reading any ambient session.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn id(&self) -> String {
        self.user_id.to_string()
    }

    pub fn require_student(&self) -> ApiResult<()> {
        match self.role {
            Role::Student => Ok(()),
            _ => Err(ApiError::Forbidden(messages::STUDENTS_ONLY)),
        }
    }

    pub fn require_guardian(&self) -> ApiResult<()> {
        if self.role.is_guardian() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(messages::GUARDIANS_ONLY))
        }
    }
}

/// Usernames are matched case-insensitively and without surrounding blanks.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

// -- Procedures --

/// POST /rpc/authenticate_user
pub async fn authenticate_user(
    State(state): State<AppState>,
    Json(args): Json<AuthenticateUserArgs>,
) -> ApiResult<Json<Vec<SessionGrant>>> {
    let username = normalize_username(&args.p_username);

    let grant = db_call(&state, move |s| {
        let user = s
            .db
            .get_user_by_username(&username)?
            .ok_or(ApiError::NotFound(messages::USER_NOT_FOUND))?;

        let Some(stored_hash) = user.password.as_deref() else {
            return Err(ApiError::Forbidden(messages::NO_PASSWORD));
        };
        verify_password(&args.p_password, stored_hash)?;

        s.db.touch_last_login(&user.id)?;
        let user = s
            .db
            .get_user_by_id(&user.id)?
            .ok_or(ApiError::NotFound(messages::USER_NOT_FOUND))?;

        issue_session(s, user)
    })
    .await?;

    info!("{} ({}) logged in", grant.user_data.username, grant.user_data.id);
    Ok(Json(vec![grant]))
}

/// POST /rpc/register_user
pub async fn register_user(
    State(state): State<AppState>,
    Json(args): Json<RegisterUserArgs>,
) -> ApiResult<impl IntoResponse> {
    let username = normalize_username(&args.p_username);
    if username.is_empty() {
        return Err(ApiError::Validation(messages::USERNAME_REQUIRED));
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(ApiError::Validation(messages::USERNAME_TOO_LONG));
    }
    if args.p_password.is_empty() {
        return Err(ApiError::Validation(messages::PASSWORD_REQUIRED));
    }

    let avatar_url = args
        .p_avatar_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());

    let grant = db_call(&state, move |s| {
        let password_hash = hash_password(&args.p_password)?;
        let connection_code = match args.p_role {
            Role::Student => Some(s.db.generate_connection_code()?),
            Role::Parent | Role::Educator => None,
        };

        let user_id = Uuid::new_v4().to_string();
        let created = s.db.create_user(&NewUser {
            id: &user_id,
            username: &username,
            password_hash: &password_hash,
            role: args.p_role.as_str(),
            avatar_url: avatar_url.as_deref(),
            connection_code: connection_code.as_deref(),
        })?;
        if !created {
            return Err(ApiError::Conflict(messages::USERNAME_TAKEN));
        }

        let user = s
            .db
            .get_user_by_id(&user_id)?
            .ok_or(ApiError::NotFound(messages::USER_NOT_FOUND))?;
        issue_session(s, user)
    })
    .await?;

    info!(
        "Registered {} ({}) as {}",
        grant.user_data.username, grant.user_data.id, grant.user_data.role
    );
    Ok((StatusCode::CREATED, Json(vec![grant])))
}

/// POST /rpc/validate_session
///
/// An invalid or expired token yields an empty row set, not an error.
pub async fn validate_session(
    State(state): State<AppState>,
    Json(args): Json<ValidateSessionArgs>,
) -> ApiResult<Json<Vec<SessionUser>>> {
    let resolved = db_call(&state, move |s| {
        match resolve_session(s, &args.p_session_token) {
            Ok((_, user)) => Ok(Some(user)),
            Err(ApiError::Unauthorized(_)) => Ok(None),
            Err(e) => Err(e),
        }
    })
    .await?;

    Ok(Json(
        resolved
            .map(|user_data| SessionUser { user_data })
            .into_iter()
            .collect(),
    ))
}

/// POST /rpc/generate_connection_code
pub async fn generate_connection_code(State(state): State<AppState>) -> ApiResult<Json<String>> {
    let code = db_call(&state, |s| Ok(s.db.generate_connection_code()?)).await?;
    Ok(Json(code))
}

/// DELETE /tables/user_sessions
///
/// Revokes the caller's own session.
pub async fn logout(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<StatusCode> {
    let sid = identity.session_id.to_string();
    let removed = db_call(&state, move |s| Ok(s.db.delete_session(&sid)?)).await?;
    if !removed {
        warn!("Session {} was already gone at logout", identity.session_id);
    }

    info!("{} ({}) logged out", identity.username, identity.user_id);
    Ok(StatusCode::NO_CONTENT)
}

// -- Sessions --

/// Resolve a token to its caller. Fails with `Unauthorized` when the token is
/// malformed, expired, or its session row is gone.
pub fn resolve_session(s: &AppStateInner, token: &str) -> ApiResult<(Identity, User)> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(s.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::session_expired())?
    .claims;

    let session = s
        .db
        .get_live_session(&claims.sid.to_string())?
        .ok_or_else(ApiError::session_expired)?;
    if session.user_uuid()? != claims.sub {
        return Err(ApiError::session_expired());
    }

    let user = s
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or_else(ApiError::session_expired)?
        .into_user()?;

    let identity = Identity {
        user_id: user.id,
        session_id: claims.sid,
        username: user.username.clone(),
        role: user.role,
    };
    Ok((identity, user))
}

fn issue_session(s: &AppStateInner, user: UserRow) -> ApiResult<SessionGrant> {
    let session_id = Uuid::new_v4();
    let expires_at = Utc::now() + s.session_ttl;

    s.db
        .create_session(&session_id.to_string(), &user.id, &timestamp(expires_at))?;

    let user = user.into_user()?;
    let session_token = create_token(&s.jwt_secret, &user, session_id, expires_at)?;

    Ok(SessionGrant {
        user_data: user,
        session_token,
    })
}

fn create_token(
    secret: &str,
    user: &User,
    session_id: Uuid,
    expires_at: DateTime<Utc>,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        sid: session_id,
        username: user.username.clone(),
        role: user.role,
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

// -- Passwords --

fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, stored_hash: &str) -> ApiResult<()> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("Corrupt password hash: {}", e))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| ApiError::Unauthorized(messages::INVALID_CREDENTIALS))
}

impl TokenVerifier for AppStateInner {
    fn verify(&self, token: &str) -> Option<Identified> {
        resolve_session(self, token).ok().map(|(identity, _)| Identified {
            user_id: identity.user_id,
            username: identity.username,
        })
    }
}
