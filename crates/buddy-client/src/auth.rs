use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use buddy_types::api::{
    AuthenticateUserArgs, RegisterUserArgs, SessionGrant, SessionUser, UpdateProfileRequest,
    ValidateSessionArgs,
};
use buddy_types::models::{Role, User};

use crate::backend::Backend;
use crate::error::{BackendError, ClientError};
use crate::session::SessionStore;

const SERVER_ERROR: &str = "Erro no servidor";

/// Usernames are matched case-insensitively and without surrounding blanks.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// The signed-in session: backend handle, token store and current user.
/// Pass it to whatever needs the caller's identity.
pub struct BuddyClient {
    backend: Backend,
    store: Arc<dyn SessionStore>,
    user: RwLock<Option<User>>,
}

impl BuddyClient {
    pub fn new(backend: Backend, store: Arc<dyn SessionStore>) -> Self {
        Self {
            backend,
            store,
            user: RwLock::new(None),
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn token(&self) -> Option<String> {
        self.store.load()
    }

    pub fn current_user(&self) -> Option<User> {
        self.user.read().ok().and_then(|user| user.clone())
    }

    fn set_user(&self, user: Option<User>) {
        match self.user.write() {
            Ok(mut slot) => *slot = user,
            Err(poisoned) => *poisoned.into_inner() = user,
        }
    }

    fn adopt(&self, grant: SessionGrant) -> User {
        if let Err(e) = self.store.save(&grant.session_token) {
            warn!("Failed to persist session token: {}", e);
        }
        self.set_user(Some(grant.user_data.clone()));
        grant.user_data
    }

    fn forget(&self) {
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear session token: {}", e);
        }
        self.set_user(None);
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<User, ClientError> {
        let args = AuthenticateUserArgs {
            p_username: normalize_username(username),
            p_password: password.to_string(),
        };

        let grants: Vec<SessionGrant> = self
            .backend
            .rpc("authenticate_user", &args)
            .await
            .map_err(login_error)?;
        let grant = grants
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::user("Erro inesperado no login"))?;

        let user = self.adopt(grant);
        info!("Logged in as {}", user.username);
        Ok(user)
    }

    pub async fn register(
        &self,
        username: &str,
        role: Role,
        password: &str,
        avatar_url: Option<&str>,
    ) -> Result<User, ClientError> {
        let args = RegisterUserArgs {
            p_username: normalize_username(username),
            p_role: role,
            p_password: password.to_string(),
            p_avatar_url: avatar_url.map(str::to_string),
        };

        let grants: Vec<SessionGrant> = self
            .backend
            .rpc("register_user", &args)
            .await
            .map_err(register_error)?;
        let grant = grants
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::user("Erro inesperado no registro"))?;

        let user = self.adopt(grant);
        info!("Registered {} as {}", user.username, user.role);
        Ok(user)
    }

    /// Re-validate the stored token. Any failure leaves the client signed out.
    pub async fn check_session(&self) -> Option<User> {
        let Some(token) = self.token() else {
            self.set_user(None);
            return None;
        };

        let args = ValidateSessionArgs {
            p_session_token: token,
        };
        match self
            .backend
            .rpc::<_, Vec<SessionUser>>("validate_session", &args)
            .await
        {
            Ok(rows) => match rows.into_iter().next() {
                Some(row) => {
                    self.set_user(Some(row.user_data.clone()));
                    Some(row.user_data)
                }
                None => {
                    debug!("Stored session is no longer valid");
                    self.forget();
                    None
                }
            },
            Err(e) => {
                warn!("Session check failed: {}", e);
                self.forget();
                None
            }
        }
    }

    /// Revoke the session remotely if possible, then sign out locally no
    /// matter what.
    pub async fn logout(&self) {
        if let Some(token) = self.token() {
            if let Err(e) = self.backend.delete("/tables/user_sessions", &token, &[]).await {
                warn!("Failed to revoke session on logout: {}", e);
            }
        }
        self.forget();
        info!("Logged out");
    }

    pub async fn update_avatar(&self, avatar_url: &str) -> Result<User, ClientError> {
        let (Some(_), Some(token)) = (self.current_user(), self.token()) else {
            return Err(ClientError::NotLoggedIn);
        };

        let body = UpdateProfileRequest {
            avatar_url: avatar_url.to_string(),
        };
        let user: User = self
            .backend
            .patch("/tables/users/me", &token, &body)
            .await
            .map_err(|e| {
                warn!("Avatar update failed: {}", e);
                ClientError::user("Erro ao atualizar avatar")
            })?;

        self.set_user(Some(user.clone()));
        Ok(user)
    }
}

fn login_error(e: BackendError) -> ClientError {
    if e.is_transport() {
        return ClientError::user(SERVER_ERROR);
    }

    let message = if e.message.contains("Usuário não encontrado") {
        "Usuário não encontrado. Verifique o nome e tente novamente.".to_string()
    } else if e.message.contains("Credenciais inválidas") {
        "Senha incorreta. Tente novamente.".to_string()
    } else if e.message.contains("não possui senha definida") {
        "Este usuário não possui senha definida. Entre em contato com o administrador.".to_string()
    } else {
        format!("Erro no login: {}", e.message)
    };
    ClientError::User(message)
}

fn register_error(e: BackendError) -> ClientError {
    if e.is_transport() {
        return ClientError::user(SERVER_ERROR);
    }

    let message = if e.message.contains("Nome de usuário já existe") {
        "Nome de usuário já existe".to_string()
    } else if e.message.contains("Username é obrigatório") {
        "Nome de usuário é obrigatório".to_string()
    } else if e.message.contains("Senha é obrigatória") {
        "Senha é obrigatória".to_string()
    } else {
        format!("Erro ao criar usuário: {}", e.message)
    };
    ClientError::User(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_error(status: u16, message: &str) -> BackendError {
        BackendError {
            status: Some(status),
            code: "X".into(),
            message: message.into(),
        }
    }

    #[test]
    fn login_errors_map_to_friendly_messages() {
        let cases = [
            ("Usuário não encontrado", "Usuário não encontrado. Verifique o nome e tente novamente."),
            ("Credenciais inválidas", "Senha incorreta. Tente novamente."),
            (
                "Usuário não possui senha definida",
                "Este usuário não possui senha definida. Entre em contato com o administrador.",
            ),
            ("algo estranho", "Erro no login: algo estranho"),
        ];

        for (backend, shown) in cases {
            assert_eq!(login_error(backend_error(400, backend)).to_string(), shown);
        }
    }

    #[test]
    fn register_errors_map_to_friendly_messages() {
        assert_eq!(
            register_error(backend_error(400, "Username é obrigatório")).to_string(),
            "Nome de usuário é obrigatório"
        );
        assert_eq!(
            register_error(backend_error(409, "Nome de usuário já existe")).to_string(),
            "Nome de usuário já existe"
        );
        assert_eq!(
            register_error(backend_error(500, "boom")).to_string(),
            "Erro ao criar usuário: boom"
        );
    }

    #[test]
    fn transport_failures_read_as_server_errors() {
        let unreachable = BackendError {
            status: None,
            code: String::new(),
            message: "connection refused".into(),
        };
        assert_eq!(login_error(unreachable.clone()).to_string(), SERVER_ERROR);
        assert_eq!(register_error(unreachable).to_string(), SERVER_ERROR);
    }
}
