//! User-facing error texts raised by the backend. Clients match on these
//! substrings to pick their own wording, so changing one is a wire change.

pub const USER_NOT_FOUND: &str = "Usuário não encontrado";
pub const INVALID_CREDENTIALS: &str = "Credenciais inválidas";
pub const NO_PASSWORD: &str = "Usuário não possui senha definida";
pub const USERNAME_TAKEN: &str = "Nome de usuário já existe";
pub const USERNAME_REQUIRED: &str = "Username é obrigatório";
pub const USERNAME_TOO_LONG: &str = "Username deve ter no máximo 32 caracteres";
pub const PASSWORD_REQUIRED: &str = "Senha é obrigatória";
pub const SESSION_INVALID: &str = "Sessão inválida ou expirada";

pub const INVALID_CODE: &str = "Código inválido";
pub const ALREADY_CONNECTED: &str = "Já conectado";
pub const GUARDIANS_ONLY: &str = "Apenas pais e educadores podem se conectar a alunos";
pub const CONNECTION_NOT_FOUND: &str = "Conexão não encontrada";
pub const NOT_CONNECTED: &str = "Você não está conectado a este aluno";

pub const STUDENTS_ONLY: &str = "Apenas alunos podem realizar esta ação";
pub const INVALID_MOOD: &str = "Humor inválido";

pub const HELP_ALREADY_ACTIVE: &str = "Você já tem um pedido de ajuda ativo";
pub const INVALID_HELP_ID: &str = "ID de pedido inválido";
pub const HELP_NOT_FOUND: &str = "Pedido de ajuda não encontrado ou já resolvido";
pub const HELP_REOPEN_UNSUPPORTED: &str = "Pedidos de ajuda só podem ser resolvidos";

pub const INVALID_SUBSCRIPTION: &str = "Inscrição de notificação inválida";
pub const SUBSCRIPTION_NOT_FOUND: &str = "Inscrição de notificação não encontrada";
pub const LOOKUP_REQUIRES_CODE: &str = "Informe um código de conexão";
