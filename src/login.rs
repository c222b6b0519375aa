use tracing::{info, warn};

use crate::api::{ApiError, ChatApi, Credentials, Registration};
use crate::chat::InputLine;
use crate::session::{Session, SessionGuard, SharedStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Password,
}

/// The sign-in screen shown whenever there is no usable session.
#[derive(Debug, Clone)]
pub struct LoginForm {
    pub mode: AuthMode,
    pub name: InputLine,
    pub email: InputLine,
    pub password: InputLine,
    pub focus: Field,
    pub error: Option<String>,
    /// Message carried over from the chat screen, e.g. an expired session.
    pub notice: Option<String>,
}

impl Default for LoginForm {
    fn default() -> Self {
        Self::new(None)
    }
}

impl LoginForm {
    pub fn new(notice: Option<String>) -> Self {
        Self {
            mode: AuthMode::Login,
            name: InputLine::default(),
            email: InputLine::default(),
            password: InputLine::default(),
            focus: Field::Email,
            error: None,
            notice,
        }
    }

    pub fn fields(&self) -> &'static [Field] {
        match self.mode {
            AuthMode::Login => &[Field::Email, Field::Password],
            AuthMode::Register => &[Field::Name, Field::Email, Field::Password],
        }
    }

    pub fn field(&self, field: Field) -> &InputLine {
        match field {
            Field::Name => &self.name,
            Field::Email => &self.email,
            Field::Password => &self.password,
        }
    }

    pub fn focused_mut(&mut self) -> &mut InputLine {
        match self.focus {
            Field::Name => &mut self.name,
            Field::Email => &mut self.email,
            Field::Password => &mut self.password,
        }
    }

    pub fn next_field(&mut self) {
        self.step_focus(1);
    }

    pub fn prev_field(&mut self) {
        let len = self.fields().len();
        self.step_focus(len - 1);
    }

    fn step_focus(&mut self, by: usize) {
        let fields = self.fields();
        let current = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = fields[(current + by) % fields.len()];
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::Login => AuthMode::Register,
            AuthMode::Register => AuthMode::Login,
        };
        if !self.fields().contains(&self.focus) {
            self.focus = Field::Email;
        }
        self.error = None;
    }

    /// Authenticate against the backend and persist the session the way
    /// the chat screen expects to find it.
    pub async fn submit(&mut self, api: &dyn ChatApi, store: &SharedStore) -> Option<Session> {
        let email = self.email.as_str().trim().to_string();
        let password = self.password.as_str().to_string();
        let name = self.name.as_str().trim().to_string();

        let missing_name = self.mode == AuthMode::Register && name.is_empty();
        if email.is_empty() || password.is_empty() || missing_name {
            self.error = Some("Please fill in all fields".to_string());
            return None;
        }

        let result = match self.mode {
            AuthMode::Login => api.login(&Credentials { email: email.clone(), password }).await,
            AuthMode::Register => {
                api.register(&Registration { name, email: email.clone(), password })
                    .await
            }
        };

        let auth = match result {
            Ok(auth) => auth,
            Err(e) => {
                warn!(%email, error = %e, "authentication failed");
                self.error = Some(self.failure_text(&e));
                self.password.clear();
                return None;
            }
        };

        let session = Session {
            token: auth.access_token,
            user: auth.user,
        };
        if let Err(e) = SessionGuard::persist(store, &session) {
            warn!(error = %e, "could not store session");
            self.error = Some(format!("Could not save session: {e}"));
            return None;
        }

        info!(user_id = session.user.id, "signed in");
        self.password.clear();
        self.error = None;
        self.notice = None;
        Some(session)
    }

    fn failure_text(&self, error: &ApiError) -> String {
        if let Some(detail) = error.detail() {
            return detail.to_string();
        }
        match (self.mode, error) {
            (_, ApiError::Transport(_)) => "Cannot reach the server".to_string(),
            (AuthMode::Login, _) => "Login failed".to_string(),
            (AuthMode::Register, _) => "Registration failed".to_string(),
        }
    }
}
