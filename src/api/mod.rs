use async_trait::async_trait;

pub use client::HttpChatApi;
pub use types::{
    AuthResponse, Credentials, Meeting, MeetingParticipant, Message, NewMessage, Participant,
    Registration, ScheduleOutcome, ScheduleResponse, User,
};

mod client;
mod types;

#[cfg(test)]
pub mod fake;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server answered 401; the session is over.
    #[error("unauthorized")]
    Unauthorized { detail: Option<String> },

    #[error("request failed with status {status}")]
    Status { status: u16, detail: Option<String> },

    /// The request never completed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Server supplied `detail` text, when the error body carried one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { detail } | Self::Status { detail, .. } => detail.as_deref(),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

/// Backend endpoints consumed by the client.
///
/// Every call that takes a `token` sends it as a bearer credential.
/// `schedule` is the exception: the backend route is unauthenticated and the
/// client never attaches the header there.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn list_messages(&self, token: &str, chat_id: i64) -> Result<Vec<Message>, ApiError>;

    async fn create_message(&self, token: &str, message: &NewMessage) -> Result<Message, ApiError>;

    async fn schedule(&self, chat_id: i64) -> Result<ScheduleResponse, ApiError>;

    async fn list_meetings(&self, token: &str, chat_id: i64) -> Result<Vec<Meeting>, ApiError>;

    async fn list_participants(&self, token: &str, chat_id: i64) -> Result<Vec<Participant>, ApiError>;

    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError>;

    async fn register(&self, registration: &Registration) -> Result<AuthResponse, ApiError>;
}
