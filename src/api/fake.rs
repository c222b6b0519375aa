//! Scripted `ChatApi` for unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{
    ApiError, AuthResponse, ChatApi, Credentials, Meeting, Message, NewMessage, Participant,
    Registration, ScheduleResponse,
};

/// One recorded call: endpoint name and the bearer token it carried.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub endpoint: &'static str,
    pub token: Option<String>,
}

type Scripted<T> = Mutex<VecDeque<Result<T, ApiError>>>;

/// Replies are consumed in order per endpoint; an endpoint with nothing
/// scripted answers with an empty success (or a 500 for single objects).
#[derive(Default)]
pub struct FakeApi {
    calls: Mutex<Vec<Call>>,
    sent: Mutex<Vec<NewMessage>>,
    messages: Scripted<Vec<Message>>,
    created: Scripted<Message>,
    schedules: Scripted<ScheduleResponse>,
    meetings: Scripted<Vec<Meeting>>,
    participants: Scripted<Vec<Participant>>,
    auth: Scripted<AuthResponse>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_messages(self, reply: Result<Vec<Message>, ApiError>) -> Self {
        self.messages.lock().unwrap().push_back(reply);
        self
    }

    pub fn on_create(self, reply: Result<Message, ApiError>) -> Self {
        self.created.lock().unwrap().push_back(reply);
        self
    }

    pub fn on_schedule(self, reply: Result<ScheduleResponse, ApiError>) -> Self {
        self.schedules.lock().unwrap().push_back(reply);
        self
    }

    pub fn on_meetings(self, reply: Result<Vec<Meeting>, ApiError>) -> Self {
        self.meetings.lock().unwrap().push_back(reply);
        self
    }

    pub fn on_participants(self, reply: Result<Vec<Participant>, ApiError>) -> Self {
        self.participants.lock().unwrap().push_back(reply);
        self
    }

    pub fn on_auth(self, reply: Result<AuthResponse, ApiError>) -> Self {
        self.auth.lock().unwrap().push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn endpoints(&self) -> Vec<&'static str> {
        self.calls().into_iter().map(|c| c.endpoint).collect()
    }

    pub fn sent(&self) -> Vec<NewMessage> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, endpoint: &'static str, token: Option<&str>) {
        self.calls.lock().unwrap().push(Call {
            endpoint,
            token: token.map(str::to_string),
        });
    }
}

fn next<T>(queue: &Scripted<T>, fallback: impl FnOnce() -> Result<T, ApiError>) -> Result<T, ApiError> {
    queue.lock().unwrap().pop_front().unwrap_or_else(fallback)
}

fn unscripted() -> ApiError {
    ApiError::Status { status: 500, detail: Some("unscripted".into()) }
}

pub fn status(code: u16) -> ApiError {
    ApiError::Status { status: code, detail: None }
}

pub fn unauthorized() -> ApiError {
    ApiError::Unauthorized { detail: None }
}

#[async_trait]
impl ChatApi for FakeApi {
    async fn list_messages(&self, token: &str, _chat_id: i64) -> Result<Vec<Message>, ApiError> {
        self.record("list_messages", Some(token));
        next(&self.messages, || Ok(Vec::new()))
    }

    async fn create_message(&self, token: &str, message: &NewMessage) -> Result<Message, ApiError> {
        self.record("create_message", Some(token));
        self.sent.lock().unwrap().push(message.clone());
        next(&self.created, || Err(unscripted()))
    }

    async fn schedule(&self, _chat_id: i64) -> Result<ScheduleResponse, ApiError> {
        self.record("schedule", None);
        next(&self.schedules, || Err(unscripted()))
    }

    async fn list_meetings(&self, token: &str, _chat_id: i64) -> Result<Vec<Meeting>, ApiError> {
        self.record("list_meetings", Some(token));
        next(&self.meetings, || Ok(Vec::new()))
    }

    async fn list_participants(&self, token: &str, _chat_id: i64) -> Result<Vec<Participant>, ApiError> {
        self.record("list_participants", Some(token));
        next(&self.participants, || Ok(Vec::new()))
    }

    async fn login(&self, _credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        self.record("login", None);
        next(&self.auth, || Err(unscripted()))
    }

    async fn register(&self, _registration: &Registration) -> Result<AuthResponse, ApiError> {
        self.record("register", None);
        next(&self.auth, || Err(unscripted()))
    }
}
