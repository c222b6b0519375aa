//! Client-side state of the one conversation: messages, meetings,
//! participants, the compose line and the schedule control.
//!
//! Calls either run inline (`load_messages().await` and friends) or are
//! spawned onto the runtime (`refresh_messages()`, `submit()`, ...); spawned
//! calls report back as `ApiEvent`s which `poll_events` applies on the next
//! tick. Both paths go through `apply`, so they behave the same.

use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, ChatApi, Meeting, Message, NewMessage, Participant, ScheduleOutcome, User};
use crate::session::{Session, SessionGuard, SharedStore};

pub use input::InputLine;
pub use requests::{ApiEvent, Request};

mod input;
mod requests;

pub const FEED_ERROR: &str = "Error loading messages";
pub const SESSION_EXPIRED: &str = "Session expired. Please login again.";
pub const SEND_FAILED: &str = "Error sending message";
pub const SCHEDULED: &str = "Meeting scheduled successfully!";
pub const SCHEDULE_FAILED: &str = "Error scheduling meeting";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Success(String),
    Info(String),
    Error(String),
}

impl Banner {
    pub fn text(&self) -> &str {
        match self {
            Self::Success(t) | Self::Info(t) | Self::Error(t) => t,
        }
    }
}

/// Why the chat session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    LoggedOut,
    /// The server rejected the token.
    Expired,
}

pub struct ChatClient {
    api: Arc<dyn ChatApi>,
    store: SharedStore,
    session: Session,
    chat_id: i64,

    pub messages: Vec<Message>,
    pub feed_error: Option<String>,
    pub meetings: Vec<Meeting>,
    pub participants: Vec<Participant>,
    pub input: InputLine,
    pub banner: Option<Banner>,
    /// Lines scrolled back from the newest message.
    pub scroll_back: usize,
    scroll_limit: Cell<Option<usize>>,

    scheduling: bool,
    alert: Option<String>,
    ended: Option<SessionEnd>,

    next_seq: u64,
    applied_seq: u64,

    event_tx: mpsc::UnboundedSender<ApiEvent>,
    event_rx: mpsc::UnboundedReceiver<ApiEvent>,
}

impl ChatClient {
    pub fn new(api: Arc<dyn ChatApi>, store: SharedStore, session: Session, chat_id: i64) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            api,
            store,
            session,
            chat_id,

            messages: Vec::new(),
            feed_error: None,
            meetings: Vec::new(),
            participants: Vec::new(),
            input: InputLine::default(),
            banner: None,
            scroll_back: 0,
            scroll_limit: Cell::new(None),

            scheduling: false,
            alert: None,
            ended: None,

            next_seq: 0,
            applied_seq: 0,

            event_tx,
            event_rx,
        }
    }

    /// Kick off the initial loads of all three lists.
    pub fn start(&mut self) {
        info!(chat_id = self.chat_id, user_id = self.session.user.id, "chat session started");
        self.reload_all();
    }

    pub fn user(&self) -> &User {
        &self.session.user
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    pub fn is_scheduling(&self) -> bool {
        self.scheduling
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    pub fn take_alert(&mut self) -> Option<String> {
        self.alert.take()
    }

    pub fn ended(&self) -> Option<SessionEnd> {
        self.ended
    }

    // ---- inline operations -------------------------------------------------

    pub async fn load_messages(&mut self) {
        let request = self.messages_request();
        self.run(request).await;
    }

    pub async fn send_message(&mut self) {
        if let Some(request) = self.send_request() {
            self.run(request).await;
        }
    }

    pub async fn schedule_meeting(&mut self) {
        if self.begin_schedule() {
            self.run(Request::Schedule).await;
        }
    }

    pub async fn load_meetings(&mut self) {
        self.run(Request::Meetings).await;
    }

    pub async fn load_participants(&mut self) {
        self.run(Request::Participants).await;
    }

    // ---- background operations ---------------------------------------------

    /// Periodic and manual message reload.
    pub fn refresh_messages(&mut self) {
        if self.ended.is_some() {
            return;
        }
        let request = self.messages_request();
        self.spawn(request);
    }

    pub fn reload_all(&mut self) {
        if self.ended.is_some() {
            return;
        }
        self.refresh_messages();
        self.spawn(Request::Meetings);
        self.spawn(Request::Participants);
    }

    /// Send the compose line. Returns whether a request went out.
    pub fn submit(&mut self) -> bool {
        match self.send_request() {
            Some(request) => {
                self.spawn(request);
                true
            }
            None => false,
        }
    }

    /// Press the schedule control. Ignored while a previous press is pending.
    pub fn trigger_schedule(&mut self) -> bool {
        if !self.begin_schedule() {
            return false;
        }
        self.spawn(Request::Schedule);
        true
    }

    /// Apply every completed background call. Returns how many were applied.
    pub fn poll_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            applied += 1;
            for follow_up in self.apply(event) {
                self.spawn(follow_up);
            }
        }
        applied
    }

    pub fn logout(&mut self) {
        info!(user_id = self.session.user.id, "logout");
        self.end_session(SessionEnd::LoggedOut);
    }

    /// Jump the feed to the newest message.
    pub fn display_messages(&mut self) {
        self.scroll_back = 0;
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_back = self.scroll_back.saturating_add(lines).min(self.max_scroll_back());
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_back = self.scroll_back.min(self.max_scroll_back()).saturating_sub(lines);
    }

    /// Set by the feed renderer once the whole history has been laid out;
    /// `None` while older lines were never reached.
    pub fn note_scroll_limit(&self, limit: Option<usize>) {
        self.scroll_limit.set(limit);
    }

    fn max_scroll_back(&self) -> usize {
        self.scroll_limit.get().unwrap_or(usize::MAX)
    }

    // ---- internals ---------------------------------------------------------

    fn messages_request(&mut self) -> Request {
        self.next_seq += 1;
        Request::Messages { seq: self.next_seq }
    }

    fn send_request(&self) -> Option<Request> {
        if self.ended.is_some() {
            return None;
        }
        if self.input.is_blank() {
            return None;
        }
        Some(Request::Send(NewMessage {
            chat_id: self.chat_id,
            user_id: self.session.user.id,
            text: self.input.as_str().trim().to_string(),
        }))
    }

    fn begin_schedule(&mut self) -> bool {
        if self.scheduling || self.ended.is_some() {
            return false;
        }
        self.scheduling = true;
        true
    }

    async fn run(&mut self, request: Request) {
        let mut pending = VecDeque::from([request]);
        while let Some(request) = pending.pop_front() {
            let event = requests::perform(self.api.as_ref(), &self.session.token, self.chat_id, request).await;
            pending.extend(self.apply(event));
        }
    }

    fn spawn(&self, request: Request) {
        let api = Arc::clone(&self.api);
        let token = self.session.token.clone();
        let chat_id = self.chat_id;
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let event = requests::perform(api.as_ref(), &token, chat_id, request).await;
            let _ = event_tx.send(event);
        });
    }

    /// Fold a completed call into the state; returns follow-up calls.
    fn apply(&mut self, event: ApiEvent) -> Vec<Request> {
        if self.ended.is_some() {
            debug!("session over, dropping late reply");
            return Vec::new();
        }

        match event {
            ApiEvent::Messages { seq, result } => self.apply_messages(seq, result),
            ApiEvent::MessageSent(result) => self.apply_sent(result),
            ApiEvent::Scheduled(result) => return self.apply_schedule(result),
            ApiEvent::Meetings(result) => {
                if let Some(meetings) = self.list_or_empty("meetings", result) {
                    self.meetings = meetings;
                }
            }
            ApiEvent::Participants(result) => {
                if let Some(participants) = self.list_or_empty("participants", result) {
                    self.participants = participants;
                }
            }
        }
        Vec::new()
    }

    fn apply_messages(&mut self, seq: u64, result: Result<Vec<Message>, ApiError>) {
        if matches!(&result, Err(e) if e.is_unauthorized()) {
            self.end_session(SessionEnd::Expired);
            return;
        }
        if seq <= self.applied_seq {
            debug!(seq, applied = self.applied_seq, "stale message reload dropped");
            return;
        }
        self.applied_seq = seq;

        match result {
            Ok(messages) => {
                debug!(count = messages.len(), "messages loaded");
                self.messages = messages;
                self.feed_error = None;
                self.display_messages();
            }
            Err(e) => {
                warn!(error = %e, "loading messages failed");
                self.feed_error = Some(FEED_ERROR.to_string());
            }
        }
    }

    fn apply_sent(&mut self, result: Result<Message, ApiError>) {
        match result {
            Ok(message) => {
                info!(message_id = message.id, "message sent");
                if !self.messages.iter().any(|m| m.id == message.id) {
                    self.messages.push(message);
                }
                self.display_messages();
                self.input.clear();
            }
            Err(ApiError::Unauthorized { .. }) => {
                self.alert = Some(SESSION_EXPIRED.to_string());
                self.end_session(SessionEnd::Expired);
            }
            Err(e @ ApiError::Status { .. }) => {
                warn!(error = %e, "message rejected");
                let detail = e.detail().unwrap_or("Unknown error");
                self.alert = Some(format!("{SEND_FAILED}: {detail}"));
            }
            Err(e) => {
                warn!(error = %e, "sending message failed");
                self.alert = Some(SEND_FAILED.to_string());
            }
        }
    }

    fn apply_schedule(&mut self, result: Result<crate::api::ScheduleResponse, ApiError>) -> Vec<Request> {
        self.scheduling = false;

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "schedule request failed");
                self.banner = Some(Banner::Error(SCHEDULE_FAILED.to_string()));
                return Vec::new();
            }
        };

        match reply.outcome() {
            ScheduleOutcome::Scheduled => {
                info!("meeting scheduled");
                self.banner = Some(Banner::Success(SCHEDULED.to_string()));
                vec![Request::Meetings]
            }
            ScheduleOutcome::NeedInfo(ask) => {
                info!(%ask, "scheduler needs more information");
                self.banner = Some(Banner::Info(ask));
                Vec::new()
            }
            ScheduleOutcome::Failed(message) => {
                warn!(status = %reply.status, "scheduling failed");
                self.banner = Some(Banner::Error(message.unwrap_or_else(|| SCHEDULE_FAILED.to_string())));
                Vec::new()
            }
        }
    }

    /// Unwrap a list reply. 401 ends the session (`None`); any other failure
    /// reads as an empty list.
    fn list_or_empty<T>(&mut self, what: &str, result: Result<Vec<T>, ApiError>) -> Option<Vec<T>> {
        match result {
            Ok(items) => {
                debug!(what, count = items.len(), "list loaded");
                Some(items)
            }
            Err(e) if e.is_unauthorized() => {
                self.end_session(SessionEnd::Expired);
                None
            }
            Err(e) => {
                warn!(what, error = %e, "loading list failed");
                Some(Vec::new())
            }
        }
    }

    fn end_session(&mut self, reason: SessionEnd) {
        if reason == SessionEnd::Expired {
            warn!(user_id = self.session.user.id, "server rejected the session token");
        }
        if let Err(e) = SessionGuard::clear(&self.store) {
            error!(error = %e, "could not clear stored session");
        }
        self.ended = Some(reason);
    }
}
