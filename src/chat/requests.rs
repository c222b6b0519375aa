use crate::api::{ApiError, ChatApi, Meeting, Message, NewMessage, Participant, ScheduleResponse};

/// A call the chat client wants made.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Message reload, numbered so late replies can be recognised.
    Messages { seq: u64 },
    Send(NewMessage),
    Schedule,
    Meetings,
    Participants,
}

/// A completed call, delivered back to the chat client.
#[derive(Debug)]
pub enum ApiEvent {
    Messages { seq: u64, result: Result<Vec<Message>, ApiError> },
    MessageSent(Result<Message, ApiError>),
    Scheduled(Result<ScheduleResponse, ApiError>),
    Meetings(Result<Vec<Meeting>, ApiError>),
    Participants(Result<Vec<Participant>, ApiError>),
}

pub async fn perform(api: &dyn ChatApi, token: &str, chat_id: i64, request: Request) -> ApiEvent {
    match request {
        Request::Messages { seq } => ApiEvent::Messages {
            seq,
            result: api.list_messages(token, chat_id).await,
        },
        Request::Send(message) => ApiEvent::MessageSent(api.create_message(token, &message).await),
        Request::Schedule => ApiEvent::Scheduled(api.schedule(chat_id).await),
        Request::Meetings => ApiEvent::Meetings(api.list_meetings(token, chat_id).await),
        Request::Participants => ApiEvent::Participants(api.list_participants(token, chat_id).await),
    }
}
