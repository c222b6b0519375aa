use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    ApiError, AuthResponse, ChatApi, Credentials, Meeting, Message, NewMessage, Participant,
    Registration, ScheduleResponse,
};
use super::types::ScheduleRequest;

/// `ChatApi` over HTTP with JSON bodies.
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpChatApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder, token: &str) -> RequestBuilder {
        builder.bearer_auth(token)
    }

    async fn send<T: DeserializeOwned>(&self, what: &str, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await.map_err(|e| {
            warn!(endpoint = what, error = %e, "request did not complete");
            ApiError::Transport(e)
        })?;
        decode(what, response).await
    }
}

/// Turn a response into `T`, mapping 401 and other failure statuses to
/// their `ApiError` variants. Error bodies are `{"detail": "..."}`.
async fn decode<T: DeserializeOwned>(what: &str, response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.bytes().await?;
    debug!(endpoint = what, status = status.as_u16(), bytes = body.len(), "response received");

    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized { detail: error_detail(&body) });
    }
    if !status.is_success() {
        warn!(endpoint = what, status = status.as_u16(), "request rejected");
        return Err(ApiError::Status {
            status: status.as_u16(),
            detail: error_detail(&body),
        });
    }

    serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

fn error_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_messages(&self, token: &str, chat_id: i64) -> Result<Vec<Message>, ApiError> {
        let request = self.http.get(self.url("/messages")).query(&[("chat_id", chat_id)]);
        self.send("list_messages", self.authed(request, token)).await
    }

    async fn create_message(&self, token: &str, message: &NewMessage) -> Result<Message, ApiError> {
        let request = self.http.post(self.url("/messages")).json(message);
        self.send("create_message", self.authed(request, token)).await
    }

    async fn schedule(&self, chat_id: i64) -> Result<ScheduleResponse, ApiError> {
        let request = self.http.post(self.url("/schedule")).json(&ScheduleRequest { chat_id });
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        debug!(endpoint = "schedule", status = status.as_u16(), "response received");

        // The scheduler reply is read regardless of status; its `status`
        // field decides the outcome.
        serde_json::from_slice(&body).map_err(|e| {
            warn!(endpoint = "schedule", status = status.as_u16(), "undecodable reply");
            ApiError::Decode(e.to_string())
        })
    }

    async fn list_meetings(&self, token: &str, chat_id: i64) -> Result<Vec<Meeting>, ApiError> {
        let request = self.http.get(self.url("/meetings")).query(&[("chat_id", chat_id)]);
        self.send("list_meetings", self.authed(request, token)).await
    }

    async fn list_participants(&self, token: &str, chat_id: i64) -> Result<Vec<Participant>, ApiError> {
        let request = self.http.get(self.url(&format!("/chats/{chat_id}/participants")));
        self.send("list_participants", self.authed(request, token)).await
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        let request = self.http.post(self.url("/auth/login")).json(credentials);
        self.send("login", request).await
    }

    async fn register(&self, registration: &Registration) -> Result<AuthResponse, ApiError> {
        let request = self.http.post(self.url("/auth/register")).json(registration);
        self.send("register", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accept one connection, answer with `status` and `body`, and hand back
    /// the raw request text.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                if request_complete(&raw) {
                    break;
                }
            }

            let reply = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&raw).to_string()
        });

        (format!("http://{addr}/api"), handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(split) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..split]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
            })
            .unwrap_or(0);
        raw.len() >= split + 4 + length
    }

    fn api(base: &str) -> HttpChatApi {
        HttpChatApi::new(base, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn list_messages_sends_bearer_and_chat_id() {
        let (base, server) = serve_once(
            "200 OK",
            r#"[{"id":1,"chat_id":2,"user_id":3,"user_name":"Ada","text":"hi","created_at":"2024-01-01T10:00:00Z"}]"#,
        )
        .await;

        let messages = api(&base).list_messages("tok123", 2).await.unwrap();
        let request = server.await.unwrap().to_lowercase();

        assert_eq!(messages.len(), 1);
        assert!(request.starts_with("get /api/messages?chat_id=2 "));
        assert!(request.contains("authorization: bearer tok123"));
    }

    #[tokio::test]
    async fn schedule_never_sends_authorization() {
        let (base, server) = serve_once("200 OK", r#"{"status":"need_info","ask":"Which day?"}"#).await;

        let reply = api(&base).schedule(2).await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(reply.ask.as_deref(), Some("Which day?"));
        assert!(request.starts_with("POST /api/schedule "));
        assert!(!request.to_lowercase().contains("authorization:"));
        assert!(request.ends_with(r#"{"chat_id":2}"#));
    }

    #[tokio::test]
    async fn unauthorized_status_maps_to_unauthorized() {
        let (base, server) = serve_once("401 Unauthorized", r#"{"detail":"Could not validate credentials"}"#).await;

        let err = api(&base).list_meetings("stale", 2).await.unwrap_err();
        server.await.unwrap();

        assert!(err.is_unauthorized());
        assert_eq!(err.detail(), Some("Could not validate credentials"));
    }

    #[tokio::test]
    async fn failure_status_carries_detail() {
        let (base, server) = serve_once("404 Not Found", r#"{"detail":"Chat not found"}"#).await;

        let message = NewMessage { chat_id: 9, user_id: 1, text: "hello".into() };
        let err = api(&base).create_message("tok", &message).await.unwrap_err();
        let request = server.await.unwrap();

        assert!(matches!(err, ApiError::Status { status: 404, .. }));
        assert_eq!(err.detail(), Some("Chat not found"));
        assert!(request.contains(r#""text":"hello""#));
    }

    #[tokio::test]
    async fn participants_path_embeds_chat_id() {
        let (base, server) = serve_once("200 OK", r#"[{"id":1,"name":"Ada","email":"ada@example.com"}]"#).await;

        let participants = api(&base).list_participants("tok", 2).await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(participants[0].email, "ada@example.com");
        assert!(request.starts_with("GET /api/chats/2/participants "));
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = api(&format!("http://{addr}/api")).list_messages("tok", 2).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = api("http://localhost:8003/api/");
        assert_eq!(client.url("/messages"), "http://localhost:8003/api/messages");
    }
}
