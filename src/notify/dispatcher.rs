//! Dispatch of confirmation notifications through the remote notify
//! function.
//!
//! Delivery is best-effort by design: the registration flow fires a
//! detached dispatch and never learns whether it landed. Every failure in
//! this path is logged and swallowed.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error};

use crate::models::Event;

/// HTTP request timeout in seconds.
/// The notify function proxies to mail/SMS providers and can be slow.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Fixed sign-off appended to every confirmation message
const SIGN_OFF: &str = "\nÀ bientôt,\nL'équipe NSPT Tassin";

/// Notify endpoint settings, passed in at construction.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Full URL of the deployed notify function
    pub endpoint_url: String,
    /// Bearer credential the function expects
    pub token: String,
}

/// Payload for the notify function.
/// Absent channels are serialized as explicit nulls.
#[derive(Debug, Clone, Serialize)]
pub struct NotifyRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
}

/// Client for the remote notify function.
/// Clone is cheap - reqwest::Client uses Arc internally.
#[derive(Clone)]
pub struct Notifier {
    client: Client,
    config: NotifyConfig,
}

impl Notifier {
    pub fn new(config: NotifyConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self { client, config })
    }

    /// Deliver a notification, logging the outcome.
    /// Never propagates failure - a lost confirmation must not disturb the
    /// registration it confirms.
    pub async fn dispatch(&self, request: NotifyRequest) {
        match self.send(&request).await {
            Ok(()) => debug!(subject = %request.subject, "Notify OK"),
            Err(e) => error!(error = %e, subject = %request.subject, "Notify failed"),
        }
    }

    /// Fire-and-forget form: spawns the dispatch as a detached task whose
    /// result is discarded except for logging.
    pub fn dispatch_detached(&self, request: NotifyRequest) {
        let notifier = self.clone();
        tokio::spawn(async move {
            notifier.dispatch(request).await;
        });
    }

    async fn send(&self, request: &NotifyRequest) -> Result<()> {
        let response = self
            .client
            .post(&self.config.endpoint_url)
            .bearer_auth(&self.config.token)
            .json(request)
            .send()
            .await
            .context("Failed to reach notify endpoint")?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        // The function replies with JSON on most paths, but an empty or
        // unparseable body is fine as long as the status is a success.
        let data: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();

        let flagged_failure = data.get("ok").and_then(|v| v.as_bool()) == Some(false);
        if !status.is_success() || flagged_failure {
            return Err(anyhow!("notify endpoint returned {}: {}", status, data));
        }

        Ok(())
    }
}

/// Subject line for a registration confirmation
pub fn confirmation_subject(event: &Event) -> String {
    format!("Confirmation participation – {}", event.title)
}

/// Fixed-template confirmation message.
/// The date line (with the time appended when present) and the location
/// line are emitted only when those fields carry a value.
pub fn confirmation_message(name: &str, event: &Event) -> String {
    let mut message = format!(
        "Bonjour {},\n\nMerci pour votre inscription à l'événement : \"{}\".\n",
        name, event.title
    );

    if let Some(date_line) = event.date_line() {
        message.push_str(&format!("📅 Date : {}\n", date_line));
    }
    if let Some(place) = event.place() {
        message.push_str(&format!("📍 Lieu : {}\n", place));
    }

    message.push_str(SIGN_OFF);
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn event(date: &str, time: &str, location: &str) -> Event {
        Event {
            id: "ev-1".to_string(),
            title: "Pique-nique".to_string(),
            event_date: Some(date.to_string()),
            event_time: Some(time.to_string()),
            location: Some(location.to_string()),
            description: None,
            participant_count: 3,
        }
    }

    #[test]
    fn test_confirmation_message_full() {
        let msg = confirmation_message("Alice", &event("2024-06-01", "12:00", "Parc"));
        assert!(msg.contains("Bonjour Alice,"));
        assert!(msg.contains("\"Pique-nique\""));
        assert!(msg.contains("2024-06-01 à 12:00"));
        assert!(msg.contains("📍 Lieu : Parc"));
        assert!(msg.ends_with("À bientôt,\nL'équipe NSPT Tassin"));
    }

    #[test]
    fn test_confirmation_message_omits_empty_lines() {
        let msg = confirmation_message("Alice", &event("", "12:00", ""));
        assert!(!msg.contains("📅 Date"));
        assert!(!msg.contains("📍 Lieu"));
        assert!(msg.contains("\"Pique-nique\""));
    }

    #[test]
    fn test_confirmation_message_date_without_time() {
        let msg = confirmation_message("Alice", &event("2024-06-01", "", "Parc"));
        assert!(msg.contains("📅 Date : 2024-06-01\n"));
        assert!(!msg.contains("2024-06-01 à"));
    }

    #[test]
    fn test_confirmation_subject() {
        let subject = confirmation_subject(&event("2024-06-01", "12:00", "Parc"));
        assert_eq!(subject, "Confirmation participation – Pique-nique");
    }

    /// Read a full HTTP request (headers plus content-length body), which
    /// may arrive split across several segments.
    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];

        loop {
            let n = socket.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);

            if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&data[..pos]).to_lowercase();
                let content_length = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if data.len() >= pos + 4 + content_length {
                    break;
                }
            }
        }

        String::from_utf8_lossy(&data).to_string()
    }

    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/notify", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;

            let response = format!(
                "{}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request
        });

        (url, handle)
    }

    fn notifier_for(url: &str) -> Notifier {
        Notifier::new(NotifyConfig {
            endpoint_url: url.to_string(),
            token: "anon-key".to_string(),
        })
        .unwrap()
    }

    fn request() -> NotifyRequest {
        NotifyRequest {
            email: Some("alice@example.com".to_string()),
            phone: None,
            subject: "Confirmation".to_string(),
            message: "Bonjour".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_posts_bearer_and_json() {
        let (url, handle) = serve_once("HTTP/1.1 200 OK", r#"{"ok":true}"#).await;

        notifier_for(&url).send(&request()).await.unwrap();

        let raw = handle.await.unwrap();
        assert!(raw.starts_with("POST /notify"));
        assert!(raw.contains("authorization: Bearer anon-key"));
        assert!(raw.contains(r#""email":"alice@example.com""#));
        assert!(raw.contains(r#""phone":null"#));
    }

    #[tokio::test]
    async fn test_send_tolerates_non_json_body() {
        let (url, _handle) = serve_once("HTTP/1.1 200 OK", "delivered").await;
        notifier_for(&url).send(&request()).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_rejects_ok_false() {
        let (url, _handle) =
            serve_once("HTTP/1.1 200 OK", r#"{"ok":false,"error":"quota"}"#).await;
        assert!(notifier_for(&url).send(&request()).await.is_err());
    }

    #[tokio::test]
    async fn test_dispatch_swallows_transport_failure() {
        // Nothing listens on this port; dispatch must complete regardless.
        let notifier = notifier_for("http://127.0.0.1:9/notify");
        notifier.dispatch(request()).await;
    }
}
