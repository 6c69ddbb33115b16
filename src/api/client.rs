//! REST client for the managed event store.
//!
//! This module provides the `StoreClient` struct for querying and inserting
//! rows in the hosted backend's `events` and `event_participants`
//! collections over its PostgREST-style interface.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::models::{Event, NewEvent, NewParticipant};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Path prefix for the store's REST interface.
const REST_PREFIX: &str = "/rest/v1";

/// HTTP request timeout in seconds.
/// 30s allows for slow responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Store connection settings, passed in at construction.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`
    pub base_url: String,
    /// Publishable (anon) key sent as both `apikey` and bearer token
    pub anon_key: String,
}

/// Client for the managed event store.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct StoreClient {
    client: Client,
    config: StoreConfig,
}

impl StoreClient {
    /// Create a new store client
    pub fn new(config: StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self { client, config })
    }

    fn rest_url(&self, collection: &str) -> String {
        format!(
            "{}{}/{}",
            self.config.base_url.trim_end_matches('/'),
            REST_PREFIX,
            collection
        )
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "apikey",
            header::HeaderValue::from_str(&self.config.anon_key)?,
        );
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", self.config.anon_key))?,
        );
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            // Rate limited - signal to retry
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// GET rows from a collection, retrying on rate limits.
    async fn select<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.rest_url(collection);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(&url)
                .headers(self.auth_headers()?)
                .query(query)
                .send()
                .await
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response
                        .json()
                        .await
                        .with_context(|| format!("Failed to parse JSON response from {}", url));
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = %url, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    /// POST a new row into a collection with minimal-return preference.
    async fn insert<B: Serialize>(&self, collection: &str, row: &B) -> Result<()> {
        let url = self.rest_url(collection);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .post(&url)
                .headers(self.auth_headers()?)
                .header("Prefer", "return=minimal")
                .json(row)
                .send()
                .await
                .with_context(|| format!("Failed to send POST request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(_) => return Ok(()),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = %url, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    // ===== Data Methods =====

    /// Fetch all events, ordered by date then time (ascending)
    pub async fn fetch_events(&self) -> Result<Vec<Event>> {
        let events: Vec<Event> = self
            .select(
                "events",
                &[("select", "*"), ("order", "event_date.asc,event_time.asc")],
            )
            .await?;
        debug!(count = events.len(), "Events fetched");
        Ok(events)
    }

    /// Point lookup of a single event by id.
    /// An absent row is `None`, not an error.
    pub async fn fetch_event(&self, id: &str) -> Result<Option<Event>> {
        let filter = format!("eq.{}", id);
        let rows: Vec<Event> = self
            .select(
                "events",
                &[("select", "*"), ("id", filter.as_str()), ("limit", "1")],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Insert a registration for an event
    pub async fn insert_participant(&self, participant: &NewParticipant) -> Result<()> {
        self.insert("event_participants", participant).await?;
        debug!(event_id = %participant.event_id, "Participant inserted");
        Ok(())
    }

    /// Insert a new event
    pub async fn insert_event(&self, event: &NewEvent) -> Result<()> {
        self.insert("events", event).await?;
        debug!(title = %event.title, "Event inserted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContactType;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

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

    /// Accept a single connection and answer it with a canned HTTP response.
    /// Returns the bound origin and a handle resolving to the raw request text.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let origin = format!("http://{}", listener.local_addr().unwrap());

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

        (origin, handle)
    }

    fn client_for(origin: &str) -> StoreClient {
        StoreClient::new(StoreConfig {
            base_url: origin.to_string(),
            anon_key: "test-key".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_events_parses_and_orders_by_query() {
        let body = r#"[{"id":"a","title":"Tournoi","event_date":"2024-05-01","participant_count":2},
                       {"id":"b","title":"Repas","event_date":"2024-06-01"}]"#;
        let (origin, handle) = serve_once("HTTP/1.1 200 OK", body).await;

        let events = client_for(&origin).fetch_events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "Tournoi");
        assert_eq!(events[0].participant_count, 2);
        // participant_count defaults to 0 when the store omits it
        assert_eq!(events[1].participant_count, 0);

        let request = handle.await.unwrap();
        assert!(request.starts_with("GET /rest/v1/events?"));
        assert!(request.contains("order=event_date.asc"));
        assert!(request.contains("apikey: test-key"));
        assert!(request.contains("authorization: Bearer test-key"));
    }

    #[tokio::test]
    async fn test_fetch_event_absent_row_is_none() {
        let (origin, handle) = serve_once("HTTP/1.1 200 OK", "[]").await;

        let event = client_for(&origin).fetch_event("missing").await.unwrap();
        assert!(event.is_none());

        let request = handle.await.unwrap();
        assert!(request.contains("id=eq.missing"));
        assert!(request.contains("limit=1"));
    }

    #[tokio::test]
    async fn test_insert_participant_posts_minimal_return() {
        let (origin, handle) = serve_once("HTTP/1.1 201 Created", "").await;

        let participant = NewParticipant::build(
            "ev-1".to_string(),
            "Alice".to_string(),
            Some("alice@example.com".to_string()),
            None,
        );
        assert_eq!(participant.contact_type, Some(ContactType::Email));

        client_for(&origin)
            .insert_participant(&participant)
            .await
            .unwrap();

        let request = handle.await.unwrap();
        assert!(request.starts_with("POST /rest/v1/event_participants"));
        assert!(request.contains("prefer: return=minimal"));
        assert!(request.contains("\"event_id\":\"ev-1\""));
        assert!(request.contains("\"contact_type\":\"email\""));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_api_error() {
        let (origin, _handle) = serve_once("HTTP/1.1 500 Internal Server Error", "boom").await;

        let err = client_for(&origin).fetch_events().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::ServerError(_))
        ));
    }
}
