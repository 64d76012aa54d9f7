use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;

use crate::signature::SIGNATURE_HEADER;
use crate::types::DeliveryErrorKind;

pub const EVENT_HEADER: &str = "x-webhook-event";
pub const EVENT_ID_HEADER: &str = "x-webhook-id";
pub const ATTEMPT_HEADER: &str = "x-webhook-attempt";
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";

/// Headers the relay sets on every delivery; subscriptions cannot override them.
pub const RESERVED_HEADERS: &[&str] = &[
    "content-type",
    "content-length",
    "host",
    "user-agent",
    SIGNATURE_HEADER,
    EVENT_HEADER,
    EVENT_ID_HEADER,
    ATTEMPT_HEADER,
    TIMESTAMP_HEADER,
];

pub struct DeliveryHeaders<'a> {
    pub extra: &'a BTreeMap<String, String>,
    pub event: &'a str,
    pub event_id: Uuid,
    pub attempt: u32,
    pub timestamp: &'a str,
    pub signature: Option<String>,
}

/// Subscription headers first, relay headers on top.
pub fn build_headers(delivery: &DeliveryHeaders<'_>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (name, value) in delivery.extra {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "skipping invalid subscription header"),
        }
    }

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    insert_str(&mut headers, EVENT_HEADER, delivery.event);
    insert_str(&mut headers, EVENT_ID_HEADER, &delivery.event_id.to_string());
    insert_str(&mut headers, ATTEMPT_HEADER, &delivery.attempt.to_string());
    insert_str(&mut headers, TIMESTAMP_HEADER, delivery.timestamp);
    if let Some(signature) = &delivery.signature {
        insert_str(&mut headers, SIGNATURE_HEADER, signature);
    }

    headers
}

fn insert_str(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

/// Result of a single HTTP attempt.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub success: bool,
    pub status: Option<u16>,
    pub error_kind: Option<DeliveryErrorKind>,
    pub error_message: Option<String>,
    pub response_body: Option<String>,
    pub elapsed: Duration,
}

/// POST `body` to `url`. 2xx within `timeout` is a success; any other
/// status, a transport error or a timeout is a failure.
pub async fn send(
    client: &reqwest::Client,
    url: &str,
    headers: HeaderMap,
    body: Bytes,
    timeout: Duration,
    max_response_body_bytes: usize,
) -> AttemptOutcome {
    let started = Instant::now();
    let result = client
        .post(url)
        .headers(headers)
        .body(body)
        .timeout(timeout)
        .send()
        .await;

    match result {
        Ok(response) => {
            let status = response.status();
            let response_body = read_body_capped(response, max_response_body_bytes).await;
            let success = status.is_success();
            AttemptOutcome {
                success,
                status: Some(status.as_u16()),
                error_kind: (!success).then_some(DeliveryErrorKind::HttpStatus),
                error_message: (!success).then(|| format!("unexpected status {status}")),
                response_body,
                elapsed: started.elapsed(),
            }
        }
        Err(err) => {
            let error_kind = if err.is_timeout() {
                DeliveryErrorKind::Timeout
            } else {
                DeliveryErrorKind::Network
            };
            AttemptOutcome {
                success: false,
                status: None,
                error_kind: Some(error_kind),
                error_message: Some(err.to_string()),
                response_body: None,
                elapsed: started.elapsed(),
            }
        }
    }
}

/// Read at most `limit` bytes of the response body, then drop the rest
/// of the stream unread.
async fn read_body_capped(mut response: reqwest::Response, limit: usize) -> Option<String> {
    let mut buf = Vec::with_capacity(limit.min(8 * 1024));
    while buf.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = (limit - buf.len()).min(chunk.len());
                buf.extend_from_slice(chunk.get(..take).unwrap_or(&chunk));
            }
            Ok(None) => break,
            Err(_) => return None,
        }
    }
    Some(truncate_body(&buf, limit))
}

fn truncate_body(bytes: &[u8], limit: usize) -> String {
    let slice = bytes.get(..limit).unwrap_or(bytes);
    String::from_utf8_lossy(slice).into_owned()
}
