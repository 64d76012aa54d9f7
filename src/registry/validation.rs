use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

use crate::dispatcher::RESERVED_HEADERS;
use crate::types::{CreateSubscriptionRequest, EventKind, UpdateSubscriptionRequest};

use super::WebhookSubscription;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const MAX_RETRIES_LIMIT: u32 = 10;
pub const DEFAULT_TIMEOUT_SECS: u32 = 10;
pub const TIMEOUT_SECS_RANGE: RangeInclusive<u32> = 1..=120;

const MAX_SECRET_LEN: usize = 512;
const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_HEADERS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Fields of a subscription that passed validation, ready to persist.
#[derive(Debug, Clone)]
pub struct ValidatedSubscription {
    pub target_url: String,
    pub events: BTreeSet<EventKind>,
    pub secret: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub max_retries: u32,
    pub timeout_secs: u32,
    pub active: bool,
    pub description: Option<String>,
}

pub fn validate_create(
    req: &CreateSubscriptionRequest,
) -> Result<ValidatedSubscription, ValidationError> {
    Ok(ValidatedSubscription {
        target_url: validate_target_url(&req.target_url)?,
        events: validate_events(&req.events)?,
        secret: req.secret.as_deref().map(validate_secret).transpose()?,
        headers: match &req.headers {
            Some(headers) => validate_headers(headers)?,
            None => BTreeMap::new(),
        },
        max_retries: validate_max_retries(req.max_retries.unwrap_or(DEFAULT_MAX_RETRIES))?,
        timeout_secs: validate_timeout_secs(req.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))?,
        active: req.active.unwrap_or(true),
        description: match req.description.as_deref() {
            Some(description) => validate_description(description)?,
            None => None,
        },
    })
}

/// Apply a partial update on top of `current`. Supplied fields go through
/// the same checks as on create; everything else is carried over.
pub fn apply_update(
    current: &WebhookSubscription,
    req: &UpdateSubscriptionRequest,
) -> Result<ValidatedSubscription, ValidationError> {
    if req.clear_secret == Some(true) && req.secret.is_some() {
        return Err(ValidationError::new(
            "secret and clear_secret cannot be combined",
        ));
    }

    let secret = if req.clear_secret == Some(true) {
        None
    } else {
        match req.secret.as_deref() {
            Some(secret) => Some(validate_secret(secret)?),
            None => current.secret.clone(),
        }
    };

    Ok(ValidatedSubscription {
        target_url: match req.target_url.as_deref() {
            Some(url) => validate_target_url(url)?,
            None => current.target_url.clone(),
        },
        events: match &req.events {
            Some(events) => validate_events(events)?,
            None => current.events.clone(),
        },
        secret,
        headers: match &req.headers {
            Some(headers) => validate_headers(headers)?,
            None => current.headers.clone(),
        },
        max_retries: match req.max_retries {
            Some(value) => validate_max_retries(value)?,
            None => current.max_retries,
        },
        timeout_secs: match req.timeout_secs {
            Some(value) => validate_timeout_secs(value)?,
            None => current.timeout_secs(),
        },
        active: req.active.unwrap_or(current.active),
        description: match req.description.as_deref() {
            Some(description) => validate_description(description)?,
            None => current.description.clone(),
        },
    })
}

/// Absolute `http`/`https` URL with a host. Returns the normalised form.
pub fn validate_target_url(raw: &str) -> Result<String, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::new("target_url is required"));
    }
    let url = Url::parse(raw)
        .map_err(|err| ValidationError::new(format!("target_url is not a valid URL: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::new("target_url must use http or https"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ValidationError::new("target_url must include a host"));
    }
    Ok(url.to_string())
}

pub fn validate_events(raw: &[String]) -> Result<BTreeSet<EventKind>, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::new("events must contain at least one event"));
    }
    raw.iter()
        .map(|tag| {
            tag.trim()
                .parse::<EventKind>()
                .map_err(|err| ValidationError::new(err.to_string()))
        })
        .collect()
}

pub fn validate_secret(raw: &str) -> Result<String, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::new("secret must not be blank"));
    }
    if raw.len() > MAX_SECRET_LEN {
        return Err(ValidationError::new(format!(
            "secret must be at most {MAX_SECRET_LEN} bytes"
        )));
    }
    Ok(raw.to_string())
}

/// Header names are lower-cased. Names the relay sets itself are rejected.
pub fn validate_headers(
    raw: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, ValidationError> {
    if raw.len() > MAX_HEADERS {
        return Err(ValidationError::new(format!(
            "at most {MAX_HEADERS} custom headers are allowed"
        )));
    }

    let mut headers = BTreeMap::new();
    for (name, value) in raw {
        let parsed = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| ValidationError::new(format!("invalid header name: {name}")))?;
        if RESERVED_HEADERS.contains(&parsed.as_str()) {
            return Err(ValidationError::new(format!(
                "header {} is set by the relay and cannot be overridden",
                parsed.as_str()
            )));
        }
        HeaderValue::from_str(value)
            .map_err(|_| ValidationError::new(format!("invalid value for header {name}")))?;
        headers.insert(parsed.as_str().to_string(), value.clone());
    }
    Ok(headers)
}

pub fn validate_max_retries(value: u32) -> Result<u32, ValidationError> {
    if value > MAX_RETRIES_LIMIT {
        return Err(ValidationError::new(format!(
            "max_retries must be between 0 and {MAX_RETRIES_LIMIT}"
        )));
    }
    Ok(value)
}

pub fn validate_timeout_secs(value: u32) -> Result<u32, ValidationError> {
    if !TIMEOUT_SECS_RANGE.contains(&value) {
        return Err(ValidationError::new(format!(
            "timeout_secs must be between {} and {}",
            TIMEOUT_SECS_RANGE.start(),
            TIMEOUT_SECS_RANGE.end()
        )));
    }
    Ok(value)
}

/// Blank descriptions are stored as absent.
pub fn validate_description(raw: &str) -> Result<Option<String>, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::new(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}
