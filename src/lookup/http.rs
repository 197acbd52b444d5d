//! HTTP adapter for a JSON metadata lookup endpoint.
//!
//! `GET {endpoint}?path=<abs path>&name=<display name>` answers with
//! `{"fields": ["tt123", "", "A Movie", "", "", "2000"]}`. A 404, a `null`
//! field list, or an empty list all mean "nothing found".

use std::num::NonZeroU32;
use std::path::Path;
use std::time::{Duration, Instant};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::debug;
use serde_json::Value;

use super::InfoLookup;
use crate::config::LookupConfig;
use crate::error::LookupError;

const USER_AGENT: &str = "infodb/0.1.0 (media info cache)";
const RATE_LIMIT_WAIT_LIMIT: Duration = Duration::from_millis(1500);
const RATE_LIMIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// [`InfoLookup`] backed by a blocking `ureq` agent and a request-rate limiter.
pub struct HttpInfoLookup {
    endpoint: String,
    http_client: ureq::Agent,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    rate_limit_wait: Duration,
}

impl HttpInfoLookup {
    pub fn new(config: &LookupConfig) -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_millis(config.connect_timeout_ms))
            .timeout_read(Duration::from_millis(config.read_timeout_ms))
            .timeout_write(Duration::from_millis(config.read_timeout_ms))
            .build();
        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Self {
            endpoint: config.endpoint.clone(),
            http_client,
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
            rate_limit_wait: RATE_LIMIT_WAIT_LIMIT,
        }
    }

    fn request_url(endpoint: &str, params: &[(&str, &str)]) -> String {
        let mut url = endpoint.to_string();
        if params.is_empty() {
            return url;
        }

        url.push(if url.contains('?') { '&' } else { '?' });
        for (index, (key, value)) in params.iter().enumerate() {
            if index > 0 {
                url.push('&');
            }
            url.push_str(key);
            url.push('=');
            url.push_str(urlencoding::encode(value).as_ref());
        }
        url
    }

    fn wait_for_rate_limit_slot(&self) -> bool {
        if self.limiter.check().is_ok() {
            return true;
        }
        let deadline = Instant::now() + self.rate_limit_wait;
        while Instant::now() < deadline {
            std::thread::sleep(RATE_LIMIT_POLL_INTERVAL);
            if self.limiter.check().is_ok() {
                return true;
            }
        }
        false
    }

    /// Extracts the field list from a response body.
    fn parse_lookup_payload(body: &str) -> Result<Option<Vec<String>>, LookupError> {
        let parsed: Value = serde_json::from_str(body)
            .map_err(|error| LookupError::Failed(format!("invalid JSON response: {error}")))?;
        let Some(object) = parsed.as_object() else {
            return Err(LookupError::Failed(
                "lookup response is not a JSON object".to_string(),
            ));
        };
        let fields = match object.get("fields") {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(LookupError::Failed(
                    "lookup response `fields` is not an array".to_string(),
                ))
            }
        };
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            fields
                .iter()
                .map(|item| match item {
                    Value::String(text) => text.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect(),
        ))
    }
}

impl InfoLookup for HttpInfoLookup {
    fn lookup(
        &self,
        file: &Path,
        display_name: &str,
    ) -> Result<Option<Vec<String>>, LookupError> {
        if !self.wait_for_rate_limit_slot() {
            return Err(LookupError::RateLimited(
                "lookup request rate saturated".to_string(),
            ));
        }

        let path = file.to_string_lossy();
        let url = Self::request_url(
            &self.endpoint,
            &[("path", path.as_ref()), ("name", display_name)],
        );
        debug!("Info lookup request: {}", url);
        let response = match self
            .http_client
            .get(&url)
            .set("User-Agent", USER_AGENT)
            .set("Accept", "application/json")
            .call()
        {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Ok(None),
            Err(ureq::Error::Status(429, _)) => {
                return Err(LookupError::RateLimited(
                    "lookup service returned 429".to_string(),
                ))
            }
            Err(error) => return Err(LookupError::Failed(format!("request failed: {error}"))),
        };
        let body = response
            .into_string()
            .map_err(|error| LookupError::Failed(format!("failed to read response: {error}")))?;
        Self::parse_lookup_payload(&body)
    }
}
