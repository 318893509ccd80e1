use crate::errors::{ResultExt, SyncError};
use crate::fingerprint::PageFingerprint;
use crate::models::RawSolicitation;
use serde_json::Value;
use std::time::Duration;

/// Default endpoint of the worker-loan solicitations listing.
pub const DEFAULT_ENDPOINT: &str =
    "https://monbank.co/api/dataprev/propostas/solicitacoes-trabalhador";

/// Container keys tried, in order, when extracting a page's record list.
const CONTAINER_KEYS: [&str; 2] = ["content", "data"];

const MAX_ERROR_BODY_CHARS: usize = 500;

/// Pacing and retry settings for the fetch loop.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    /// Pause after every successful page, and the unit of linear backoff.
    pub delay: Duration,
    /// Attempts per page before the whole fetch is abandoned.
    pub max_attempts: u32,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            max_attempts: 5,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Attempt counter for one page with linear backoff.
///
/// Each failure bumps the attempt count; the pause before the next attempt
/// is `delay × attempts`. Once `max_attempts` failures are recorded no
/// further attempt is allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
    max_attempts: u32,
    delay: Duration,
}

impl RetryState {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: 0,
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Failed attempts recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Records a failed attempt.
    ///
    /// Returns the backoff to wait before retrying, or `None` when attempts
    /// are exhausted.
    pub fn record_failure(&mut self) -> Option<Duration> {
        self.attempts += 1;
        if self.attempts >= self.max_attempts {
            None
        } else {
            Some(self.delay * self.attempts)
        }
    }
}

/// Why a window fetch stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// A page came back with no records.
    EmptyPage { page: u32 },
    /// A page had the same content as the one before it.
    DuplicatePage { page: u32 },
    /// Every attempt at a page failed; records gathered so far are kept.
    RetriesExhausted {
        page: u32,
        attempts: u32,
        last_error: String,
    },
}

impl Termination {
    /// Whether the window was read to its end.
    pub fn is_complete(&self) -> bool {
        !matches!(self, Termination::RetriesExhausted { .. })
    }
}

/// Result of fetching one time window.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Records of every accepted page, in page order.
    pub records: Vec<RawSolicitation>,
    /// Number of pages whose records were accepted.
    pub pages: u32,
    pub termination: Termination,
}

/// Client for the paginated solicitations API.
#[derive(Clone)]
pub struct SolicitationClient {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    settings: FetchSettings,
}

impl SolicitationClient {
    /// Creates a new `SolicitationClient`.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Full URL of the solicitations listing.
    /// * `token` - Value sent verbatim in the `Authorization` header.
    /// * `settings` - Pacing, retry and timeout settings.
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        settings: FetchSettings,
    ) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| {
                SyncError::Config(format!("Failed to create solicitations client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token: token.into(),
            settings,
        })
    }

    /// Fetches a single page.
    ///
    /// # Arguments
    ///
    /// * `page` - Zero-based page number.
    /// * `start` / `end` - Window bounds in `DDMMYYYYHHMMSS`.
    ///
    /// # Returns
    ///
    /// * `Result<Vec<RawSolicitation>, SyncError>` - The page's records, possibly empty.
    pub async fn fetch_page(
        &self,
        page: u32,
        start: &str,
        end: &str,
    ) -> Result<Vec<RawSolicitation>, SyncError> {
        tracing::debug!("Requesting page {} of window {} -> {}", page, start, end);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("nroPagina", page.to_string()),
                ("dataHoraInicio", start.to_string()),
                ("dataHoraFim", end.to_string()),
            ])
            .header("Accept", "application/json")
            .header("Authorization", &self.token)
            .header("X-CSRF-TOKEN", "")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SyncError::UnexpectedStatus {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let body: Value = response.json().await?;
        extract_records(body).with_context(|| format!("page {}", page))
    }

    /// Fetches every page of a window, in order.
    ///
    /// Never fails: a page that keeps failing after `max_attempts` attempts
    /// ends the loop and whatever was gathered so far is returned, with the
    /// reason recorded in [`FetchOutcome::termination`].
    pub async fn fetch_window(&self, start: &str, end: &str) -> FetchOutcome {
        let mut page: u32 = 0;
        let mut records: Vec<RawSolicitation> = Vec::new();
        let mut previous: Option<PageFingerprint> = None;

        loop {
            let mut retry = RetryState::new(self.settings.max_attempts, self.settings.delay);

            let batch = loop {
                match self.fetch_page(page, start, end).await {
                    Ok(batch) => break batch,
                    Err(e) => match retry.record_failure() {
                        Some(backoff) => {
                            tracing::warn!(
                                "Page {} failed (attempt {}): {}. Retrying in {:?}",
                                page,
                                retry.attempts(),
                                e,
                                backoff
                            );
                            tokio::time::sleep(backoff).await;
                        }
                        None => {
                            tracing::error!(
                                "Page {} failed {} times, abandoning window with {} records: {}",
                                page,
                                retry.attempts(),
                                records.len(),
                                e
                            );
                            return FetchOutcome {
                                records,
                                pages: page,
                                termination: Termination::RetriesExhausted {
                                    page,
                                    attempts: retry.attempts(),
                                    last_error: e.to_string(),
                                },
                            };
                        }
                    },
                }
            };

            if batch.is_empty() {
                tracing::debug!("Page {} is empty, window complete", page);
                return FetchOutcome {
                    records,
                    pages: page,
                    termination: Termination::EmptyPage { page },
                };
            }

            let fingerprint = PageFingerprint::of_page(&batch);
            if previous.as_ref() == Some(&fingerprint) {
                tracing::warn!(
                    "Page {} repeats page {} ({}), API is not advancing",
                    page,
                    page.saturating_sub(1),
                    fingerprint.as_str()
                );
                return FetchOutcome {
                    records,
                    pages: page,
                    termination: Termination::DuplicatePage { page },
                };
            }
            previous = Some(fingerprint);

            tracing::info!("Page {}: {} solicitations", page, batch.len());
            records.extend(batch);
            page += 1;

            tokio::time::sleep(self.settings.delay).await;
        }
    }
}

/// Pulls the record list out of a response body.
///
/// Accepts `{"content": [...]}`, `{"data": [...]}` and a bare array. A
/// container that is present but empty or `null` yields an empty page.
pub fn extract_records(body: Value) -> Result<Vec<RawSolicitation>, SyncError> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        Value::Object(mut map) => {
            let mut saw_empty_container = false;
            for key in CONTAINER_KEYS {
                match map.remove(key) {
                    Some(Value::Array(items)) if !items.is_empty() => return Ok(items),
                    Some(Value::Array(_)) | Some(Value::Null) => saw_empty_container = true,
                    _ => {}
                }
            }
            if saw_empty_container {
                Ok(Vec::new())
            } else {
                let keys: Vec<&String> = map.keys().collect();
                Err(SyncError::UnexpectedShape(format!(
                    "object without a record list (keys: {:?})",
                    keys
                )))
            }
        }
        other => Err(SyncError::UnexpectedShape(format!(
            "expected a list of solicitations, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_retry_state_linear_backoff() {
        let mut retry = RetryState::new(4, Duration::from_millis(100));

        assert_eq!(retry.record_failure(), Some(Duration::from_millis(100)));
        assert_eq!(retry.record_failure(), Some(Duration::from_millis(200)));
        assert_eq!(retry.record_failure(), Some(Duration::from_millis(300)));
        assert_eq!(retry.record_failure(), None);
        assert_eq!(retry.attempts(), 4);
    }

    #[test]
    fn test_retry_state_single_attempt() {
        let mut retry = RetryState::new(0, Duration::from_secs(1));
        assert_eq!(retry.record_failure(), None);
        assert_eq!(retry.attempts(), 1);
    }

    #[test]
    fn test_extract_records_shapes() {
        assert_eq!(
            extract_records(json!({"content": [{"id": 1}]})).unwrap(),
            vec![json!({"id": 1})]
        );
        assert_eq!(
            extract_records(json!({"data": [{"id": 2}]})).unwrap(),
            vec![json!({"id": 2})]
        );
        assert_eq!(
            extract_records(json!([{"id": 3}])).unwrap(),
            vec![json!({"id": 3})]
        );
    }

    #[test]
    fn test_extract_records_falls_through_empty_content() {
        let body = json!({"content": [], "data": [{"id": 4}]});
        assert_eq!(extract_records(body).unwrap(), vec![json!({"id": 4})]);
    }

    #[test]
    fn test_extract_records_empty_pages() {
        assert!(extract_records(json!({"content": []})).unwrap().is_empty());
        assert!(extract_records(json!({"data": null})).unwrap().is_empty());
        assert!(extract_records(json!([])).unwrap().is_empty());
        assert!(extract_records(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_extract_records_unknown_shape() {
        let err = extract_records(json!({"message": "token expirado"})).unwrap_err();
        assert!(matches!(err, SyncError::UnexpectedShape(_)));
        assert!(extract_records(json!("texto")).is_err());
    }

    #[test]
    fn test_termination_completeness() {
        assert!(Termination::EmptyPage { page: 0 }.is_complete());
        assert!(Termination::DuplicatePage { page: 2 }.is_complete());
        assert!(!Termination::RetriesExhausted {
            page: 1,
            attempts: 5,
            last_error: "timeout".into()
        }
        .is_complete());
    }
}
