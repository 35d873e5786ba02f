//! The HTTP Executor with retry/error policy (spec §4.3), and the
//! cancellation plumbing from §5.
//!
//! A [`Transport`] trait sits between the executor and `reqwest::Client` so
//! tests can swap in a [`FakeTransport`] that returns canned
//! timeouts/errors/bodies deterministically, instead of reaching for a
//! network-mocking crate (none appears anywhere in the reference pack this
//! crate was grown from).

use crate::error::{Error, ErrorKind};
use crate::wrapper::RequestSpec;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What a transport attempt can return: a successful JSON body, or a
/// classified failure matching the spec §7 taxonomy.
pub type TransportResult = Result<Value, Error>;

/// The seam between the executor's retry loop and an actual HTTP client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request attempt and returns either the parsed JSON body or
    /// a classified transport error. Implementations must not retry
    /// internally — retrying is the executor's job.
    async fn send(&self, spec: &RequestSpec) -> TransportResult;
}

/// The default transport, backed by `reqwest::Client`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport around a fresh `reqwest::Client`.
    pub fn new() -> Self {
        ReqwestTransport {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, spec: &RequestSpec) -> TransportResult {
        let mut request = self.client.request(spec.method.clone(), &spec.url);
        for (key, value) in &spec.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &spec.body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(Error::from)?;
        if !response.status().is_success() {
            return Err(ErrorKind::Http {
                msg: format!("{} {}", response.status(), spec.url),
            }
            .into());
        }
        response.json::<Value>().await.map_err(Error::from)
    }
}

/// Bounded retry/timeout policy for one wrapper call (spec §4.3/§5).
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// attempts beyond the first one; total attempts = `max_retries + 1`
    pub max_retries: u32,
    /// per-attempt wall-clock budget
    pub per_attempt_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            max_retries: 3,
            per_attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// Executes a translated request against `transport`, applying the retry
/// policy of spec §4.3: only transport timeouts are retried, up to
/// `config.max_retries` additional attempts; non-2xx and connection
/// failures terminate immediately. `cancel` is checked between attempts and
/// raced against the in-flight attempt.
pub async fn execute(
    transport: &dyn Transport,
    spec: &RequestSpec,
    config: ExecutorConfig,
    cancel: &CancellationToken,
) -> TransportResult {
    let mut last_err: Option<Error> = None;

    for attempt in 0..=config.max_retries {
        if cancel.is_cancelled() {
            return Err(ErrorKind::Unknown {
                msg: "query cancelled".into(),
            }
            .into());
        }

        let attempt_result = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(ErrorKind::Unknown { msg: "query cancelled".into() }.into());
            }
            result = tokio::time::timeout(config.per_attempt_timeout, transport.send(spec)) => result,
        };

        match attempt_result {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => {
                let retryable = matches!(err.kind(), ErrorKind::Timeout { .. });
                log::warn!(
                    "attempt {}/{} for {} failed: {}",
                    attempt + 1,
                    config.max_retries + 1,
                    spec.url,
                    err
                );
                if !retryable {
                    return Err(err);
                }
                last_err = Some(err);
            }
            Err(_elapsed) => {
                let err: Error = ErrorKind::Timeout {
                    msg: format!("attempt {} against {}", attempt + 1, spec.url),
                }
                .into();
                log::warn!("{}", err);
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        ErrorKind::Unknown {
            msg: "exhausted retries with no recorded error".into(),
        }
        .into()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a scripted sequence of results, one per call to `send`, and
    /// records how many attempts were made.
    struct FakeTransport {
        script: Mutex<Vec<TransportResult>>,
        calls: AtomicUsize,
    }

    impl FakeTransport {
        fn new(script: Vec<TransportResult>) -> Self {
            FakeTransport {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, _spec: &RequestSpec) -> TransportResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                panic!("FakeTransport script exhausted");
            }
            script.remove(0)
        }
    }

    fn spec() -> RequestSpec {
        RequestSpec {
            method: Method::GET,
            url: "https://example.test/search".into(),
            headers: Vec::new(),
            body: None,
            db_query: "term".into(),
            api_key: "key".into(),
        }
    }

    #[tokio::test]
    async fn retries_only_on_timeout_then_succeeds() {
        let transport = FakeTransport::new(vec![
            Err(ErrorKind::Timeout { msg: "slow".into() }.into()),
            Ok(serde_json::json!({"ok": true})),
        ]);
        let cancel = CancellationToken::new();
        let result = execute(&transport, &spec(), ExecutorConfig::default(), &cancel).await;
        assert!(result.is_ok());
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn connection_error_is_not_retried() {
        let transport = FakeTransport::new(vec![
            Err(ErrorKind::Connection { msg: "refused".into() }.into()),
            Ok(serde_json::json!({"ok": true})),
        ]);
        let cancel = CancellationToken::new();
        let result = execute(&transport, &spec(), ExecutorConfig::default(), &cancel).await;
        assert!(result.is_err());
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn exhausts_retries_and_surfaces_last_timeout() {
        let config = ExecutorConfig {
            max_retries: 2,
            per_attempt_timeout: Duration::from_secs(1),
        };
        let transport = FakeTransport::new(vec![
            Err(ErrorKind::Timeout { msg: "1".into() }.into()),
            Err(ErrorKind::Timeout { msg: "2".into() }.into()),
            Err(ErrorKind::Timeout { msg: "3".into() }.into()),
        ]);
        let cancel = CancellationToken::new();
        let result = execute(&transport, &spec(), config, &cancel).await;
        assert!(matches!(result.unwrap_err().kind(), ErrorKind::Timeout { .. }));
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn cancellation_short_circuits_before_next_attempt() {
        let transport = FakeTransport::new(vec![Err(ErrorKind::Timeout { msg: "1".into() }.into())]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = execute(&transport, &spec(), ExecutorConfig::default(), &cancel).await;
        assert!(result.is_err());
        assert_eq!(transport.call_count(), 0);
    }
}
