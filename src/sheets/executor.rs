use super::transport::{ApiRequest, ApiResponse, Transport};
use crate::auth::{AuthorizationFlow, CredentialManager};
use crate::config::RetryConfig;
use crate::error::{AppError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

const STATUS_TOO_MANY_REQUESTS: u16 = 429;
const STATUS_INTERNAL_SERVER_ERROR: u16 = 500;
const STATUS_SERVICE_UNAVAILABLE: u16 = 503;

/// Bounded exponential backoff: the delay before retry `k` is `base_delay * 2^k`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        (&RetryConfig::default()).into()
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// A failure class the policy is allowed to retry.
#[derive(Debug)]
struct RetryableFailure {
    rate_limited: bool,
    status: u16,
    detail: String,
}

impl RetryableFailure {
    fn classify(response: &ApiResponse) -> Option<Self> {
        let rate_limited = match response.status {
            STATUS_TOO_MANY_REQUESTS => true,
            STATUS_INTERNAL_SERVER_ERROR | STATUS_SERVICE_UNAVAILABLE => false,
            _ => return None,
        };

        Some(Self {
            rate_limited,
            status: response.status,
            detail: response.error_detail(),
        })
    }

    fn exhausted(self, attempts: u32) -> AppError {
        match self.rate_limited {
            true => AppError::RateLimited {
                attempts,
                status: self.status,
                detail: self.detail,
            },
            false => AppError::ServiceUnavailable {
                attempts,
                status: self.status,
                detail: self.detail,
            },
        }
    }
}

/// The only place that talks to the network.
pub struct RequestExecutor<T, F> {
    transport: T,
    credentials: Arc<CredentialManager<F>>,
    policy: RetryPolicy,
}

impl<T: Transport, F: AuthorizationFlow> RequestExecutor<T, F> {
    pub fn new(transport: T, credentials: Arc<CredentialManager<F>>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            credentials,
            policy,
        }
    }

    pub fn credentials(&self) -> &Arc<CredentialManager<F>> {
        &self.credentials
    }

    /// Send `request`, retrying rate-limit and unavailable responses per the policy.
    #[instrument(name = "Executing request", skip_all, fields(method = %request.method))]
    pub async fn execute(&self, request: &ApiRequest) -> Result<Value> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            // Fetched per attempt so a token that lapses during backoff is refreshed
            let token = self.credentials.get_active_token().await?;
            let response = self.transport.send(request, &token).await?;

            if response.is_success() {
                return Ok(response.body);
            }

            let Some(failure) = RetryableFailure::classify(&response) else {
                return Err(AppError::RequestRejected {
                    status: response.status,
                    detail: response.error_detail(),
                });
            };

            if attempt >= self.policy.max_attempts {
                return Err(failure.exhausted(attempt));
            }

            let delay = self.policy.delay_for(attempt - 1);
            warn!(
                attempt,
                status = failure.status,
                delay_ms = delay.as_millis() as u64,
                "Request failed ({}), retrying",
                failure.detail
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Like [`execute`](Self::execute), decoding the reply into a wire type.
    pub async fn execute_as<R: DeserializeOwned>(&self, request: &ApiRequest) -> Result<R> {
        let body = self.execute(request).await?;
        serde_json::from_value(body)
            .map_err(|e| AppError::Sheets(format!("Malformed response: {}", e)))
    }
}


#[cfg(test)]
mod tests {
    use super::test_helpers::authenticated_manager;
    use super::*;
    use crate::error::FailureKind;
    use crate::sheets::transport::test_helpers::{MockTransport, ok, status};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Records when each attempt was made on the (paused) tokio clock.
    struct TimedTransport {
        responses: Mutex<VecDeque<ApiResponse>>,
        sent_at: Mutex<Vec<Instant>>,
    }

    impl TimedTransport {
        fn new(responses: Vec<ApiResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                sent_at: Mutex::new(Vec::new()),
            }
        }

        fn gaps(&self) -> Vec<Duration> {
            let sent_at = self.sent_at.lock().unwrap();
            sent_at.windows(2).map(|w| w[1] - w[0]).collect()
        }
    }

    #[async_trait]
    impl Transport for TimedTransport {
        async fn send(&self, _request: &ApiRequest, _token: &str) -> Result<ApiResponse> {
            self.sent_at.lock().unwrap().push(Instant::now());
            Ok(self.responses.lock().unwrap().pop_front().unwrap())
        }
    }

    fn request() -> ApiRequest {
        ApiRequest::get(["spreadsheets", "doc"])
    }

    #[test]
    fn test_delay_schedule_doubles_from_one_unit() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhausts_after_three_attempts() {
        let (_dir, manager) = authenticated_manager();
        let transport = TimedTransport::new(vec![
            status(429, "Quota exceeded"),
            status(429, "Quota exceeded"),
            status(429, "Quota exceeded"),
        ]);
        let executor = RequestExecutor::new(transport, manager, RetryPolicy::default());

        let err = executor.execute(&request()).await.unwrap_err();

        let AppError::RateLimited {
            attempts,
            status,
            ref detail,
        } = err
        else {
            panic!("unexpected error {:?}", err);
        };
        assert_eq!(attempts, 3);
        assert_eq!(status, 429);
        assert_eq!(detail, "Quota exceeded");
        assert_eq!(err.kind(), FailureKind::RateLimited);
        assert_eq!(
            executor.transport.gaps(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_second_attempt() {
        let (_dir, manager) = authenticated_manager();
        let transport = TimedTransport::new(vec![
            status(503, "Backend unavailable"),
            ok(json!({"spreadsheetId": "doc"})),
        ]);
        let executor = RequestExecutor::new(transport, manager, RetryPolicy::default());

        let body = executor.execute(&request()).await.unwrap();

        assert_eq!(body, json!({"spreadsheetId": "doc"}));
        assert_eq!(executor.transport.gaps(), vec![Duration::from_secs(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_exhaustion_is_service_unavailable() {
        let (_dir, manager) = authenticated_manager();
        let transport = MockTransport::new(vec![
            Ok(status(500, "Internal error")),
            Ok(status(503, "Unavailable")),
            Ok(status(500, "Internal error")),
        ]);
        let executor = RequestExecutor::new(transport.clone(), manager, RetryPolicy::default());

        let err = executor.execute(&request()).await.unwrap_err();

        assert!(
            matches!(err, AppError::ServiceUnavailable { attempts: 3, status: 500, .. }),
            "got {:?}",
            err
        );
        assert_eq!(transport.sent().len(), 3);
        assert_eq!(transport.tokens.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_statuses_are_not_retried() {
        for code in [400, 403, 404, 502] {
            let (_dir, manager) = authenticated_manager();
            let transport = MockTransport::new(vec![Ok(status(code, "nope"))]);
            let executor =
                RequestExecutor::new(transport.clone(), manager, RetryPolicy::default());

            let err = executor.execute(&request()).await.unwrap_err();

            assert!(
                matches!(err, AppError::RequestRejected { status, ref detail } if status == code && detail == "nope"),
                "got {:?}",
                err
            );
            assert_eq!(transport.sent().len(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_are_not_retried() {
        let (_dir, manager) = authenticated_manager();
        let transport = MockTransport::new(vec![Err(AppError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        )))]);
        let executor = RequestExecutor::new(transport.clone(), manager, RetryPolicy::default());

        let err = executor.execute(&request()).await.unwrap_err();

        assert!(matches!(err, AppError::Io(_)), "got {:?}", err);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy_never_sleeps() {
        let (_dir, manager) = authenticated_manager();
        let transport = TimedTransport::new(vec![status(429, "slow down")]);
        let policy = RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_secs(1),
        };
        let executor = RequestExecutor::new(transport, manager, policy);
        let started = Instant::now();

        let err = executor.execute(&request()).await.unwrap_err();

        assert!(matches!(err, AppError::RateLimited { attempts: 1, .. }), "got {:?}", err);
        assert_eq!(Instant::now() - started, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_execute_as_reports_malformed_reply() {
        let (_dir, manager) = authenticated_manager();
        let transport = MockTransport::new(vec![Ok(ok(json!({"replies": "not a list"})))]);
        let executor = RequestExecutor::new(transport, manager, RetryPolicy::default());

        let result: Result<google_sheets4::api::BatchUpdateSpreadsheetResponse> =
            executor.execute_as(&request()).await;

        assert!(matches!(result, Err(AppError::Sheets(_))), "got {:?}", result);
    }
}
