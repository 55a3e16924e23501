//! Bounded retry around a rating capability.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::{ChatMessage, RatingCapability, ResponseSchema};
use crate::config::RetrySettings;
use crate::error::{PanelError, PanelResult};

/// Attempt budget and fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(20))
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self::new(settings.max_attempts, settings.delay())
    }
}

/// Retries retriable failures (transport, rate limit, malformed structured
/// output) up to the policy's attempt budget, then fails with
/// [`PanelError::RetriesExhausted`].
pub struct RetryingCapability<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: RatingCapability> RetryingCapability<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn attempt(
        &self,
        messages: &[ChatMessage],
        schema: Option<&ResponseSchema>,
    ) -> PanelResult<String> {
        let raw = self.inner.generate(messages, schema).await?;
        if let Some(schema) = schema {
            schema.validate(&raw)?;
        }
        Ok(raw)
    }
}

#[async_trait]
impl<C: RatingCapability> RatingCapability for RetryingCapability<C> {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        schema: Option<&ResponseSchema>,
    ) -> PanelResult<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.attempt(messages, schema).await {
                Ok(raw) => return Ok(raw),
                Err(err) => err,
            };
            if !err.is_retriable() {
                return Err(err);
            }
            if attempt >= self.policy.max_attempts {
                return Err(PanelError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }
            warn!(
                attempt,
                max_attempts = self.policy.max_attempts,
                category = %err.retry_category(),
                error = %err,
                "Rating call failed, retrying in {:?}",
                self.policy.delay
            );
            tokio::time::sleep(self.policy.delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::generate_structured;
    use coordination::CodingResponse;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays a fixed sequence of outcomes, one per call.
    struct Flaky {
        outcomes: Mutex<VecDeque<PanelResult<String>>>,
        calls: Mutex<u32>,
    }

    impl Flaky {
        fn new(outcomes: Vec<PanelResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl RatingCapability for Flaky {
        async fn generate(
            &self,
            _messages: &[ChatMessage],
            _schema: Option<&ResponseSchema>,
        ) -> PanelResult<String> {
            *self.calls.lock().unwrap() += 1;
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(PanelError::InferenceFailure("script exhausted".into())))
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_secs(20))
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let inner = Flaky::new(vec![
            Err(PanelError::InferenceFailure("connection reset".into())),
            Err(PanelError::RateLimit("slow down".into())),
            Ok("unified codebook".into()),
        ]);
        let retrying = RetryingCapability::new(inner.clone(), policy(5));
        let out = retrying.generate(&[ChatMessage::user("hi")], None).await.unwrap();
        assert_eq!(out, "unified codebook");
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget_and_reports_last_error() {
        let inner = Flaky::new(vec![
            Err(PanelError::InferenceFailure("a".into())),
            Err(PanelError::InferenceFailure("b".into())),
            Err(PanelError::RateLimit("c".into())),
        ]);
        let retrying = RetryingCapability::new(inner.clone(), policy(3));
        let err = retrying.generate(&[], None).await.unwrap_err();
        assert_eq!(inner.calls(), 3);
        match err {
            PanelError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, PanelError::RateLimit(_)));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_structured_output_is_retried() {
        let inner = Flaky::new(vec![
            Ok("I think the answer is 2".into()),
            Ok(r#"{"reasoning": "no code"}"#.into()),
            Ok(r#"{"code": 2, "reasoning": "against"}"#.into()),
        ]);
        let retrying = RetryingCapability::new(inner.clone(), policy(5));
        let schema = ResponseSchema::of::<CodingResponse>();
        let raw = retrying.generate(&[], Some(&schema)).await.unwrap();
        assert!(raw.contains("\"code\": 2"));
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn wrongly_typed_field_is_retried() {
        let inner = Flaky::new(vec![
            Ok(r#"{"code": "two", "reasoning": "against"}"#.into()),
            Ok(r#"{"code": 2, "reasoning": "against"}"#.into()),
        ]);
        let retrying = RetryingCapability::new(inner.clone(), policy(5));
        let (answer, _raw) = generate_structured::<CodingResponse>(&retrying, &[])
            .await
            .unwrap();
        assert_eq!(answer.code, 2);
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_type_errors_exhaust_budget() {
        let bad = || Ok(r#"{"code": 1.5, "reasoning": "between"}"#.to_string());
        let inner = Flaky::new(vec![bad(), bad()]);
        let retrying = RetryingCapability::new(inner.clone(), policy(2));
        let err = generate_structured::<CodingResponse>(&retrying, &[])
            .await
            .unwrap_err();
        assert_eq!(inner.calls(), 2);
        match err {
            PanelError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, PanelError::ParseFailure { .. }));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn non_retriable_error_fails_immediately() {
        let inner = Flaky::new(vec![Err(PanelError::Configuration("bad key".into()))]);
        let retrying = RetryingCapability::new(inner.clone(), policy(5));
        let err = retrying.generate(&[], None).await.unwrap_err();
        assert!(matches!(err, PanelError::Configuration(_)));
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_fixed_delay_between_attempts() {
        let inner = Flaky::new(vec![
            Err(PanelError::InferenceFailure("x".into())),
            Ok("done".into()),
        ]);
        let retrying = RetryingCapability::new(inner, policy(2));
        let start = tokio::time::Instant::now();
        retrying.generate(&[], None).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(20));
    }

    #[test]
    fn zero_attempts_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
