use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::WeatherLog;

pub mod memory;

pub use memory::MemoryTransport;

/// Delay between broker connection attempts under the default policy.
pub const DEFAULT_CONNECT_DELAY: Duration = Duration::from_secs(5);

/// Broker connection failure, reported by the transport.
#[derive(Debug, Error)]
#[error("queue connect failed: {0}")]
pub struct ConnectError(pub String);

/// Failure of an operation on an already-open channel.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BrokerError(pub String);

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to encode log for publishing: {0}")]
    Encode(#[from] serde_json::Error),

    /// Connection attempts exhausted. Only reachable under a bounded
    /// policy; the default policy retries forever.
    #[error("queue connect gave up after {attempts} attempts: {source}")]
    Connect { attempts: u32, source: ConnectError },

    /// Broker rejected a declare or publish on an open channel. Never
    /// retried; the iteration that asked for the publish absorbs it.
    #[error("queue operation failed: {0}")]
    Broker(#[from] BrokerError),
}

/// Delivery properties attached to a published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageProperties {
    pub content_type: String,
    pub persistent: bool,
}

impl MessageProperties {
    /// JSON body with a persistence marking, the only combination this
    /// pipeline publishes.
    pub fn persistent_json() -> Self {
        Self {
            content_type: "application/json".to_string(),
            persistent: true,
        }
    }
}

/// Connection retry strategy for [`QueuePublisher`].
///
/// The pipeline default waits a fixed delay and never gives up, favoring
/// availability over fail-fast. Bounded retry exists for callers that
/// would rather see the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Retry forever, waiting `delay` between attempts.
    FixedDelay { delay: Duration },
    /// Give up after `max_attempts` total attempts.
    Bounded { delay: Duration, max_attempts: u32 },
}

impl RetryPolicy {
    pub fn forever(delay: Duration) -> Self {
        Self::FixedDelay { delay }
    }

    /// Wait before the next attempt, or `None` once the policy is
    /// exhausted. `failed` counts attempts that have already failed.
    pub fn delay_before_retry(&self, failed: u32) -> Option<Duration> {
        match self {
            RetryPolicy::FixedDelay { delay } => Some(*delay),
            RetryPolicy::Bounded { delay, max_attempts } => {
                (failed < *max_attempts).then_some(*delay)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::FixedDelay { delay: DEFAULT_CONNECT_DELAY }
    }
}

/// Connection factory for a message broker.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn QueueChannel>, ConnectError>;
}

/// One open broker channel. Channels are short-lived: the publisher opens
/// one per delivery and closes it on every exit path.
#[async_trait]
pub trait QueueChannel: Send {
    /// Declare a named queue. Idempotent on the broker side.
    async fn declare_queue(&mut self, name: &str, durable: bool) -> Result<(), BrokerError>;

    /// Publish one message to the default exchange under `routing_key`.
    async fn publish(
        &mut self,
        routing_key: &str,
        body: &[u8],
        properties: &MessageProperties,
    ) -> Result<(), BrokerError>;

    /// Release the underlying connection.
    async fn close(self: Box<Self>);
}

/// Publishes weather logs to a named durable queue.
///
/// `publish` suspends its caller while the connection loop runs, so under
/// the default policy an unreachable broker parks the calling iteration
/// instead of failing it. Errors after a connection is open are surfaced
/// without retry.
pub struct QueuePublisher {
    transport: Box<dyn QueueTransport>,
    queue_name: String,
    retry: RetryPolicy,
}

impl QueuePublisher {
    pub fn new(
        transport: Box<dyn QueueTransport>,
        queue_name: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            queue_name: queue_name.into(),
            retry,
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Serialize `log` and deliver it, closing the channel on every exit
    /// path.
    pub async fn publish(&self, log: &WeatherLog) -> Result<(), PublishError> {
        let body = serde_json::to_vec(log)?;

        let mut channel = self.acquire().await?;
        let result = self.deliver(channel.as_mut(), &body).await;
        channel.close().await;

        result
    }

    /// Loop until the transport yields a connection or the policy gives
    /// up.
    async fn acquire(&self) -> Result<Box<dyn QueueChannel>, PublishError> {
        let mut failed: u32 = 0;

        loop {
            match self.transport.connect().await {
                Ok(channel) => return Ok(channel),
                Err(err) => {
                    failed += 1;
                    match self.retry.delay_before_retry(failed) {
                        Some(delay) => {
                            log::warn!(
                                "Queue connect attempt {failed} failed, retrying in {delay:?}: {err}"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            return Err(PublishError::Connect { attempts: failed, source: err });
                        }
                    }
                }
            }
        }
    }

    async fn deliver(
        &self,
        channel: &mut dyn QueueChannel,
        body: &[u8],
    ) -> Result<(), PublishError> {
        channel.declare_queue(&self.queue_name, true).await?;
        channel
            .publish(&self.queue_name, body, &MessageProperties::persistent_json())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WeatherLog;
    use tokio::time::Instant;

    fn sample_log() -> WeatherLog {
        WeatherLog {
            timestamp: chrono::Utc::now(),
            location: "test".to_string(),
            temperature: Some(25.0),
            humidity: Some(60.0),
            wind_speed: None,
            condition: "clear".to_string(),
            source: "gdash-collector".to_string(),
            user_id: None,
        }
    }

    fn publisher_with(transport: MemoryTransport, retry: RetryPolicy) -> QueuePublisher {
        QueuePublisher::new(Box::new(transport), "gdash.weather.logs", retry)
    }

    #[tokio::test]
    async fn publish_declares_durable_queue_and_marks_message_persistent() {
        let transport = MemoryTransport::new();
        let publisher = publisher_with(transport.clone(), RetryPolicy::default());

        let log = sample_log();
        publisher.publish(&log).await.expect("publish should succeed");

        assert_eq!(
            transport.declared_queues(),
            vec![("gdash.weather.logs".to_string(), true)]
        );

        let messages = transport.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].queue, "gdash.weather.logs");
        assert_eq!(messages[0].properties, MessageProperties::persistent_json());

        let decoded: WeatherLog = serde_json::from_slice(&messages[0].body).unwrap();
        assert_eq!(decoded, log);

        assert_eq!(transport.closed_channels(), 1, "channel must be released");
    }

    #[tokio::test(start_paused = true)]
    async fn connect_failures_are_retried_with_a_fixed_delay() {
        let transport = MemoryTransport::new();
        transport.fail_connects(3);

        let delay = Duration::from_secs(5);
        let publisher = publisher_with(transport.clone(), RetryPolicy::forever(delay));

        let started = Instant::now();
        publisher.publish(&sample_log()).await.expect("publish should eventually succeed");

        assert_eq!(transport.connect_attempts(), 4);
        assert_eq!(started.elapsed(), delay * 3, "one delay wait per failed attempt");
        assert_eq!(transport.messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_policy_gives_up_after_max_attempts() {
        let transport = MemoryTransport::new();
        transport.fail_connects(10);

        let delay = Duration::from_secs(5);
        let publisher = publisher_with(
            transport.clone(),
            RetryPolicy::Bounded { delay, max_attempts: 3 },
        );

        let started = Instant::now();
        let err = publisher.publish(&sample_log()).await.expect_err("must give up");

        match err {
            PublishError::Connect { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected Connect error, got {other:?}"),
        }
        assert_eq!(transport.connect_attempts(), 3);
        assert_eq!(started.elapsed(), delay * 2, "no delay after the final attempt");
        assert!(transport.messages().is_empty());
    }

    #[tokio::test]
    async fn broker_failure_after_connect_is_not_retried_and_closes_channel() {
        let transport = MemoryTransport::new();
        transport.fail_publish(true);

        let publisher = publisher_with(transport.clone(), RetryPolicy::default());

        let err = publisher.publish(&sample_log()).await.expect_err("publish must fail");
        assert!(matches!(err, PublishError::Broker(_)));

        assert_eq!(transport.connect_attempts(), 1, "no reconnect after a broker error");
        assert!(transport.messages().is_empty());
        assert_eq!(transport.closed_channels(), 1, "channel released on the failure path");
    }

    #[test]
    fn fixed_delay_policy_never_gives_up() {
        let policy = RetryPolicy::forever(Duration::from_secs(5));

        assert_eq!(policy.delay_before_retry(1), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay_before_retry(1_000_000), Some(Duration::from_secs(5)));
    }

    #[test]
    fn bounded_policy_exhausts_at_the_attempt_cap() {
        let policy = RetryPolicy::Bounded {
            delay: Duration::from_secs(1),
            max_attempts: 3,
        };

        assert_eq!(policy.delay_before_retry(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_before_retry(2), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_before_retry(3), None);
    }
}
