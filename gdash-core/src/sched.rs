use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::fetch::{FetchError, WeatherFetcher};
use crate::queue::{PublishError, QueuePublisher};

/// Failure of one collect iteration.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// One fetch-then-publish pipeline iteration.
pub struct Collector {
    fetcher: Box<dyn WeatherFetcher>,
    publisher: QueuePublisher,
}

impl Collector {
    pub fn new(fetcher: Box<dyn WeatherFetcher>, publisher: QueuePublisher) -> Self {
        Self { fetcher, publisher }
    }

    /// Fetch one observation and publish it. An error from either step
    /// belongs to this iteration alone.
    pub async fn run_once(&self) -> Result<(), CollectError> {
        let log = self.fetcher.fetch_current().await?;

        let temperature = log
            .temperature
            .map_or_else(|| "n/a".to_string(), |t| format!("{t:.1}C"));
        log::info!("Collected {} reading: {}, {}", log.location, log.condition, temperature);

        self.publisher.publish(&log).await?;
        log::info!("Published reading to queue {}", self.publisher.queue_name());

        Ok(())
    }
}

/// Run `iteration` every `period` until `shutdown` signals.
///
/// The first run starts immediately. Each iteration is awaited in place,
/// so a run that outlives its period holds the single flight; ticks that
/// fall due while it runs are skipped rather than queued. An iteration
/// error is logged and the next tick proceeds as scheduled.
pub async fn run_scheduler<F, Fut>(
    period: Duration,
    mut shutdown: watch::Receiver<()>,
    mut iteration: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), CollectError>>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                log::info!("Scheduler stopping");
                break;
            }
            _ = ticker.tick() => {
                if let Err(err) = iteration().await {
                    log::error!("Collect iteration failed: {err}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WeatherLog;
    use crate::queue::{MemoryTransport, RetryPolicy};
    use async_trait::async_trait;
    use chrono::Utc;
    use reqwest::StatusCode;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct StaticFetcher {
        log: Option<WeatherLog>,
    }

    #[async_trait]
    impl WeatherFetcher for StaticFetcher {
        async fn fetch_current(&self) -> Result<WeatherLog, FetchError> {
            match &self.log {
                Some(log) => Ok(log.clone()),
                None => Err(FetchError::UpstreamStatus {
                    status: StatusCode::BAD_GATEWAY,
                    body: "upstream down".to_string(),
                }),
            }
        }
    }

    fn sample_log() -> WeatherLog {
        WeatherLog {
            timestamp: Utc::now(),
            location: "test".to_string(),
            temperature: Some(22.5),
            humidity: Some(48.0),
            wind_speed: None,
            condition: "clear".to_string(),
            source: "gdash-collector".to_string(),
            user_id: None,
        }
    }

    fn collector_with(transport: &MemoryTransport, log: Option<WeatherLog>) -> Collector {
        let publisher = QueuePublisher::new(
            Box::new(transport.clone()),
            "gdash.weather.logs",
            RetryPolicy::default(),
        );
        Collector::new(Box::new(StaticFetcher { log }), publisher)
    }

    #[tokio::test]
    async fn run_once_publishes_the_fetched_reading() {
        let transport = MemoryTransport::new();
        let log = sample_log();

        collector_with(&transport, Some(log.clone()))
            .run_once()
            .await
            .expect("iteration should succeed");

        let messages = transport.messages();
        assert_eq!(messages.len(), 1);

        let published: WeatherLog = serde_json::from_slice(&messages[0].body).unwrap();
        assert_eq!(published, log);
    }

    #[tokio::test]
    async fn fetch_failure_skips_the_publish() {
        let transport = MemoryTransport::new();

        let err = collector_with(&transport, None)
            .run_once()
            .await
            .expect_err("iteration must fail");

        assert!(matches!(err, CollectError::Fetch(_)));
        assert_eq!(transport.connect_attempts(), 0, "no queue work after a fetch failure");
    }

    #[tokio::test]
    async fn publish_failure_surfaces_as_a_collect_error() {
        let transport = MemoryTransport::new();
        transport.fail_publish(true);

        let err = collector_with(&transport, Some(sample_log()))
            .run_once()
            .await
            .expect_err("iteration must fail");

        assert!(matches!(err, CollectError::Publish(_)));
        assert!(transport.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_iteration_leaves_the_next_tick_unaffected() {
        let (tx, rx) = watch::channel(());
        let count = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&count);

        let handle = tokio::spawn(run_scheduler(Duration::from_secs(60), rx, move || {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(CollectError::Fetch(FetchError::UpstreamStatus {
                        status: StatusCode::BAD_GATEWAY,
                        body: "upstream down".to_string(),
                    }))
                } else {
                    Ok(())
                }
            }
        }));

        // Immediate run at t=0, then ticks at 60s and 120s.
        tokio::time::sleep(Duration::from_secs(150)).await;
        tx.send(()).expect("scheduler is listening");
        handle.await.expect("scheduler task must finish");

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn first_iteration_runs_without_waiting_a_full_period() {
        let (tx, rx) = watch::channel(());
        let count = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&count);

        let handle = tokio::spawn(run_scheduler(Duration::from_secs(3600), rx, move || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tx.send(()).expect("scheduler is listening");
        handle.await.expect("scheduler task must finish");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_signaled_before_the_first_tick_stops_the_loop() {
        let (tx, rx) = watch::channel(());
        let count = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&count);

        tx.send(()).expect("receiver is alive");

        run_scheduler(Duration::from_secs(60), rx, move || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
