//! Core library for the GDash weather pipeline.
//!
//! This crate defines:
//! - Configuration read from the environment
//! - The collect pipeline: fetch an observation, publish it to a queue
//! - The insights engine and the bounded log buffer behind it
//! - Shared domain models (logs, insights)
//!
//! It is used by `gdash-daemon`, but can also be reused by other binaries
//! or services.

pub mod config;
pub mod fetch;
pub mod insights;
pub mod model;
pub mod queue;
pub mod sched;
pub mod store;

pub use config::Config;
pub use fetch::{FetchError, OpenMeteoFetcher, WeatherFetcher};
pub use model::{Trend, WeatherInsights, WeatherLog};
pub use queue::{PublishError, QueuePublisher, QueueTransport, RetryPolicy};
pub use sched::{CollectError, Collector, run_scheduler};
pub use store::LogBuffer;
