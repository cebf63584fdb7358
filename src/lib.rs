//! Status reconciliation for continuous-integration projects.
//!
//! A [`ProjectMonitor`] polls one remote project through a [`StatusFetcher`],
//! compares each [`StatusSnapshot`] with the previous one, and reports build
//! starts, completions and server messages to subscribers. Readers may query
//! the monitor from any thread while it polls.

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod estimator;
pub mod events;
pub mod monitor;
pub mod status;
pub mod transition;

pub use client::{ClientError, HttpProjectClient, ProjectController, StatusFetcher};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{MonitorConfig, ProjectConfig};
pub use error::MonitorError;
pub use estimator::BuildDurationEstimator;
pub use events::{BuildOccurred, MessageReceived, Observers, PollCompleted, SubscriptionId};
pub use monitor::{ProjectMonitor, ProjectReport};
pub use status::{
    Activity, BuildStatus, IntegratorState, ProjectState, SnapshotCell, StatusSnapshot,
    derive_state,
};
pub use transition::{BuildTransition, PollTransition, classify};
