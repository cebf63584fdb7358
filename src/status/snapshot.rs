use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the remote project is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Activity {
    #[default]
    Sleeping,
    CheckingModifications,
    Building,
    Pending,
}

impl Activity {
    /// `Building` only. A queued build is not yet running.
    pub fn is_building(self) -> bool {
        self == Activity::Building
    }

    /// `Building` or `Pending`: the project is inside an active build cycle.
    pub fn is_building_or_pending(self) -> bool {
        matches!(self, Activity::Building | Activity::Pending)
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Sleeping => write!(f, "Sleeping"),
            Activity::CheckingModifications => write!(f, "CheckingModifications"),
            Activity::Building => write!(f, "Building"),
            Activity::Pending => write!(f, "Pending"),
        }
    }
}

/// Outcome of the most recent completed build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BuildStatus {
    #[default]
    Unknown,
    Success,
    Failure,
    Exception,
    Cancelled,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStatus::Unknown => write!(f, "Unknown"),
            BuildStatus::Success => write!(f, "Success"),
            BuildStatus::Failure => write!(f, "Failure"),
            BuildStatus::Exception => write!(f, "Exception"),
            BuildStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Lifecycle of the remote build scheduler for the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum IntegratorState {
    #[default]
    Unknown,
    Running,
    Stopped,
}

impl fmt::Display for IntegratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegratorState::Unknown => write!(f, "Unknown"),
            IntegratorState::Running => write!(f, "Running"),
            IntegratorState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// One observation of a project's remote status.
///
/// Snapshots are produced whole by the fetch collaborator and never modified
/// afterwards; the monitor swaps whole values rather than patching fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub name: String,
    pub activity: Activity,
    pub build_status: BuildStatus,
    #[serde(default)]
    pub last_build_label: String,
    #[serde(default)]
    pub last_build_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_build_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub web_url: String,
    #[serde(default)]
    pub build_stage: String,
    #[serde(default)]
    pub current_message: String,
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub integrator_state: IntegratorState,
}

impl StatusSnapshot {
    /// A snapshot with the given activity and status and empty descriptive fields.
    pub fn new(name: impl Into<String>, activity: Activity, build_status: BuildStatus) -> Self {
        Self {
            name: name.into(),
            activity,
            build_status,
            last_build_label: String::new(),
            last_build_date: None,
            next_build_time: None,
            web_url: String::new(),
            build_stage: String::new(),
            current_message: String::new(),
            server_name: String::new(),
            integrator_state: IntegratorState::Unknown,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.current_message = message.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.last_build_label = label.into();
        self
    }
}
