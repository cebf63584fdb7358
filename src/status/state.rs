use std::fmt;

use serde::{Deserialize, Serialize};

use super::snapshot::{BuildStatus, StatusSnapshot};

/// The five display states of a monitored project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectState {
    NotConnected,
    Building,
    BrokenAndBuilding,
    Success,
    Broken,
}

impl fmt::Display for ProjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectState::NotConnected => write!(f, "Not connected"),
            ProjectState::Building => write!(f, "Building"),
            ProjectState::BrokenAndBuilding => write!(f, "Broken and building"),
            ProjectState::Success => write!(f, "Success"),
            ProjectState::Broken => write!(f, "Broken"),
        }
    }
}

/// Project the current snapshot onto a display state.
///
/// - No snapshot → `NotConnected`
/// - Building or pending, last build green → `Building`
/// - Building or pending, last build anything else → `BrokenAndBuilding`
/// - Idle, last build green → `Success`
/// - Idle otherwise → `Broken`
///
/// Recomputed on every read; never cached.
pub fn derive_state(snapshot: Option<&StatusSnapshot>) -> ProjectState {
    let Some(snapshot) = snapshot else {
        return ProjectState::NotConnected;
    };

    let green = snapshot.build_status == BuildStatus::Success;
    match (snapshot.activity.is_building_or_pending(), green) {
        (true, true) => ProjectState::Building,
        (true, false) => ProjectState::BrokenAndBuilding,
        (false, true) => ProjectState::Success,
        (false, false) => ProjectState::Broken,
    }
}
