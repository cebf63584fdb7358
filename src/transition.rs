use std::fmt;

use serde::{Deserialize, Serialize};

use crate::status::{BuildStatus, StatusSnapshot};

/// Kind of build event carried by a build-occurred notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildTransition {
    /// The project went from not building to `Building`.
    Started,
    /// Completed green after a non-green build.
    Fixed,
    /// Completed non-green after a green build.
    Broken,
    StillSuccessful,
    StillFailing,
}

impl BuildTransition {
    fn completed(previous: BuildStatus, current: BuildStatus) -> Self {
        let was_green = previous == BuildStatus::Success;
        let is_green = current == BuildStatus::Success;
        match (was_green, is_green) {
            (true, true) => BuildTransition::StillSuccessful,
            (false, true) => BuildTransition::Fixed,
            (true, false) => BuildTransition::Broken,
            (false, false) => BuildTransition::StillFailing,
        }
    }

    pub fn is_completion(self) -> bool {
        self != BuildTransition::Started
    }

    pub fn is_success(self) -> bool {
        matches!(
            self,
            BuildTransition::Fixed | BuildTransition::StillSuccessful
        )
    }
}

impl fmt::Display for BuildTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildTransition::Started => write!(f, "build started"),
            BuildTransition::Fixed => write!(f, "build fixed"),
            BuildTransition::Broken => write!(f, "build broken"),
            BuildTransition::StillSuccessful => write!(f, "build successful"),
            BuildTransition::StillFailing => write!(f, "build still failing"),
        }
    }
}

/// What changed between two consecutive polls.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollTransition {
    /// Left `Building`/`Pending` for `Sleeping`/`CheckingModifications`.
    pub build_completed: bool,
    /// `build_completed` and the new status is `Success`.
    pub build_succeeded: bool,
    /// Entered `Building` from anything else.
    pub build_started: bool,
    /// A non-empty message that differs from the previous one.
    pub new_message_received: bool,
    /// Kind of the completion, if any. `None` unless `build_completed`.
    pub completion: Option<BuildTransition>,
}

impl PollTransition {
    /// Build events to emit for this transition, in firing order.
    pub fn build_events(&self) -> Vec<BuildTransition> {
        let mut events = Vec::new();
        if self.build_started {
            events.push(BuildTransition::Started);
        }
        if let Some(kind) = self.completion {
            events.push(kind);
        }
        events
    }

    pub fn is_quiet(&self) -> bool {
        !self.build_completed && !self.build_started && !self.new_message_received
    }
}

/// Compare two snapshots and describe the change.
///
/// Returns `None` unless both sides are present: the first poll after
/// startup, and the first poll after a failed one, never produce events.
/// Only the endpoint activities are compared, so `Pending → Sleeping`
/// counts as a completed build even if `Building` was never observed.
pub fn classify(
    previous: Option<&StatusSnapshot>,
    current: Option<&StatusSnapshot>,
) -> Option<PollTransition> {
    let (prev, cur) = (previous?, current?);

    let build_completed =
        prev.activity.is_building_or_pending() && !cur.activity.is_building_or_pending();
    let build_succeeded = build_completed && cur.build_status == BuildStatus::Success;
    let build_started = !prev.activity.is_building() && cur.activity.is_building();
    let new_message_received =
        !cur.current_message.is_empty() && cur.current_message != prev.current_message;

    let completion = build_completed
        .then(|| BuildTransition::completed(prev.build_status, cur.build_status));

    Some(PollTransition {
        build_completed,
        build_succeeded,
        build_started,
        new_message_received,
        completion,
    })
}
