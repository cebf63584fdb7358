mod cell;
mod snapshot;
mod state;

pub use cell::SnapshotCell;
pub use snapshot::{Activity, BuildStatus, IntegratorState, StatusSnapshot};
pub use state::{ProjectState, derive_state};
