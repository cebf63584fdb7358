pub mod error;
pub mod http;

use std::future::Future;

use crate::status::StatusSnapshot;

pub use error::ClientError;
pub use http::HttpProjectClient;

/// Fetches the current status of a named project.
///
/// Every failure (transport, protocol, decoding, timeout) is treated the
/// same way by the monitor: it disconnects.
pub trait StatusFetcher: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn fetch_status(
        &self,
        project: &str,
    ) -> impl Future<Output = Result<StatusSnapshot, Self::Error>> + Send;
}

/// Build-control commands for a named project. Failures are returned to the
/// caller as-is.
pub trait ProjectController: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn force_build(&self, project: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn abort_build(&self, project: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn fix_build(
        &self,
        project: &str,
        user: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn stop_project(&self, project: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn start_project(&self, project: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn cancel_pending_request(
        &self,
        project: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
