use thiserror::Error;

use crate::client::ClientError;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("No user name for fix. Pass --user or set user_name in ccmonitor.toml.")]
    MissingUser,

    #[error("Build server error: {0}")]
    Client(#[from] ClientError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_error_converts() {
        let err: MonitorError = ClientError::NotFound("core".into()).into();
        assert_eq!(err.to_string(), "Build server error: project not found: core");
    }

    #[test]
    fn config_error_display() {
        let err = MonitorError::Config("bad".into());
        assert_eq!(err.to_string(), "Config error: bad");
    }
}
