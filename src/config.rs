//! Configuração do ccmonitor carregada a partir de `ccmonitor.toml`.
//!
//! A struct [`MonitorConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `CCMONITOR_SERVER_URL` tem precedência sobre o arquivo.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::MonitorError;

/// Nome padrão do arquivo de configuração.
pub const DEFAULT_CONFIG_FILE: &str = "ccmonitor.toml";

/// Variável de ambiente que sobrescreve `server_url`.
pub const SERVER_URL_ENV: &str = "CCMONITOR_SERVER_URL";

/// Configuração de nível superior carregada de `ccmonitor.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// URL base do servidor de integração contínua.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Intervalo entre polls no modo `watch`, em segundos.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Timeout total de cada requisição HTTP, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout de conexão, em segundos.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Projeto usado quando nenhum é passado na linha de comando.
    #[serde(default)]
    pub default_project: Option<String>,

    /// Usuário enviado junto com o comando `fix`.
    #[serde(default)]
    pub user_name: Option<String>,
}

// Valor padrão para o servidor: localhost:8080.
fn default_server_url() -> String {
    "http://localhost:8080".to_string()
}

// Valor padrão para o intervalo de poll: 5s.
fn default_poll_interval_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            default_project: None,
            user_name: None,
        }
    }
}

impl MonitorConfig {
    /// Carrega a configuração do caminho informado.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load_from(path: &Path) -> Result<Self, MonitorError> {
        let mut config = if path.exists() {
            debug!(path = %path.display(), "loading configuration");
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<MonitorConfig>(&contents)?
        } else {
            debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo de configuração.
        if let Ok(url) = std::env::var(SERVER_URL_ENV) {
            if !url.is_empty() {
                config.server_url = url;
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), MonitorError> {
        if self.server_url.trim().is_empty() {
            return Err(MonitorError::Config("server_url must not be empty".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(MonitorError::Config(
                "poll_interval_secs must be at least 1".into(),
            ));
        }
        // Timeout zero faz toda requisição falhar imediatamente.
        if self.request_timeout_secs == 0 {
            return Err(MonitorError::Config(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(MonitorError::Config(
                "connect_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Resolve o projeto a monitorar: argumento da CLI ou `default_project`.
    pub fn project(&self, name: Option<String>) -> Result<ProjectConfig, MonitorError> {
        let name = name
            .or_else(|| self.default_project.clone())
            .ok_or_else(|| {
                MonitorError::Config("no project given and no default_project configured".into())
            })?;
        Ok(ProjectConfig {
            name,
            server_url: self.server_url.clone(),
        })
    }
}

/// Identifica um projeto monitorado. O monitor apenas expõe este registro;
/// somente `name` é usado internamente.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub server_url: String,
}

impl ProjectConfig {
    pub fn new(name: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server_url: server_url.into(),
        }
    }
}
