//! Tipos de erro para o cliente HTTP do servidor de integração contínua.
//!
//! Define [`ClientError`] com variantes para respostas de erro do servidor,
//! projeto inexistente, falhas de rede e URLs inválidas.

use thiserror::Error;

/// Erros que podem ocorrer ao consultar ou controlar um projeto remoto.
#[derive(Debug, Error)]
pub enum ClientError {
    /// O servidor não conhece o projeto (HTTP 404).
    #[error("project not found: {0}")]
    NotFound(String),

    /// Qualquer outra resposta não-2xx. Contém o status e o corpo da resposta.
    #[error("server error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A URL base configurada não pode ser usada para montar endpoints.
    #[error("invalid server url: {0}")]
    InvalidUrl(String),

    /// O corpo da resposta não é um snapshot de status válido.
    #[error("failed to decode status: {0}")]
    Decode(String),
}
