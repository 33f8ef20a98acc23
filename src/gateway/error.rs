//! Tipos de erro para o gateway remoto.
//!
//! Define [`GatewayError`] com variantes para resposta HTTP sem sucesso,
//! falha de rede e corpo que não pôde ser interpretado. Todas são
//! recuperáveis: o fluxo converte qualquer uma delas em estado de erro ou
//! aviso no formulário.

use thiserror::Error;

/// Erros que podem ocorrer ao chamar o webhook.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// O servidor respondeu com um status HTTP fora da faixa 2xx.
    #[error("HTTP {status}")]
    Http { status: u16 },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout configurado).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// O corpo da resposta não é um JSON com o formato esperado.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Malformed(err.to_string())
    }
}
