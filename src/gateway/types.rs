//! Tipos de dados trocados com o webhook remoto.
//!
//! A requisição é um único objeto JSON `{"action": ..., ...payload}`; a
//! resposta é lida de forma tolerante em [`RemoteReply`] e normalizada em
//! [`RemoteResult`], onde o `status` é um enum fechado com fallback
//! [`RemoteStatus::Unknown`].

use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Deserializer, Serialize};

use crate::identifier::Identifier;

/// Ação remota solicitada ao webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Consulta de saldo.
    Check,
    /// Reconsulta do status da proposta.
    Status,
    /// Pedido de saque.
    Withdraw,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Check => write!(f, "check"),
            Action::Status => write!(f, "status"),
            Action::Withdraw => write!(f, "withdraw"),
        }
    }
}

/// Tipo da conta de destino do saque. Serializado com os valores do webhook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    #[default]
    #[serde(rename = "corrente")]
    Checking,
    #[serde(rename = "poupanca")]
    Savings,
}

/// Corpo de `check`/`status`: apenas o CPF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupPayload {
    pub cpf: Identifier,
}

/// Corpo de `withdraw`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawPayload {
    pub cpf: Identifier,
    /// Telefone só com dígitos, completado com zeros à esquerda até 11.
    pub phone: String,
    pub bank: String,
    pub agency: String,
    pub account: String,
    #[serde(rename = "accountType")]
    pub account_type: AccountKind,
}

/// Payload de uma ação; achatado ao lado de `action` no JSON enviado.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Lookup(LookupPayload),
    Withdraw(WithdrawPayload),
}

/// Envelope completo de uma requisição ao webhook.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookRequest<'a> {
    pub action: Action,
    #[serde(flatten)]
    pub payload: &'a Payload,
}

/// Status devolvido pelo serviço remoto.
///
/// Qualquer string fora do conjunto conhecido vira [`RemoteStatus::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    Eligible,
    PendingAuthorization,
    NotEligible,
    Error,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteStatus::Eligible => write!(f, "eligible"),
            RemoteStatus::PendingAuthorization => write!(f, "pending_authorization"),
            RemoteStatus::NotEligible => write!(f, "not_eligible"),
            RemoteStatus::Error => write!(f, "error"),
            RemoteStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Resposta bruta do webhook. Todos os campos são opcionais.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteReply {
    #[serde(default)]
    pub status: Option<RemoteStatus>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
    /// Valores não numéricos, negativos ou não finitos são descartados.
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub formalization_url: Option<String>,
}

// Text fields of any other JSON type are dropped instead of failing the reply.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

// `amount` may arrive as anything; only a finite non-negative number is kept.
fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| v.as_f64())
        .filter(|a| a.is_finite() && *a >= 0.0))
}

/// Resultado normalizado de uma ação remota. Imutável depois de recebido.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResult {
    pub status: RemoteStatus,
    pub message: Option<String>,
    /// Presente apenas quando `status` é `Eligible`.
    pub amount: Option<f64>,
    /// Presente apenas quando `status` é `Eligible`.
    pub formalization_link: Option<Url>,
}

impl RemoteResult {
    /// Normaliza uma resposta bruta. `default_status` é usado quando o campo
    /// `status` está ausente (o saque assume `Eligible`; consultas, `Unknown`).
    pub fn from_reply(reply: RemoteReply, default_status: RemoteStatus) -> Self {
        let status = reply.status.unwrap_or(default_status);
        let link = reply
            .formalization_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| match Url::parse(s) {
                Ok(url) => Some(url),
                Err(err) => {
                    tracing::warn!(url = s, %err, "ignoring unparseable formalization link");
                    None
                }
            });
        let eligible = status == RemoteStatus::Eligible;
        Self {
            status,
            message: reply.message,
            amount: reply.amount.filter(|_| eligible),
            formalization_link: link.filter(|_| eligible),
        }
    }

    /// Resultado sintético para uma falha de transporte.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: RemoteStatus::Error,
            message: Some(message.into()),
            amount: None,
            formalization_link: None,
        }
    }
}
