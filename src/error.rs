use thiserror::Error;

use crate::deeplink::DeepLinkError;
use crate::gateway::GatewayError;
use crate::identifier::IdentifierError;
use crate::session::SessionError;
use crate::workflow::WorkflowError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Nenhum CPF informado e nenhuma sessão lembrada.")]
    NoIdentifier,

    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Link error: {0}")]
    DeepLink(#[from] DeepLinkError),
}
