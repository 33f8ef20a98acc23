pub mod client;
pub mod error;
pub mod types;

pub use client::{RemoteGateway, WEBHOOK_URL, WebhookClient};
pub use error::GatewayError;
pub use types::{
    AccountKind, Action, LookupPayload, Payload, RemoteReply, RemoteResult, RemoteStatus,
    WithdrawPayload,
};
