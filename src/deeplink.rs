//! Abertura de links externos (formalização, WhatsApp).
//!
//! Falhas ao abrir são reportadas ao usuário, mas nunca alteram o estado do fluxo.

use std::process::{Command, Stdio};

use reqwest::Url;
use thiserror::Error;

pub const WHATSAPP_URL: &str = "https://wa.me/18998008009";

/// Mensagem pré-preenchida do "Indique e ganhe".
pub const REFERRAL_MESSAGE: &str =
    "Oi! Usei o app GranaCred para consultar/sacar FGTS. Recomendo! ✅";

#[derive(Debug, Error)]
pub enum DeepLinkError {
    #[error("invalid link `{uri}`: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("could not launch link handler: {0}")]
    Launch(#[from] std::io::Error),

    #[error("link handler exited with status {0}")]
    HandlerFailed(i32),
}

/// Opens a URI in an external handler.
pub trait DeepLinker {
    fn open(&self, uri: &str) -> Result<(), DeepLinkError>;
}

/// Hands the URI to the platform opener (`xdg-open`, `open`, `start`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl SystemOpener {
    fn command(uri: &str) -> Command {
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("open");
            cmd.arg(uri);
            cmd
        } else if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", "", uri]);
            cmd
        } else {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(uri);
            cmd
        }
    }
}

impl DeepLinker for SystemOpener {
    fn open(&self, uri: &str) -> Result<(), DeepLinkError> {
        let url = parse(uri)?;
        tracing::debug!(uri = %url, "opening external link");
        let status = Self::command(url.as_str())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(DeepLinkError::HandlerFailed(status.code().unwrap_or(-1)))
        }
    }
}

fn parse(uri: &str) -> Result<Url, DeepLinkError> {
    Url::parse(uri).map_err(|err| DeepLinkError::InvalidUri {
        uri: uri.to_string(),
        reason: err.to_string(),
    })
}

/// Builds `<base>?text=<message>` with the message percent-encoded.
pub fn share_link(base: &str, message: &str) -> Result<Url, DeepLinkError> {
    let mut url = parse(base)?;
    url.query_pairs_mut().append_pair("text", message);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_link_encodes_message() {
        let url = share_link(WHATSAPP_URL, "Oi! Recomendo").unwrap();
        assert_eq!(url.as_str(), "https://wa.me/18998008009?text=Oi%21+Recomendo");
        let (key, value) = url.query_pairs().next().unwrap();
        assert_eq!(key, "text");
        assert_eq!(value, "Oi! Recomendo");
    }

    #[test]
    fn share_link_rejects_bad_base() {
        assert!(matches!(
            share_link("wa.me without scheme", REFERRAL_MESSAGE),
            Err(DeepLinkError::InvalidUri { .. })
        ));
    }

    #[test]
    fn system_opener_rejects_invalid_uri_before_launching() {
        let err = SystemOpener.open("::nope").unwrap_err();
        assert!(matches!(err, DeepLinkError::InvalidUri { .. }));
    }
}
