//! Configuração do GranaCred carregada a partir de `granacred.toml`.
//!
//! A struct [`GranaConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! Variáveis de ambiente `GRANACRED_*` têm precedência sobre o arquivo.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::deeplink::WHATSAPP_URL;
use crate::gateway::WEBHOOK_URL;

pub const CONFIG_FILE: &str = "granacred.toml";

pub const HOWTO_IMAGE_URL: &str = "https://gpakoffbuypbmfiwewka.supabase.co/storage/v1/object/public/Farol/Imagens%20de%20envio/Como%20autorizar%20aplicativo.jpg";

/// Configuração de nível superior carregada de `granacred.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct GranaConfig {
    /// URL do webhook que responde `check`, `status` e `withdraw`.
    #[serde(default = "default_webhook_url")]
    pub webhook_url: String,

    /// Link de atendimento no WhatsApp; também é a base do "Indique e ganhe".
    #[serde(default = "default_whatsapp_url")]
    pub whatsapp_url: String,

    /// Imagem com o passo a passo de autorização.
    #[serde(default = "default_howto_image_url")]
    pub howto_image_url: String,

    /// Arquivo onde o CPF lembrado é gravado.
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,

    /// Timeout de conexão em segundos.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Timeout total da requisição em segundos. Ausente = sem limite.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_webhook_url() -> String {
    WEBHOOK_URL.to_string()
}

fn default_whatsapp_url() -> String {
    WHATSAPP_URL.to_string()
}

fn default_howto_image_url() -> String {
    HOWTO_IMAGE_URL.to_string()
}

// Valor padrão para o arquivo de sessão: `.granacred/session.json` no diretório atual.
fn default_session_file() -> PathBuf {
    PathBuf::from(".granacred").join("session.json")
}

// Valor padrão para o timeout de conexão: 10s.
fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for GranaConfig {
    fn default() -> Self {
        Self {
            webhook_url: default_webhook_url(),
            whatsapp_url: default_whatsapp_url(),
            howto_image_url: default_howto_image_url(),
            session_file: default_session_file(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: None,
        }
    }
}

impl GranaConfig {
    /// Carrega a configuração de `granacred.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<GranaConfig>(&contents)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    // Variáveis de ambiente não vazias sobrescrevem o arquivo.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(url) = non_empty("GRANACRED_WEBHOOK_URL") {
            self.webhook_url = url;
        }
        if let Some(url) = non_empty("GRANACRED_WHATSAPP_URL") {
            self.whatsapp_url = url;
        }
        if let Some(url) = non_empty("GRANACRED_HOWTO_IMAGE_URL") {
            self.howto_image_url = url;
        }
        if let Some(path) = non_empty("GRANACRED_SESSION_FILE") {
            self.session_file = PathBuf::from(path);
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
