//! Configuração do gateway via TOML.
//!
//! Um único `config.toml` ao lado do executável; seções ausentes usam os
//! valores padrão.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::history::DEFAULT_CAPACITY;

/// Porta serial do controlador.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Nome da porta (ex: "COM3", "/dev/ttyACM0")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Tempo máximo de espera por uma resposta (ms)
    pub timeout_ms: u64,
    /// Espera após abrir a porta – o controlador reinicia na conexão (ms)
    pub settle_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "COM3".into(),
            baud_rate: 9600,
            timeout_ms: 2000,
            settle_ms: 2000,
        }
    }
}

/// Servidor HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_ip: String,
    pub port: u16,
    /// Diretório com o build do cliente web
    pub static_dir: String,
    /// Limite por requisição, incluindo a espera pela serial (ms)
    pub request_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_ip: "127.0.0.1".into(),
            port: 5500,
            static_dir: "../client/build".into(),
            request_timeout_ms: 5000,
        }
    }
}

/// Threshold de alerta de enchente.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Nível de água acima do qual há enchente (estritamente maior)
    pub water_level_threshold: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            water_level_threshold: 30.0,
        }
    }
}

/// Tamanho dos históricos em memória.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Configuração de webhooks de alerta (ntfy, Discord).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub enabled: bool,
    pub ntfy_server: String,
    pub ntfy_topic: String,
    pub discord_webhook_url: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ntfy_server: "https://ntfy.sh".into(),
            ntfy_topic: String::new(),
            discord_webhook_url: String::new(),
        }
    }
}

/// Configuração raiz do gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub serial: SerialConfig,
    pub http: HttpConfig,
    pub alerts: AlertConfig,
    pub history: HistoryConfig,
    pub webhooks: WebhookConfig,
}

impl GatewayConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<GatewayConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        GatewayConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.serial.port.trim().is_empty() {
            errors.push("Porta serial não configurada".into());
        }
        if self.serial.baud_rate == 0 {
            errors.push("Baud rate não pode ser 0".into());
        }
        if self.serial.timeout_ms == 0 {
            errors.push("Timeout da serial não pode ser 0".into());
        }
        if self.http.port == 0 {
            errors.push("Porta HTTP não pode ser 0".into());
        }
        if self.http.request_timeout_ms < self.serial.timeout_ms {
            errors.push(format!(
                "Timeout HTTP ({} ms) menor que o da serial ({} ms)",
                self.http.request_timeout_ms, self.serial.timeout_ms
            ));
        }
        if !self.alerts.water_level_threshold.is_finite() {
            errors.push("Threshold de nível de água inválido".into());
        }
        if self.history.capacity == 0 {
            errors.push("Capacidade do histórico não pode ser 0".into());
        }
        if self.webhooks.enabled
            && self.webhooks.ntfy_topic.is_empty()
            && self.webhooks.discord_webhook_url.is_empty()
        {
            errors.push("Webhooks habilitados sem ntfy_topic nem discord_webhook_url".into());
        }

        errors
    }
}
