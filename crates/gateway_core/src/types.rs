//! Tipos de dados do gateway: leitura de telemetria, eventos e mensagens.
//!
//! Os nomes dos campos serializados seguem o que o cliente web já espera
//! (`waterLevel`, `event`, mensagens como strings simples).

use serde::{Deserialize, Serialize};
use tracing::warn;

// ──────────────────────────────────────────────
// Telemetria
// ──────────────────────────────────────────────

/// Leitura decodificada de uma linha de telemetria do controlador.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    /// Temperatura (°C)
    pub temperature: f64,
    /// Umidade relativa (%)
    pub humidity: f64,
    /// Nível de água (cm)
    #[serde(rename = "waterLevel")]
    pub water_level: f64,
}

// ──────────────────────────────────────────────
// Eventos
// ──────────────────────────────────────────────

/// Formato do timestamp dos eventos: `YYYY-MM-DD HH:MM:SS`.
pub const TIMESTAMP_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Evento registrado pelo avaliador de alertas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub timestamp: String,
    #[serde(rename = "event")]
    pub description: String,
}

/// Hora local formatada (UTC se o offset local não puder ser determinado).
pub fn local_timestamp() -> String {
    let now = time::OffsetDateTime::now_local()
        .unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    format_timestamp(now)
}

/// Formata no layout dos eventos. Se falhar, usa o UTC em RFC 3339 para o
/// evento nunca ficar sem horário.
pub fn format_timestamp(at: time::OffsetDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).unwrap_or_else(|e| {
        warn!("Falha ao formatar timestamp: {e}");
        let utc = at.to_offset(time::UtcOffset::UTC);
        utc.format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| utc.unix_timestamp().to_string())
    })
}

impl Event {
    pub fn new(timestamp: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            description: description.into(),
        }
    }

    /// Cria um evento carimbado com a hora local.
    pub fn now(description: impl Into<String>) -> Self {
        Self::new(local_timestamp(), description)
    }
}

// ──────────────────────────────────────────────
// Mensagens do operador
// ──────────────────────────────────────────────

/// Recado enviado pelo operador e espelhado no display do controlador.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Message {
    pub text: String,
}

impl Message {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
