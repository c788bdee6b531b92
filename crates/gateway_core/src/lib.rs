//! # Gateway Core
//!
//! Núcleo do gateway de enchente: conversa com o controlador de sensores
//! pela serial, decodifica a telemetria, dispara alertas de nível de água e
//! mantém históricos curtos de eventos e recados em memória.
//!
//! ## Módulos
//! - [`link`] – Link serial requisição/resposta com lock exclusivo
//! - [`protocol`] – Comandos do controlador e decodificação da telemetria
//! - [`history`] – Histórico limitado (mais antigo sai primeiro)
//! - [`alerts`] – Threshold de enchente e notificação
//! - [`gateway`] – Estado central e operações expostas ao HTTP
//! - [`config`] – Configuração via TOML
//! - [`types`] – Leitura, evento e recado

pub mod alerts;
pub mod config;
pub mod gateway;
pub mod history;
pub mod link;
pub mod protocol;
pub mod types;

// Re-exports convenientes
pub use alerts::{AlertEvaluator, LogNotifier, Notifier, NotifyError};
pub use config::GatewayConfig;
pub use gateway::{Gateway, GatewayError};
pub use history::{BoundedLog, IndexError, parse_index};
pub use link::{DeviceLink, LinkError, Port};
pub use types::{Event, Message, Reading};
