//! Estado central do gateway: link, avaliador e históricos.
//!
//! Criado uma vez no boot e compartilhado (via `Arc`) entre as requisições.
//! Nada é persistido; tudo some quando o processo termina.

use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::alerts::{AlertEvaluator, Notifier};
use crate::config::GatewayConfig;
use crate::history::{BoundedLog, IndexError};
use crate::link::{DeviceLink, LinkError};
use crate::protocol::{Command, ParseError, parse_reading};
use crate::types::{Event, Message, Reading};

/// Falhas das operações do gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Mensagem inválida: {0}")]
    InvalidMessage(String),
}

/// Núcleo do gateway.
pub struct Gateway {
    link: DeviceLink,
    evaluator: AlertEvaluator,
    events: Mutex<BoundedLog<Event>>,
    messages: Mutex<BoundedLog<Message>>,
}

impl Gateway {
    pub fn new(link: DeviceLink, evaluator: AlertEvaluator, capacity: usize) -> Self {
        Self {
            link,
            evaluator,
            events: Mutex::new(BoundedLog::new(capacity)),
            messages: Mutex::new(BoundedLog::new(capacity)),
        }
    }

    /// Monta o gateway com threshold e capacidade da configuração.
    pub fn from_config(
        config: &GatewayConfig,
        link: DeviceLink,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        let evaluator = AlertEvaluator::new(config.alerts.water_level_threshold, notifier);
        Self::new(link, evaluator, config.history.capacity)
    }

    pub fn is_link_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Lê a telemetria, avalia o alerta e devolve a leitura.
    ///
    /// Passo único: falha no link ou na decodificação encerra sem tocar nos
    /// históricos.
    pub fn fetch_sensor_reading(&self) -> Result<Reading, GatewayError> {
        debug!("Buscando dados dos sensores...");
        let raw = self.link.request(&Command::Read.encode())?;
        let reading = parse_reading(&raw)?;
        info!(
            "Sensores: Temp={:.1} Umidade={:.1} Nível={:.1}",
            reading.temperature, reading.humidity, reading.water_level
        );
        self.evaluator.evaluate(&reading, &self.events);
        Ok(reading)
    }

    /// Liga/desliga o atuador.
    pub fn set_actuator(&self, on: bool) -> Result<(), GatewayError> {
        self.link.write(&Command::actuator(on).encode())?;
        info!("Atuador {}", if on { "ligado" } else { "desligado" });
        Ok(())
    }

    /// Envia o recado ao display e só então o guarda no histórico.
    pub fn post_operator_message(&self, text: &str) -> Result<(), GatewayError> {
        if text.is_empty() {
            return Err(GatewayError::InvalidMessage("No message provided".into()));
        }
        // `\n` encerra o comando U no controlador.
        if text.contains(['\n', '\r']) {
            return Err(GatewayError::InvalidMessage(
                "Message must not contain line breaks".into(),
            ));
        }

        self.link.write(&Command::Display(text.to_string()).encode())?;
        lock(&self.messages).append(Message::new(text));
        info!("Recado enviado ao display: '{text}'");
        Ok(())
    }

    pub fn list_messages(&self) -> Vec<Message> {
        lock(&self.messages).list()
    }

    pub fn list_events(&self) -> Vec<Event> {
        lock(&self.events).list()
    }

    /// Remove um evento pelo índice (0 = mais antigo).
    pub fn delete_event(&self, index: usize) -> Result<Event, IndexError> {
        let removed = lock(&self.events).remove_at(index);
        match &removed {
            Ok(event) => info!("Evento {index} removido ({})", event.timestamp),
            Err(e) => warn!("{e}"),
        }
        removed
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
