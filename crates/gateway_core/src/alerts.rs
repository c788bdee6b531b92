//! Sistema de alertas – detecção de enchente e notificação.

use std::sync::{Mutex, PoisonError};

use tracing::{info, warn};

use crate::history::BoundedLog;
use crate::types::{Event, Reading, local_timestamp};

/// Descrição do evento e motivo da notificação de enchente.
pub const FLOOD_DETECTED: &str = "Flood detected";

/// Falha no transporte da notificação.
#[derive(Debug, thiserror::Error)]
#[error("Falha ao notificar via {channel}: {reason}")]
pub struct NotifyError {
    pub channel: String,
    pub reason: String,
}

/// Canal de notificação de alertas (webhook, e-mail…).
pub trait Notifier: Send + Sync {
    fn notify(&self, reason: &str) -> Result<(), NotifyError>;
}

/// Notificador que apenas registra o alerta no log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, reason: &str) -> Result<(), NotifyError> {
        warn!("🚨 ALERTA: {reason}");
        Ok(())
    }
}

/// Resultado da avaliação de uma leitura.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub breached: bool,
}

/// Fonte dos timestamps dos eventos.
pub type Clock = Box<dyn Fn() -> String + Send + Sync>;

/// Avalia leituras contra o threshold de nível de água.
pub struct AlertEvaluator {
    threshold: f64,
    notifier: Box<dyn Notifier>,
    clock: Clock,
}

impl AlertEvaluator {
    pub fn new(threshold: f64, notifier: Box<dyn Notifier>) -> Self {
        Self {
            threshold,
            notifier,
            clock: Box::new(local_timestamp),
        }
    }

    /// Troca o relógio usado para carimbar os eventos.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Nível estritamente acima do threshold é enchente.
    pub fn is_breach(&self, reading: &Reading) -> bool {
        reading.water_level > self.threshold
    }

    /// Em caso de enchente notifica e registra um evento. Falha na
    /// notificação só vai para o log.
    ///
    /// Sem supressão: toda leitura acima do threshold notifica de novo.
    pub fn evaluate(&self, reading: &Reading, events: &Mutex<BoundedLog<Event>>) -> Decision {
        if !self.is_breach(reading) {
            return Decision { breached: false };
        }

        info!(
            "Nível de água {:.1} acima do threshold {:.1}",
            reading.water_level, self.threshold
        );

        match self.notifier.notify(FLOOD_DETECTED) {
            Ok(()) => info!("Notificação de enchente enviada"),
            Err(e) => warn!("{e}"),
        }

        events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append(Event::new((self.clock)(), FLOOD_DETECTED));

        Decision { breached: true }
    }
}
