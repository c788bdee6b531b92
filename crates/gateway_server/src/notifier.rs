//! Notificação de enchente via webhooks (ntfy / Discord).

use std::time::Duration;

use crossbeam_channel::{Sender, TrySendError, bounded};
use gateway_core::config::WebhookConfig;
use gateway_core::{Notifier, NotifyError};
use serde_json::json;
use tracing::{info, warn};

/// Título do alerta.
pub const ALERT_TITLE: &str = "Flood Alert!";

/// Corpo do alerta.
pub const ALERT_BODY: &str =
    "The water level has exceeded the threshold. Please take necessary actions.";

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Alertas aguardando entrega.
const QUEUE_SIZE: usize = 16;

// ──────────────────────────────────────────────
// Entrega em segundo plano
// ──────────────────────────────────────────────

/// Entrega alertas numa thread própria.
///
/// `notify` só enfileira e retorna; um webhook lento nunca segura a
/// requisição que detectou a enchente. Fila cheia descarta o alerta novo.
pub struct BackgroundNotifier {
    tx: Sender<String>,
}

impl BackgroundNotifier {
    pub fn spawn(inner: Box<dyn Notifier>) -> Result<Self, NotifyError> {
        let (tx, rx) = bounded::<String>(QUEUE_SIZE);

        std::thread::Builder::new()
            .name("alert-notifier".into())
            .spawn(move || {
                for reason in rx {
                    if let Err(e) = inner.notify(&reason) {
                        warn!("{e}");
                    }
                }
            })
            .map_err(|e| NotifyError {
                channel: "thread".into(),
                reason: e.to_string(),
            })?;

        Ok(Self { tx })
    }
}

impl Notifier for BackgroundNotifier {
    fn notify(&self, reason: &str) -> Result<(), NotifyError> {
        self.tx.try_send(reason.to_string()).map_err(|e| NotifyError {
            channel: "fila".into(),
            reason: match e {
                TrySendError::Full(_) => "fila de alertas cheia".into(),
                TrySendError::Disconnected(_) => "thread de entrega encerrada".into(),
            },
        })
    }
}

// ──────────────────────────────────────────────
// Webhooks
// ──────────────────────────────────────────────

/// Envia o alerta para todos os webhooks configurados.
///
/// Usa o cliente bloqueante do reqwest; roda atrás de um
/// [`BackgroundNotifier`], fora do runtime.
pub struct WebhookNotifier {
    client: reqwest::blocking::Client,
    ntfy_url: Option<String>,
    discord_url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| NotifyError {
                channel: "http".into(),
                reason: e.to_string(),
            })?;

        let ntfy_url = (!config.ntfy_topic.is_empty()).then(|| {
            format!(
                "{}/{}",
                config.ntfy_server.trim_end_matches('/'),
                config.ntfy_topic
            )
        });
        let discord_url =
            (!config.discord_webhook_url.is_empty()).then(|| config.discord_webhook_url.clone());

        info!(
            "Webhooks de alerta: ntfy={} discord={}",
            ntfy_url.is_some(),
            discord_url.is_some()
        );

        Ok(Self {
            client,
            ntfy_url,
            discord_url,
        })
    }

    fn send_ntfy(&self, url: &str, reason: &str) -> Result<(), String> {
        self.client
            .post(url)
            .header("Title", ALERT_TITLE)
            .header("Priority", "urgent")
            .header("Tags", "warning,ocean")
            .body(format!("{reason}: {ALERT_BODY}"))
            .send()
            .and_then(|r| r.error_for_status())
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn send_discord(&self, url: &str, reason: &str) -> Result<(), String> {
        self.client
            .post(url)
            .json(&json!({ "content": format!("**{ALERT_TITLE}** {reason}\n{ALERT_BODY}") }))
            .send()
            .and_then(|r| r.error_for_status())
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, reason: &str) -> Result<(), NotifyError> {
        let mut failures = Vec::new();

        if let Some(url) = &self.ntfy_url {
            if let Err(e) = self.send_ntfy(url, reason) {
                warn!("ntfy falhou: {e}");
                failures.push(("ntfy", e));
            }
        }
        if let Some(url) = &self.discord_url {
            if let Err(e) = self.send_discord(url, reason) {
                warn!("Discord falhou: {e}");
                failures.push(("discord", e));
            }
        }

        if failures.is_empty() {
            return Ok(());
        }
        let (channels, reasons): (Vec<_>, Vec<_>) = failures.into_iter().unzip();
        Err(NotifyError {
            channel: channels.join("+"),
            reason: reasons.join("; "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_ntfy_url_without_double_slash() {
        let config = WebhookConfig {
            enabled: true,
            ntfy_server: "https://ntfy.sh/".into(),
            ntfy_topic: "enchente-casa".into(),
            ..Default::default()
        };
        let notifier = WebhookNotifier::new(&config).unwrap();
        assert_eq!(notifier.ntfy_url.as_deref(), Some("https://ntfy.sh/enchente-casa"));
        assert!(notifier.discord_url.is_none());
    }

    struct SlowNotifier {
        delivered: crossbeam_channel::Sender<String>,
    }

    impl Notifier for SlowNotifier {
        fn notify(&self, reason: &str) -> Result<(), NotifyError> {
            std::thread::sleep(Duration::from_millis(300));
            let _ = self.delivered.send(reason.to_string());
            Ok(())
        }
    }

    #[test]
    fn background_delivery_returns_immediately() {
        let (delivered, rx) = crossbeam_channel::unbounded();
        let notifier = BackgroundNotifier::spawn(Box::new(SlowNotifier { delivered })).unwrap();

        let start = std::time::Instant::now();
        notifier.notify("Flood detected").unwrap();
        assert!(start.elapsed() < Duration::from_millis(100));

        let reason = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(reason, "Flood detected");
    }

    #[test]
    fn full_queue_reports_error() {
        let (delivered, _rx) = crossbeam_channel::unbounded();
        let notifier = BackgroundNotifier::spawn(Box::new(SlowNotifier { delivered })).unwrap();

        let results: Vec<_> = (0..QUEUE_SIZE + 5).map(|_| notifier.notify("x")).collect();
        assert!(results.iter().any(|r| r.is_err()));
    }

    #[test]
    fn no_targets_is_a_noop() {
        let notifier = WebhookNotifier::new(&WebhookConfig::default()).unwrap();
        assert!(notifier.notify("Flood detected").is_ok());
    }
}
