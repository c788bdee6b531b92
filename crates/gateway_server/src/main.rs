//! # Gateway de Enchente
//!
//! Ponte entre o controlador de sensores (serial) e o cliente web (HTTP).
//! Lê temperatura, umidade e nível de água, liga/desliga a bomba, espelha
//! recados no display e dispara alerta quando o nível passa do threshold.
//!
//! ## Uso
//! ```bash
//! gateway_server                  # config.toml ao lado do executável
//! gateway_server ./config.toml    # config explícita
//! ```

mod notifier;
mod routes;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gateway_core::config::{GatewayConfig, HttpConfig};
use gateway_core::{DeviceLink, Gateway, LogNotifier, Notifier};
use notifier::{BackgroundNotifier, WebhookNotifier};
use routes::AppState;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(GatewayConfig::default_path);
    let config = GatewayConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    for problem in config.validate() {
        warn!("Config: {problem}");
    }

    // ── Serial ──
    let link = match DeviceLink::open(&config.serial) {
        Ok(link) => link,
        Err(e) => {
            error!("Falha ao conectar na porta serial: {e}");
            DeviceLink::disconnected(e.to_string())
        }
    };

    // ── Notificação ──
    let notifier: Box<dyn Notifier> = if config.webhooks.enabled {
        match WebhookNotifier::new(&config.webhooks)
            .and_then(|webhooks| BackgroundNotifier::spawn(Box::new(webhooks)))
        {
            Ok(background) => Box::new(background),
            Err(e) => {
                warn!("{e}. Alertas só no log.");
                Box::new(LogNotifier)
            }
        }
    } else {
        Box::new(LogNotifier)
    };

    let gateway = Arc::new(Gateway::from_config(&config, link, notifier));

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   🌊 GATEWAY DE ENCHENTE – ATIVO");
    println!("══════════════════════════════════════════════");
    println!(
        "  Serial:    {} @ {} baud ({})",
        config.serial.port,
        config.serial.baud_rate,
        if gateway.is_link_connected() { "conectada" } else { "INDISPONÍVEL" }
    );
    println!("  HTTP:      http://{}:{}", config.http.bind_ip, config.http.port);
    println!("  Threshold: nível > {:.1}", config.alerts.water_level_threshold);
    println!("══════════════════════════════════════════════");
    println!();

    let state = AppState {
        gateway: Arc::clone(&gateway),
        request_timeout: Duration::from_millis(config.http.request_timeout_ms),
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Falha ao criar runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(serve(&config.http, state)) {
        error!("Servidor HTTP encerrado: {e}");
        std::process::exit(1);
    }
}

async fn serve(http: &HttpConfig, state: AppState) -> std::io::Result<()> {
    let addr = format!("{}:{}", http.bind_ip, http.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP escutando em {addr} – estáticos de {}", http.static_dir);
    axum::serve(listener, routes::app(state, &http.static_dir)).await
}
