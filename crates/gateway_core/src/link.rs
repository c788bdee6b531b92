//! Link serial com o controlador.
//!
//! Um único canal físico: toda escrita (e a leitura da resposta) acontece
//! com o lock da porta tomado, então nunca há dois comandos em voo.
//! Se a porta não abre no boot o link fica [`LinkState::Disconnected`] até
//! o processo reiniciar; não há reconexão.

use std::io::{self, Read, Write};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, info, warn};

use crate::config::SerialConfig;

/// Tamanho máximo de uma linha de resposta.
pub const MAX_LINE_LEN: usize = 256;

/// Erros do link serial.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Porta serial não inicializada: {0}")]
    Unavailable(String),

    #[error("Falha ao abrir {port}: {reason}")]
    Open { port: String, reason: String },

    #[error("Sem resposta do controlador dentro do timeout")]
    Timeout,

    #[error("Erro de I/O na serial: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for LinkError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => LinkError::Timeout,
            _ => LinkError::Io(e),
        }
    }
}

/// Canal bidirecional de bytes com o controlador.
///
/// Implementado pela porta serial real e por portas falsas nos testes.
pub trait Port: Read + Write + Send {
    /// Descarta bytes pendentes na entrada (ex: resposta atrasada de um
    /// comando que já expirou).
    fn discard_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for Box<dyn SerialPort> {
    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

/// Estado do link.
pub enum LinkState {
    Disconnected { reason: String },
    Connected(Mutex<Box<dyn Port>>),
}

/// Link com o controlador de sensores.
pub struct DeviceLink {
    name: String,
    state: LinkState,
}

impl DeviceLink {
    /// Abre a porta serial e espera o controlador reiniciar.
    pub fn open(config: &SerialConfig) -> Result<Self, LinkError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(Duration::from_millis(config.timeout_ms))
            .open()
            .map_err(|e| LinkError::Open {
                port: config.port.clone(),
                reason: e.to_string(),
            })?;

        info!("Serial {} aberta a {} baud", config.port, config.baud_rate);

        if config.settle_ms > 0 {
            debug!("Aguardando {} ms para o controlador inicializar", config.settle_ms);
            std::thread::sleep(Duration::from_millis(config.settle_ms));
        }

        Ok(Self::from_port(config.port.clone(), port))
    }

    /// Link já conectado sobre uma porta qualquer.
    pub fn from_port(name: impl Into<String>, port: impl Port + 'static) -> Self {
        Self {
            name: name.into(),
            state: LinkState::Connected(Mutex::new(Box::new(port))),
        }
    }

    /// Link permanentemente desconectado (falha na abertura).
    pub fn disconnected(reason: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            state: LinkState::Disconnected {
                reason: reason.into(),
            },
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, LinkState::Connected(_))
    }

    /// Envia um comando e lê uma linha de resposta (sem o `\n`, aparada).
    ///
    /// Uma escrita, uma leitura, nenhuma repetição.
    pub fn request(&self, command: &[u8]) -> Result<String, LinkError> {
        self.with_port(|port| {
            // Resposta atrasada de um timeout anterior não pode ser lida
            // como resposta deste comando.
            if let Err(e) = port.discard_input() {
                warn!("Não foi possível limpar a entrada serial: {e}");
            }
            send(port, command)?;
            let line = read_line(port)?;
            debug!("Resposta crua de {}: '{line}'", self.name);
            Ok(line)
        })
    }

    /// Envia um comando que não tem resposta.
    pub fn write(&self, command: &[u8]) -> Result<(), LinkError> {
        self.with_port(|port| send(port, command))?;
        debug!("{} bytes enviados para {}", command.len(), self.name);
        Ok(())
    }

    fn with_port<R>(
        &self,
        op: impl FnOnce(&mut dyn Port) -> Result<R, LinkError>,
    ) -> Result<R, LinkError> {
        match &self.state {
            LinkState::Disconnected { reason } => Err(LinkError::Unavailable(reason.clone())),
            LinkState::Connected(port) => {
                let mut guard = port.lock().unwrap_or_else(PoisonError::into_inner);
                op(&mut **guard)
            }
        }
    }
}

fn send(port: &mut dyn Port, command: &[u8]) -> Result<(), LinkError> {
    port.write_all(command)?;
    port.flush()?;
    Ok(())
}

fn read_line(port: &mut dyn Port) -> Result<String, LinkError> {
    let mut line = Vec::with_capacity(32);
    let mut byte = [0u8; 1];
    loop {
        match port.read(&mut byte) {
            Ok(0) => {
                return Err(LinkError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "porta fechada antes do fim da linha",
                )));
            }
            Ok(_) if byte[0] == b'\n' => break,
            Ok(_) => {
                if line.len() >= MAX_LINE_LEN {
                    return Err(LinkError::Io(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("linha maior que {MAX_LINE_LEN} bytes"),
                    )));
                }
                line.push(byte[0]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(String::from_utf8_lossy(&line).trim().to_string())
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
