//! Protocolo serial do controlador de sensores.
//!
//! Protocolo texto, estritamente requisição/resposta, um comando por vez:
//!
//! ```text
//! ┌─────────┬──────────────────┬──────────────────────────────────┐
//! │ Comando │ Bytes enviados   │ Resposta                         │
//! ├─────────┼──────────────────┼──────────────────────────────────┤
//! │ Ler     │ R                │ "<temp>,<umidade>,<nível>\n"     │
//! │ Ligar   │ A                │ —                                │
//! │ Desligar│ S                │ —                                │
//! │ Display │ U<texto>\n       │ —                                │
//! └─────────┴──────────────────┴──────────────────────────────────┘
//! ```

use crate::types::Reading;

/// Número de campos numa linha de telemetria.
pub const FIELD_COUNT: usize = 3;

/// Separador de campos da telemetria.
pub const FIELD_SEPARATOR: char = ',';

/// Comandos aceitos pelo controlador.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Pede uma linha de telemetria.
    Read,
    /// Liga o atuador (bomba).
    ActuatorOn,
    /// Desliga o atuador.
    ActuatorOff,
    /// Mostra um recado no display.
    Display(String),
}

impl Command {
    /// Bytes exatos enviados pela serial.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Command::Read => b"R".to_vec(),
            Command::ActuatorOn => b"A".to_vec(),
            Command::ActuatorOff => b"S".to_vec(),
            Command::Display(text) => {
                let mut frame = Vec::with_capacity(text.len() + 2);
                frame.push(b'U');
                frame.extend_from_slice(text.as_bytes());
                frame.push(b'\n');
                frame
            }
        }
    }

    /// Comando do atuador para o estado desejado.
    pub fn actuator(on: bool) -> Self {
        if on {
            Command::ActuatorOn
        } else {
            Command::ActuatorOff
        }
    }
}

/// Erros de decodificação da telemetria. Sempre carregam a linha crua.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Telemetria com {found} campos (esperado {FIELD_COUNT}): '{raw}'")]
    FieldCount { raw: String, found: usize },

    #[error("Valor não numérico '{token}' na telemetria: '{raw}'")]
    InvalidNumber { raw: String, token: String },
}

impl ParseError {
    /// Linha crua recebida do controlador.
    pub fn raw(&self) -> &str {
        match self {
            ParseError::FieldCount { raw, .. } | ParseError::InvalidNumber { raw, .. } => raw,
        }
    }
}

/// Decodifica uma linha `"<temp>,<umidade>,<nível>"` em [`Reading`].
///
/// Espaços em volta da linha e de cada campo são ignorados. Nunca retorna
/// leitura parcial.
pub fn parse_reading(raw: &str) -> Result<Reading, ParseError> {
    let fields: Vec<&str> = raw.trim().split(FIELD_SEPARATOR).collect();
    if fields.len() != FIELD_COUNT {
        return Err(ParseError::FieldCount {
            raw: raw.to_string(),
            found: fields.len(),
        });
    }

    let mut values = [0.0f64; FIELD_COUNT];
    for (slot, token) in values.iter_mut().zip(&fields) {
        *slot = parse_field(raw, token)?;
    }

    Ok(Reading {
        temperature: values[0],
        humidity: values[1],
        water_level: values[2],
    })
}

fn parse_field(raw: &str, token: &str) -> Result<f64, ParseError> {
    let token = token.trim();
    match token.parse::<f64>() {
        // O controlador só manda decimais ASCII; nan/inf não são telemetria.
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ParseError::InvalidNumber {
            raw: raw.to_string(),
            token: token.to_string(),
        }),
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
