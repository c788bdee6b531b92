//! Histórico limitado em memória (eventos e recados).
//!
//! Buffer de capacidade fixa: ao encher, o registro mais antigo (índice 0)
//! sai antes do novo entrar no fim. Índice 0 é sempre o mais antigo.

use std::collections::VecDeque;

/// Capacidade padrão dos históricos.
pub const DEFAULT_CAPACITY: usize = 10;

/// Índice inválido numa remoção.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    #[error("Índice {index} fora do histórico (tamanho {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("Índice inválido: '{0}'")]
    NotAnIndex(String),
}

/// Converte um índice vindo como texto. Negativos e não inteiros são
/// rejeitados.
pub fn parse_index(raw: &str) -> Result<usize, IndexError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IndexError::NotAnIndex(raw.to_string()));
    }
    trimmed
        .parse::<usize>()
        .map_err(|_| IndexError::NotAnIndex(raw.to_string()))
}

/// Histórico ordenado de capacidade fixa.
///
/// Não é thread-safe; quem compartilha envolve num lock.
#[derive(Debug, Clone)]
pub struct BoundedLog<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> BoundedLog<T> {
    /// Cria um histórico vazio. Capacidade 0 vira 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Adiciona no fim, descartando o mais antigo se estiver cheio.
    pub fn append(&mut self, entry: T) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Cópia dos registros, do mais antigo ao mais novo.
    pub fn list(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }

    /// Remove o registro no índice, deslocando os seguintes.
    pub fn remove_at(&mut self, index: usize) -> Result<T, IndexError> {
        let len = self.entries.len();
        self.entries
            .remove(index)
            .ok_or(IndexError::OutOfRange { index, len })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Clone> Default for BoundedLog<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
