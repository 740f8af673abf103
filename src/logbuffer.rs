use crate::models::LogEntry;
use serde::Deserialize;
use std::collections::VecDeque;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

pub const DEFAULT_MAX_SIZE: usize = 1000;

/// Requête de lecture du buffer : filtres exacts + pagination.
/// Le même type sert de query-string pour GET /api/logs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    pub level: Option<String>,
    pub component: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Ring buffer borné des N dernières lignes de log.
/// Les entrées sont immuables une fois stockées, seule l'éviction les retire.
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    max_size: usize,
}

impl LogBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_size,
        }
    }

    /// Ajoute une entrée, stampe receivedAt seulement s'il est absent
    /// (les timestamps fournis par l'appelant sont préservés), puis évince
    /// les plus anciennes au-delà de max_size. Retourne l'entrée stockée.
    pub fn add(&mut self, mut entry: LogEntry) -> LogEntry {
        if entry.received_at.is_none() {
            entry.received_at = Some(
                OffsetDateTime::now_utc()
                    .format(&Rfc3339)
                    .unwrap_or_default(),
            );
        }
        self.entries.push_back(entry.clone());
        while self.entries.len() > self.max_size {
            self.entries.pop_front();
        }
        entry
    }

    fn matches(entry: &LogEntry, query: &LogQuery) -> bool {
        // filtre vide (ex: ?level= dans l'URL) = pas de filtre
        if let Some(level) = query.level.as_deref().filter(|s| !s.is_empty()) {
            if entry.level.as_deref() != Some(level) {
                return false;
            }
        }
        if let Some(component) = query.component.as_deref().filter(|s| !s.is_empty()) {
            if entry.component.as_deref() != Some(component) {
                return false;
            }
        }
        true
    }

    /// Lecture filtrée, la plus récente d'abord. Offset appliqué avant limit.
    pub fn query(&self, query: &LogQuery) -> Vec<LogEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|e| Self::matches(e, query))
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Nombre d'entrées qui matchent les filtres, avant pagination.
    pub fn total_matching(&self, query: &LogQuery) -> usize {
        self.entries
            .iter()
            .filter(|e| Self::matches(e, query))
            .count()
    }

    /// Copie défensive : muter le résultat n'affecte pas le buffer.
    pub fn get_all(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}
