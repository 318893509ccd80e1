//! One sync cycle: window selection, fetch, normalization, rules, insert.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta};
use std::collections::HashSet;

use crate::api_time::{format_api_timestamp, now_sao_paulo};
use crate::db_storage::SolicitationStore;
use crate::errors::SyncError;
use crate::models::{EvaluatedSolicitation, SolicitationRow};
use crate::normalize::normalize_batch;
use crate::rules::{RuleConfig, RuleEngine};
use crate::solicitation_client::{SolicitationClient, Termination};

/// Summary of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Window start sent to the API (`DDMMYYYYHHMMSS`).
    pub window_start: String,
    /// Window end sent to the API (`DDMMYYYYHHMMSS`).
    pub window_end: String,
    /// Records returned by the API.
    pub fetched: usize,
    /// Pages accepted.
    pub pages: u32,
    /// False when the fetch was abandoned after repeated failures.
    pub window_complete: bool,
    /// Records that went through the rule engine.
    pub evaluated: usize,
    /// Records with `aprovado_final = 1`.
    pub approved: usize,
    /// Records dropped for lacking an identifier or repeating one in the batch.
    pub skipped: usize,
    /// Rows newly written to storage.
    pub inserted: u64,
}

/// Drives a sync cycle against a store.
pub struct SyncOrchestrator<S> {
    client: SolicitationClient,
    store: S,
    rules: RuleConfig,
    initial_lookback: TimeDelta,
}

impl<S: SolicitationStore> SyncOrchestrator<S> {
    /// Creates a new orchestrator.
    ///
    /// # Arguments
    ///
    /// * `initial_lookback` - How far before "now" the first window starts
    ///   when the store is empty. Zero reproduces the `start = end = now` window.
    pub fn new(
        client: SolicitationClient,
        store: S,
        rules: RuleConfig,
        initial_lookback: TimeDelta,
    ) -> Self {
        Self {
            client,
            store,
            rules,
            initial_lookback,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Start of the next window: the stored high-water-mark, or
    /// `now - initial_lookback` when nothing is stored yet.
    pub async fn window_start(&self, now: NaiveDateTime) -> Result<NaiveDateTime, SyncError> {
        match self.store.high_water_mark().await? {
            Some(mark) => Ok(mark),
            None => {
                tracing::info!(
                    "No stored solicitations, starting window {:?} before now",
                    self.initial_lookback
                );
                now.checked_sub_signed(self.initial_lookback).ok_or_else(|| {
                    SyncError::Config(format!(
                        "Initial lookback {:?} reaches before the earliest representable date",
                        self.initial_lookback
                    ))
                })
            }
        }
    }

    /// Runs one cycle ending at the current São Paulo time.
    pub async fn run_once(&self) -> Result<SyncReport, SyncError> {
        self.run_at(now_sao_paulo()).await
    }

    /// Runs one cycle ending at `now`, starting at the stored high-water-mark.
    pub async fn run_at(&self, now: DateTime<FixedOffset>) -> Result<SyncReport, SyncError> {
        let start = self.window_start(now.naive_local()).await?;
        self.run_window(start, now).await
    }

    /// Runs one cycle over `[start, now]`.
    ///
    /// `now` is also the rule engine's reference instant and every row's
    /// capture timestamp.
    pub async fn run_window(
        &self,
        start: NaiveDateTime,
        now: DateTime<FixedOffset>,
    ) -> Result<SyncReport, SyncError> {
        let window_start = format_api_timestamp(&start);
        let window_end = format_api_timestamp(&now.naive_local());

        if start > now.naive_local() {
            tracing::warn!(
                "Window start {} is after window end {}",
                window_start,
                window_end
            );
        }
        tracing::info!("Fetching solicitations from {} to {}", window_start, window_end);

        let outcome = self.client.fetch_window(&window_start, &window_end).await;
        let mut report = SyncReport {
            window_start,
            window_end,
            fetched: outcome.records.len(),
            pages: outcome.pages,
            window_complete: outcome.termination.is_complete(),
            evaluated: 0,
            approved: 0,
            skipped: 0,
            inserted: 0,
        };

        if let Termination::RetriesExhausted { page, .. } = &outcome.termination {
            tracing::warn!(
                "Window fetch stopped at page {}, continuing with {} records",
                page,
                report.fetched
            );
        }

        if outcome.records.is_empty() {
            tracing::info!("No solicitations found");
            return Ok(report);
        }

        let flat = normalize_batch(&outcome.records);
        let engine = RuleEngine::new(self.rules.clone(), now.naive_local());
        let evaluated = engine.apply(flat, now);

        report.evaluated = evaluated.len();
        report.approved = evaluated.iter().filter(|e| e.rules.approved_final).count();

        let rows = to_rows(&evaluated);
        report.skipped = evaluated.len() - rows.len();

        report.inserted = self.store.insert_ignore(&rows).await?;

        tracing::info!(
            "{} solicitations processed ({} approved), {} inserted, {} already stored",
            report.evaluated,
            report.approved,
            report.inserted,
            (rows.len() as u64).saturating_sub(report.inserted)
        );

        Ok(report)
    }
}

/// Maps evaluated records to rows, keeping the first occurrence of each
/// identifier and dropping records without one.
fn to_rows(evaluated: &[EvaluatedSolicitation]) -> Vec<SolicitationRow> {
    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(evaluated.len());

    for item in evaluated {
        let Some(row) = SolicitationRow::from_evaluated(item) else {
            tracing::warn!("Skipping solicitation without idSolicitacao");
            continue;
        };
        if !seen.insert(row.id_solicitacao.clone()) {
            tracing::debug!("Duplicate idSolicitacao {} in batch", row.id_solicitacao);
            continue;
        }
        rows.push(row);
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RuleOutcome;
    use serde_json::json;

    fn item(record: serde_json::Value) -> EvaluatedSolicitation {
        EvaluatedSolicitation {
            record: record.as_object().cloned().unwrap(),
            rules: RuleOutcome::default(),
            captured_at: now_sao_paulo(),
        }
    }

    #[test]
    fn test_to_rows_dedupes_and_skips_missing_ids() {
        let rows = to_rows(&[
            item(json!({ "idSolicitacao": "A1", "cpf": "first" })),
            item(json!({ "cpf": "no id" })),
            item(json!({ "idSolicitacao": "A1", "cpf": "second" })),
            item(json!({ "idSolicitacao": "B2" })),
        ]);

        let ids: Vec<&str> = rows.iter().map(|r| r.id_solicitacao.as_str()).collect();
        assert_eq!(ids, vec!["A1", "B2"]);
        assert_eq!(rows[0].cpf.as_deref(), Some("first"));
    }
}
