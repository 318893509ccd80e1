//! Eligibility rules for worker-loan solicitations.
//!
//! Every rule is evaluated per row and degrades to "not satisfied" when the
//! input is missing or malformed; a bad row never aborts the batch.

use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, Months, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::api_time::parse_admission_date;
use crate::models::{
    decimal_field, value_as_bool, EvaluatedSolicitation, FlatRecord, RuleOutcome, COL_ADMISSION,
    COL_ELIGIBLE, COL_MARGIN, COL_PEP_DESCRIPTION,
};

/// Canonical description of a worker who is not politically exposed,
/// already trimmed and lower-cased.
pub const NOT_POLITICALLY_EXPOSED: &str = "pessoa não exposta politicamente";

/// Tunable rule parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleConfig {
    /// Minimum months between admission and the reference instant.
    pub minimum_tenure_months: u32,
    /// Minimum available margin, inclusive.
    pub minimum_margin: BigDecimal,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            minimum_tenure_months: 3,
            minimum_margin: BigDecimal::from(0),
        }
    }
}

/// Evaluates the eligibility rules against a fixed reference instant.
///
/// The tenure cutoff is derived once at construction, so every row of a
/// batch is judged against the same date.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    config: RuleConfig,
    tenure_cutoff: Option<NaiveDate>,
}

impl RuleEngine {
    pub fn new(config: RuleConfig, reference: NaiveDateTime) -> Self {
        // Month subtraction clamps to the last day of shorter months
        // (31 May - 3 months = 28/29 Feb).
        let tenure_cutoff = reference
            .date()
            .checked_sub_months(Months::new(config.minimum_tenure_months));
        Self {
            config,
            tenure_cutoff,
        }
    }

    /// Latest admission date that still satisfies the tenure rule.
    pub fn tenure_cutoff(&self) -> Option<NaiveDate> {
        self.tenure_cutoff
    }

    /// Admission date (`DDMMYYYY`) is on or before the tenure cutoff.
    pub fn tenure_ok(&self, record: &FlatRecord) -> bool {
        let (Some(cutoff), Some(admission)) = (self.tenure_cutoff, admission_date(record)) else {
            return false;
        };
        admission <= cutoff
    }

    /// Exposure description equals the canonical "not exposed" phrase,
    /// ignoring case and surrounding whitespace.
    pub fn not_politically_exposed(&self, record: &FlatRecord) -> bool {
        let description = match record.get(COL_PEP_DESCRIPTION) {
            Some(Value::String(s)) => s.as_str(),
            _ => "",
        };
        description.trim().to_lowercase() == NOT_POLITICALLY_EXPOSED
    }

    /// Raw eligibility flag is truthy.
    pub fn eligible(&self, record: &FlatRecord) -> bool {
        record
            .get(COL_ELIGIBLE)
            .and_then(value_as_bool)
            .unwrap_or(false)
    }

    /// Available margin is at least the configured minimum.
    pub fn margin_ok(&self, record: &FlatRecord) -> bool {
        decimal_field(record, COL_MARGIN)
            .map(|margin| margin >= self.config.minimum_margin)
            .unwrap_or(false)
    }

    /// Evaluates every rule for one record.
    ///
    /// Margin and eligibility are reported but do not feed `approved_final`.
    pub fn evaluate(&self, record: &FlatRecord) -> RuleOutcome {
        let rule_tenure_ok = self.tenure_ok(record);
        let rule_not_politically_exposed = self.not_politically_exposed(record);

        RuleOutcome {
            rule_tenure_ok,
            rule_not_politically_exposed,
            rule_eligible: self.eligible(record),
            rule_margin_ok: self.margin_ok(record),
            approved_final: rule_tenure_ok && rule_not_politically_exposed,
        }
    }

    /// Annotates a batch, stamping every row with the same capture instant.
    pub fn apply(
        &self,
        records: Vec<FlatRecord>,
        captured_at: DateTime<FixedOffset>,
    ) -> Vec<EvaluatedSolicitation> {
        records
            .into_iter()
            .map(|record| {
                let rules = self.evaluate(&record);
                EvaluatedSolicitation {
                    record,
                    rules,
                    captured_at,
                }
            })
            .collect()
    }
}

fn admission_date(record: &FlatRecord) -> Option<NaiveDate> {
    match record.get(COL_ADMISSION)? {
        Value::String(s) => parse_admission_date(s),
        // Numeric dates lose their leading zero (01012000 -> 1012000).
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| parse_admission_date(&format!("{:08}", n))),
        _ => None,
    }
}
