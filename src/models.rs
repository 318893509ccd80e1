use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::api_time::parse_validity_timestamp;

// ============ API Models ============

/// One worker-loan solicitation exactly as returned by the API.
///
/// Kept untyped: the API adds fields over time and nested objects
/// (`inscricaoEmpregador`, `pessoaExpostaPoliticamente`) are flattened later.
pub type RawSolicitation = Value;

/// A solicitation after flattening, keyed by storage-safe column names.
pub type FlatRecord = Map<String, Value>;

// ============ Column names ============

pub const COL_ID: &str = "idSolicitacao";
pub const COL_CPF: &str = "cpf";
pub const COL_MATRICULA: &str = "matricula";
pub const COL_EMPLOYER_REGISTRATION: &str = "numeroInscricaoEmpregador";
pub const COL_RELEASED_AMOUNT: &str = "valorLiberado";
pub const COL_INSTALLMENTS: &str = "nroParcelas";
pub const COL_VALIDITY: &str = "dataHoraValidadeSolicitacao";
pub const COL_WORKER_NAME: &str = "nomeTrabalhador";
pub const COL_BIRTH_DATE: &str = "dataNascimento";
pub const COL_MARGIN: &str = "margemDisponivel";
pub const COL_ELIGIBLE: &str = "elegivelEmprestimo";
pub const COL_ADMISSION: &str = "dataAdmissao";
pub const COL_EMPLOYER_CODE: &str = "inscricaoEmpregador_codigo";
pub const COL_EMPLOYER_DESCRIPTION: &str = "inscricaoEmpregador_descricao";
pub const COL_PEP_CODE: &str = "pessoaExpostaPoliticamente_codigo";
pub const COL_PEP_DESCRIPTION: &str = "pessoaExpostaPoliticamente_descricao";

pub const COL_RULE_TENURE: &str = "regra_tempo_empresa";
pub const COL_RULE_PEP: &str = "regra_pep";
pub const COL_RULE_ELIGIBLE: &str = "regra_elegivel";
pub const COL_RULE_MARGIN: &str = "regra_margem";
pub const COL_APPROVED: &str = "aprovado_final";
pub const COL_CAPTURED_AT: &str = "hora_atualizacao";

// ============ Evaluated Models ============

/// Rule outcomes for one solicitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleOutcome {
    /// Admission date is at least `minimum_tenure_months` old.
    pub rule_tenure_ok: bool,
    /// Worker is classified as not politically exposed.
    pub rule_not_politically_exposed: bool,
    /// API flagged the worker as eligible for a loan. Not part of the decision.
    pub rule_eligible: bool,
    /// Available margin reaches `minimum_margin`. Not part of the decision.
    pub rule_margin_ok: bool,
    /// `rule_tenure_ok && rule_not_politically_exposed`.
    pub approved_final: bool,
}

/// A flattened solicitation annotated with rule outcomes and capture time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluatedSolicitation {
    /// Flattened raw fields.
    pub record: FlatRecord,
    /// Rule outcomes.
    pub rules: RuleOutcome,
    /// When this worker captured the record, São Paulo time.
    pub captured_at: DateTime<FixedOffset>,
}

impl EvaluatedSolicitation {
    /// The solicitation identifier, if the record carries one.
    pub fn id(&self) -> Option<String> {
        text_field(&self.record, COL_ID)
    }

    /// Flattened record with the rule columns merged in, `0`/`1` valued.
    pub fn to_annotated_record(&self) -> FlatRecord {
        let mut out = self.record.clone();
        let flag = |b: bool| Value::from(i32::from(b));
        out.insert(COL_RULE_TENURE.into(), flag(self.rules.rule_tenure_ok));
        out.insert(COL_RULE_PEP.into(), flag(self.rules.rule_not_politically_exposed));
        out.insert(COL_RULE_ELIGIBLE.into(), flag(self.rules.rule_eligible));
        out.insert(COL_RULE_MARGIN.into(), flag(self.rules.rule_margin_ok));
        out.insert(COL_APPROVED.into(), flag(self.rules.approved_final));
        out.insert(
            COL_CAPTURED_AT.into(),
            Value::from(self.captured_at.to_rfc3339()),
        );
        out
    }
}

// ============ Database Models ============

/// One row of `dataprev_solicitacoes`.
#[derive(Debug, Clone, PartialEq)]
pub struct SolicitationRow {
    pub id_solicitacao: String,
    pub cpf: Option<String>,
    pub matricula: Option<String>,
    pub numero_inscricao_empregador: Option<String>,
    pub valor_liberado: Option<BigDecimal>,
    pub nro_parcelas: Option<i32>,
    pub data_hora_validade_solicitacao: Option<NaiveDateTime>,
    pub nome_trabalhador: Option<String>,
    pub data_nascimento: Option<String>,
    pub margem_disponivel: Option<BigDecimal>,
    pub elegivel_emprestimo: Option<bool>,
    pub data_admissao: Option<String>,
    pub inscricao_empregador_codigo: Option<String>,
    pub inscricao_empregador_descricao: Option<String>,
    pub pessoa_exposta_politicamente_codigo: Option<String>,
    pub pessoa_exposta_politicamente_descricao: Option<String>,
    pub regra_tempo_empresa: i16,
    pub regra_pep: i16,
    pub regra_elegivel: i16,
    pub regra_margem: i16,
    pub aprovado_final: i16,
    pub hora_atualizacao: DateTime<FixedOffset>,
    /// Full flattened record, rule columns included.
    pub payload: Value,
}

impl SolicitationRow {
    /// Maps an evaluated solicitation onto the table's column set.
    ///
    /// Returns `None` when the record has no identifier, since it cannot be keyed.
    pub fn from_evaluated(item: &EvaluatedSolicitation) -> Option<Self> {
        let r = &item.record;
        let id_solicitacao = item.id()?;

        Some(Self {
            id_solicitacao,
            cpf: text_field(r, COL_CPF),
            matricula: text_field(r, COL_MATRICULA),
            numero_inscricao_empregador: text_field(r, COL_EMPLOYER_REGISTRATION),
            valor_liberado: decimal_field(r, COL_RELEASED_AMOUNT),
            nro_parcelas: r.get(COL_INSTALLMENTS).and_then(value_as_i32),
            data_hora_validade_solicitacao: text_field(r, COL_VALIDITY)
                .as_deref()
                .and_then(parse_validity_timestamp),
            nome_trabalhador: text_field(r, COL_WORKER_NAME),
            data_nascimento: text_field(r, COL_BIRTH_DATE),
            margem_disponivel: decimal_field(r, COL_MARGIN),
            elegivel_emprestimo: r.get(COL_ELIGIBLE).and_then(value_as_bool),
            data_admissao: text_field(r, COL_ADMISSION),
            inscricao_empregador_codigo: text_field(r, COL_EMPLOYER_CODE),
            inscricao_empregador_descricao: text_field(r, COL_EMPLOYER_DESCRIPTION),
            pessoa_exposta_politicamente_codigo: text_field(r, COL_PEP_CODE),
            pessoa_exposta_politicamente_descricao: text_field(r, COL_PEP_DESCRIPTION),
            regra_tempo_empresa: i16::from(item.rules.rule_tenure_ok),
            regra_pep: i16::from(item.rules.rule_not_politically_exposed),
            regra_elegivel: i16::from(item.rules.rule_eligible),
            regra_margem: i16::from(item.rules.rule_margin_ok),
            aprovado_final: i16::from(item.rules.approved_final),
            hora_atualizacao: item.captured_at,
            payload: Value::Object(item.to_annotated_record()),
        })
    }
}

// ============ Field coercion ============

/// Reads a field as text. Numbers are rendered, null and empty strings are `None`.
pub fn text_field(record: &FlatRecord, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Reads a monetary field. Accepts JSON numbers and strings in either
/// `1234.56` or Brazilian `1.234,56` notation.
pub fn decimal_field(record: &FlatRecord, key: &str) -> Option<BigDecimal> {
    match record.get(key)? {
        Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

fn parse_decimal(raw: &str) -> Option<BigDecimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let normalized = if raw.contains(',') {
        raw.replace('.', "").replace(',', ".")
    } else {
        raw.to_string()
    };
    BigDecimal::from_str(&normalized).ok()
}

fn value_as_i32(v: &Value) -> Option<i32> {
    match v {
        Value::Number(n) => n.as_i64().and_then(|i| i32::try_from(i).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Interprets a loosely typed flag.
///
/// Booleans map directly, numbers are true when non-zero, strings are true
/// unless empty or one of the usual negatives (`false`, `0`, `n`, `nao`, `não`).
pub fn value_as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => {
            let s = s.trim().to_lowercase();
            Some(!matches!(
                s.as_str(),
                "" | "false" | "0" | "n" | "nao" | "não" | "no"
            ))
        }
        _ => None,
    }
}
