use crate::errors::{ResultExt, SyncError};
use crate::models::SolicitationRow;
use chrono::NaiveDateTime;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::future::Future;

/// Name of the storage table.
pub const TABLE: &str = "dataprev_solicitacoes";

/// Column list of the batch insert, in bind order.
const INSERT_COLUMNS: &str = "idSolicitacao, cpf, matricula, numeroInscricaoEmpregador, \
     valorLiberado, nroParcelas, dataHoraValidadeSolicitacao, nomeTrabalhador, \
     dataNascimento, margemDisponivel, elegivelEmprestimo, dataAdmissao, \
     inscricaoEmpregador_codigo, inscricaoEmpregador_descricao, \
     pessoaExpostaPoliticamente_codigo, pessoaExpostaPoliticamente_descricao, \
     regra_tempo_empresa, regra_pep, regra_elegivel, regra_margem, aprovado_final, \
     hora_atualizacao, payload";

const COLUMNS_PER_ROW: usize = 23;

/// Rows per INSERT statement, kept under the 65535 bind-parameter limit.
const ROWS_PER_STATEMENT: usize = 65_535 / COLUMNS_PER_ROW / 2;

/// Persistence seam of the sync cycle.
pub trait SolicitationStore: Send + Sync {
    /// Latest validity timestamp stored so far, `None` when the table is empty.
    fn high_water_mark(
        &self,
    ) -> impl Future<Output = Result<Option<NaiveDateTime>, SyncError>> + Send;

    /// Inserts rows whose identifier is not stored yet, in one transaction.
    ///
    /// Existing identifiers are skipped, never updated. Returns the number of
    /// rows actually inserted.
    fn insert_ignore(
        &self,
        rows: &[SolicitationRow],
    ) -> impl Future<Output = Result<u64, SyncError>> + Send;
}

/// Postgres-backed store for evaluated solicitations.
#[derive(Clone)]
pub struct PgSolicitationStore {
    pool: PgPool,
}

impl PgSolicitationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SolicitationStore for PgSolicitationStore {
    async fn high_water_mark(&self) -> Result<Option<NaiveDateTime>, SyncError> {
        let mark: Option<NaiveDateTime> = sqlx::query_scalar(
            "SELECT MAX(dataHoraValidadeSolicitacao) FROM dataprev_solicitacoes",
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to read high-water-mark")?;

        Ok(mark)
    }

    async fn insert_ignore(&self, rows: &[SolicitationRow]) -> Result<u64, SyncError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start insert transaction")?;

        let mut inserted = 0u64;
        for chunk in rows.chunks(ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO {} ({}) ", TABLE, INSERT_COLUMNS));

            qb.push_values(chunk, |mut b, row| {
                b.push_bind(&row.id_solicitacao)
                    .push_bind(&row.cpf)
                    .push_bind(&row.matricula)
                    .push_bind(&row.numero_inscricao_empregador)
                    .push_bind(&row.valor_liberado)
                    .push_bind(row.nro_parcelas)
                    .push_bind(row.data_hora_validade_solicitacao)
                    .push_bind(&row.nome_trabalhador)
                    .push_bind(&row.data_nascimento)
                    .push_bind(&row.margem_disponivel)
                    .push_bind(row.elegivel_emprestimo)
                    .push_bind(&row.data_admissao)
                    .push_bind(&row.inscricao_empregador_codigo)
                    .push_bind(&row.inscricao_empregador_descricao)
                    .push_bind(&row.pessoa_exposta_politicamente_codigo)
                    .push_bind(&row.pessoa_exposta_politicamente_descricao)
                    .push_bind(row.regra_tempo_empresa)
                    .push_bind(row.regra_pep)
                    .push_bind(row.regra_elegivel)
                    .push_bind(row.regra_margem)
                    .push_bind(row.aprovado_final)
                    .push_bind(row.hora_atualizacao)
                    .push_bind(&row.payload);
            });
            qb.push(" ON CONFLICT (idSolicitacao) DO NOTHING");

            let result = qb
                .build()
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to insert batch of {} solicitations", chunk.len()))?;
            inserted += result.rows_affected();
        }

        tx.commit()
            .await
            .context("Failed to commit insert transaction")?;

        Ok(inserted)
    }
}
