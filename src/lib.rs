//! Dataprev Worker-Loan Solicitations Sync Library
//!
//! Polls the paginated solicitations API for a time window, evaluates the
//! eligibility rules for each record and stores the results in Postgres,
//! keyed by `idSolicitacao` with insert-or-ignore semantics.
//!
//! # Modules
//!
//! - `api_time`: API timestamp formats and the São Paulo civil clock.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `db_storage`: Storage trait and Postgres implementation.
//! - `errors`: Error handling types.
//! - `fingerprint`: Page digests for stalled-pagination detection.
//! - `models`: Raw, flattened and evaluated solicitation models.
//! - `normalize`: Record flattening and column-name sanitizing.
//! - `rules`: Eligibility rule engine.
//! - `solicitation_client`: Paginated API client with retry.
//! - `sync`: One sync cycle.
//! - `worker`: Supervisory loop.

pub mod api_time;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod fingerprint;
pub mod models;
pub mod normalize;
pub mod rules;
pub mod solicitation_client;
pub mod sync;
pub mod worker;
