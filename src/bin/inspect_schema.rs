//! Prints the column layout of the solicitations table.

use dataprev_sync::db_storage::TABLE;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("DB_URL"))
        .map_err(|_| anyhow::anyhow!("DATABASE_URL or DB_URL must be set"))?;
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;

    let columns: Vec<(String, String, String)> = sqlx::query_as(
        "SELECT column_name, data_type, is_nullable FROM information_schema.columns \
         WHERE table_name = $1 ORDER BY ordinal_position",
    )
    .bind(TABLE)
    .fetch_all(&pool)
    .await?;

    if columns.is_empty() {
        println!("Table {} not found. See sql/dataprev_solicitacoes.sql", TABLE);
        return Ok(());
    }

    println!("{}:", TABLE);
    for (name, data_type, nullable) in columns {
        let null = if nullable == "YES" { "" } else { " NOT NULL" };
        println!("  - {}: {}{}", name, data_type, null);
    }

    let (rows, mark): (i64, Option<chrono::NaiveDateTime>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(dataHoraValidadeSolicitacao) FROM dataprev_solicitacoes",
    )
    .fetch_one(&pool)
    .await?;
    println!();
    println!("Rows: {}", rows);
    match mark {
        Some(m) => println!("High-water-mark: {}", m),
        None => println!("High-water-mark: none"),
    }

    Ok(())
}
