use sea_orm::Database;
use sea_orm_migration::prelude::*;

const USAGE: &str = "\
Usage: cargo run -p migration -- [up|down|fresh|status]

Manages the mess fund SQLite schema (m20261001_000001_ledger_groups creates
the `ledger_groups` table). The database is read from MESS_FUND_DATABASE_URL,
then DATABASE_URL, and defaults to sqlite:./mess_fund.db?mode=rwc.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cmd = std::env::args().nth(1).unwrap_or_else(|| "up".to_string());
    if matches!(cmd.as_str(), "-h" | "--help" | "help") {
        println!("{USAGE}");
        return Ok(());
    }

    let db_url = std::env::var("MESS_FUND_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .unwrap_or_else(|_| "sqlite:./mess_fund.db?mode=rwc".to_string());
    let db = Database::connect(&db_url).await?;

    match cmd.as_str() {
        "up" => {
            migration::Migrator::up(&db, None).await?;
            println!("ledger schema up to date at {db_url}");
        }
        "down" => migration::Migrator::down(&db, None).await?,
        "fresh" => migration::Migrator::fresh(&db).await?,
        "status" => migration::Migrator::status(&db).await?,
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}
