use std::{collections::BTreeMap, error::Error, path::PathBuf, sync::Arc};

use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use engine::{Amount, Engine, EngineError, JsonFileStore, SqliteStore, Standing, ZonedClock};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

mod export;

#[derive(Parser, Debug)]
#[command(name = "mess_fund_admin")]
#[command(about = "Admin utilities for the mess fund ledger")]
struct Cli {
    /// Database connection string. When set, the SQLite store is used
    /// instead of the JSON state file.
    #[arg(long, env = "MESS_FUND_DATABASE_URL")]
    database_url: Option<String>,

    /// JSON state file.
    #[arg(long, env = "MESS_FUND_STATE_FILE", default_value = "mess_fund_groups.json")]
    state_file: PathBuf,

    /// Timezone deciding which calendar day it is (IANA name).
    #[arg(long, env = "MESS_FUND_TIMEZONE", default_value = "UTC")]
    timezone: Tz,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a member in a group.
    Register(RegisterArgs),
    /// Record an expense in the current period.
    Expense(ExpenseArgs),
    /// Submit the meal counts of the current period, replacing any earlier submission.
    Meals(MealsArgs),
    /// Change one member's meal count in the current submission.
    AdjustMeal(AdjustMealArgs),
    /// Show the settlement of the current period.
    Settlement(GroupArgs),
    /// Close the current period and open the next one.
    Rotate(RotateArgs),
    /// Per-member breakdown of the current period.
    Summary(GroupArgs),
    /// Spending and meals of one member.
    Stats(MemberArgs),
    /// List known groups.
    Groups,
    /// Archived settlements of a group.
    History(GroupArgs),
    /// Write the current period's expenses and meal counts as CSV.
    Export(ExportArgs),
}

#[derive(Args, Debug)]
struct GroupArgs {
    #[arg(allow_hyphen_values = true)]
    group: String,
}

#[derive(Args, Debug)]
struct MemberArgs {
    #[arg(allow_hyphen_values = true)]
    group: String,
    member_id: String,
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(allow_hyphen_values = true)]
    group: String,
    member_id: String,
    name: String,
    #[arg(long)]
    handle: Option<String>,
}

#[derive(Args, Debug)]
struct ExpenseArgs {
    #[arg(allow_hyphen_values = true)]
    group: String,
    #[arg(value_parser = parse_amount)]
    amount: Amount,
    description: String,
    /// Member id of whoever paid.
    #[arg(long)]
    by: String,
    /// Name recorded with the expense. Defaults to the registered name.
    #[arg(long)]
    by_name: Option<String>,
}

#[derive(Args, Debug)]
struct MealsArgs {
    #[arg(allow_hyphen_values = true)]
    group: String,
    /// `member_id=count` pairs.
    #[arg(required = true, value_parser = parse_meal_count)]
    counts: Vec<(String, u32)>,
    #[arg(long, default_value = "admin")]
    submitted_by: String,
}

#[derive(Args, Debug)]
struct AdjustMealArgs {
    #[arg(allow_hyphen_values = true)]
    group: String,
    member_id: String,
    count: u32,
}

#[derive(Args, Debug)]
struct RotateArgs {
    #[arg(allow_hyphen_values = true)]
    group: String,
    /// Required: rotation drops the closed period's expenses and meal counts.
    #[arg(long)]
    confirm: bool,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[arg(allow_hyphen_values = true)]
    group: String,
    #[arg(long, default_value = "mess_fund_export.csv")]
    output: PathBuf,
}

fn parse_amount(raw: &str) -> Result<Amount, String> {
    raw.parse().map_err(|err: EngineError| err.to_string())
}

fn parse_meal_count(raw: &str) -> Result<(String, u32), String> {
    let Some((member_id, count)) = raw.split_once('=') else {
        return Err(format!("expected member_id=count, got {raw:?}"));
    };
    let member_id = member_id.trim();
    if member_id.is_empty() {
        return Err(format!("missing member id in {raw:?}"));
    }
    let count = count
        .trim()
        .parse()
        .map_err(|_| format!("invalid meal count in {raw:?}"))?;
    Ok((member_id.to_string(), count))
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

async fn open_engine(cli: &Cli) -> Result<Engine, Box<dyn Error + Send + Sync>> {
    let builder = Engine::builder().clock(Arc::new(ZonedClock::new(cli.timezone)));
    let builder = match &cli.database_url {
        Some(url) => builder.store(SqliteStore::new(connect_db(url).await?)),
        None => builder.store(JsonFileStore::new(&cli.state_file)),
    };
    Ok(builder.build().await?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter("mess_fund_admin=warn,engine=warn")
        .with_writer(std::io::stderr)
        .init();

    let mut engine = open_engine(&cli).await?;

    match cli.command {
        Command::Register(args) => {
            match engine
                .register_member(&args.group, &args.member_id, &args.name, args.handle.as_deref())
                .await
            {
                Ok(member) => println!("registered {} ({})", member.display_name, member.id),
                Err(err) if err.is_informational() => println!("{err}"),
                Err(err) => return Err(err.into()),
            }
        }
        Command::Expense(args) => {
            let name = match args.by_name {
                Some(name) => name,
                None => engine
                    .member(&args.group, &args.by)
                    .map(|member| member.display_name)
                    .unwrap_or_else(|| args.by.clone()),
            };
            let expense = engine
                .record_expense(&args.group, args.amount, &args.description, &name, &args.by)
                .await?;
            println!(
                "recorded {} for {} by {name} in {} ({})",
                expense.amount, expense.description, expense.period, expense.id
            );
        }
        Command::Meals(args) => {
            let counts: BTreeMap<_, _> = args.counts.into_iter().collect();
            let submission = engine
                .submit_meal_counts(&args.group, counts, &args.submitted_by)
                .await?;
            println!(
                "submitted {} meal(s) for {} member(s) in {}",
                submission.total_meals(),
                submission.counts.len(),
                submission.period
            );
        }
        Command::AdjustMeal(args) => match engine
            .adjust_meal_count(&args.group, &args.member_id, args.count)
            .await
        {
            Ok(()) => println!("{} now has {} meal(s)", args.member_id, args.count),
            Err(err @ EngineError::NoSubmissionYet(_)) => {
                eprintln!("{err}");
                std::process::exit(1);
            }
            Err(err) => return Err(err.into()),
        },
        Command::Settlement(args) => match engine.compute_settlement(&args.group) {
            Ok(settlement) => {
                println!("settlement for {}", settlement.period);
                println!(
                    "expenses {} + carry forward {} = {}",
                    settlement.total_expenses,
                    settlement.carry_forward_in,
                    settlement.total_with_carry
                );
                println!(
                    "{} meal(s), {} per meal",
                    settlement.total_meals, settlement.cost_per_meal
                );
                for line in settlement.by_balance() {
                    let standing = match line.standing() {
                        Standing::GetsBack => format!("gets back {}", line.balance),
                        Standing::Pays => format!("pays {}", line.balance.abs()),
                        Standing::Settled => "settled".to_string(),
                    };
                    println!(
                        "  {}: spent {}, {} meal(s), owes {}, {standing}",
                        line.name, line.spent, line.meals, line.owes
                    );
                }
                println!("remainder {}", settlement.remainder);
            }
            Err(err) => {
                eprintln!("{err}");
                std::process::exit(1);
            }
        },
        Command::Rotate(args) => {
            if !args.confirm {
                eprintln!("rotation drops the current period's records; pass --confirm");
                std::process::exit(2);
            }
            let rotation = engine.rotate_period(&args.group).await?;
            match &rotation.outcome {
                Ok(settlement) => println!(
                    "closed {} (archived, carry forward {}), opened {}",
                    rotation.closed, settlement.remainder, rotation.opened
                ),
                Err(reason) => println!(
                    "closed {} without settlement ({}), opened {}",
                    rotation.closed,
                    EngineError::from(*reason),
                    rotation.opened
                ),
            }
        }
        Command::Summary(args) => {
            println!("period {}", engine.current_period(&args.group));
            for summary in engine.member_wise_summary(&args.group) {
                println!(
                    "  {} ({}): spent {} in {} expense(s), {} meal(s), owes {}, balance {}",
                    summary.name,
                    summary.member_id,
                    summary.spent,
                    summary.expense_count,
                    summary.meals,
                    summary.owes,
                    summary.balance
                );
            }
        }
        Command::Stats(args) => {
            let stats = engine.member_stats(&args.group, &args.member_id);
            println!(
                "{}: spent {} in {} expense(s), {} meal(s)",
                args.member_id, stats.spent, stats.expense_count, stats.meals
            );
        }
        Command::Groups => {
            for group_id in engine.list_groups() {
                println!(
                    "{group_id}\t{}\t{}",
                    engine.current_period(&group_id),
                    if engine.meal_data_submitted(&group_id) {
                        "meals submitted"
                    } else {
                        "meals pending"
                    }
                );
            }
        }
        Command::History(args) => {
            for archived in engine.archived_settlements(&args.group) {
                let settlement = &archived.settlement;
                println!(
                    "{}\tarchived {}\ttotal {}\t{} meal(s)\t{} per meal\tremainder {}",
                    settlement.period,
                    archived.archived_at.format("%Y-%m-%d %H:%M"),
                    settlement.total_with_carry,
                    settlement.total_meals,
                    settlement.cost_per_meal,
                    settlement.remainder
                );
            }
        }
        Command::Export(args) => match export::current_period_csv(&engine, &args.group)? {
            Some(data) => {
                std::fs::write(&args.output, data)?;
                println!("exported to {}", args.output.display());
            }
            None => println!("nothing to export for {}", engine.current_period(&args.group)),
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_meal_pairs() {
        assert_eq!(parse_meal_count("u1=12"), Ok(("u1".to_string(), 12)));
        assert_eq!(parse_meal_count(" u2 = 0 "), Ok(("u2".to_string(), 0)));
        assert!(parse_meal_count("u1").is_err());
        assert!(parse_meal_count("=3").is_err());
        assert!(parse_meal_count("u1=-1").is_err());
    }

    #[test]
    fn parses_amounts() {
        assert_eq!(parse_amount("12,50"), Ok(Amount::new(12.5)));
        assert!(parse_amount("0").is_err());
    }

    #[test]
    fn rotate_requires_confirm_flag() {
        let cli = Cli::try_parse_from(["mess_fund_admin", "rotate", "-1001"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Rotate(RotateArgs { ref group, confirm: false }) if group == "-1001"
        ));

        let cli = Cli::try_parse_from(["mess_fund_admin", "rotate", "-1001", "--confirm"]).unwrap();
        assert!(matches!(cli.command, Command::Rotate(RotateArgs { confirm: true, .. })));
    }
}
