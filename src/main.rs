//! Trade journal CLI.
//!
//! Records trades, manages batch take-profit targets, reports holdings and
//! stores post-trade reviews. Every command prints pretty JSON on stdout;
//! logs go to stderr.

use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use trade_journal::config::Settings;
use trade_journal::data::models::{NewTrade, ProfitTargetInput, ReviewDecision, ReviewInput, TradeSide};
use trade_journal::errors::JournalError;
use trade_journal::journal::TradeJournal;
use trade_journal::storage::Database;
use trade_journal::take_profit::TakeProfitValidator;

/// Exit code for rejected input.
const EXIT_VALIDATION: i32 = 2;

#[derive(Parser)]
#[command(name = "trade-journal", about = "Personal stock-trading journal")]
struct Cli {
    /// Database file. Overrides JOURNAL_DB_PATH.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema.
    Init,
    /// Record and inspect trades.
    Trade {
        #[command(subcommand)]
        command: TradeCommand,
    },
    /// Manage batch take-profit targets.
    Targets {
        #[command(subcommand)]
        command: TargetsCommand,
    },
    /// Current holdings and profit/loss.
    Holdings {
        /// Mark price for a stock, e.g. --mark 600519=1720.50 (repeatable).
        #[arg(long = "mark", value_parser = parse_mark)]
        marks: Vec<(String, Decimal)>,
    },
    /// Post-trade reviews.
    Review {
        #[command(subcommand)]
        command: ReviewCommand,
    },
}

#[derive(Subcommand)]
enum TradeCommand {
    /// Record a new trade.
    Add(TradeArgs),
    /// Overwrite an existing trade.
    Update {
        id: i64,
        #[command(flatten)]
        trade: TradeArgs,
    },
    /// List trades, optionally for one stock.
    List {
        #[arg(long)]
        code: Option<String>,
    },
    /// Show a trade with its targets and review.
    Show {
        id: i64,
    },
    /// Delete a trade with its targets and review.
    Delete {
        id: i64,
    },
}

#[derive(Args)]
struct TradeArgs {
    #[arg(long)]
    code: String,
    #[arg(long, default_value = "")]
    name: String,
    /// buy or sell
    #[arg(long)]
    side: TradeSide,
    #[arg(long)]
    price: Decimal,
    #[arg(long)]
    quantity: i64,
    #[arg(long, default_value = "0")]
    commission: Decimal,
    /// Trade date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Single take-profit ratio, e.g. 0.2 for 20%.
    #[arg(long)]
    take_profit_ratio: Option<Decimal>,
    #[arg(long)]
    stop_loss_ratio: Option<Decimal>,
    #[arg(long, default_value = "")]
    notes: String,
}

impl TradeArgs {
    fn into_new_trade(self) -> NewTrade {
        NewTrade {
            stock_code: self.code,
            stock_name: self.name,
            side: self.side,
            price: self.price,
            quantity: self.quantity,
            commission: self.commission,
            trade_date: self.date.unwrap_or_else(|| Utc::now().date_naive()),
            take_profit_ratio: self.take_profit_ratio,
            stop_loss_ratio: self.stop_loss_ratio,
            notes: self.notes,
        }
    }
}

#[derive(Subcommand)]
enum TargetsCommand {
    /// Replace all targets of a buy trade from a JSON file.
    Set {
        trade_id: i64,
        /// JSON array of {target_price?, profit_ratio?, sell_ratio, sequence_order}.
        #[arg(long)]
        file: PathBuf,
    },
    /// Show the stored targets of a trade.
    Show {
        trade_id: i64,
    },
    /// Remove all targets of a trade.
    Clear {
        trade_id: i64,
    },
    /// Exit plan of a buy trade in shares and money.
    Plan {
        trade_id: i64,
    },
    /// Validate and evaluate a target file without storing it.
    Preview {
        #[arg(long)]
        buy_price: Decimal,
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ReviewCommand {
    /// Create or replace the review of a trade.
    Set {
        trade_id: i64,
        /// 1 (poor) to 5 (excellent)
        #[arg(long)]
        rating: i64,
        /// hold, add, reduce or exit
        #[arg(long)]
        decision: ReviewDecision,
        #[arg(long, default_value = "")]
        summary: String,
        #[arg(long, default_value = "")]
        lessons: String,
    },
    /// Show the review of a trade.
    Show {
        trade_id: i64,
    },
    /// List every review.
    List,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration.
    let mut settings = Settings::from_env();
    if let Some(db) = cli.db {
        settings.database_path = db;
    }

    // Initialize logging.
    init_logging(&settings);

    // Validate settings.
    if let Err(errors) = settings.validate() {
        for e in &errors {
            error!(error = %e, "Configuration error");
        }
        bail!("Configuration validation failed");
    }

    let db = Database::open(&settings.database_path)?;
    let validator = TakeProfitValidator::new(settings.take_profit_limits());
    let mut journal = TradeJournal::new(db, validator);

    match run(&mut journal, cli.command) {
        Ok(output) => {
            println!("{output}");
            Ok(())
        }
        Err(e) => match e.downcast_ref::<JournalError>().and_then(JournalError::validation) {
            Some(v) => {
                let report = serde_json::json!({ "error": "validation", "issues": v.issues() });
                println!("{}", serde_json::to_string_pretty(&report)?);
                std::process::exit(EXIT_VALIDATION);
            }
            None => Err(e),
        },
    }
}

fn run(journal: &mut TradeJournal, command: Commands) -> anyhow::Result<String> {
    match command {
        Commands::Init => {
            journal.database().init_schema()?;
            info!("Schema ready");
            to_json(&serde_json::json!({ "status": "ok" }))
        }
        Commands::Trade { command } => match command {
            TradeCommand::Add(args) => to_json(&journal.record_trade(args.into_new_trade())?),
            TradeCommand::Update { id, trade } => {
                to_json(&journal.update_trade(id, trade.into_new_trade())?)
            }
            TradeCommand::List { code } => to_json(&journal.trades(code.as_deref())?),
            TradeCommand::Show { id } => {
                let trade = journal.trade(id)?;
                let targets = journal.profit_targets(id)?;
                let review = journal.review(id)?;
                to_json(&serde_json::json!({
                    "trade": trade,
                    "profit_targets": targets,
                    "review": review,
                }))
            }
            TradeCommand::Delete { id } => {
                journal.delete_trade(id)?;
                to_json(&serde_json::json!({ "deleted": id }))
            }
        },
        Commands::Targets { command } => match command {
            TargetsCommand::Set { trade_id, file } => {
                let targets = read_targets(&file)?;
                to_json(&journal.set_profit_targets(trade_id, targets)?)
            }
            TargetsCommand::Show { trade_id } => to_json(&journal.profit_targets(trade_id)?),
            TargetsCommand::Clear { trade_id } => {
                let removed = journal.clear_profit_targets(trade_id)?;
                to_json(&serde_json::json!({ "trade_id": trade_id, "removed": removed }))
            }
            TargetsCommand::Plan { trade_id } => to_json(&journal.take_profit_plan(trade_id)?),
            TargetsCommand::Preview { buy_price, file } => {
                let targets = read_targets(&file)?;
                to_json(&journal.preview_profit_targets(buy_price, &targets)?)
            }
        },
        Commands::Holdings { marks } => {
            let marks: HashMap<String, Decimal> = marks.into_iter().collect();
            let portfolio = journal.portfolio()?;
            let holdings: Vec<_> = portfolio
                .holdings()
                .into_iter()
                .map(|h| {
                    let mark = marks.get(&h.stock_code).copied();
                    serde_json::json!({
                        "holding": h,
                        "avg_cost": h.avg_cost().round_dp(4),
                        "mark_price": mark,
                        "unrealized_pnl": mark.map(|p| h.unrealized_pnl(p)),
                    })
                })
                .collect();
            to_json(&serde_json::json!({
                "holdings": holdings,
                "closed": portfolio.closed(),
                "summary": portfolio.summary(&marks),
            }))
        }
        Commands::Review { command } => match command {
            ReviewCommand::Set {
                trade_id,
                rating,
                decision,
                summary,
                lessons,
            } => {
                let review = ReviewInput {
                    rating,
                    decision,
                    summary,
                    lessons,
                };
                to_json(&journal.save_review(trade_id, review)?)
            }
            ReviewCommand::Show { trade_id } => to_json(&journal.review(trade_id)?),
            ReviewCommand::List => to_json(&journal.reviews()?),
        },
    }
}

fn read_targets(path: &Path) -> anyhow::Result<Vec<ProfitTargetInput>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read target file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse target file {}", path.display()))
}

fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn parse_mark(raw: &str) -> Result<(String, Decimal), String> {
    let (code, price) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected CODE=PRICE, got {raw}"))?;
    let price: Decimal = price
        .trim()
        .parse()
        .map_err(|e| format!("invalid price in {raw}: {e}"))?;
    Ok((code.trim().to_string(), price))
}

fn init_logging(settings: &Settings) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    if settings.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_every_subcommand_has_help() {
        let cmd = Cli::command();
        cmd.clone().debug_assert();
        for group in cmd.get_subcommands() {
            assert!(group.get_about().is_some(), "{} has no help", group.get_name());
            for sub in group.get_subcommands() {
                assert!(
                    sub.get_about().is_some(),
                    "{} {} has no help",
                    group.get_name(),
                    sub.get_name()
                );
            }
        }
    }

    #[test]
    fn test_parse_mark() {
        let (code, price) = parse_mark(" 600519 =1720.50").unwrap();
        assert_eq!(code, "600519");
        assert_eq!(price, Decimal::new(172050, 2));
        assert!(parse_mark("600519").is_err());
    }
}
