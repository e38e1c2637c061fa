//! A terminal blackjack table.
//!
//! Every seat is played from the same prompt: commands name the
//! participant they act for. Wallets and game history live in memory, or
//! in PostgreSQL when a database URL is given.

use anyhow::{Context, Result};
use ctrlc::set_handler;
use log::info;
use pico_args::Arguments;
use private_blackjack::{
    SessionId, TableConfig, TableService,
    db::{Database, DatabaseConfig, PgGameRepository},
    wallet::PgWalletLedger,
};
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use pb_cli::{
    commands::{Command, parse_command},
    session::{HELP as COMMANDS, execute},
};

const HELP: &str = "\
Play blackjack at a terminal table

USAGE:
  pb_cli [OPTIONS]

OPTIONS:
  --decks      N           Decks in the shoe  [default: env BJ_NUM_DECKS or 2]
  --balance    USD         Starting balance for new wallets  [default: env BJ_STARTING_BALANCE or 1000]
  --db-url     URL         Keep wallets and games in PostgreSQL instead of memory
  --session    NAME        Table session name  [default: main]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  BJ_MIN_BET, BJ_MAX_BET, BJ_MAX_PLAYERS, BJ_LOAN_INCREMENT
  DATABASE_URL             Used when --db-url is not given and set
";

struct Args {
    num_decks: Option<usize>,
    starting_balance: Option<i64>,
    database_url: Option<String>,
    session: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        num_decks: pargs.opt_value_from_str("--decks")?,
        starting_balance: pargs.opt_value_from_str("--balance")?,
        database_url: pargs
            .opt_value_from_str("--db-url")?
            .or_else(|| std::env::var("DATABASE_URL").ok()),
        session: pargs
            .opt_value_from_str("--session")?
            .unwrap_or_else(|| "main".to_string()),
    };

    // Catching signals for exit.
    set_handler(|| std::process::exit(0))?;

    env_logger::builder().format_target(false).init();

    let service = build_service(&args).await?;
    run(&service, &SessionId::from(args.session.as_str())).await
}

async fn build_service(args: &Args) -> Result<TableService> {
    let mut config = TableConfig::from_env();
    if let Some(num_decks) = args.num_decks {
        config.num_decks = num_decks;
    }
    if let Some(balance) = args.starting_balance {
        config.starting_balance = balance;
    }
    config.validate().context("Invalid table configuration")?;

    let Some(database_url) = &args.database_url else {
        info!("Using in-memory wallets and games");
        return Ok(TableService::in_memory(config));
    };

    let db_config = DatabaseConfig {
        database_url: database_url.clone(),
        ..DatabaseConfig::from_env()
    };
    let db = Database::new(&db_config)
        .await
        .context("Failed to connect to database")?;
    db.health_check().await.context("Database health check failed")?;
    info!("Database connected successfully");

    let pool = Arc::new(db.pool().clone());
    let ledger = PgWalletLedger::new(pool.clone()).with_default_balance(config.starting_balance);
    let repository = PgGameRepository::new(pool);
    Ok(TableService::new(config, Arc::new(ledger), Arc::new(repository)))
}

async fn run(service: &TableService, session_id: &SessionId) -> Result<()> {
    println!("Blackjack at table '{session_id}'. Type 'help' for commands.");
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line) {
            Ok(Command::Quit) => break,
            Ok(Command::Help) => {
                print!("{COMMANDS}");
                continue;
            }
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };

        match execute(service, session_id, command).await {
            Ok(output) => print!("{output}"),
            Err(err) => println!("error: {}", err.client_message()),
        }
    }

    println!("Left the table.");
    Ok(())
}
