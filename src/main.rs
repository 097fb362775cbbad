use clap::{Parser, Subcommand};
use colored::*;
use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

mod account;
mod app;
mod config;
mod handler;
mod ledger;
mod oracle;
mod session;
mod sync;
mod tui;
mod ui;

#[cfg(test)]
mod stub;

use account::Account;
use app::App;
use config::Config;
use ledger::LedgerClient;
use oracle::OracleClient;
use session::CoPilotSession;
use sync::AccountSync;

/// Where the service gateway lives when nothing else is configured.
const DEFAULT_LEDGER_URL: &str = "http://localhost:8000";
const DEFAULT_ORACLE_URL: &str = "http://localhost:8000";

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Dashboard and co-pilot client for the FDCN ledger network")]
struct Cli {
    /// Base URL of the ledger service
    #[arg(long, global = true)]
    ledger_url: Option<String>,

    /// Base URL of the oracle service
    #[arg(long, global = true)]
    oracle_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Live dashboard with the co-pilot panel (default)
    Dashboard {
        /// Account to watch; falls back to the configured default
        #[arg(short, long)]
        account: Option<String>,
    },
    /// Fetch and print an account snapshot
    Account {
        /// Account id; falls back to the configured default
        id: Option<String>,
    },
    /// Ask the co-pilot for guidance without opening the dashboard
    Ask {
        /// Your insight
        text: String,
        /// Account the insight is anchored to
        #[arg(short, long)]
        account: Option<String>,
    },
    /// Remember an account id as the default
    Use {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = Config::load().unwrap_or_else(|_| Config::new());
    let ledger_url = cli
        .ledger_url
        .or_else(|| config.ledger_url.clone())
        .unwrap_or_else(|| DEFAULT_LEDGER_URL.to_string());
    let oracle_url = cli
        .oracle_url
        .or_else(|| config.oracle_url.clone())
        .unwrap_or_else(|| DEFAULT_ORACLE_URL.to_string());

    match cli.command.unwrap_or(Commands::Dashboard { account: None }) {
        Commands::Dashboard { account } => {
            let id = resolve_account_id(account, &config)?;
            run_dashboard(Account::new(id), &ledger_url, &oracle_url).await
        }
        Commands::Account { id } => {
            let id = resolve_account_id(id, &config)?;
            show_account(&LedgerClient::new(&ledger_url), &id).await
        }
        Commands::Ask { text, account } => {
            let id = resolve_account_id(account, &config)?;
            ask_oracle(&OracleClient::new(&oracle_url), &id, &text).await
        }
        Commands::Use { id } => {
            Config::save_account_id(&id)?;
            println!("Default account set to {}", id.bold());
            Ok(())
        }
    }
}

fn init_tracing(cli: &Cli) {
    // The dashboard owns the terminal; only log there when explicitly asked.
    let dashboard = matches!(cli.command, None | Some(Commands::Dashboard { .. }));
    if dashboard && std::env::var_os("RUST_LOG").is_none() {
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

/// The dashboard cannot exist without an account to watch.
fn resolve_account_id(flag: Option<String>, config: &Config) -> Result<String> {
    flag.or_else(|| config.account_id.clone()).ok_or_else(|| {
        anyhow!("no account id; pass --account <ID> or set a default with `portal use <ID>`")
    })
}

async fn run_dashboard(account: Account, ledger_url: &str, oracle_url: &str) -> Result<()> {
    let sync = AccountSync::start(account, LedgerClient::new(ledger_url));
    let session = CoPilotSession::new(OracleClient::new(oracle_url));
    let mut app = App::new(sync, session);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event)?,
            None => break,
        }

        // Fold in completed background work before the next frame.
        app.sync.pump();
        app.session.pump().await;
    }

    app.sync.shutdown();
    tui::restore()?;

    Ok(())
}

async fn show_account(client: &LedgerClient, id: &str) -> Result<()> {
    let mut account = Account::new(id);

    match client.fetch(id).await {
        Ok(patch) => account.merge(patch),
        Err(e) => {
            println!("{}: {}", "Error reaching the ledger".red(), e);
            println!(
                "Make sure the services are running at {}",
                "the configured URLs".bold()
            );
            return Ok(());
        }
    }

    println!("\n{}", format!("Account {}", account.id).bold().blue());
    println!("{}", "=".repeat(40).dimmed());
    println!("  {} $FEX", account.fex_display().bold().green());
    println!("  {} SU", account.su_display().bold().yellow());

    for (key, value) in account.fields() {
        if key != "fex" && key != "su" {
            println!("  {} {}", value.to_string().bold(), key.dimmed());
        }
    }

    Ok(())
}

async fn ask_oracle(client: &OracleClient, id: &str, text: &str) -> Result<()> {
    println!("Anchoring insight for {}...\n", id.bold().cyan());

    match client.analyze(id, text).await {
        Ok(guidance) => {
            println!("{}", "Guidance:".bold().green());
            println!("{}", guidance);
        }
        Err(e) => {
            println!("{}: {}", "The oracle did not answer".red(), e);
            println!(
                "Make sure the services are running at {}",
                "the configured URLs".bold()
            );
        }
    }

    Ok(())
}
