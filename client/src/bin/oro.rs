use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use oro_client::{Client, LocalStorage, Session, Syncer};
use oro_execution::WithdrawalRequest;
use oro_types::{PlayerId, WithdrawalStatus, PLAYERS};
use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(author, version, about = "Track the group's oro bank and withdrawals.", long_about = None)]
struct Args {
    /// Ledger server
    #[arg(long, default_value = "http://localhost:3000")]
    url: String,

    /// Directory holding the local ledger
    #[arg(long, default_value = ".oro")]
    data_dir: PathBuf,

    #[arg(long, default_value_t = Level::WARN)]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show balances, amounts owed and history
    Status,
    /// Set a player's bank balance
    SetBalance { player: PlayerId, quantity: u64 },
    /// Set the rate offered for the next withdrawal
    SetRate { rate: f64 },
    /// Withdraw oro for one or more players, e.g. `withdraw alan=30 tommy=5`
    Withdraw {
        #[arg(required = true, value_parser = parse_quantity)]
        quantities: Vec<(PlayerId, u64)>,
        /// Rate to apply (defaults to the current rate)
        #[arg(long)]
        rate: Option<f64>,
    },
    /// Set the status of one withdrawal
    Mark { id: String, status: WithdrawalStatus },
    /// Set the status of every withdrawal of a player
    MarkPlayer {
        player: PlayerId,
        status: WithdrawalStatus,
    },
    /// Drop the withdrawal history
    ClearHistory,
    /// Replace the remote ledger with the local one
    Push,
    /// Replace the local ledger with the remote one
    Pull,
    /// Keep the local ledger in sync until interrupted
    Watch,
}

fn parse_quantity(value: &str) -> Result<(PlayerId, u64), String> {
    let (player, quantity) = value
        .split_once('=')
        .ok_or_else(|| format!("expected player=quantity, got {value}"))?;
    let player = player.parse::<PlayerId>().map_err(|e| e.to_string())?;
    let quantity = quantity
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("invalid quantity {quantity}: {e}"))?;
    Ok((player, quantity))
}

fn print_status(session: &Session) {
    let ledger = session.ledger();
    println!("rate: {} USD per oro", ledger.rate());
    println!(
        "last sync: {}{}",
        session.last_sync().unwrap_or("never"),
        if session.is_unsynced() {
            " (local changes not pushed)"
        } else {
            ""
        }
    );
    println!();
    println!("{:<10} {:>10} {:>12}", "player", "bank", "owed (USD)");
    for player in PLAYERS {
        println!(
            "{:<10} {:>10} {:>12.2}",
            player.name,
            ledger.bank().get(player.id),
            ledger.pending_usd(player.id)
        );
    }
    println!(
        "{:<10} {:>10} {:>12.2}",
        "total",
        ledger.total_bank(),
        ledger.total_pending_usd()
    );

    if ledger.withdrawals().is_empty() {
        return;
    }
    println!();
    for w in ledger.withdrawals() {
        println!(
            "{}  {:<10} {:>8} oro @ {:<8} = {:>10.2} USD  {:<9}  {}",
            w.date,
            w.name,
            w.quantity,
            w.rate,
            w.amount,
            w.status.as_str(),
            w.id
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args
    let args = Args::parse();

    // Create logger
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .init();

    let storage = LocalStorage::open(&args.data_dir)
        .with_context(|| format!("could not open {}", args.data_dir.display()))?;
    let session = Session::open(storage).context("could not load local ledger")?;
    let client = Client::new(&args.url).context("invalid server url")?;
    let syncer = Syncer::new(client, Arc::new(Mutex::new(session)));

    match args.command {
        Command::Status => {}
        Command::Push => {
            syncer.push().await.context("push failed")?;
            println!("pushed");
        }
        Command::Pull => {
            syncer.pull_now().await.context("pull failed")?;
            println!("pulled");
        }
        Command::Watch => {
            syncer
                .run(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!(error = %e, "could not listen for ctrl-c");
                    }
                })
                .await;
        }
        command => {
            let mut session = syncer
                .session()
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            match command {
                Command::SetBalance { player, quantity } => {
                    session.set_balance(player, quantity)?;
                }
                Command::SetRate { rate } => session.set_rate(rate)?,
                Command::Withdraw { quantities, rate } => {
                    let mut request = WithdrawalRequest::new(rate.unwrap_or(session.ledger().rate()));
                    for (player, quantity) in quantities {
                        request = request.with(player, quantity);
                    }
                    let created = session.confirm_withdrawals(&request)?;
                    for w in created {
                        println!("{}: {} oro = {:.2} USD ({})", w.name, w.quantity, w.amount, w.id);
                    }
                }
                Command::Mark { id, status } => session.set_status(&id, status)?,
                Command::MarkPlayer { player, status } => {
                    let updated = session.set_player_status(player, status)?;
                    if updated == 0 {
                        bail!("{} has no withdrawals", player.name());
                    }
                }
                Command::ClearHistory => session.clear_history()?,
                Command::Status | Command::Push | Command::Pull | Command::Watch => {}
            }
        }
    }

    let session = syncer.session().lock().unwrap_or_else(|e| e.into_inner());
    print_status(&session);
    Ok(())
}
