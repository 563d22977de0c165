//! Operator utilities for a coinpurse ledger snapshot.
//!
//! Applies single operations through the same engine the server runs, then
//! writes the snapshot back atomically. Refuses to touch a corrupt snapshot
//! (unlike the server, which starts degraded-empty).

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use economy::{Ledger, LedgerSnapshot, Money, SnapshotStore};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "coinpurse_admin")]
#[command(about = "Operator utilities for the coinpurse economy ledger")]
struct Cli {
    /// Ledger snapshot file (also read from `COINPURSE_SNAPSHOT`).
    #[arg(long, env = "COINPURSE_SNAPSHOT", default_value = "coinpurse.json")]
    snapshot: PathBuf,

    /// Actor recorded on the audit trail.
    #[arg(long, default_value = "admin")]
    actor: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a player's balance without creating the account.
    Balance { owner: Uuid },
    /// Credit money to a player from the economy itself.
    Deposit { owner: Uuid, amount: Money },
    /// Remove money from a player into the economy itself.
    Withdraw { owner: Uuid, amount: Money },
    /// Move money between two players.
    Transfer {
        from: Uuid,
        to: Uuid,
        amount: Money,
    },
    /// Set a player's balance to an exact value (ignores the lock flag).
    Set { owner: Uuid, amount: Money },
    /// Freeze an account against balance changes.
    Lock { owner: Uuid },
    /// Unfreeze an account.
    Unlock { owner: Uuid },
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let store = SnapshotStore::new(&cli.snapshot);
    let snapshot = match store.load() {
        Ok(snapshot) => snapshot,
        Err(err) if err.is_missing() => LedgerSnapshot::default(),
        Err(err) => return Err(err.into()),
    };
    let ledger = Ledger::builder().snapshot(snapshot).build();
    let actor = cli.actor.as_str();

    match cli.command {
        Command::Balance { owner } => {
            match ledger.peek(owner) {
                Some(account) => println!("{}: {}", owner, render(&account)),
                None => println!("{owner}: no account"),
            }
            return Ok(());
        }
        Command::Deposit { owner, amount } => {
            ledger.exchange(None, Some(owner), amount, actor)?;
            println!("Added {amount} to {owner}");
        }
        Command::Withdraw { owner, amount } => {
            ledger.exchange(Some(owner), None, amount, actor)?;
            println!("Removed {amount} from {owner}");
        }
        Command::Transfer { from, to, amount } => {
            ledger.exchange(Some(from), Some(to), amount, actor)?;
            println!("Moved {amount} from {from} to {to}");
        }
        Command::Set { owner, amount } => {
            ledger.set_money(owner, amount, actor)?;
            println!("Set {owner} balance to {amount}");
        }
        Command::Lock { owner } => {
            ledger.lock(owner, actor);
            println!("Locked {owner}");
        }
        Command::Unlock { owner } => {
            ledger.unlock(owner, actor);
            println!("Unlocked {owner}");
        }
    }

    store.save(&ledger.snapshot())?;
    Ok(())
}

fn render(account: &economy::Account) -> String {
    if account.locked {
        format!("{} [locked]", account.balance)
    } else {
        account.balance.to_string()
    }
}
