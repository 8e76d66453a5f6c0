//! Operator commands against the persisted ledger
//!
//! Each command loads the ledger from sled, applies one engine operation
//! and commits the resulting state and events in a single transaction.

use crate::config::{parse_account, NodeConfig};
use crate::lock::DataDirLock;
use anyhow::{bail, Context, Result};
use clap::{Subcommand, ValueEnum};
use loyalty_ledger::{
    AccrualOutcome, AccrualRequest, InMemoryCurrencyLedger, LedgerState, PointsEngine,
};
use loyalty_storage::{LedgerStore, SledStore};
use loyalty_types::{AccountId, CurrencyId};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Feature {
    Collecting,
    Distribution,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create an empty ledger owned by the configured owner
    Init,
    /// Allow a game module to report stakes
    DeclareCaller {
        #[arg(value_parser = parse_account)]
        module: AccountId,
    },
    /// Revoke a game module
    UndeclareCaller {
        #[arg(value_parser = parse_account)]
        module: AccountId,
    },
    /// Set currency units per point (0 disables the currency)
    SetRatio { currency: CurrencyId, ratio: u128 },
    /// Switch collecting or distribution on or off
    Toggle {
        #[arg(value_enum)]
        feature: Feature,
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// Delegate the worker role
    SetWorker {
        #[arg(value_parser = parse_account)]
        worker: AccountId,
    },
    /// Bonus percent for a table of 2, 3 or 4 players
    SetPlayerBonus { players: u32, percent: u32 },
    /// Bonus percent per wearable
    SetWearableBonus { percent: u32 },
    /// Bonus allowed above the 100% baseline
    SetMaxBonus { extra: u32 },
    /// Share of credited points paid to referrers
    SetAffiliateBonus { percent: u32 },
    /// Currency redemptions are paid in
    SetDistributionCurrency { currency: CurrencyId },
    /// Link a referred account to its referrer (worker only)
    AssignAffiliate {
        #[arg(value_parser = parse_account)]
        referred: AccountId,
        #[arg(value_parser = parse_account)]
        referrer: AccountId,
    },
    /// Report a stake on behalf of a declared module
    Accrue {
        #[arg(value_parser = parse_account)]
        beneficiary: AccountId,
        currency: CurrencyId,
        amount: u128,
        /// Reporting module (defaults to the operator)
        #[arg(long, value_parser = parse_account)]
        caller: Option<AccountId>,
        #[arg(long, default_value_t = 1)]
        players: u32,
        #[arg(long, default_value_t = 0)]
        wearables: u32,
    },
    /// Show an account's points
    Balance {
        #[arg(value_parser = parse_account)]
        account: AccountId,
    },
    /// Show configuration and totals
    Status,
    /// Print the event log as JSON lines
    Events {
        /// Only the most recent N events
        #[arg(long)]
        tail: Option<usize>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Init => "init",
            Command::DeclareCaller { .. } => "declare-caller",
            Command::UndeclareCaller { .. } => "undeclare-caller",
            Command::SetRatio { .. } => "set-ratio",
            Command::Toggle { .. } => "toggle",
            Command::SetWorker { .. } => "set-worker",
            Command::SetPlayerBonus { .. } => "set-player-bonus",
            Command::SetWearableBonus { .. } => "set-wearable-bonus",
            Command::SetMaxBonus { .. } => "set-max-bonus",
            Command::SetAffiliateBonus { .. } => "set-affiliate-bonus",
            Command::SetDistributionCurrency { .. } => "set-distribution-currency",
            Command::AssignAffiliate { .. } => "assign-affiliate",
            Command::Accrue { .. } => "accrue",
            Command::Balance { .. } => "balance",
            Command::Status => "status",
            Command::Events { .. } => "events",
        }
    }
}

/// Run one command and return what should be printed.
pub fn execute(config: &NodeConfig, command: Command) -> Result<String> {
    let _lock = DataDirLock::acquire(&config.data_dir, command.name())?;
    let store = SledStore::open(config.db_path())
        .with_context(|| format!("opening ledger at {}", config.db_path().display()))?;

    if let Command::Init = command {
        return init(config, &store);
    }

    let state = store
        .load_state()?
        .context("ledger not initialised; run `init` first")?;

    if let Command::Events { tail } = command {
        return print_events(&store, tail);
    }

    let persisted = usize::try_from(store.event_count()?)?;
    // Redemption is not exposed here, so no live currency ledger is bound.
    let engine = PointsEngine::resume(state, persisted, Box::new(InMemoryCurrencyLedger::new()));
    let output = apply(config, &engine, command)?;

    let new_events = engine.take_events();
    if !new_events.is_empty() {
        store.commit(&engine.snapshot(), &new_events)?;
        store.flush()?;
        info!(target: "node", "Committed {} events", new_events.len());
    }
    Ok(output)
}

fn init(config: &NodeConfig, store: &SledStore) -> Result<String> {
    if store.load_state()?.is_some() {
        bail!("ledger already initialised at {}", config.db_path().display());
    }
    let owner = config
        .owner
        .context("owner must be configured to initialise a ledger (LOYALTY_OWNER)")?;

    let state = LedgerState::new(owner, config.distribution_currency.clone());
    store.commit(&state, &[])?;
    store.flush()?;

    info!(target: "node", "Initialised ledger owned by {}", owner);
    Ok(format!(
        "Initialised ledger at {} (owner {}, distribution currency {})",
        config.db_path().display(),
        owner,
        config.distribution_currency
    ))
}

/// Reads only the requested tail of the log.
fn print_events(store: &SledStore, tail: Option<usize>) -> Result<String> {
    let total = store.event_count()?;
    let offset = tail.map_or(0, |n| total.saturating_sub(n as u64));
    let lines = store
        .load_events_since(offset)?
        .iter()
        .map(serde_json::to_string)
        .collect::<serde_json::Result<Vec<_>>>()?;
    Ok(lines.join("\n"))
}

fn apply(config: &NodeConfig, engine: &PointsEngine, command: Command) -> Result<String> {
    match command {
        Command::Init | Command::Events { .. } => {
            unreachable!("handled before the engine is loaded")
        }
        Command::Balance { account } => Ok(engine.balance_of(&account).to_string()),
        Command::Status => Ok(serde_json::to_string_pretty(&engine.status()?)?),
        command => {
            let operator = config.acting_account()?;
            mutate(engine, &operator, command)
        }
    }
}

fn mutate(engine: &PointsEngine, operator: &AccountId, command: Command) -> Result<String> {
    let message = match command {
        Command::DeclareCaller { module } => {
            if engine.declare_caller(operator, module)? {
                format!("Declared {module}")
            } else {
                format!("{module} was already declared")
            }
        }
        Command::UndeclareCaller { module } => {
            if engine.undeclare_caller(operator, &module)? {
                format!("Undeclared {module}")
            } else {
                format!("{module} was not declared")
            }
        }
        Command::SetRatio { currency, ratio } => {
            engine.set_ratio(operator, currency.clone(), ratio)?;
            format!("Ratio for {currency} set to {ratio}")
        }
        Command::Toggle { feature, enabled } => {
            match feature {
                Feature::Collecting => engine.enable_collecting(operator, enabled)?,
                Feature::Distribution => engine.enable_distribution(operator, enabled)?,
            }
            format!("{feature:?} enabled: {enabled}")
        }
        Command::SetWorker { worker } => {
            engine.set_worker(operator, worker)?;
            format!("Worker set to {worker}")
        }
        Command::SetPlayerBonus { players, percent } => {
            engine.change_player_bonus(operator, players, percent)?;
            format!("{players}-player bonus set to {percent}%")
        }
        Command::SetWearableBonus { percent } => {
            engine.change_wearable_bonus(operator, percent)?;
            format!("Wearable bonus set to {percent}% per unit")
        }
        Command::SetMaxBonus { extra } => {
            engine.change_max_combined_bonus(operator, extra)?;
            format!(
                "Combined multiplier capped at {}%",
                engine.bonus_config().max_combined_bonus
            )
        }
        Command::SetAffiliateBonus { percent } => {
            engine.change_affiliate_bonus(operator, percent)?;
            format!("Affiliate bonus set to {percent}%")
        }
        Command::SetDistributionCurrency { currency } => {
            engine.change_distribution_currency(operator, currency.clone())?;
            format!("Distribution currency set to {currency}")
        }
        Command::AssignAffiliate { referred, referrer } => {
            match engine.assign_affiliate(operator, referred, referrer)? {
                Some(previous) => format!("Referrer of {referred} changed from {previous} to {referrer}"),
                None => format!("Referrer of {referred} set to {referrer}"),
            }
        }
        Command::Accrue {
            beneficiary,
            currency,
            amount,
            caller,
            players,
            wearables,
        } => {
            let caller = caller.unwrap_or(*operator);
            let request = AccrualRequest::new(beneficiary, currency, amount)
                .with_players(players)
                .with_wearables(wearables);
            match engine.accrue(&caller, request)? {
                AccrualOutcome::Credited(receipt) => format!(
                    "Credited {} points to {} at {}%",
                    receipt.points, receipt.beneficiary, receipt.bonus.multiplier
                ),
                AccrualOutcome::Skipped(reason) => format!("Nothing credited: {reason:?}"),
            }
        }
        Command::Init | Command::Balance { .. } | Command::Status | Command::Events { .. } => {
            unreachable!("read-only commands are handled by apply")
        }
    };
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> NodeConfig {
        NodeConfig {
            data_dir: dir.path().to_path_buf(),
            operator: None,
            owner: Some(AccountId::from_label("owner")),
            distribution_currency: CurrencyId::new("MANA").unwrap(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }

    fn mana() -> CurrencyId {
        CurrencyId::new("MANA").unwrap()
    }

    #[test]
    fn commands_require_init() {
        let dir = TempDir::new().expect("temp dir");
        let err = execute(&test_config(&dir), Command::Status).unwrap_err();
        assert!(err.to_string().contains("not initialised"));
    }

    #[test]
    fn init_only_once() {
        let dir = TempDir::new().expect("temp dir");
        let config = test_config(&dir);
        execute(&config, Command::Init).unwrap();
        assert!(execute(&config, Command::Init).is_err());
    }

    #[test]
    fn accrual_persists_between_commands() {
        let dir = TempDir::new().expect("temp dir");
        let config = test_config(&dir);
        let slots = AccountId::from_label("slots");
        let player = AccountId::from_label("player");

        execute(&config, Command::Init).unwrap();
        execute(&config, Command::DeclareCaller { module: slots }).unwrap();
        execute(
            &config,
            Command::SetRatio {
                currency: mana(),
                ratio: 150,
            },
        )
        .unwrap();
        let output = execute(
            &config,
            Command::Accrue {
                beneficiary: player,
                currency: mana(),
                amount: 15_000,
                caller: Some(slots),
                players: 4,
                wearables: 0,
            },
        )
        .unwrap();
        assert!(output.contains("130 points"), "unexpected output: {output}");

        let balance = execute(&config, Command::Balance { account: player }).unwrap();
        assert_eq!(balance, "130");

        let events = execute(&config, Command::Events { tail: Some(1) }).unwrap();
        assert!(events.contains("PointsAccrued"));
        assert_eq!(events.lines().count(), 1);

        // Each session appends after what is stored, without repeats.
        let all = execute(&config, Command::Events { tail: None }).unwrap();
        let names: Vec<_> = all
            .lines()
            .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap()["event"].clone())
            .collect();
        assert_eq!(names, vec!["CallerDeclared", "RatioSet", "PointsAccrued"]);
    }

    #[test]
    fn non_owner_operator_is_refused() {
        let dir = TempDir::new().expect("temp dir");
        let mut config = test_config(&dir);
        execute(&config, Command::Init).unwrap();

        config.operator = Some(AccountId::from_label("intruder"));
        let err = execute(
            &config,
            Command::Toggle {
                feature: Feature::Distribution,
                enabled: true,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("owner access denied"));
    }
}
