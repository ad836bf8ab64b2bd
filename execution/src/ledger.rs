use chrono::{SecondsFormat, Utc};
use oro_types::{
    BankBalances, PlayerId, Withdrawal, WithdrawalStatus, DEFAULT_RATE, PLAYERS,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

/// Current time as an RFC 3339 UTC timestamp with millisecond precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn default_rate() -> f64 {
    DEFAULT_RATE
}

/// Rejected ledger operations. None of them mutate state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("nothing to withdraw: request at least one quantity above zero")]
    EmptyRequest,
    #[error("invalid rate: {0} (must be a positive number)")]
    InvalidRate(f64),
    #[error("not enough oro in the bank for {}: available {available}, requested {requested}", .player.name())]
    InsufficientBalance {
        player: PlayerId,
        available: u64,
        requested: u64,
    },
    #[error("unknown withdrawal: {0}")]
    UnknownWithdrawal(String),
}

/// A batch of withdrawals confirmed together at one rate.
#[derive(Clone, Debug, PartialEq)]
pub struct WithdrawalRequest {
    pub rate: f64,
    pub quantities: BTreeMap<PlayerId, u64>,
}

impl WithdrawalRequest {
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            quantities: BTreeMap::new(),
        }
    }

    pub fn with(mut self, player: PlayerId, quantity: u64) -> Self {
        self.quantities.insert(player, quantity);
        self
    }

    fn quantity(&self, player: PlayerId) -> u64 {
        self.quantities.get(&player).copied().unwrap_or(0)
    }
}

/// Everything the ledger holds, in the shape it is persisted locally.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub withdrawals: Vec<Withdrawal>,
    #[serde(rename = "oroBanco", default)]
    pub bank: BankBalances,
    #[serde(rename = "tasaOroUsd", default = "default_rate")]
    pub rate: f64,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            withdrawals: Vec::new(),
            bank: BankBalances::default(),
            rate: DEFAULT_RATE,
        }
    }
}

/// Bank balances plus withdrawal history, newest first.
///
/// All mutation goes through the methods below; a rejected operation leaves
/// the ledger untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ledger {
    state: Snapshot,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self { state: snapshot }
    }

    pub fn bank(&self) -> &BankBalances {
        &self.state.bank
    }

    pub fn withdrawals(&self) -> &[Withdrawal] {
        &self.state.withdrawals
    }

    /// Rate offered for the next withdrawal.
    pub fn rate(&self) -> f64 {
        self.state.rate
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.clone()
    }

    /// Replaces the whole ledger, e.g. with what was pulled from the sheet.
    pub fn apply(&mut self, snapshot: Snapshot) {
        self.state = snapshot;
    }

    /// Replaces bank and history, keeping the current rate.
    pub fn replace(&mut self, bank: BankBalances, withdrawals: Vec<Withdrawal>) {
        self.state.bank = bank;
        self.state.withdrawals = withdrawals;
    }

    /// Manual edit of a player's bank balance.
    pub fn set_balance(&mut self, player: PlayerId, quantity: u64) {
        self.state.bank.set(player, quantity);
    }

    pub fn set_rate(&mut self, rate: f64) -> Result<(), LedgerError> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(LedgerError::InvalidRate(rate));
        }
        self.state.rate = rate;
        Ok(())
    }

    /// Confirms a batch of withdrawals stamped with the current time.
    pub fn confirm_withdrawals(
        &mut self,
        request: &WithdrawalRequest,
    ) -> Result<Vec<Withdrawal>, LedgerError> {
        self.confirm_withdrawals_at(request, &timestamp())
    }

    /// Confirms a batch of withdrawals, all or nothing.
    ///
    /// Every requested quantity is checked against its player's balance
    /// before anything changes. On success the balances are debited, one
    /// pending withdrawal per player is prepended to the history, and the
    /// applied rate becomes the current rate.
    pub fn confirm_withdrawals_at(
        &mut self,
        request: &WithdrawalRequest,
        date: &str,
    ) -> Result<Vec<Withdrawal>, LedgerError> {
        if !(request.rate.is_finite() && request.rate > 0.0) {
            return Err(LedgerError::InvalidRate(request.rate));
        }
        if request.quantities.values().all(|q| *q == 0) {
            return Err(LedgerError::EmptyRequest);
        }
        for player in PLAYERS {
            let requested = request.quantity(player.id);
            let available = self.state.bank.get(player.id);
            if requested > available {
                return Err(LedgerError::InsufficientBalance {
                    player: player.id,
                    available,
                    requested,
                });
            }
        }

        let mut bank = self.state.bank.clone();
        let mut created = Vec::new();
        for player in PLAYERS {
            let quantity = request.quantity(player.id);
            if quantity == 0 {
                continue;
            }
            if bank.withdraw(player.id, quantity).is_none() {
                // Checked above.
                return Err(LedgerError::InsufficientBalance {
                    player: player.id,
                    available: bank.get(player.id),
                    requested: quantity,
                });
            }
            created.push(Withdrawal::new(player.id, quantity, request.rate, date));
        }

        info!(
            withdrawals = created.len(),
            rate = request.rate,
            "confirmed withdrawals"
        );
        self.state.bank = bank;
        self.state.rate = request.rate;
        self.state.withdrawals.splice(0..0, created.iter().cloned());
        Ok(created)
    }

    /// Sets the status of the withdrawal with `id`.
    pub fn set_status(&mut self, id: &str, status: WithdrawalStatus) -> Result<(), LedgerError> {
        let mut found = false;
        for withdrawal in self.state.withdrawals.iter_mut().filter(|w| w.id == id) {
            withdrawal.status = status;
            found = true;
        }
        if !found {
            return Err(LedgerError::UnknownWithdrawal(id.to_string()));
        }
        Ok(())
    }

    /// Sets the status of every withdrawal of `player`, returning how many
    /// there were.
    pub fn set_player_status(&mut self, player: PlayerId, status: WithdrawalStatus) -> usize {
        let mut updated = 0;
        for withdrawal in self
            .state
            .withdrawals
            .iter_mut()
            .filter(|w| w.player == Some(player))
        {
            withdrawal.status = status;
            updated += 1;
        }
        updated
    }

    /// Drops the whole withdrawal history. Bank balances are untouched.
    pub fn clear_history(&mut self) {
        self.state.withdrawals.clear();
    }

    pub fn total_bank(&self) -> u64 {
        self.state.bank.total()
    }

    /// Settlement still owed to `player`.
    pub fn pending_usd(&self, player: PlayerId) -> f64 {
        self.state
            .withdrawals
            .iter()
            .filter(|w| w.is_pending() && w.player == Some(player))
            .map(|w| w.amount)
            .sum()
    }

    pub fn has_pending(&self, player: PlayerId) -> bool {
        self.state
            .withdrawals
            .iter()
            .any(|w| w.is_pending() && w.player == Some(player))
    }

    /// Settlement still owed across every pending withdrawal.
    pub fn total_pending_usd(&self) -> f64 {
        self.state
            .withdrawals
            .iter()
            .filter(|w| w.is_pending())
            .map(|w| w.amount)
            .sum()
    }
}
