use crate::PlayerId;
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WithdrawalStatus {
    #[default]
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "pagado")]
    Paid,
}

impl WithdrawalStatus {
    /// Value stored in the sheet's status column.
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pendiente",
            WithdrawalStatus::Paid => "pagado",
        }
    }

    /// Parses a stored status; anything unrecognized is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pendiente" => Some(WithdrawalStatus::Pending),
            "pagado" => Some(WithdrawalStatus::Paid),
            _ => None,
        }
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid status: {0} (expected paid or pending)")]
pub struct InvalidStatus(pub String);

impl FromStr for WithdrawalStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "pendiente" => Ok(WithdrawalStatus::Pending),
            "paid" | "pagado" => Ok(WithdrawalStatus::Paid),
            _ => Err(InvalidStatus(s.to_string())),
        }
    }
}

/// Settlement amount owed for `quantity` oro at `rate`.
pub fn settlement(quantity: u64, rate: f64) -> f64 {
    quantity as f64 * rate
}

/// Withdrawal identity: creation timestamp followed by the player's name.
///
/// Both halves are stored in the sheet, so a decoded row gets back the id it
/// was created with.
pub fn derive_id(date: &str, name: &str) -> String {
    format!("{date}{name}")
}

/// Reads an absent or `null` field as its default. Rows loaded from a sheet
/// with blank cells come back with `null`s.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A confirmed conversion of bank oro into the settlement currency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    #[serde(default)]
    pub id: String,
    /// `None` when a remote row names someone outside the roster.
    #[serde(rename = "playerId", default, skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerId>,
    #[serde(rename = "nombre", default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "oro")]
    pub quantity: u64,
    #[serde(rename = "tasa")]
    pub rate: f64,
    #[serde(rename = "usd")]
    pub amount: f64,
    #[serde(rename = "fecha", default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(rename = "estado", default, deserialize_with = "null_as_default")]
    pub status: WithdrawalStatus,
}

impl Withdrawal {
    /// Creates a pending withdrawal, fixing its amount at `rate`.
    pub fn new(player: PlayerId, quantity: u64, rate: f64, date: impl Into<String>) -> Self {
        let date = date.into();
        let name = player.name().to_string();
        Self {
            id: derive_id(&date, &name),
            player: Some(player),
            name,
            quantity,
            rate,
            amount: settlement(quantity, rate),
            date,
            status: WithdrawalStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == WithdrawalStatus::Pending
    }
}

/// A withdrawal record as read back from the sheet, before it is typed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRow {
    #[serde(rename = "fecha")]
    pub date: Option<String>,
    #[serde(rename = "nombre")]
    pub name: Option<String>,
    #[serde(rename = "oro")]
    pub quantity: u64,
    #[serde(rename = "tasa")]
    pub rate: f64,
    #[serde(rename = "usd")]
    pub amount: f64,
    #[serde(rename = "estado")]
    pub status: Option<String>,
}

impl WithdrawalRow {
    /// Types the row. A zero rate falls back to `default_rate`; a missing or
    /// unrecognized status reads as pending.
    pub fn into_withdrawal(self, default_rate: f64) -> Withdrawal {
        let date = self.date.unwrap_or_default();
        let name = self.name.unwrap_or_default();
        let rate = if self.rate == 0.0 {
            default_rate
        } else {
            self.rate
        };
        let status = self
            .status
            .as_deref()
            .and_then(WithdrawalStatus::parse)
            .unwrap_or_default();
        Withdrawal {
            id: derive_id(&date, &name),
            player: PlayerId::from_name(&name),
            name,
            quantity: self.quantity,
            rate,
            amount: self.amount,
            date,
            status,
        }
    }
}

impl From<&Withdrawal> for WithdrawalRow {
    fn from(withdrawal: &Withdrawal) -> Self {
        Self {
            date: Some(withdrawal.date.clone()),
            name: Some(withdrawal.name.clone()),
            quantity: withdrawal.quantity,
            rate: withdrawal.rate,
            amount: withdrawal.amount,
            status: Some(withdrawal.status.as_str().to_string()),
        }
    }
}
