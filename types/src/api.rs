//! Request and response bodies of the ledger HTTP API.

use crate::{BankBalances, SheetContents, Withdrawal, WithdrawalRow};
use serde::{Deserialize, Serialize};

/// The only action `POST /sync` accepts.
pub const SYNC_ACTION: &str = "sync";

/// Body of `GET /load`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<WithdrawalRow>,
    /// Absent when the sheet predates the bank row.
    #[serde(rename = "oroBanco", default, skip_serializing_if = "Option::is_none")]
    pub bank: Option<BankBalances>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LoadResponse {
    pub fn ok(contents: SheetContents) -> Self {
        Self {
            success: true,
            data: contents.withdrawals,
            bank: contents.bank,
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Vec::new(),
            bank: None,
            message: Some(message.into()),
        }
    }
}

/// Body of `POST /sync`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub action: String,
    #[serde(default)]
    pub withdrawals: Vec<Withdrawal>,
    #[serde(rename = "oroBanco", default)]
    pub bank: Option<BankBalances>,
}

impl SyncRequest {
    pub fn new(bank: BankBalances, withdrawals: Vec<Withdrawal>) -> Self {
        Self {
            action: SYNC_ACTION.to_string(),
            withdrawals,
            bank: Some(bank),
        }
    }
}

/// Pass/fail envelope returned by `POST /sync` and by failed requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Status {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}
