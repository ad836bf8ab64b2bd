//! Row codec for the ledger sheet.
//!
//! The sheet is a list of 6-cell rows. The current layout stores the bank in a
//! sentinel first row, then a header, then one row per withdrawal:
//!
//! ```text
//! ["__bank__", "{\"alan\":100,...}"]
//! ["Fecha", "Nombre", "Oro", "Tasa", "USD", "Estado"]
//! ["2025-01-01T00:00:00.000Z", "Alan", 30, "0.03", 0.9, "pendiente"]
//! ```
//!
//! Sheets written before the bank row existed start directly with the header.
//! Decoding never fails: malformed cells degrade to defaults.

use crate::{BankBalances, PlayerId, Withdrawal, WithdrawalRow};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::{debug, warn};

/// First cell of the row carrying the bank balances.
pub const SENTINEL: &str = "__bank__";

/// Cells per row.
pub const ROW_WIDTH: usize = 6;

pub const HEADER: [&str; ROW_WIDTH] = ["Fecha", "Nombre", "Oro", "Tasa", "USD", "Estado"];

/// A single sheet cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
}

pub type Row = Vec<Cell>;

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Non-empty textual content, if any.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Cell::Text(s) if s.is_empty() => None,
            Cell::Text(s) => Some(Cow::Borrowed(s)),
            Cell::Number(n) if *n == 0.0 || n.is_nan() => None,
            Cell::Number(n) => Some(Cow::Owned(n.to_string())),
        }
    }

    /// Numeric content; anything that is not a finite number reads as 0.
    pub fn as_number(&self) -> f64 {
        let value = match self {
            Cell::Number(n) => *n,
            Cell::Text(s) => s.trim().parse().unwrap_or(0.0),
        };
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }

    /// Numeric content as a whole, non-negative quantity.
    pub fn as_quantity(&self) -> u64 {
        let value = self.as_number();
        if value > 0.0 {
            value.trunc() as u64
        } else {
            0
        }
    }
}

impl From<serde_json::Value> for Cell {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => Cell::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Cell::Text(s),
            serde_json::Value::Null => Cell::Text(String::new()),
            serde_json::Value::Bool(b) => Cell::Text(if b { "TRUE" } else { "FALSE" }.to_string()),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// A sheet row with its role made explicit.
#[derive(Clone, Debug, PartialEq)]
pub enum LedgerRow {
    Sentinel(BankBalances),
    Header,
    Record(WithdrawalRow),
}

impl LedgerRow {
    pub fn to_cells(&self) -> Row {
        let mut cells = match self {
            LedgerRow::Sentinel(bank) => vec![Cell::text(SENTINEL), Cell::text(bank.to_json())],
            LedgerRow::Header => HEADER.iter().map(|h| Cell::text(*h)).collect(),
            LedgerRow::Record(record) => vec![
                Cell::text(record.date.clone().unwrap_or_default()),
                Cell::text(record.name.clone().unwrap_or_default()),
                Cell::Number(record.quantity as f64),
                // Written as text so the sheet does not round it.
                Cell::text(record.rate.to_string()),
                Cell::Number(record.amount),
                Cell::text(record.status.clone().unwrap_or_default()),
            ],
        };
        cells.resize(ROW_WIDTH, Cell::text(""));
        cells
    }
}

/// Everything a sheet holds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SheetContents {
    /// `None` for sheets in the legacy layout.
    pub bank: Option<BankBalances>,
    pub withdrawals: Vec<WithdrawalRow>,
}

fn is_sentinel(row: &[Cell]) -> bool {
    matches!(row.first(), Some(Cell::Text(s)) if s == SENTINEL)
}

/// Parses the sentinel's JSON cell, degrading to an empty bank on any error.
fn parse_bank(cell: Option<&Cell>) -> BankBalances {
    let text = cell
        .and_then(Cell::as_text)
        .unwrap_or(Cow::Borrowed("{}"));
    let object = match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&text) {
        Ok(object) => object,
        Err(e) => {
            warn!(error = %e, "malformed bank row, using empty bank");
            return BankBalances::default();
        }
    };

    let mut bank = BankBalances::default();
    for (key, value) in object {
        let Ok(player) = key.parse::<PlayerId>() else {
            debug!(key = %key, "ignoring unknown player in bank row");
            continue;
        };
        let quantity = match value {
            serde_json::Value::Number(n) => Cell::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Cell::Text(s),
            _ => Cell::Number(0.0),
        }
        .as_quantity();
        bank.set(player, quantity);
    }
    bank
}

fn cell(row: &[Cell], index: usize) -> Option<&Cell> {
    row.get(index)
}

fn record(row: &[Cell]) -> WithdrawalRow {
    let text = |i| cell(row, i).and_then(Cell::as_text).map(Cow::into_owned);
    let number = |i| cell(row, i).map(Cell::as_number).unwrap_or(0.0);
    WithdrawalRow {
        date: text(0),
        name: text(1),
        quantity: cell(row, 2).map(Cell::as_quantity).unwrap_or(0),
        rate: number(3),
        amount: number(4),
        status: text(5),
    }
}

/// Tags every row with its role. Total: any input classifies.
pub fn classify(rows: &[Row]) -> Vec<LedgerRow> {
    let mut tagged = Vec::with_capacity(rows.len());
    let mut rest = rows.iter();
    match rest.next() {
        None => return tagged,
        Some(first) if is_sentinel(first) => {
            tagged.push(LedgerRow::Sentinel(parse_bank(first.get(1))));
            if rest.next().is_some() {
                tagged.push(LedgerRow::Header);
            }
        }
        Some(_) => tagged.push(LedgerRow::Header),
    }
    tagged.extend(rest.map(|row| LedgerRow::Record(record(row))));
    tagged
}

/// Decodes a sheet, reporting whether it carried a bank row.
pub fn decode_sheet(rows: &[Row]) -> SheetContents {
    let mut contents = SheetContents::default();
    for row in classify(rows) {
        match row {
            LedgerRow::Sentinel(bank) => contents.bank = Some(bank),
            LedgerRow::Header => {}
            LedgerRow::Record(record) => contents.withdrawals.push(record),
        }
    }
    contents
}

/// Decodes a sheet, keeping `previous` when the sheet has no bank row.
pub fn decode(rows: &[Row], previous: &BankBalances) -> (BankBalances, Vec<WithdrawalRow>) {
    let SheetContents { bank, withdrawals } = decode_sheet(rows);
    (bank.unwrap_or_else(|| previous.clone()), withdrawals)
}

/// Encodes the bank and withdrawals in the current (sentinel) layout.
pub fn encode(bank: &BankBalances, withdrawals: &[Withdrawal]) -> Vec<Row> {
    let mut rows = Vec::with_capacity(withdrawals.len() + 2);
    rows.push(LedgerRow::Sentinel(bank.clone()).to_cells());
    rows.push(LedgerRow::Header.to_cells());
    rows.extend(
        withdrawals
            .iter()
            .map(|w| LedgerRow::Record(WithdrawalRow::from(w)).to_cells()),
    );
    rows
}
