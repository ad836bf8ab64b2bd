pub mod api;
pub mod codec;

mod bank;
mod player;
mod withdrawal;

pub use bank::BankBalances;
pub use codec::{Cell, LedgerRow, Row, SheetContents};
pub use player::{Player, PlayerId, UnknownPlayer, PLAYERS};
pub use withdrawal::{
    derive_id, settlement, InvalidStatus, Withdrawal, WithdrawalRow, WithdrawalStatus,
};

/// Exchange rate used before any withdrawal has been confirmed.
pub const DEFAULT_RATE: f64 = 0.03;
