use oro_store::{ErrorKind, RecordStore, MAX_ROWS};
use oro_types::{
    codec::{self, SheetContents},
    BankBalances, Withdrawal, WithdrawalRow,
};
use thiserror::Error;
use tracing::{info, warn};

/// Step of a push that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Encode,
    Clear,
    Append,
}

/// A failed push.
///
/// A push clears the range and then appends the encoded rows. Neither step
/// is retried or rolled back, so the phase tells what the remote looks like
/// afterwards.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The encoded ledger does not fit the store's range. Nothing was touched.
    #[error("ledger needs {rows} rows but the remote range holds {max}")]
    TooManyRows { rows: usize, max: usize },
    /// The remote is unchanged or partially cleared.
    #[error("failed to clear remote rows: {0}")]
    Clear(#[source] oro_store::Error),
    /// The remote was cleared but nothing was written back.
    #[error("remote rows cleared but not rewritten: {0}")]
    Append(#[source] oro_store::Error),
}

impl SyncError {
    pub fn phase(&self) -> Phase {
        match self {
            SyncError::TooManyRows { .. } => Phase::Encode,
            SyncError::Clear(_) => Phase::Clear,
            SyncError::Append(_) => Phase::Append,
        }
    }

    pub fn store_error(&self) -> Option<&oro_store::Error> {
        match self {
            SyncError::TooManyRows { .. } => None,
            SyncError::Clear(e) | SyncError::Append(e) => Some(e),
        }
    }

    /// Kind of the underlying store failure, if the store was reached.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.store_error().map(oro_store::Error::kind)
    }
}

/// Moves the ledger between memory and a [RecordStore].
pub struct Reconciler<S> {
    store: S,
}

impl<S: RecordStore> Reconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reads and decodes the remote rows.
    pub async fn pull(&self) -> Result<SheetContents, oro_store::Error> {
        let rows = self.store.read_all().await.inspect_err(|e| {
            warn!(error = %e, "failed to read remote rows");
        })?;
        let contents = codec::decode_sheet(&rows);
        info!(
            rows = rows.len(),
            withdrawals = contents.withdrawals.len(),
            legacy = contents.bank.is_none(),
            "pulled ledger"
        );
        Ok(contents)
    }

    /// Like [Reconciler::pull], keeping `previous` when the remote is in the
    /// legacy layout.
    pub async fn pull_into(
        &self,
        previous: &BankBalances,
    ) -> Result<(BankBalances, Vec<WithdrawalRow>), oro_store::Error> {
        let SheetContents { bank, withdrawals } = self.pull().await?;
        Ok((bank.unwrap_or_else(|| previous.clone()), withdrawals))
    }

    /// Replaces the remote contents with `bank` and `withdrawals`.
    ///
    /// Fails before touching the remote if the encoded rows would not fit in
    /// [MAX_ROWS].
    pub async fn push(&self, bank: &BankBalances, withdrawals: &[Withdrawal]) -> Result<(), SyncError> {
        let rows = codec::encode(bank, withdrawals);
        let count = rows.len();
        if count > MAX_ROWS {
            warn!(rows = count, max = MAX_ROWS, "ledger does not fit remote range");
            return Err(SyncError::TooManyRows {
                rows: count,
                max: MAX_ROWS,
            });
        }

        self.store.clear_range().await.map_err(|e| {
            warn!(error = %e, "clear failed, remote left unchanged or partially cleared");
            SyncError::Clear(e)
        })?;
        self.store.append_rows(rows).await.map_err(|e| {
            warn!(error = %e, "append failed, remote left empty");
            SyncError::Append(e)
        })?;

        info!(rows = count, withdrawals = withdrawals.len(), "pushed ledger");
        Ok(())
    }
}
