use crate::{
    storage::{LocalStorage, DATA_KEY, LAST_SYNC_KEY, UNSYNCED_KEY},
    Result,
};
use oro_execution::{Ledger, LedgerError, Snapshot, WithdrawalRequest};
use oro_types::{PlayerId, SheetContents, Withdrawal, WithdrawalStatus, DEFAULT_RATE};
use tracing::{debug, warn};

/// Display format of the last-sync slot.
const LAST_SYNC_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

/// Restores a persisted ledger, or `None` if the blob is unusable.
fn restore(blob: &str) -> Option<Snapshot> {
    match serde_json::from_str::<Snapshot>(blob) {
        Ok(mut snapshot) => {
            if !(snapshot.rate.is_finite() && snapshot.rate > 0.0) {
                snapshot.rate = DEFAULT_RATE;
            }
            Some(snapshot)
        }
        Err(e) => {
            warn!(error = %e, "ignoring malformed local ledger");
            None
        }
    }
}

/// The local copy of the ledger.
///
/// Every mutation is written through to [LocalStorage] and marks the session
/// unsynced until the next successful push or applied pull. The unsynced
/// mark is persisted too, so it survives a restart.
pub struct Session {
    storage: LocalStorage,
    ledger: Ledger,
    unsynced: bool,
    revision: u64,
    last_sync: Option<String>,
}

impl Session {
    /// Opens the session stored in `storage`, starting empty if there is none.
    pub fn open(storage: LocalStorage) -> Result<Self> {
        let ledger = storage
            .get(DATA_KEY)?
            .and_then(|blob| restore(&blob))
            .map(Ledger::from_snapshot)
            .unwrap_or_default();
        let last_sync = storage.get(LAST_SYNC_KEY)?;
        let unsynced = storage.get(UNSYNCED_KEY)?.is_some();
        debug!(
            withdrawals = ledger.withdrawals().len(),
            unsynced,
            dir = %storage.dir().display(),
            "opened session"
        );
        Ok(Self {
            storage,
            ledger,
            unsynced,
            revision: 0,
            last_sync,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// When the ledger was last pushed, as shown to the user.
    pub fn last_sync(&self) -> Option<&str> {
        self.last_sync.as_deref()
    }

    /// Whether there are local changes the remote has not seen.
    pub fn is_unsynced(&self) -> bool {
        self.unsynced
    }

    /// Whether a periodic push is due.
    pub fn needs_push(&self) -> bool {
        self.unsynced && !self.ledger.withdrawals().is_empty()
    }

    /// Counter bumped by every local mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn persist(&self) -> Result<()> {
        let blob = serde_json::to_string(&self.ledger.snapshot())?;
        self.storage.set(DATA_KEY, &blob)
    }

    fn set_unsynced(&mut self, unsynced: bool) -> Result<()> {
        if unsynced == self.unsynced {
            return Ok(());
        }
        if unsynced {
            self.storage.set(UNSYNCED_KEY, &self.revision.to_string())?;
        } else {
            self.storage.remove(UNSYNCED_KEY)?;
        }
        self.unsynced = unsynced;
        Ok(())
    }

    fn mutate<T>(&mut self, f: impl FnOnce(&mut Ledger) -> std::result::Result<T, LedgerError>) -> Result<T> {
        let value = f(&mut self.ledger)?;
        self.revision += 1;
        // Mark first, then write the ledger.
        self.set_unsynced(true)?;
        self.persist()?;
        Ok(value)
    }

    pub fn set_balance(&mut self, player: PlayerId, quantity: u64) -> Result<()> {
        self.mutate(|ledger| {
            ledger.set_balance(player, quantity);
            Ok(())
        })
    }

    pub fn set_rate(&mut self, rate: f64) -> Result<()> {
        self.mutate(|ledger| ledger.set_rate(rate))
    }

    pub fn confirm_withdrawals(&mut self, request: &WithdrawalRequest) -> Result<Vec<Withdrawal>> {
        self.mutate(|ledger| ledger.confirm_withdrawals(request))
    }

    pub fn set_status(&mut self, id: &str, status: WithdrawalStatus) -> Result<()> {
        self.mutate(|ledger| ledger.set_status(id, status))
    }

    pub fn set_player_status(&mut self, player: PlayerId, status: WithdrawalStatus) -> Result<usize> {
        self.mutate(|ledger| Ok(ledger.set_player_status(player, status)))
    }

    pub fn clear_history(&mut self) -> Result<()> {
        self.mutate(|ledger| {
            ledger.clear_history();
            Ok(())
        })
    }

    /// Replaces the local ledger with what was pulled.
    ///
    /// The bank is kept when the remote carried none (legacy layout); remote
    /// rows without a rate take the current one.
    pub fn apply_remote(&mut self, contents: SheetContents) -> Result<()> {
        let rate = self.ledger.rate();
        let bank = contents
            .bank
            .unwrap_or_else(|| self.ledger.bank().clone());
        let withdrawals = contents
            .withdrawals
            .into_iter()
            .map(|row| row.into_withdrawal(rate))
            .collect();
        self.ledger.replace(bank, withdrawals);
        self.persist()?;
        self.set_unsynced(false)
    }

    /// Records a successful push of the ledger as of `revision`.
    ///
    /// Changes made after that revision stay unsynced.
    pub fn mark_synced(&mut self, revision: u64) -> Result<()> {
        if revision == self.revision {
            self.set_unsynced(false)?;
        }
        let now = chrono::Local::now().format(LAST_SYNC_FORMAT).to_string();
        self.storage.set(LAST_SYNC_KEY, &now)?;
        self.last_sync = Some(now);
        Ok(())
    }
}
