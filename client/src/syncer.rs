use crate::{Client, Result, Session};
use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How often the remote ledger is pulled.
pub const PULL_INTERVAL: Duration = Duration::from_secs(30);

/// How often unsynced withdrawals are pushed.
pub const PUSH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Keeps a [Session] and the remote ledger in step.
///
/// The session lock is only held between network calls, never across one.
#[derive(Clone)]
pub struct Syncer {
    client: Client,
    session: Arc<Mutex<Session>>,
}

impl Syncer {
    pub fn new(client: Client, session: Arc<Mutex<Session>>) -> Self {
        Self { client, session }
    }

    pub fn session(&self) -> &Arc<Mutex<Session>> {
        &self.session
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pulls and applies the remote ledger unless there are local changes
    /// it would overwrite. Returns whether it was applied.
    pub async fn pull(&self) -> Result<bool> {
        let revision = {
            let session = self.lock();
            if session.is_unsynced() {
                debug!("skipping pull, local changes not pushed");
                return Ok(false);
            }
            session.revision()
        };

        let contents = self.client.load().await?;

        let mut session = self.lock();
        if session.is_unsynced() || session.revision() != revision {
            debug!("discarding pull, session changed meanwhile");
            return Ok(false);
        }
        session.apply_remote(contents)?;
        Ok(true)
    }

    /// Pulls and applies the remote ledger, discarding local changes.
    pub async fn pull_now(&self) -> Result<()> {
        let contents = self.client.load().await?;
        self.lock().apply_remote(contents)
    }

    /// Pushes the whole local ledger.
    pub async fn push(&self) -> Result<()> {
        let (revision, snapshot) = {
            let session = self.lock();
            (session.revision(), session.ledger().snapshot())
        };

        self.client.sync(&snapshot.bank, &snapshot.withdrawals).await?;

        self.lock().mark_synced(revision)
    }

    /// Pushes if [Session::needs_push]. Returns whether it pushed.
    pub async fn push_if_needed(&self) -> Result<bool> {
        if !self.lock().needs_push() {
            return Ok(false);
        }
        self.push().await?;
        Ok(true)
    }

    /// Pulls at startup and then on [PULL_INTERVAL], pushing on
    /// [PUSH_INTERVAL], until `shutdown` resolves. Failures are logged and
    /// the next tick tries again.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        self.run_with(PULL_INTERVAL, PUSH_INTERVAL, shutdown).await
    }

    pub async fn run_with(
        &self,
        pull_every: Duration,
        push_every: Duration,
        shutdown: impl Future<Output = ()>,
    ) {
        let mut pulls = interval(pull_every);
        pulls.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pushes = interval(push_every);
        pushes.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first push tick fires immediately; wait a full period instead.
        pushes.reset();

        tokio::pin!(shutdown);
        info!(?pull_every, ?push_every, "syncing");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("sync stopped");
                    return;
                }
                _ = pulls.tick() => {
                    match self.pull().await {
                        Ok(true) => debug!("pulled remote ledger"),
                        Ok(false) => {}
                        Err(e) => warn!(error = %e, "pull failed"),
                    }
                }
                _ = pushes.tick() => {
                    match self.push_if_needed().await {
                        Ok(true) => info!("pushed local changes"),
                        Ok(false) => {}
                        Err(e) => warn!(error = %e, "push failed"),
                    }
                }
            }
        }
    }
}
