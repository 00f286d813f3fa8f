use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    account::AccountId,
    command::LedgerCommand,
    config::InstanceId,
    ledger::{Effect, ErrorKind, EscrowLedger, LedgerError},
    project::ProjectId,
    projection::{LedgerSnapshot, ReadProjection},
};

pub mod substrate;

use substrate::{Substrate, SubstrateError};

/// The state a command is serialized against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Entity {
    Account(AccountId),
    Project(ProjectId),
    Ledger(InstanceId),
}

impl Entity {
    pub fn of(caller: &AccountId, command: &LedgerCommand, ledger: &InstanceId) -> Self {
        match command {
            LedgerCommand::Mint { .. } | LedgerCommand::Approve { .. } => {
                Entity::Account(caller.clone())
            }
            LedgerCommand::CreateProject { .. } => Entity::Ledger(ledger.clone()),
            LedgerCommand::Contribute { project_id, .. }
            | LedgerCommand::Withdraw { project_id, .. } => Entity::Project(*project_id),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Account(id) => write!(f, "account:{id}"),
            Entity::Project(id) => write!(f, "project:{id}"),
            Entity::Ledger(id) => write!(f, "ledger:{id}"),
        }
    }
}

/// Identifies one logical operation. Submitting the same key twice never
/// applies it twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey {
    pub caller: AccountId,
    pub entity: Entity,
    pub nonce: u64,
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.caller, self.entity, self.nonce)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Substrate(#[from] SubstrateError),
    #[error("Key {key} already identifies a different command")]
    KeyReused { key: IdempotencyKey },
}

impl TransactionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransactionError::Ledger(err) => err.kind(),
            TransactionError::Substrate(SubstrateError::Unavailable(_)) => ErrorKind::Unavailable,
            TransactionError::KeyReused { .. } => ErrorKind::Validation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied(Effect),
    Rejected(TransactionError),
    /// No confirmation was observed. The operation may or may not have landed.
    Indeterminate,
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn effect(&self) -> Option<&Effect> {
        match self {
            Outcome::Applied(effect) => Some(effect),
            _ => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Outcome::Applied(_) => None,
            Outcome::Rejected(err) => Some(err.kind()),
            Outcome::Indeterminate => Some(ErrorKind::Indeterminate),
        }
    }
}

/// Caller side of a submission. Dropping it only stops the caller's wait,
/// the submission itself runs to completion.
#[derive(Debug)]
pub struct SubmissionHandle {
    key: IdempotencyKey,
    rx: watch::Receiver<Option<Outcome>>,
}

impl SubmissionHandle {
    pub fn key(&self) -> &IdempotencyKey {
        &self.key
    }

    /// Terminal outcome, if one has been reached yet.
    pub fn poll(&self) -> Option<Outcome> {
        self.rx.borrow().clone()
    }

    pub async fn wait(mut self) -> Outcome {
        let outcome = match self.rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone(),
            // the submission task went away without reporting
            Err(_) => None,
        };
        outcome.unwrap_or(Outcome::Indeterminate)
    }

    pub async fn wait_timeout(self, timeout: Duration) -> Outcome {
        tokio::time::timeout(timeout, self.wait())
            .await
            .unwrap_or(Outcome::Indeterminate)
    }
}

/// Serializes commands against the escrow ledger.
///
/// A submission first awaits confirmation from the substrate, holding no
/// lock, and is then applied in one short critical section together with
/// publishing the resulting snapshot. Effects therefore land in
/// confirmation order, and no reader ever observes half of one.
#[derive(Clone)]
pub struct Sequencer {
    inner: Arc<Inner>,
}

struct Submission {
    command: LedgerCommand,
    rx: watch::Receiver<Option<Outcome>>,
}

struct Inner {
    instance: InstanceId,
    ledger: Mutex<EscrowLedger>,
    substrate: Arc<dyn Substrate>,
    /// In-flight and applied keys. Applied ones stay until `Sequencer::forget`
    /// drops them, so a long-running sequencer grows with every applied key.
    submissions: Mutex<HashMap<IdempotencyKey, Submission>>,
    snapshots: watch::Sender<Arc<LedgerSnapshot>>,
    confirmation_timeout: Duration,
}

impl Sequencer {
    pub fn new(
        ledger: EscrowLedger,
        substrate: Arc<dyn Substrate>,
        confirmation_timeout: Duration,
    ) -> Self {
        let (snapshots, _) = watch::channel(Arc::new(LedgerSnapshot::capture(&ledger)));
        Self {
            inner: Arc::new(Inner {
                instance: ledger.instance().clone(),
                ledger: Mutex::new(ledger),
                substrate,
                submissions: Mutex::new(HashMap::new()),
                snapshots,
                confirmation_timeout,
            }),
        }
    }

    pub fn projection(&self) -> ReadProjection {
        ReadProjection::new(self.inner.snapshots.subscribe())
    }

    pub fn confirmation_timeout(&self) -> Duration {
        self.inner.confirmation_timeout
    }

    pub fn instance(&self) -> &InstanceId {
        &self.inner.instance
    }

    /// Submits `command` on behalf of `caller`. If the same logical operation
    /// is already in flight or applied, the returned handle follows that one.
    /// A key that comes back with a different command is rejected at once.
    ///
    /// # Panics
    ///
    /// If called outside of a tokio runtime
    pub fn submit(
        &self,
        caller: AccountId,
        nonce: u64,
        command: LedgerCommand,
    ) -> SubmissionHandle {
        let key = IdempotencyKey {
            entity: Entity::of(&caller, &command, &self.inner.instance),
            caller,
            nonce,
        };

        let mut submissions = self.inner.submissions.lock();
        if let Some(existing) = submissions.get(&key) {
            if existing.command != command {
                warn!(%key, ?command, original = ?existing.command, "key reused");
                let err = TransactionError::KeyReused { key: key.clone() };
                let (_, rx) = watch::channel(Some(Outcome::Rejected(err)));
                return SubmissionHandle { key, rx };
            }
            debug!(%key, "resubmission follows the existing operation");
            return SubmissionHandle {
                key,
                rx: existing.rx.clone(),
            };
        }
        let (tx, rx) = watch::channel(None);
        submissions.insert(
            key.clone(),
            Submission {
                command: command.clone(),
                rx: rx.clone(),
            },
        );
        drop(submissions);

        debug!(%key, ?command, "submitted");
        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        tokio::spawn(async move { inner.run(task_key, command, tx).await });
        SubmissionHandle { key, rx }
    }

    /// Drops an applied key, returns whether one was dropped. A later
    /// submission under the same key is treated as a new operation. Keys
    /// still in flight are kept.
    pub fn forget(&self, key: &IdempotencyKey) -> bool {
        let mut submissions = self.inner.submissions.lock();
        let settled = submissions
            .get(key)
            .is_some_and(|submission| submission.rx.borrow().is_some());
        if settled {
            submissions.remove(key);
            debug!(%key, "forgotten");
        }
        settled
    }

    /// Submits and waits up to the configured confirmation timeout.
    pub async fn execute(&self, caller: AccountId, nonce: u64, command: LedgerCommand) -> Outcome {
        self.submit(caller, nonce, command)
            .wait_timeout(self.inner.confirmation_timeout)
            .await
    }
}

impl Inner {
    async fn run(
        self: Arc<Self>,
        key: IdempotencyKey,
        command: LedgerCommand,
        tx: watch::Sender<Option<Outcome>>,
    ) {
        let outcome = match self.substrate.confirm(&key).await {
            Ok(()) => self.apply(&key, &command),
            Err(err) => {
                warn!(%key, %err, "submission not confirmed");
                Outcome::Rejected(err.into())
            }
        };
        if !outcome.is_applied() {
            // forget rejections so a remedied retry is evaluated again
            self.submissions.lock().remove(&key);
        }
        tx.send_replace(Some(outcome));
    }

    fn apply(&self, key: &IdempotencyKey, command: &LedgerCommand) -> Outcome {
        let mut ledger = self.ledger.lock();
        match ledger.process(&key.caller, command) {
            Ok(effect) => {
                self.snapshots
                    .send_replace(Arc::new(LedgerSnapshot::capture(&ledger)));
                debug!(%key, ?effect, version = ledger.version(), "applied");
                Outcome::Applied(effect)
            }
            Err(err) => {
                debug!(%key, %err, "rejected");
                Outcome::Rejected(err.into())
            }
        }
    }
}
