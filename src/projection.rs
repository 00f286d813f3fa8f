use std::{collections::HashMap, sync::Arc};

use tokio::sync::watch;

use crate::{
    account::{Account, AccountId, Amount},
    ledger::{EscrowLedger, LedgerError},
    project::{Project, ProjectId},
};

/// Point-in-time view of the ledger, taken between two mutations.
///
/// Projects and accounts are shared with the ledger and only cloned by the
/// ledger when it next writes to them. Capturing still copies one pointer per
/// project and per account, so publishing is linear in the number of entries.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    version: u64,
    projects: Vec<Arc<Project>>,
    accounts: HashMap<AccountId, Arc<Account>>,
}

impl LedgerSnapshot {
    pub fn capture(ledger: &EscrowLedger) -> Self {
        Self {
            version: ledger.version(),
            projects: ledger.projects().to_vec(),
            accounts: ledger.registry().accounts().clone(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn num_projects(&self) -> usize {
        self.projects.len()
    }

    /// All projects in creation order.
    pub fn projects(&self) -> &[Arc<Project>] {
        &self.projects
    }

    pub fn project(&self, project_id: ProjectId) -> Result<&Project, LedgerError> {
        usize::try_from(project_id)
            .ok()
            .and_then(|index| self.projects.get(index))
            .map(Arc::as_ref)
            .ok_or(LedgerError::UnknownProject(project_id))
    }

    pub fn get_balance(&self, project_id: ProjectId) -> Result<Amount, LedgerError> {
        self.project(project_id).map(Project::balance)
    }

    pub fn goal_reached(&self, project_id: ProjectId) -> Result<bool, LedgerError> {
        self.project(project_id).map(Project::goal_reached)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, &Account)> {
        self.accounts.iter().map(|(id, acc)| (id, acc.as_ref()))
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.accounts.get(account).map_or(0, |acc| acc.balance())
    }

    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.accounts
            .get(owner)
            .map_or(0, |acc| acc.allowance(spender))
    }
}

/// Read side of the sequencer. Every snapshot it hands out was published in
/// the same critical section that applied the mutation, and before that
/// mutation's outcome was delivered, so an `Applied` caller always reads
/// its own write.
#[derive(Debug, Clone)]
pub struct ReadProjection {
    rx: watch::Receiver<Arc<LedgerSnapshot>>,
}

impl ReadProjection {
    pub(crate) fn new(rx: watch::Receiver<Arc<LedgerSnapshot>>) -> Self {
        Self { rx }
    }

    /// Use one snapshot for several reads that must agree with each other.
    pub fn snapshot(&self) -> Arc<LedgerSnapshot> {
        Arc::clone(&self.rx.borrow())
    }

    pub fn num_projects(&self) -> usize {
        self.rx.borrow().num_projects()
    }

    pub fn project(&self, project_id: ProjectId) -> Result<Project, LedgerError> {
        self.rx.borrow().project(project_id).cloned()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.rx
            .borrow()
            .projects()
            .iter()
            .map(|project| Project::clone(project))
            .collect()
    }

    pub fn get_balance(&self, project_id: ProjectId) -> Result<Amount, LedgerError> {
        self.rx.borrow().get_balance(project_id)
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.rx.borrow().balance_of(account)
    }

    /// Waits for the next published snapshot. Returns the current one right
    /// away if the sequencer is gone.
    pub async fn changed(&mut self) -> Arc<LedgerSnapshot> {
        // a closed channel means no further snapshots will ever arrive
        let _ = self.rx.changed().await;
        Arc::clone(&self.rx.borrow_and_update())
    }

    /// Waits until the ledger has applied at least `version` mutations.
    pub async fn wait_for_version(&mut self, version: u64) -> Arc<LedgerSnapshot> {
        if let Ok(snapshot) = self.rx.wait_for(|snapshot| snapshot.version() >= version).await {
            return Arc::clone(&snapshot);
        }
        self.snapshot()
    }
}
