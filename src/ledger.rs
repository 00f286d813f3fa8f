use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::{
    account::{AccountError, AccountId, Amount},
    clock::{Clock, Timestamp},
    command::LedgerCommand,
    config::{InstanceId, LedgerConfig},
    project::{Project, ProjectError, ProjectId},
    registry::TokenRegistry,
};

/// Coarse classification of a failure, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input, never worth retrying as is
    Validation,
    /// Caller is not allowed to perform the operation
    Authorization,
    /// Allowance, balance or project funds do not cover the amount.
    /// Retry once the precondition is remedied.
    Insufficient,
    /// No confirmation arrived in time. Re-query state before resubmitting.
    Indeterminate,
    /// The value-transfer substrate could not be reached
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Deadline {deadline} is not in the future (now {now})")]
    InvalidDeadline { deadline: Timestamp, now: Timestamp },
    #[error("Goal must be greater than zero")]
    InvalidGoal,
    #[error("Title must not be empty")]
    InvalidTitle,
    #[error("Project {0} does not exist")]
    UnknownProject(ProjectId),
    #[error("{0} is the ledger's custodial account and cannot act as a caller")]
    CustodyCaller(AccountId),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Account(#[from] AccountError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidDeadline { .. }
            | LedgerError::InvalidGoal
            | LedgerError::InvalidTitle
            | LedgerError::UnknownProject(_)
            | LedgerError::Project(ProjectError::InvalidAmount)
            | LedgerError::Project(ProjectError::DeadlinePassed { .. })
            | LedgerError::Project(ProjectError::BalanceOverflow { .. })
            | LedgerError::Account(AccountError::InvalidAmount)
            | LedgerError::Account(AccountError::BalanceOverflow { .. }) => ErrorKind::Validation,
            LedgerError::CustodyCaller(_) | LedgerError::Project(ProjectError::NotOwner { .. }) => {
                ErrorKind::Authorization
            }
            LedgerError::Project(ProjectError::InsufficientFunds { .. })
            | LedgerError::Account(AccountError::InsufficientAllowance { .. })
            | LedgerError::Account(AccountError::InsufficientBalance { .. }) => {
                ErrorKind::Insufficient
            }
        }
    }
}

/// What an applied command did, with the state it left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Minted {
        account: AccountId,
        balance: Amount,
    },
    Approved {
        owner: AccountId,
        spender: AccountId,
        allowance: Amount,
    },
    ProjectCreated {
        project_id: ProjectId,
    },
    Contributed {
        project_id: ProjectId,
        amount: Amount,
        project_balance: Amount,
    },
    Withdrawn {
        project_id: ProjectId,
        amount: Amount,
        project_balance: Amount,
    },
}

/// The escrow ledger: an append-only list of projects whose balances are
/// backed by the ledger's custodial account in the token registry.
///
/// Invariant: `projects[i].id() == i`, and the custodial balance equals the
/// sum of all project balances. The custodial account never acts as a
/// caller, so nothing but contributions and withdrawals moves its balance.
///
/// Projects are shared with published snapshots and copied on write.
pub struct EscrowLedger {
    instance: InstanceId,
    custody: AccountId,
    registry: TokenRegistry,
    projects: Vec<Arc<Project>>,
    clock: Arc<dyn Clock>,
    version: u64,
}

impl EscrowLedger {
    pub fn new(config: &LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            instance: config.ledger.clone(),
            custody: AccountId::from(&config.ledger),
            registry: TokenRegistry::new(config.token.clone()),
            projects: Vec::new(),
            clock,
            version: 0,
        }
    }

    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    /// Account holding contributed funds, also the spender contributors approve.
    pub fn custody(&self) -> &AccountId {
        &self.custody
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    /// Number of mutations applied so far.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn num_projects(&self) -> usize {
        self.projects.len()
    }

    pub fn projects(&self) -> &[Arc<Project>] {
        &self.projects
    }

    pub fn project(&self, project_id: ProjectId) -> Result<&Project, LedgerError> {
        let index = self.index(project_id)?;
        Ok(self.projects[index].as_ref())
    }

    pub fn get_balance(&self, project_id: ProjectId) -> Result<Amount, LedgerError> {
        self.project(project_id).map(Project::balance)
    }

    pub fn goal_reached(&self, project_id: ProjectId) -> Result<bool, LedgerError> {
        self.project(project_id).map(Project::goal_reached)
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.registry.balance_of(account)
    }

    pub fn mint(&mut self, to: &AccountId, amount: Amount) -> Result<Amount, LedgerError> {
        self.reject_custody(to)?;
        let balance = self.registry.mint(to, amount)?;
        self.version += 1;
        Ok(balance)
    }

    pub fn approve(
        &mut self,
        owner: &AccountId,
        spender: &AccountId,
        amount: Amount,
    ) -> Result<Amount, LedgerError> {
        self.reject_custody(owner)?;
        let allowance = self.registry.approve(owner, spender, amount);
        self.version += 1;
        debug!(%owner, %spender, allowance, "allowance set");
        Ok(allowance)
    }

    pub fn create_project(
        &mut self,
        caller: &AccountId,
        deadline: Timestamp,
        title: impl Into<String>,
        goal: Amount,
    ) -> Result<ProjectId, LedgerError> {
        self.reject_custody(caller)?;
        let now = self.clock.now();
        if deadline <= now {
            return Err(LedgerError::InvalidDeadline { deadline, now });
        }
        if goal == 0 {
            return Err(LedgerError::InvalidGoal);
        }
        let title = title.into();
        if title.trim().is_empty() {
            return Err(LedgerError::InvalidTitle);
        }

        let project_id = self.projects.len() as ProjectId;
        info!(project_id, owner = %caller, %title, goal, deadline, "project created");
        self.projects.push(Arc::new(Project::new(
            project_id,
            title,
            goal,
            deadline,
            caller.clone(),
        )));
        self.version += 1;
        Ok(project_id)
    }

    /// Pulls `amount` from the caller through the allowance granted to the
    /// ledger, returns the new project balance.
    pub fn contribute(
        &mut self,
        caller: &AccountId,
        project_id: ProjectId,
        amount: Amount,
    ) -> Result<Amount, LedgerError> {
        self.reject_custody(caller)?;
        let index = self.index(project_id)?;
        let evt = self.projects[index].handle_contribute(amount, self.clock.now())?;
        self.registry
            .transfer_from(&self.custody, caller, &self.custody, amount)?;

        let project = Arc::make_mut(&mut self.projects[index]);
        project.apply(&evt);
        self.version += 1;
        debug!(project_id, contributor = %caller, amount, balance = project.balance(), "contributed");
        Ok(project.balance())
    }

    /// Pays `amount` out of custody to the project owner, returns the new
    /// project balance. Reaching the goal is not required.
    pub fn withdraw(
        &mut self,
        caller: &AccountId,
        project_id: ProjectId,
        amount: Amount,
    ) -> Result<Amount, LedgerError> {
        self.reject_custody(caller)?;
        let index = self.index(project_id)?;
        let evt = self.projects[index].handle_withdraw(caller, amount)?;
        self.registry.transfer(&self.custody, caller, amount)?;

        let project = Arc::make_mut(&mut self.projects[index]);
        project.apply(&evt);
        self.version += 1;
        info!(project_id, owner = %caller, amount, balance = project.balance(), "withdrawn");
        Ok(project.balance())
    }

    pub fn process(
        &mut self,
        caller: &AccountId,
        command: &LedgerCommand,
    ) -> Result<Effect, LedgerError> {
        match command {
            LedgerCommand::Mint { amount } => Ok(Effect::Minted {
                account: caller.clone(),
                balance: self.mint(caller, *amount)?,
            }),
            LedgerCommand::Approve { spender, amount } => Ok(Effect::Approved {
                owner: caller.clone(),
                spender: spender.clone(),
                allowance: self.approve(caller, spender, *amount)?,
            }),
            LedgerCommand::CreateProject {
                deadline,
                title,
                goal,
            } => Ok(Effect::ProjectCreated {
                project_id: self.create_project(caller, *deadline, title.as_str(), *goal)?,
            }),
            LedgerCommand::Contribute { project_id, amount } => Ok(Effect::Contributed {
                project_id: *project_id,
                amount: *amount,
                project_balance: self.contribute(caller, *project_id, *amount)?,
            }),
            LedgerCommand::Withdraw { project_id, amount } => Ok(Effect::Withdrawn {
                project_id: *project_id,
                amount: *amount,
                project_balance: self.withdraw(caller, *project_id, *amount)?,
            }),
        }
    }

    fn reject_custody(&self, caller: &AccountId) -> Result<(), LedgerError> {
        if *caller == self.custody {
            return Err(LedgerError::CustodyCaller(caller.clone()));
        }
        Ok(())
    }

    fn index(&self, project_id: ProjectId) -> Result<usize, LedgerError> {
        usize::try_from(project_id)
            .ok()
            .filter(|index| *index < self.projects.len())
            .ok_or(LedgerError::UnknownProject(project_id))
    }
}
