use thiserror::Error;

use crate::{
    account::{AccountId, Amount},
    clock::Timestamp,
};

pub type ProjectId = u64;

#[derive(Debug, PartialEq, Eq)]
pub enum ProjectEventKind {
    Contributed,
    Withdrawn,
}

#[derive(Debug)]
pub struct ProjectEvent {
    amount: Amount,
    kind: ProjectEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectError {
    #[error("Amount must be greater than zero")]
    InvalidAmount,
    #[error("Project {project_id} stopped accepting contributions at {deadline}")]
    DeadlinePassed {
        project_id: ProjectId,
        deadline: Timestamp,
    },
    #[error("{caller} does not own project {project_id}")]
    NotOwner {
        project_id: ProjectId,
        caller: AccountId,
    },
    #[error("Insufficient funds: {requested} requested, project holds {available}")]
    InsufficientFunds { requested: Amount, available: Amount },
    #[error("Contributing {amount} would overflow the project balance")]
    BalanceOverflow { amount: Amount },
}

/// A crowdfunding project. Only `balance` changes after creation, and only
/// through contribution and withdrawal events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    id: ProjectId,
    title: String,
    goal: Amount,
    deadline: Timestamp,
    owner: AccountId,
    balance: Amount,
}

impl Project {
    pub(crate) fn new(
        id: ProjectId,
        title: String,
        goal: Amount,
        deadline: Timestamp,
        owner: AccountId,
    ) -> Self {
        Self {
            id,
            title,
            goal,
            deadline,
            owner,
            balance: 0,
        }
    }

    pub fn id(&self) -> ProjectId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn goal(&self) -> Amount {
        self.goal
    }

    pub fn deadline(&self) -> Timestamp {
        self.deadline
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    /// Informational only, never used as a gate.
    pub fn goal_reached(&self) -> bool {
        self.balance >= self.goal
    }

    pub fn accepts_contributions(&self, now: Timestamp) -> bool {
        now <= self.deadline
    }

    pub fn apply(&mut self, event: &ProjectEvent) {
        match event.kind {
            ProjectEventKind::Contributed => {
                self.balance += event.amount;
            }
            ProjectEventKind::Withdrawn => {
                self.balance -= event.amount;
            }
        }
    }

    pub fn handle_contribute(
        &self,
        amount: Amount,
        now: Timestamp,
    ) -> Result<ProjectEvent, ProjectError> {
        if amount == 0 {
            return Err(ProjectError::InvalidAmount);
        }
        if !self.accepts_contributions(now) {
            return Err(ProjectError::DeadlinePassed {
                project_id: self.id,
                deadline: self.deadline,
            });
        }
        if self.balance.checked_add(amount).is_none() {
            return Err(ProjectError::BalanceOverflow { amount });
        }
        Ok(ProjectEvent {
            amount,
            kind: ProjectEventKind::Contributed,
        })
    }

    pub fn handle_withdraw(
        &self,
        caller: &AccountId,
        amount: Amount,
    ) -> Result<ProjectEvent, ProjectError> {
        if caller != &self.owner {
            return Err(ProjectError::NotOwner {
                project_id: self.id,
                caller: caller.clone(),
            });
        }
        if amount == 0 {
            return Err(ProjectError::InvalidAmount);
        }
        if amount > self.balance {
            return Err(ProjectError::InsufficientFunds {
                requested: amount,
                available: self.balance,
            });
        }
        Ok(ProjectEvent {
            amount,
            kind: ProjectEventKind::Withdrawn,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water_well() -> Project {
        Project::new(0, "Water well".into(), 1000, 2_000, "bob".into())
    }

    #[test]
    fn apply_events() {
        let mut p = water_well();
        p.apply(&ProjectEvent {
            amount: 600,
            kind: ProjectEventKind::Contributed,
        });
        assert!(!p.goal_reached());
        p.apply(&ProjectEvent {
            amount: 400,
            kind: ProjectEventKind::Contributed,
        });
        assert_eq!(p.balance(), 1000);
        assert!(p.goal_reached());
        p.apply(&ProjectEvent {
            amount: 1000,
            kind: ProjectEventKind::Withdrawn,
        });
        assert_eq!(p.balance(), 0);
        assert!(!p.goal_reached());
    }

    #[test]
    fn handle_contribute() {
        let p = water_well();
        assert!(matches!(
            p.handle_contribute(0, 1_000).unwrap_err(),
            ProjectError::InvalidAmount
        ));

        // the deadline itself is still open
        let evt = p.handle_contribute(10, 2_000).unwrap();
        assert_eq!(evt.amount, 10);
        assert_eq!(evt.kind, ProjectEventKind::Contributed);

        let err = p.handle_contribute(10, 2_001).unwrap_err();
        assert_eq!(
            err,
            ProjectError::DeadlinePassed {
                project_id: 0,
                deadline: 2_000
            }
        );
        assert_eq!(
            err.to_string(),
            "Project 0 stopped accepting contributions at 2000"
        );
    }

    #[test]
    fn handle_withdraw() {
        let mut p = water_well();
        p.apply(&p.handle_contribute(400, 1_000).unwrap());

        let err = p.handle_withdraw(&"alice".into(), 1).unwrap_err();
        assert!(matches!(err, ProjectError::NotOwner { project_id: 0, .. }));

        // not owner takes precedence over missing funds
        let err = p.handle_withdraw(&"alice".into(), 10_000).unwrap_err();
        assert!(matches!(err, ProjectError::NotOwner { .. }));

        let err = p.handle_withdraw(&"bob".into(), 401).unwrap_err();
        assert_eq!(
            err,
            ProjectError::InsufficientFunds {
                requested: 401,
                available: 400
            }
        );
        assert!(matches!(
            p.handle_withdraw(&"bob".into(), 0).unwrap_err(),
            ProjectError::InvalidAmount
        ));

        let evt = p.handle_withdraw(&"bob".into(), 400).unwrap();
        assert_eq!(evt.kind, ProjectEventKind::Withdrawn);
        p.apply(&evt);
        assert_eq!(p.balance(), 0);
    }

    #[test]
    fn balance_overflow_is_rejected() {
        let mut p = water_well();
        p.apply(&ProjectEvent {
            amount: Amount::MAX,
            kind: ProjectEventKind::Contributed,
        });
        assert!(matches!(
            p.handle_contribute(1, 0).unwrap_err(),
            ProjectError::BalanceOverflow { amount: 1 }
        ));
    }
}
