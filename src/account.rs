use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token amount in the smallest denomination.
pub type Amount = u128;

/// Opaque address-like identity of a token holder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountEventKind {
    Minted,
    Approved { spender: AccountId },
    AllowanceSpent { spender: AccountId },
    Debited,
    Credited,
}

#[derive(Debug, Clone)]
pub struct AccountEvent {
    amount: Amount,
    kind: AccountEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("Amount must be greater than zero")]
    InvalidAmount,
    #[error("Insufficient allowance: {spender} may spend {allowed}, {requested} requested")]
    InsufficientAllowance {
        spender: AccountId,
        requested: Amount,
        allowed: Amount,
    },
    #[error("Insufficient balance: {requested} requested, {available} available")]
    InsufficientBalance { requested: Amount, available: Amount },
    #[error("Crediting {amount} would overflow the account balance")]
    BalanceOverflow { amount: Amount },
}

#[derive(Debug, Default, Clone)]
pub struct Account {
    balance: Amount,
    allowances: HashMap<AccountId, Amount>,
}

impl Account {
    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn allowance(&self, spender: &AccountId) -> Amount {
        self.allowances.get(spender).copied().unwrap_or_default()
    }

    pub fn apply(&mut self, event: &AccountEvent) {
        match &event.kind {
            AccountEventKind::Minted | AccountEventKind::Credited => {
                self.balance += event.amount;
            }
            AccountEventKind::Debited => {
                self.balance -= event.amount;
            }
            AccountEventKind::Approved { spender } => {
                if event.amount == 0 {
                    self.allowances.remove(spender);
                } else {
                    self.allowances.insert(spender.clone(), event.amount);
                }
            }
            AccountEventKind::AllowanceSpent { spender } => {
                self.balance -= event.amount;
                let remaining = self.allowance(spender) - event.amount;
                if remaining == 0 {
                    self.allowances.remove(spender);
                } else {
                    self.allowances.insert(spender.clone(), remaining);
                }
            }
        }
    }

    pub fn handle_mint(&self, amount: Amount) -> Result<AccountEvent, AccountError> {
        if amount == 0 {
            return Err(AccountError::InvalidAmount);
        }
        let credit = self.handle_credit(amount)?;
        Ok(AccountEvent {
            kind: AccountEventKind::Minted,
            ..credit
        })
    }

    /// Allowances are absolute: approving again overwrites the previous value.
    pub fn handle_approve(&self, spender: &AccountId, amount: Amount) -> AccountEvent {
        AccountEvent {
            amount,
            kind: AccountEventKind::Approved {
                spender: spender.clone(),
            },
        }
    }

    pub fn handle_spend(
        &self,
        spender: &AccountId,
        amount: Amount,
    ) -> Result<AccountEvent, AccountError> {
        let allowed = self.allowance(spender);
        if allowed < amount {
            return Err(AccountError::InsufficientAllowance {
                spender: spender.clone(),
                requested: amount,
                allowed,
            });
        }
        self.check_balance(amount)?;
        Ok(AccountEvent {
            amount,
            kind: AccountEventKind::AllowanceSpent {
                spender: spender.clone(),
            },
        })
    }

    pub fn handle_debit(&self, amount: Amount) -> Result<AccountEvent, AccountError> {
        self.check_balance(amount)?;
        Ok(AccountEvent {
            amount,
            kind: AccountEventKind::Debited,
        })
    }

    pub fn handle_credit(&self, amount: Amount) -> Result<AccountEvent, AccountError> {
        if self.balance.checked_add(amount).is_none() {
            return Err(AccountError::BalanceOverflow { amount });
        }
        Ok(AccountEvent {
            amount,
            kind: AccountEventKind::Credited,
        })
    }

    fn check_balance(&self, amount: Amount) -> Result<(), AccountError> {
        if self.balance < amount {
            Err(AccountError::InsufficientBalance {
                requested: amount,
                available: self.balance,
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> AccountId {
        AccountId::from("crowdfunding")
    }

    #[test]
    fn apply_events() {
        let mut acc = Account::default();
        acc.apply(&AccountEvent {
            amount: 100,
            kind: AccountEventKind::Minted,
        });
        assert_eq!(acc.balance, 100);
        acc.apply(&AccountEvent {
            amount: 40,
            kind: AccountEventKind::Approved { spender: ledger() },
        });
        assert_eq!(acc.allowance(&ledger()), 40);
        assert_eq!(acc.balance, 100);

        // event is the source of truth, there's no more validation happening
        acc.apply(&AccountEvent {
            amount: 15,
            kind: AccountEventKind::AllowanceSpent { spender: ledger() },
        });
        assert_eq!(acc.balance, 85);
        assert_eq!(acc.allowance(&ledger()), 25);

        acc.apply(&AccountEvent {
            amount: 25,
            kind: AccountEventKind::AllowanceSpent { spender: ledger() },
        });
        assert_eq!(acc.balance, 60);
        assert!(acc.allowances.is_empty());

        acc.apply(&AccountEvent {
            amount: 10,
            kind: AccountEventKind::Debited,
        });
        acc.apply(&AccountEvent {
            amount: 3,
            kind: AccountEventKind::Credited,
        });
        assert_eq!(acc.balance, 53);
    }

    #[test]
    fn approve_overwrites_previous_allowance() {
        let mut acc = Account::default();
        let first = acc.handle_approve(&ledger(), 500);
        acc.apply(&first);
        let second = acc.handle_approve(&ledger(), 70);
        acc.apply(&second);
        assert_eq!(acc.allowance(&ledger()), 70);

        // approving zero revokes
        let revoke = acc.handle_approve(&ledger(), 0);
        acc.apply(&revoke);
        assert_eq!(acc.allowance(&ledger()), 0);
        assert!(acc.allowances.is_empty());
    }

    #[test]
    fn handle_spend() {
        let mut acc = Account::default();
        acc.apply(&acc.handle_mint(50).unwrap());

        let err = acc.handle_spend(&ledger(), 10).unwrap_err();
        assert_eq!(
            err,
            AccountError::InsufficientAllowance {
                spender: ledger(),
                requested: 10,
                allowed: 0
            }
        );

        acc.apply(&acc.handle_approve(&ledger(), 80));
        let err = acc.handle_spend(&ledger(), 60).unwrap_err();
        assert_eq!(
            err,
            AccountError::InsufficientBalance {
                requested: 60,
                available: 50
            }
        );
        assert_eq!(
            err.to_string(),
            "Insufficient balance: 60 requested, 50 available"
        );

        let evt = acc.handle_spend(&ledger(), 50).unwrap();
        assert_eq!(evt.amount, 50);
        assert!(matches!(evt.kind, AccountEventKind::AllowanceSpent { .. }));
        acc.apply(&evt);
        assert_eq!(acc.balance(), 0);
        assert_eq!(acc.allowance(&ledger()), 30);
    }

    #[test]
    fn mint_and_credit_limits() {
        let acc = Account {
            balance: Amount::MAX - 1,
            ..Default::default()
        };
        assert!(matches!(
            acc.handle_credit(2).unwrap_err(),
            AccountError::BalanceOverflow { amount: 2 }
        ));
        assert!(acc.handle_credit(1).is_ok());
        assert!(matches!(
            Account::default().handle_mint(0).unwrap_err(),
            AccountError::InvalidAmount
        ));
        let evt = Account::default().handle_mint(7).unwrap();
        assert_eq!(evt.kind, AccountEventKind::Minted);
    }

    #[test]
    fn handle_debit() {
        let acc = Account {
            balance: 5,
            ..Default::default()
        };
        assert!(acc.handle_debit(5).is_ok());
        assert!(matches!(
            acc.handle_debit(6).unwrap_err(),
            AccountError::InsufficientBalance {
                requested: 6,
                available: 5
            }
        ));
    }
}
