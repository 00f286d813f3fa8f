use std::{collections::HashMap, sync::Arc};

use tracing::debug;

use crate::{
    account::{Account, AccountError, AccountId, Amount},
    config::InstanceId,
};

/// Balances and allowances of one token instance.
///
/// Every mutating call validates all affected accounts before applying any
/// event, so a failed call leaves the registry untouched.
///
/// Accounts are shared with published snapshots and copied on write, so a
/// mutation only clones the accounts it touches.
#[derive(Debug)]
pub struct TokenRegistry {
    instance: InstanceId,
    accounts: HashMap<AccountId, Arc<Account>>,
}

impl TokenRegistry {
    pub fn new(instance: InstanceId) -> Self {
        Self {
            instance,
            accounts: HashMap::new(),
        }
    }

    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    pub fn accounts(&self) -> &HashMap<AccountId, Arc<Account>> {
        &self.accounts
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.accounts.get(account).map_or(0, |acc| acc.balance())
    }

    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.accounts
            .get(owner)
            .map_or(0, |acc| acc.allowance(spender))
    }

    /// Issues new supply, returns the resulting balance.
    pub fn mint(&mut self, to: &AccountId, amount: Amount) -> Result<Amount, AccountError> {
        let evt = self.with_account(to, |acc| acc.handle_mint(amount))?;
        let acc = self.account_mut(to);
        acc.apply(&evt);
        let balance = acc.balance();
        debug!(token = %self.instance, account = %to, amount, "minted");
        Ok(balance)
    }

    pub fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: Amount) -> Amount {
        let acc = self.account_mut(owner);
        let evt = acc.handle_approve(spender, amount);
        acc.apply(&evt);
        acc.allowance(spender)
    }

    /// Moves `amount` from `owner` to `to`, spending the allowance `owner`
    /// granted to `spender`.
    pub fn transfer_from(
        &mut self,
        spender: &AccountId,
        owner: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), AccountError> {
        let spend = self.with_account(owner, |acc| acc.handle_spend(spender, amount))?;
        let credit = self.with_account(to, |acc| acc.handle_credit(amount))?;
        self.account_mut(owner).apply(&spend);
        self.account_mut(to).apply(&credit);
        Ok(())
    }

    /// Direct move without an allowance. Only the ledger pays out of its own
    /// custody this way.
    pub(crate) fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), AccountError> {
        let debit = self.with_account(from, |acc| acc.handle_debit(amount))?;
        let credit = self.with_account(to, |acc| acc.handle_credit(amount))?;
        self.account_mut(from).apply(&debit);
        self.account_mut(to).apply(&credit);
        Ok(())
    }

    fn account_mut(&mut self, id: &AccountId) -> &mut Account {
        Arc::make_mut(self.accounts.entry(id.clone()).or_default())
    }

    // unknown accounts behave as empty ones without being inserted
    fn with_account<T>(&self, id: &AccountId, f: impl FnOnce(&Account) -> T) -> T {
        match self.accounts.get(id) {
            Some(acc) => f(acc),
            None => f(&Account::default()),
        }
    }
}
