use std::{fmt, time::Duration};

use crate::account::AccountId;

/// Identifier of a deployed token or ledger instance, the analogue of a
/// contract address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A ledger instance holds custody, and spends allowances, under its own id.
impl From<&InstanceId> for AccountId {
    fn from(instance: &InstanceId) -> Self {
        AccountId::new(instance.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Token instance whose accounts the ledger moves value through
    pub token: InstanceId,

    /// Ledger instance, also the spender and custodial account
    pub ledger: InstanceId,

    /// Number of decimals between one whole token and its base unit
    pub decimals: u32,

    /// How long a caller waits for a confirmation before the outcome
    /// is reported as indeterminate
    pub confirmation_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            token: InstanceId::from("metacoin"),
            ledger: InstanceId::from("crowdfunding"),
            decimals: 18,
            confirmation_timeout: Duration::from_secs(30),
        }
    }
}
