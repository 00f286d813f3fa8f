use rust_decimal::{
    Decimal,
    prelude::{ToPrimitive, Zero},
};
use serde::Deserialize;
use thiserror::Error;

use crate::{
    account::{AccountId, Amount},
    clock::Timestamp,
    project::ProjectId,
};

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Mint,
    Approve,
    #[serde(alias = "createproject", alias = "create_project")]
    Create,
    Contribute,
    Withdraw,
}

/// A state-changing call against the ledger, issued on behalf of a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCommand {
    Mint {
        amount: Amount,
    },
    Approve {
        spender: AccountId,
        amount: Amount,
    },
    CreateProject {
        deadline: Timestamp,
        title: String,
        goal: Amount,
    },
    Contribute {
        project_id: ProjectId,
        amount: Amount,
    },
    Withdraw {
        project_id: ProjectId,
        amount: Amount,
    },
}

/// Loosely typed command arguments as they arrive from a script row.
/// `amount` doubles as the goal of a new project.
#[derive(Debug, Default, Clone)]
pub struct CommandArgs {
    pub project: Option<ProjectId>,
    pub spender: Option<AccountId>,
    pub amount: Option<Decimal>,
    pub title: Option<String>,
    pub deadline: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Amount is required for {kind:?}")]
    AmountRequired { kind: TransactionKind },
    #[error("Amount must not be negative for {kind:?}")]
    NegativeAmount { kind: TransactionKind },
    #[error("Amount {amount} is not a whole number of base units for {kind:?}")]
    FractionalAmount {
        kind: TransactionKind,
        amount: Decimal,
    },
    #[error("Amount {amount} does not fit into base units for {kind:?}")]
    AmountOverflow {
        kind: TransactionKind,
        amount: Decimal,
    },
    #[error("Project id is required for {kind:?}")]
    ProjectRequired { kind: TransactionKind },
    #[error("Deadline is required for {kind:?}")]
    DeadlineRequired { kind: TransactionKind },
}

impl LedgerCommand {
    /// `default_spender` is used when an approval names no spender, which is
    /// the ledger itself in the approve-then-contribute flow.
    pub fn parse_command(
        kind: TransactionKind,
        args: CommandArgs,
        decimals: u32,
        default_spender: &AccountId,
    ) -> Result<Self, CommandError> {
        let amount = Self::parse_amount(kind, args.amount, decimals)?;
        match kind {
            TransactionKind::Mint => Ok(Self::Mint { amount }),
            TransactionKind::Approve => Ok(Self::Approve {
                spender: args.spender.unwrap_or_else(|| default_spender.clone()),
                amount,
            }),
            TransactionKind::Create => Ok(Self::CreateProject {
                deadline: args
                    .deadline
                    .ok_or(CommandError::DeadlineRequired { kind })?,
                title: args.title.unwrap_or_default(),
                goal: amount,
            }),
            TransactionKind::Contribute => Ok(Self::Contribute {
                project_id: args.project.ok_or(CommandError::ProjectRequired { kind })?,
                amount,
            }),
            TransactionKind::Withdraw => Ok(Self::Withdraw {
                project_id: args.project.ok_or(CommandError::ProjectRequired { kind })?,
                amount,
            }),
        }
    }

    fn parse_amount(
        kind: TransactionKind,
        amount: Option<Decimal>,
        decimals: u32,
    ) -> Result<Amount, CommandError> {
        let Some(amount) = amount else {
            return Err(CommandError::AmountRequired { kind });
        };
        if amount < Decimal::zero() {
            return Err(CommandError::NegativeAmount { kind });
        }
        to_base_units(amount, decimals).map_err(|err| match err {
            UnitsError::Fractional => CommandError::FractionalAmount { kind, amount },
            UnitsError::Overflow => CommandError::AmountOverflow { kind, amount },
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum UnitsError {
    Fractional,
    Overflow,
}

/// Converts a whole-token amount into base units, `decimals` places down.
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<Amount, UnitsError> {
    let mut scaled = amount;
    for _ in 0..decimals {
        scaled = scaled.checked_mul(Decimal::TEN).ok_or(UnitsError::Overflow)?;
    }
    if !scaled.fract().is_zero() {
        return Err(UnitsError::Fractional);
    }
    scaled.trunc().to_u128().ok_or(UnitsError::Overflow)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn ledger() -> AccountId {
        AccountId::from("crowdfunding")
    }

    #[test]
    fn base_units() {
        assert_eq!(to_base_units(dec("1.5"), 18), Ok(1_500_000_000_000_000_000));
        assert_eq!(to_base_units(dec("42"), 0), Ok(42));
        assert_eq!(to_base_units(dec("0.25"), 2), Ok(25));
        assert_eq!(to_base_units(dec("0.125"), 2), Err(UnitsError::Fractional));
        assert_eq!(
            to_base_units(dec("79000000000000000000000000000"), 1),
            Err(UnitsError::Overflow)
        );
    }

    #[test]
    fn parse_approve_defaults_to_ledger_spender() {
        let cmd = LedgerCommand::parse_command(
            TransactionKind::Approve,
            CommandArgs {
                amount: Some(dec("5")),
                ..Default::default()
            },
            0,
            &ledger(),
        )
        .unwrap();
        assert_eq!(
            cmd,
            LedgerCommand::Approve {
                spender: ledger(),
                amount: 5
            }
        );
    }

    #[test]
    fn parse_create_project() {
        let cmd = LedgerCommand::parse_command(
            TransactionKind::Create,
            CommandArgs {
                amount: Some(dec("1000")),
                title: Some("Water well".into()),
                deadline: Some(1_700_000_000),
                ..Default::default()
            },
            0,
            &ledger(),
        )
        .unwrap();
        assert_eq!(
            cmd,
            LedgerCommand::CreateProject {
                deadline: 1_700_000_000,
                title: "Water well".into(),
                goal: 1000
            }
        );

        let err = LedgerCommand::parse_command(
            TransactionKind::Create,
            CommandArgs {
                amount: Some(dec("1000")),
                ..Default::default()
            },
            0,
            &ledger(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            CommandError::DeadlineRequired {
                kind: TransactionKind::Create
            }
        );
    }

    #[test]
    fn parse_errors() {
        let err = LedgerCommand::parse_command(
            TransactionKind::Contribute,
            CommandArgs {
                project: Some(0),
                ..Default::default()
            },
            0,
            &ledger(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CommandError::AmountRequired {
                kind: TransactionKind::Contribute
            }
        ));

        let err = LedgerCommand::parse_command(
            TransactionKind::Withdraw,
            CommandArgs {
                amount: Some(dec("1")),
                ..Default::default()
            },
            0,
            &ledger(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Project id is required for Withdraw");

        let err = LedgerCommand::parse_command(
            TransactionKind::Mint,
            CommandArgs {
                amount: Some(dec("-3")),
                ..Default::default()
            },
            0,
            &ledger(),
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::NegativeAmount { .. }));

        let err = LedgerCommand::parse_command(
            TransactionKind::Mint,
            CommandArgs {
                amount: Some(dec("20.5")),
                ..Default::default()
            },
            0,
            &ledger(),
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::FractionalAmount { .. }));
    }
}
