//! Bootstraps the ledger for the binary: parses a CSV script, feeds it through
//! the sequencer row by row and prints the final state.

use std::{
    io::{Read, Write},
    sync::Arc,
    time::Duration,
};

use crate::{
    account::AccountId,
    clock::Clock,
    command::{CommandError, LedgerCommand},
    config::LedgerConfig,
    ledger::EscrowLedger,
    sequencer::{Outcome, Sequencer, TransactionError, substrate::Substrate},
};
use anyhow::Result;
use csv_parser::CsvTransactionParser;
use csv_printer::{AccountRecord, ProjectRecord, print_accounts, print_projects};
use thiserror::Error;
use tracing::debug;
pub mod csv_parser;
pub mod csv_printer;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Malformed row: {0}")]
    Malformed(String),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Rejected(#[from] TransactionError),
    #[error("No confirmation within {0:?}, re-query state before resubmitting")]
    Indeterminate(Duration),
}

/// Replays a CSV script through a fresh ledger, one row at a time, then
/// prints the projects and accounts it ended up with.
pub struct Service<'w, R, W: 'w> {
    pub input: R,
    pub output: &'w mut W,
    pub config: LedgerConfig,
    pub clock: Arc<dyn Clock>,
    pub substrate: Arc<dyn Substrate>,
    pub error_printer: Box<dyn FnMut(u64, ServiceError)>,
}

impl<'w, R, W> Service<'w, R, W>
where
    R: Read,
    W: Write + 'w,
{
    pub async fn run(mut self) -> Result<()> {
        let parser = CsvTransactionParser::new(self.input);

        let ledger = EscrowLedger::new(&self.config, self.clock);
        let sequencer = Sequencer::new(ledger, self.substrate, self.config.confirmation_timeout);
        let default_spender = AccountId::from(&self.config.ledger);

        for (line, row) in parser {
            let row = match row {
                Ok(row) => row,
                Err(err) => {
                    (self.error_printer)(line, ServiceError::Malformed(err.to_string()));
                    continue;
                }
            };
            let command = match LedgerCommand::parse_command(
                row.kind,
                row.args(),
                self.config.decimals,
                &default_spender,
            ) {
                Ok(command) => command,
                Err(err) => {
                    (self.error_printer)(line, err.into());
                    continue;
                }
            };
            match sequencer.execute(row.caller, row.nonce, command).await {
                Outcome::Applied(effect) => debug!(line, ?effect, "row applied"),
                Outcome::Rejected(err) => (self.error_printer)(line, err.into()),
                Outcome::Indeterminate => (self.error_printer)(
                    line,
                    ServiceError::Indeterminate(sequencer.confirmation_timeout()),
                ),
            }
        }

        let snapshot = sequencer.projection().snapshot();
        print_projects(
            &mut *self.output,
            snapshot.projects().iter().map(|project| ProjectRecord {
                id: project.id(),
                title: project.title().to_owned(),
                goal: project.goal(),
                deadline: project.deadline(),
                owner: project.owner().clone(),
                balance: project.balance(),
                goal_reached: project.goal_reached(),
            }),
        )?;
        print_accounts(
            &mut *self.output,
            snapshot.accounts().map(|(account, acc)| AccountRecord {
                account: account.clone(),
                balance: acc.balance(),
            }),
        )
    }
}
