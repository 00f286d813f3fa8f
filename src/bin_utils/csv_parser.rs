use std::io::Read;

use crate::{
    account::AccountId,
    clock::Timestamp,
    command::{CommandArgs, TransactionKind},
    project::ProjectId,
};
use csv::{DeserializeRecordsIntoIter, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub caller: AccountId,
    pub nonce: u64,
    pub project: Option<ProjectId>,
    pub spender: Option<AccountId>,
    pub amount: Option<Decimal>,
    pub title: Option<String>,
    pub deadline: Option<Timestamp>,
}

impl Transaction {
    pub fn args(&self) -> CommandArgs {
        CommandArgs {
            project: self.project,
            spender: self.spender.clone(),
            amount: self.amount,
            title: self.title.clone(),
            deadline: self.deadline,
        }
    }
}

/// Parses a list of ledger transactions in CSV format, yielding each row
/// with the line it starts on.
pub struct CsvTransactionParser<R> {
    iter: DeserializeRecordsIntoIter<R, Transaction>,
}

impl<R> CsvTransactionParser<R>
where
    R: Read,
{
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);

        Self {
            iter: reader.into_deserialize(),
        }
    }
}

impl<R> Iterator for CsvTransactionParser<R>
where
    R: Read,
{
    type Item = (u64, Result<Transaction, csv::Error>);

    fn next(&mut self) -> Option<Self::Item> {
        let curr_line = self.iter.reader().position().line();
        self.iter.next().map(|row| (curr_line, row))
    }
}
