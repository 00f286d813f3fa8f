use std::io::Write;

use crate::{
    account::{AccountId, Amount},
    clock::Timestamp,
    project::ProjectId,
};
use csv::Writer;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub title: String,
    pub goal: Amount,
    pub deadline: Timestamp,
    pub owner: AccountId,
    pub balance: Amount,
    pub goal_reached: bool,
}

#[derive(Debug, Serialize)]
pub struct AccountRecord {
    pub account: AccountId,
    pub balance: Amount,
}

pub fn print_projects<W>(
    output: &mut W,
    projects: impl Iterator<Item = ProjectRecord>,
) -> anyhow::Result<()>
where
    W: Write,
{
    print_records(output, projects)
}

pub fn print_accounts<W>(
    output: &mut W,
    accounts: impl Iterator<Item = AccountRecord>,
) -> anyhow::Result<()>
where
    W: Write,
{
    print_records(output, accounts)
}

fn print_records<W, T>(output: &mut W, records: impl Iterator<Item = T>) -> anyhow::Result<()>
where
    W: Write,
    T: Serialize,
{
    let mut writer = Writer::from_writer(output);
    for record in records {
        if let Err(err) = writer.serialize(record) {
            anyhow::bail!("Failed to write to CSV: {err}")
        }
    }
    // Ensure all data is flushed to the output
    if let Err(err) = writer.flush() {
        anyhow::bail!("Failed to flush CSV writer: {err}")
    }
    Ok(())
}
