/// Token holder balances and allowances.
/// State is modified using events, which are created by handling commands
pub mod account;

/// Token account registry of one token instance, built on [`account`].
pub mod registry;

/// Crowdfunding projects and their contribution/withdrawal events.
pub mod project;

/// Ledger commands, parsed from loosely typed script rows.
pub mod command;

/// The escrow ledger: owns projects, moves value through the registry and
/// enforces goal, deadline and ownership rules.
pub mod ledger;

/// Submit/await protocol in front of the ledger.
/// Applies commands in confirmation order and deduplicates resubmissions.
pub mod sequencer;

/// Consistent point-in-time reads for external callers.
pub mod projection;

pub mod clock;

pub mod config;

/// Script replay around the sequencer. Lives here rather than in the
/// binary so integration tests can drive it.
pub mod bin_utils;
