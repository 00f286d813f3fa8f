use std::{fs::File, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use crowdfund_ledger::{
    bin_utils::{Service, ServiceError},
    clock::SystemClock,
    config::{InstanceId, LedgerConfig},
    ledger::ErrorKind,
    sequencer::substrate::Immediate,
};
use tracing_subscriber::EnvFilter;

/// Replays a crowdfunding transaction script and prints the resulting
/// projects and token accounts as CSV.
#[derive(Debug, Parser)]
struct Args {
    /// CSV file with `type,caller,nonce,project,spender,amount,title,deadline` rows
    input: PathBuf,

    /// Token instance the ledger moves value through
    #[arg(long, default_value = "metacoin", value_name = "INSTANCE")]
    token: String,

    /// Ledger instance, also the spender contributors approve
    #[arg(long, default_value = "crowdfunding", value_name = "INSTANCE")]
    ledger: String,

    /// Decimals between a whole token and its base unit
    #[arg(long, default_value_t = 18)]
    decimals: u32,

    /// How long to wait for a confirmation
    #[arg(long, default_value = "30s", value_name = "DURATION")]
    timeout: humantime::Duration,
}

impl Args {
    fn config(&self) -> LedgerConfig {
        LedgerConfig {
            token: InstanceId::new(self.token.as_str()),
            ledger: InstanceId::new(self.ledger.as_str()),
            decimals: self.decimals,
            confirmation_timeout: *self.timeout,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let file = File::open(&args.input)
        .with_context(|| format!("Failed to open `{}`", args.input.display()))?;

    let service = Service {
        input: file,
        output: &mut std::io::stdout(),
        config: args.config(),
        clock: Arc::new(SystemClock),
        substrate: Arc::new(Immediate),
        error_printer: Box::new(|line, err| {
            match err {
                ServiceError::Rejected(err) if err.kind() != ErrorKind::Unavailable => {
                    // business rejections are not technical errors, they are traced instead
                }
                err => eprintln!("Error at line {line}: {err}"),
            }
        }),
    };
    service.run().await
}
