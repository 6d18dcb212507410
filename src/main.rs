use std::io;
use std::time::Duration;
use clap::Parser;
use log::{error, info};
use tokio::io::BufReader;
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use crate::lookup::{LookupController, Validation};
use crate::postal::{ClientConfig, PostalClient, PostalDirectory};
use crate::record::{render_view, OutputFormat};
use crate::shell::{Command, Session};

mod lookup;
mod postal;
mod record;
mod shell;

#[derive(Parser, Debug)]
#[command(name = "pincode-lookup", version, about = "Look up Indian post offices by their 6-digit pincode")]
struct Cli {
    /// Postal code to look up; without one an interactive session starts
    code: Option<String>,

    /// Only show post offices whose name contains this text (case-insensitive)
    #[arg(short, long)]
    filter: Option<String>,

    /// Output format for the result rows
    #[arg(short = 'o', long = "output", value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    /// Reject codes that are not six ASCII digits instead of asking the directory
    #[arg(long)]
    strict: bool,

    /// Base URL of the pincode directory
    #[arg(long, env = "PINCODE_API_URL", default_value = postal::BASE_URL)]
    base_url: String,

    /// Request timeout in seconds
    #[arg(long = "timeout", env = "PINCODE_TIMEOUT_SECS", default_value_t = postal::DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// Start an interactive session even when a code is given
    #[arg(short, long)]
    interactive: bool,
}

impl Cli {
    fn validation(&self) -> Validation {
        if self.strict {
            Validation::Strict
        } else {
            Validation::Lenient
        }
    }

    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Err(e) => {
            error!("Error: {:?}", e);
            std::process::exit(2);
        }
        Ok(false) => std::process::exit(1),
        Ok(true) => Ok(()),
    }
}

/// logs go to stderr so they never mix with the result rows
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(ErrorLayer::default())
        .init();
}

/// returns whether the session ended without a message for the user
async fn run(cli: Cli) -> color_eyre::Result<bool> {
    let client = PostalClient::new(cli.client_config())?;
    let mut controller = LookupController::new(cli.validation());

    if let Some(code) = cli.code.as_deref() {
        lookup_once(&mut controller, &client, code, cli.filter.as_deref()).await;
        if !cli.interactive {
            render_view(controller.state(), cli.output, io::stdout(), io::stderr())?;
            return Ok(controller.state().error().is_none());
        }
    }

    info!("starting interactive session against [{}]", cli.base_url);
    let mut stdout = io::stdout();
    let mut session = Session::new(controller, &client, cli.output);
    if cli.code.is_some() {
        session.execute(Command::Show, &mut stdout).await?;
    }
    session.run(BufReader::new(tokio::io::stdin()), stdout).await?;
    Ok(true)
}

/// look up `code`, then narrow the rows to `filter` if the lookup produced any
///
/// A failed lookup has nothing to filter and keeps its message.
async fn lookup_once<D>(controller: &mut LookupController, directory: &D, code: &str, filter: Option<&str>)
where
    D: PostalDirectory + ?Sized,
{
    controller.submit_lookup(directory, code).await;
    let Some(filter) = filter else {
        return;
    };
    if controller.state().all_results().is_empty() {
        info!("nothing to filter for [{}], keeping the lookup outcome", code);
    } else {
        controller.apply_filter(filter);
    }
}
