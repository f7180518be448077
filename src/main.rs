// Copyright (C) 2026 The allyapi Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::error::Error as StdError;
use std::io::stdout;
use std::process::ExitCode;

use allyapi::api::accounts::show_accounts;
use allyapi::api::quotes::get_quotes;
use allyapi::api::quotes::stream_quotes;
use allyapi::Client;
use allyapi::CredentialProvider;
use allyapi::EnvProvider;
use allyapi::Error;
use allyapi::KeyringProvider;

use clap::CommandFactory as _;
use clap::Parser;
use clap::ValueEnum;

use tracing::debug;
use tracing::error;

use tracing_subscriber::EnvFilter;


/// The source of the OAuth credentials.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum CredentialSource {
  /// The platform's secure credential store.
  #[default]
  Keychain,
  /// `TRADEKING_*` environment variables.
  Env,
}

/// Retrieve quotes and account data from the Ally Invest API.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
  /// Stream trades instead of requesting a quote snapshot.
  #[arg(long)]
  stream: bool,
  /// The symbols to request quotes for (comma-separated).
  #[arg(long, value_delimiter = ',')]
  symbols: Option<Vec<String>>,
  /// List the user's accounts.
  #[arg(long)]
  accounts: bool,
  /// Where to retrieve credentials from.
  #[arg(long, value_enum, env = "ALLYAPI_CREDENTIALS", default_value_t)]
  credentials: CredentialSource,
}

impl Args {
  /// Retrieve the non-empty symbols given, if any.
  fn symbols(&self) -> Option<Vec<&str>> {
    let symbols = self
      .symbols
      .iter()
      .flatten()
      .map(String::as_str)
      .filter(|symbol| !symbol.is_empty())
      .collect::<Vec<_>>();

    if symbols.is_empty() {
      None
    } else {
      Some(symbols)
    }
  }
}


/// Format an error along with its chain of causes.
fn format_error(err: &dyn StdError) -> String {
  let mut string = err.to_string();
  let mut source = err.source();
  while let Some(err) = source {
    string.push_str(": ");
    string.push_str(&err.to_string());
    source = err.source();
  }
  string
}


/// Issue the calls requested on the command line.
async fn run(client: &Client, args: &Args) -> Result<(), Error> {
  let mut out = stdout().lock();

  if args.accounts {
    let _count = show_accounts(client, &mut out).await?;
  }

  if let Some(symbols) = args.symbols() {
    let count = if args.stream {
      stream_quotes(client, symbols.as_slice(), &mut out).await?
    } else {
      get_quotes(client, symbols.as_slice(), &mut out).await?
    };
    debug!(responses = count, "quotes retrieved");
  }
  Ok(())
}


#[tokio::main]
async fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  let provider: &dyn CredentialProvider = match args.credentials {
    CredentialSource::Keychain => &KeyringProvider,
    CredentialSource::Env => &EnvProvider,
  };

  let client = match Client::from_provider(provider) {
    Ok(client) => client,
    Err(err) => {
      error!("failed to load credentials: {}", format_error(&err));
      return ExitCode::FAILURE
    },
  };

  if args.symbols().is_none() && !args.accounts {
    let _result = Args::command().print_help();
    return ExitCode::SUCCESS
  }

  let result = run(&client, &args).await;
  let updates = client.wait_for_updates().await;
  debug!(updates, "rate limit updates processed");

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      error!("{}", format_error(&err));
      ExitCode::FAILURE
    },
  }
}
