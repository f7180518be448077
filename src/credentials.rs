// Copyright (C) 2026 The allyapi Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::env::var_os;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;

use keyring::Entry;
use keyring::Error as KeyringError;

use tracing::debug;
use tracing::instrument;

use crate::error::CredentialError;

/// The service under which all secrets are stored.
pub const SERVICE: &str = "TradeKing";
/// The account name of the OAuth consumer key.
const ACCOUNT_CONSUMER_KEY: &str = "consumer_key";
/// The account name of the OAuth consumer secret.
const ACCOUNT_CONSUMER_SECRET: &str = "consumer_secret";
/// The account name of the OAuth access token.
const ACCOUNT_ACCESS_TOKEN: &str = "access_token";
/// The account name of the OAuth access token secret.
const ACCOUNT_ACCESS_SECRET: &str = "access_secret";


/// A capability for retrieving secrets by service and account name.
pub trait CredentialProvider {
  /// Find all secrets stored for the given service and account.
  fn find(&self, service: &str, account: &str) -> Result<Vec<String>, CredentialError>;

  /// Look up the one secret stored for the given service and account.
  ///
  /// It is an error for the provider to report no or more than one
  /// secret.
  fn lookup(&self, service: &str, account: &str) -> Result<String, CredentialError> {
    let mut secrets = self.find(service, account)?;
    match secrets.len() {
      0 => Err(CredentialError::NotFound {
        service: service.to_string(),
        account: account.to_string(),
      }),
      1 => Ok(secrets.remove(0)),
      count => Err(CredentialError::Ambiguous {
        service: service.to_string(),
        account: account.to_string(),
        count,
      }),
    }
  }
}


/// A provider retrieving secrets from the platform's secure store
/// (Keychain, Credential Manager, or Secret Service).
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyringProvider;

impl CredentialProvider for KeyringProvider {
  fn find(&self, service: &str, account: &str) -> Result<Vec<String>, CredentialError> {
    let entry = Entry::new(service, account)?;
    match entry.get_password() {
      Ok(secret) => Ok(vec![secret]),
      Err(KeyringError::NoEntry) => Ok(Vec::new()),
      Err(KeyringError::Ambiguous(entries)) => Err(CredentialError::Ambiguous {
        service: service.to_string(),
        account: account.to_string(),
        count: entries.len(),
      }),
      Err(err) => Err(CredentialError::from(err)),
    }
  }
}


/// A provider retrieving secrets from the environment.
///
/// The secret for a service and account is read from the variable
/// `<SERVICE>_<ACCOUNT>`, upper cased. E.g., the consumer key is
/// retrieved from `TRADEKING_CONSUMER_KEY`.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvProvider;

impl EnvProvider {
  /// Assemble the name of the variable for a service and account.
  fn variable(service: &str, account: &str) -> String {
    format!("{service}_{account}").to_uppercase()
  }
}

impl CredentialProvider for EnvProvider {
  fn find(&self, service: &str, account: &str) -> Result<Vec<String>, CredentialError> {
    let variable = Self::variable(service, account);
    match var_os(&variable) {
      None => Ok(Vec::new()),
      Some(value) => {
        let value = value
          .into_string()
          .map_err(|_| CredentialError::Env(variable))?;
        Ok(vec![value])
      },
    }
  }
}


/// The OAuth1 credentials used for signing requests.
#[derive(Clone, PartialEq)]
pub struct Credentials {
  /// The consumer (client) key.
  pub(crate) consumer_key: String,
  /// The consumer (client) secret.
  pub(crate) consumer_secret: String,
  /// The access token.
  pub(crate) access_token: String,
  /// The access token secret.
  pub(crate) access_secret: String,
}

impl Credentials {
  /// Create a `Credentials` object from the required data.
  pub fn from_parts(
    consumer_key: impl ToString,
    consumer_secret: impl ToString,
    access_token: impl ToString,
    access_secret: impl ToString,
  ) -> Self {
    Self {
      consumer_key: consumer_key.to_string(),
      consumer_secret: consumer_secret.to_string(),
      access_token: access_token.to_string(),
      access_secret: access_secret.to_string(),
    }
  }

  /// Load all four secrets from the given provider.
  #[instrument(level = "debug", skip(provider))]
  pub fn load<P>(provider: &P) -> Result<Self, CredentialError>
  where
    P: CredentialProvider + ?Sized,
  {
    let credentials = Self {
      consumer_key: provider.lookup(SERVICE, ACCOUNT_CONSUMER_KEY)?,
      consumer_secret: provider.lookup(SERVICE, ACCOUNT_CONSUMER_SECRET)?,
      access_token: provider.lookup(SERVICE, ACCOUNT_ACCESS_TOKEN)?,
      access_secret: provider.lookup(SERVICE, ACCOUNT_ACCESS_SECRET)?,
    };
    debug!("credentials loaded");
    Ok(credentials)
  }
}

impl Debug for Credentials {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    const MASKED: &str = "<masked>";

    f.debug_struct("Credentials")
      .field("consumer_key", &MASKED)
      .field("consumer_secret", &MASKED)
      .field("access_token", &MASKED)
      .field("access_secret", &MASKED)
      .finish()
  }
}
