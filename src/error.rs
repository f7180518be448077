// Copyright (C) 2026 The allyapi Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::io::Error as IoError;
use std::str::from_utf8;

use http::Error as HttpError;
use http::Method;
use http::StatusCode as HttpStatusCode;
use hyper::Error as HyperError;
use hyper_util::client::legacy::Error as ClientError;
use keyring::Error as KeyringError;
use serde_json::Error as JsonError;
use serde_urlencoded::ser::Error as FormError;
use thiserror::Error;
use url::ParseError;


/// A failure to resolve one of the secrets required for signing
/// requests.
#[derive(Debug, Error)]
pub enum CredentialError {
  /// The store does not contain a secret for the given service and
  /// account.
  #[error("no secret found for account {account} of service {service}")]
  NotFound {
    /// The service that was queried.
    service: String,
    /// The account that was queried.
    account: String,
  },
  /// The store contains more than one secret for the given service
  /// and account.
  #[error("found {count} secrets for account {account} of service {service}")]
  Ambiguous {
    /// The service that was queried.
    service: String,
    /// The account that was queried.
    account: String,
    /// The number of matches reported by the store.
    count: usize,
  },
  /// The environment variable carrying a secret is not a valid
  /// string.
  #[error("{0} environment variable is not a valid string")]
  Env(String),
  /// The platform's secure store reported an error.
  #[error("the secure credential store reported an error")]
  Store(
    #[from]
    #[source]
    KeyringError,
  ),
}


/// An error encountered while putting together a request.
#[derive(Debug, Error)]
pub enum RequestBuildError {
  /// The endpoint could not be resolved into a valid URL.
  #[error("failed to parse the URL")]
  Url(
    #[from]
    #[source]
    ParseError,
  ),
  /// The HTTP request could not be constructed.
  #[error("failed to construct the HTTP request")]
  Http(
    #[from]
    #[source]
    HttpError,
  ),
  /// Form parameters could not be URL-encoded.
  #[error("failed to URL-encode form parameters")]
  Form(
    #[from]
    #[source]
    FormError,
  ),
  /// Only GET and POST requests can be issued.
  #[error("unsupported HTTP method: {0}")]
  Method(Method),
}


/// An error encountered while exchanging data with the server.
#[derive(Debug, Error)]
pub enum TransportError {
  /// The request could not be delivered or no response was received.
  #[error("the HTTP client reported an error")]
  Client(
    #[from]
    #[source]
    ClientError,
  ),
  /// Reading the response body failed.
  #[error("failed to read the response body")]
  Body(
    #[from]
    #[source]
    HyperError,
  ),
}


/// A failure to decode a response unit.
#[derive(Debug, Error)]
pub enum DecodeError {
  /// A quote payload was empty.
  #[error("no quote data to decode")]
  Empty,
  /// A quote payload started with something other than an object or
  /// an array.
  #[error("unexpected leading byte {0:#04x} in quote data")]
  UnexpectedToken(u8),
  /// A field transmitted as a string does not hold a valid number.
  #[error("failed to parse field `{field}` from {value:?}")]
  Field {
    /// The name of the offending field.
    field: &'static str,
    /// The raw value as transmitted.
    value: String,
  },
  /// The data are not valid JSON or do not have the expected shape.
  #[error("a JSON conversion failed")]
  Json(
    #[from]
    #[source]
    JsonError,
  ),
}


/// A recoverable failure to evaluate the rate limit headers of a
/// response.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RateLimitParseError {
  /// A required header was not present.
  #[error("the {0} header is missing")]
  Missing(&'static str),
  /// A header value could not be parsed.
  #[error("the {header} header has invalid value {value:?}")]
  Invalid {
    /// The name of the header.
    header: &'static str,
    /// The raw header value.
    value: String,
  },
  /// A Unix time stamp is malformed.
  #[error("invalid time stamp {0:?}")]
  Timestamp(String),
}


/// The body of an HTTP response.
#[derive(Clone, Debug, Error)]
pub struct HttpBody(pub(crate) Vec<u8>);

impl Display for HttpBody {
  fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
    match from_utf8(&self.0) {
      Ok(s) => fmt.write_str(s)?,
      Err(b) => write!(fmt, "{:?}", b)?,
    }
    Ok(())
  }
}


/// The error type as used by this crate.
#[derive(Debug, Error)]
pub enum Error {
  /// The credentials could not be loaded.
  #[error("failed to load credentials")]
  Credential(
    #[from]
    #[source]
    CredentialError,
  ),
  /// A request could not be constructed.
  #[error("failed to build request")]
  RequestBuild(
    #[from]
    #[source]
    RequestBuildError,
  ),
  /// The HTTP exchange failed.
  #[error("failed to exchange data with the server")]
  Transport(
    #[from]
    #[source]
    TransportError,
  ),
  /// We encountered an HTTP status code that represents a failure.
  #[error("encountered an unexpected HTTP status: {0}")]
  HttpStatus(HttpStatusCode, #[source] HttpBody),
  /// A response unit could not be decoded.
  #[error("failed to decode response")]
  Decode(
    #[from]
    #[source]
    DecodeError,
  ),
  /// A decoded response could not be written out.
  #[error("failed to write decoded response")]
  Output(
    #[from]
    #[source]
    IoError,
  ),
}
