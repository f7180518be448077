// Copyright (C) 2026 The allyapi Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::io::Error as IoError;
use std::io::Write;
use std::mem::take;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use futures::StreamExt as _;
use futures::TryStreamExt as _;

use http::HeaderMap;
use http::Method;
use http::Request;
use http_body_util::Full;

use hyper::body::Bytes;
use hyper_util::client::legacy::Builder as HttpClientBuilder;
use hyper_util::client::legacy::Client as HttpClient;
use hyper_util::rt::TokioExecutor;

use serde_json::to_writer_pretty;

use tokio::task::JoinSet;

use tracing::debug;
use tracing::error;
use tracing::instrument;
use tracing::span;
use tracing::trace;
use tracing::Level;
use tracing_futures::Instrument;

use crate::credentials::CredentialProvider;
use crate::credentials::Credentials;
use crate::decode::JsonStream;
use crate::error::HttpBody;
use crate::rate_limit::record;
use crate::rate_limit::RateLimit;
use crate::response::ApiResponse;
use crate::transport::build_request;
use crate::transport::ByteStream;
use crate::transport::debug_request;
use crate::transport::Form;
use crate::transport::HttpsTransport;
use crate::transport::Transport;
use crate::Error;


/// Write the pretty-printed JSON representation of a response.
fn write_response<W>(out: &mut W, response: &ApiResponse) -> Result<(), Error>
where
  W: Write + ?Sized,
{
  to_writer_pretty(&mut *out, response).map_err(IoError::from)?;
  writeln!(out)?;
  // Streamed responses should show up as they arrive.
  out.flush()?;
  Ok(())
}


/// Collect the complete body of a response.
async fn collect_body(body: ByteStream) -> Result<Vec<u8>, Error> {
  body
    .try_fold(Vec::new(), |mut bytes, chunk| async move {
      bytes.extend_from_slice(&chunk);
      Ok(bytes)
    })
    .await
}


/// When decoded response units are written out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Delivery {
  /// Once the complete body has been decoded.
  Complete,
  /// As soon as each unit has been decoded.
  Incremental,
}


/// A builder for creating customized `Client` objects.
#[derive(Debug)]
pub struct Builder {
  builder: HttpClientBuilder,
  transport: Option<Box<dyn Transport>>,
}

impl Builder {
  /// Adjust the maximum number of idle connections per host.
  #[inline]
  pub fn max_idle_per_host(&mut self, max_idle: usize) -> &mut Self {
    let _ = self.builder.pool_max_idle_per_host(max_idle);
    self
  }

  /// Send requests through the provided `Transport` instead of
  /// talking HTTPS directly.
  #[inline]
  pub fn transport<T>(&mut self, transport: T) -> &mut Self
  where
    T: Transport + 'static,
  {
    self.transport = Some(Box::new(transport));
    self
  }

  /// Build the final `Client` object.
  pub fn build(&mut self, credentials: Credentials) -> Client {
    let transport = self
      .transport
      .take()
      .unwrap_or_else(|| Box::new(HttpsTransport::new(&self.builder)));

    Client {
      credentials,
      transport,
      rate_limit: Arc::new(Mutex::new(RateLimit::default())),
      updates: Mutex::new(JoinSet::new()),
    }
  }
}

impl Default for Builder {
  #[inline]
  fn default() -> Self {
    Self {
      builder: HttpClient::builder(TokioExecutor::new()),
      transport: None,
    }
  }
}


/// A `Client` is the entity used by clients of this module for
/// interacting with the Ally Invest API.
///
/// Every call hands the rate limit headers of its response to a
/// background task. Use [`Client::wait_for_updates`] before exiting
/// to make sure that all of them have been processed.
#[derive(Debug)]
pub struct Client {
  credentials: Credentials,
  transport: Box<dyn Transport>,
  rate_limit: Arc<Mutex<RateLimit>>,
  updates: Mutex<JoinSet<()>>,
}

impl Client {
  /// Instantiate a new `Builder` which allows for creating a customized `Client`.
  #[inline]
  pub fn builder() -> Builder {
    Builder::default()
  }

  /// Create a new `Client` signing requests with the given
  /// credentials.
  #[inline]
  pub fn new(credentials: Credentials) -> Self {
    Builder::default().build(credentials)
  }

  /// Create a new `Client` with credentials retrieved from the given
  /// provider.
  pub fn from_provider<P>(provider: &P) -> Result<Self, Error>
  where
    P: CredentialProvider + ?Sized,
  {
    let credentials = Credentials::load(provider)?;
    Ok(Self::new(credentials))
  }

  /// Issue a signed request to an endpoint and write the decoded
  /// response units to `out`.
  ///
  /// Endpoints starting with a slash are relative to the REST API's
  /// base URL. Nothing is written unless the complete body decoded
  /// successfully. On success the number of response units is
  /// returned.
  #[inline]
  pub async fn call<W>(
    &self,
    endpoint: &str,
    method: Method,
    form: Option<&Form>,
    out: &mut W,
  ) -> Result<usize, Error>
  where
    W: Write + ?Sized,
  {
    self
      .issue(endpoint, method, form, Delivery::Complete, out)
      .await
  }

  /// Issue a signed request to an endpoint and write each decoded
  /// response unit to `out` as soon as it arrives.
  ///
  /// This is meant for long lived responses. Units written before a
  /// failure stay written.
  #[inline]
  pub async fn stream<W>(
    &self,
    endpoint: &str,
    method: Method,
    form: Option<&Form>,
    out: &mut W,
  ) -> Result<usize, Error>
  where
    W: Write + ?Sized,
  {
    self
      .issue(endpoint, method, form, Delivery::Incremental, out)
      .await
  }

  /// Build a request and issue it inside a span.
  async fn issue<W>(
    &self,
    endpoint: &str,
    method: Method,
    form: Option<&Form>,
    delivery: Delivery,
    out: &mut W,
  ) -> Result<usize, Error>
  where
    W: Write + ?Sized,
  {
    let request = build_request(&self.credentials, method, endpoint, form)?;
    let span = span!(
      Level::INFO,
      "call",
      method = %request.method(),
      uri = %request.uri(),
      delivery = ?delivery
    );
    self.issue_(request, delivery, out).instrument(span).await
  }

  /// Issue a request.
  async fn issue_<W>(
    &self,
    request: Request<Full<Bytes>>,
    delivery: Delivery,
    out: &mut W,
  ) -> Result<usize, Error>
  where
    W: Write + ?Sized,
  {
    debug!("requesting");
    trace!(request = debug_request(&request));

    let response = self.transport.send(request).await?;
    let (parts, body) = response.into_parts();
    debug!(status = ?parts.status);
    trace!(headers = ?parts.headers);

    if !parts.status.is_success() {
      let bytes = collect_body(body).await?;
      self.schedule_rate_limit_update(parts.headers);
      return Err(Error::HttpStatus(parts.status, HttpBody(bytes)))
    }

    let mut responses = JsonStream::<_, ApiResponse>::new(body);
    let count = match delivery {
      Delivery::Complete => {
        let responses = responses.try_collect::<Vec<_>>().await?;
        for response in &responses {
          write_response(out, response)?;
        }
        responses.len()
      },
      Delivery::Incremental => {
        let mut count = 0;
        while let Some(response) = responses.next().await {
          let response = response?;
          write_response(out, &response)?;
          count += 1;
        }
        count
      },
    };
    debug!(count, "response decoded");

    self.schedule_rate_limit_update(parts.headers);
    Ok(count)
  }

  /// Issue a GET request to an endpoint.
  #[inline]
  pub async fn get<W>(&self, endpoint: &str, out: &mut W) -> Result<usize, Error>
  where
    W: Write + ?Sized,
  {
    self.call(endpoint, Method::GET, None, out).await
  }

  /// Issue a POST request with the given form parameters to an
  /// endpoint.
  #[inline]
  pub async fn post<W>(&self, endpoint: &str, form: &Form, out: &mut W) -> Result<usize, Error>
  where
    W: Write + ?Sized,
  {
    self.call(endpoint, Method::POST, Some(form), out).await
  }

  /// Evaluate the rate limit headers of a response in the background.
  fn schedule_rate_limit_update(&self, headers: HeaderMap) {
    let state = Arc::clone(&self.rate_limit);
    let span = span!(Level::DEBUG, "rate_limit");
    let future = async move {
      let _low = record(&state, &headers);
    };

    let mut updates = self.updates.lock().unwrap_or_else(PoisonError::into_inner);
    let _handle = updates.spawn(future.instrument(span));
  }

  /// Wait for all pending rate limit updates to finish.
  ///
  /// The number of updates waited for is returned.
  #[instrument(level = "debug", skip(self))]
  pub async fn wait_for_updates(&self) -> usize {
    let mut updates = {
      let mut updates = self.updates.lock().unwrap_or_else(PoisonError::into_inner);
      take(&mut *updates)
    };

    let mut count = 0;
    while let Some(result) = updates.join_next().await {
      if let Err(err) = result {
        error!(error = %err, "rate limit update did not complete");
      }
      count += 1;
    }
    count
  }

  /// Retrieve a snapshot of the current rate limit state.
  pub fn rate_limit(&self) -> RateLimit {
    *self
      .rate_limit
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }
}
