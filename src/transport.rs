// Copyright (C) 2026 The allyapi Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::pin::Pin;

use async_trait::async_trait;

use futures::Stream;
use futures::TryStreamExt as _;

use http::header::AUTHORIZATION;
use http::header::CONTENT_TYPE;
use http::request::Builder as HttpRequestBuilder;
use http::HeaderMap;
use http::HeaderValue;
use http::Method;
use http::Request;
use http::Response;
use http_body_util::BodyExt as _;
use http_body_util::Full;

use hyper::body::Bytes;
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Builder as HttpClientBuilder;
use hyper_util::client::legacy::Client as HttpClient;

use tracing::field::debug;
use tracing::field::DebugValue;

use oauth1_request::ParameterList;
use oauth1_request::Token;
use oauth1_request::HMAC_SHA1;

use url::Url;

use crate::api::API_BASE_URL;
use crate::credentials::Credentials;
use crate::error::RequestBuildError;
use crate::error::TransportError;
use crate::Error;

/// The content type of URL-encoded form data.
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";


/// A stream of response body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;


/// A set of form parameters, each key mapping to one or more values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Form(BTreeMap<String, Vec<String>>);

impl Form {
  /// Create an empty `Form`.
  #[inline]
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a value for the given key.
  pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
    self.0.entry(key.into()).or_default().push(value.into());
    self
  }

  /// Retrieve the values associated with a key.
  pub fn get(&self, key: &str) -> Option<&[String]> {
    self.0.get(key).map(Vec::as_slice)
  }

  /// Check whether the form contains no parameters.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Retrieve all key-value pairs, sorted by key and then by value.
  ///
  /// OAuth1 signatures are computed over parameters in this order.
  fn pairs(&self) -> Vec<(&str, &str)> {
    self
      .0
      .iter()
      .flat_map(|(key, values)| {
        let mut values = values.iter().map(String::as_str).collect::<Vec<_>>();
        values.sort_unstable();
        values.into_iter().map(move |value| (key.as_str(), value))
      })
      .collect()
  }

  /// URL-encode all parameters.
  fn encode(&self) -> Result<String, RequestBuildError> {
    let encoded = serde_urlencoded::to_string(self.pairs())?;
    Ok(encoded)
  }
}

impl<K, V> FromIterator<(K, V)> for Form
where
  K: Into<String>,
  V: Into<String>,
{
  fn from_iter<I>(iter: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
  {
    let mut form = Self::new();
    for (key, value) in iter {
      let _ = form.add(key, value);
    }
    form
  }
}


/// Resolve an endpoint into a URL.
///
/// Endpoints starting with a slash are relative to the REST API's
/// base URL, everything else is expected to be an absolute URL.
pub(crate) fn resolve(endpoint: &str) -> Result<Url, RequestBuildError> {
  let url = if endpoint.starts_with('/') {
    Url::parse(&format!("{API_BASE_URL}{endpoint}"))?
  } else {
    Url::parse(endpoint)?
  };
  Ok(url)
}


/// Compute the OAuth1 `Authorization` header value for a request.
fn authorization(
  credentials: &Credentials,
  method: &Method,
  url: &Url,
  form: &Form,
) -> Result<String, RequestBuildError> {
  let token = Token::from_parts(
    credentials.consumer_key.as_str(),
    credentials.consumer_secret.as_str(),
    credentials.access_token.as_str(),
    credentials.access_secret.as_str(),
  );
  let params = ParameterList::new(form.pairs());

  let header = match *method {
    Method::GET => oauth1_request::get(url.as_str(), &params, &token, HMAC_SHA1),
    Method::POST => oauth1_request::post(url.as_str(), &params, &token, HMAC_SHA1),
    _ => return Err(RequestBuildError::Method(method.clone())),
  };
  Ok(header)
}


/// Create a signed `Request` to the given endpoint.
///
/// Form parameters end up URL-encoded in the body of POST requests
/// and in the query string of GET requests.
pub(crate) fn build_request(
  credentials: &Credentials,
  method: Method,
  endpoint: &str,
  form: Option<&Form>,
) -> Result<Request<Full<Bytes>>, RequestBuildError> {
  let empty = Form::new();
  let form = form.unwrap_or(&empty);
  let mut url = resolve(endpoint)?;
  let authorization = authorization(credentials, &method, &url, form)?;

  let mut builder = HttpRequestBuilder::new().header(AUTHORIZATION, authorization);
  let body = if method == Method::POST {
    builder = builder.header(CONTENT_TYPE, FORM_CONTENT_TYPE);
    Bytes::from(form.encode()?)
  } else {
    if !form.is_empty() {
      url.set_query(Some(&form.encode()?));
    }
    Bytes::new()
  };

  let request = builder
    .method(method)
    .uri(url.as_str())
    .body(Full::new(body))?;
  Ok(request)
}


/// A type providing a debug representation of HTTP headers, with
/// sensitive data being masked out.
struct DebugHeaders<'h> {
  headers: &'h HeaderMap<HeaderValue>,
}

impl Debug for DebugHeaders<'_> {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    static MASKED: HeaderValue = HeaderValue::from_static("<masked>");

    f.debug_map()
      .entries(self.headers.iter().map(|(k, v)| {
        if k == AUTHORIZATION {
          (k, &MASKED)
        } else {
          (k, v)
        }
      }))
      .finish()
  }
}


/// A type providing a debug representation of an HTTP request, with
/// sensitive data being masked out.
pub(crate) struct DebugRequest<'r> {
  request: &'r Request<Full<Bytes>>,
}

impl Debug for DebugRequest<'_> {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    // Method and URI are part of the span at the usage site already.
    f.debug_struct("Request")
      .field("version", &self.request.version())
      .field(
        "headers",
        &DebugHeaders {
          headers: self.request.headers(),
        },
      )
      .field("body", self.request.body())
      .finish()
  }
}


/// Emit a debug representation of an HTTP request.
pub(crate) fn debug_request(request: &Request<Full<Bytes>>) -> DebugValue<DebugRequest<'_>> {
  debug(DebugRequest { request })
}


/// The seam through which signed requests are sent.
#[async_trait]
pub trait Transport: Debug + Send + Sync {
  /// Send a request and return the response with its body as a stream
  /// of chunks.
  async fn send(&self, request: Request<Full<Bytes>>) -> Result<Response<ByteStream>, Error>;
}


/// A `Transport` talking HTTPS through `hyper`.
#[derive(Debug)]
pub struct HttpsTransport {
  client: HttpClient<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl HttpsTransport {
  /// Create an `HttpsTransport` from a configured client builder.
  pub(crate) fn new(builder: &HttpClientBuilder) -> Self {
    let https = HttpsConnector::new();
    let client = builder.build(https);
    Self { client }
  }
}

#[async_trait]
impl Transport for HttpsTransport {
  async fn send(&self, request: Request<Full<Bytes>>) -> Result<Response<ByteStream>, Error> {
    let response = self
      .client
      .request(request)
      .await
      .map_err(TransportError::from)?;

    let response = response.map(|body| -> ByteStream {
      Box::pin(
        body
          .into_data_stream()
          .map_err(|err| Error::from(TransportError::from(err))),
      )
    });
    Ok(response)
  }
}
