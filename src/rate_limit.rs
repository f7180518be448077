// Copyright (C) 2026 The allyapi Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::str::FromStr;
use std::sync::Mutex;
use std::sync::PoisonError;

use chrono::DateTime;
use chrono::Utc;

use http::HeaderMap;

use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::api::HDR_RATELIMIT_EXPIRE;
use crate::api::HDR_RATELIMIT_LIMIT;
use crate::api::HDR_RATELIMIT_REMAINING;
use crate::api::HDR_RATELIMIT_USED;
use crate::error::RateLimitParseError;
use crate::time_util::parse_unix_timestamp;

/// The number of remaining calls below which we warn.
pub(crate) const LOW_BUDGET_THRESHOLD: u64 = 10;


/// Retrieve the value of a header as a string.
fn header_str<'h>(
  headers: &'h HeaderMap,
  header: &'static str,
) -> Result<&'h str, RateLimitParseError> {
  let value = headers
    .get(header)
    .ok_or(RateLimitParseError::Missing(header))?;

  value.to_str().map_err(|_| RateLimitParseError::Invalid {
    header,
    value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
  })
}


/// Parse the value of a header.
fn parse_header<T>(headers: &HeaderMap, header: &'static str) -> Result<T, RateLimitParseError>
where
  T: FromStr,
{
  let value = header_str(headers, header)?;
  value.parse::<T>().map_err(|_| RateLimitParseError::Invalid {
    header,
    value: value.to_string(),
  })
}


/// An indication that only few API calls are left in the current
/// rate limit window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LowBudget {
  /// The number of calls remaining.
  pub remaining: u64,
  /// The time at which the current limit expires, if known.
  pub expires: Option<DateTime<Utc>>,
}


/// The rate limit state as last reported by the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RateLimit {
  used: Option<u64>,
  limit: Option<u64>,
  remaining: Option<u64>,
  expires: Option<DateTime<Utc>>,
}

impl RateLimit {
  /// The number of API calls remaining, if any response reported it.
  #[inline]
  pub fn calls_remaining(&self) -> Option<u64> {
    self.remaining
  }

  /// The number of API calls used against the current limit.
  #[inline]
  pub fn used(&self) -> Option<u64> {
    self.used
  }

  /// The total number of API calls allowed in the current limit.
  #[inline]
  pub fn limit(&self) -> Option<u64> {
    self.limit
  }

  /// The time at which the current limit expires.
  ///
  /// This information is only evaluated once few calls remain.
  #[inline]
  pub fn expires(&self) -> Option<DateTime<Utc>> {
    self.expires
  }

  /// Update the state from the rate limit headers of a response.
  ///
  /// A missing or malformed remaining-calls header leaves the state
  /// untouched. The used and limit headers are optional.
  pub(crate) fn update(
    &mut self,
    headers: &HeaderMap,
  ) -> Result<Option<LowBudget>, RateLimitParseError> {
    let remaining = parse_header::<u64>(headers, HDR_RATELIMIT_REMAINING)?;
    self.remaining = Some(remaining);
    self.used = parse_header(headers, HDR_RATELIMIT_USED).ok();
    self.limit = parse_header(headers, HDR_RATELIMIT_LIMIT).ok();

    if remaining >= LOW_BUDGET_THRESHOLD {
      self.expires = None;
      return Ok(None)
    }

    let expires = header_str(headers, HDR_RATELIMIT_EXPIRE).and_then(parse_unix_timestamp);
    self.expires = match expires {
      Ok(expires) => Some(expires),
      Err(err) => {
        debug!(error = %err, "unable to determine rate limit expiration");
        None
      },
    };

    Ok(Some(LowBudget {
      remaining,
      expires: self.expires,
    }))
  }
}


/// Update the shared rate limit state from response headers, logging
/// the outcome.
pub(crate) fn record(state: &Mutex<RateLimit>, headers: &HeaderMap) -> Option<LowBudget> {
  let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);

  match state.update(headers) {
    Ok(Some(low)) => {
      match low.expires {
        Some(expires) => warn!(
          remaining = low.remaining,
          expires = %expires,
          "only {} API calls remaining; current limit set to expire at {}",
          low.remaining,
          expires
        ),
        None => warn!(
          remaining = low.remaining,
          "only {} API calls remaining",
          low.remaining
        ),
      }
      Some(low)
    },
    Ok(None) => {
      debug!(remaining = ?state.calls_remaining(), "rate limit updated");
      None
    },
    Err(err) => {
      error!(error = %err, "unable to determine API calls remaining");
      None
    },
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  use std::fmt::Debug;
  use std::mem::take;
  use std::sync::Arc;

  use chrono::Duration;
  use chrono::TimeZone as _;

  use http::HeaderName;
  use http::HeaderValue;

  use test_log::test;

  use tracing::field::Field;
  use tracing::field::Visit;
  use tracing::subscriber::with_default;
  use tracing::Event;
  use tracing::Level;
  use tracing::Subscriber;
  use tracing_subscriber::layer::Context;
  use tracing_subscriber::layer::Layer;
  use tracing_subscriber::layer::SubscriberExt as _;
  use tracing_subscriber::Registry;


  /// The fields of a captured event, formatted for comparison.
  #[derive(Debug, Default)]
  struct Fields(Vec<(String, String)>);

  impl Fields {
    /// Retrieve the formatted value of a field.
    fn get(&self, name: &str) -> Option<&str> {
      self
        .0
        .iter()
        .find(|(field, _)| field == name)
        .map(|(_, value)| value.as_str())
    }
  }

  impl Visit for Fields {
    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
      self.0.push((field.name().to_string(), format!("{value:?}")))
    }
  }


  /// A layer capturing all warning events.
  #[derive(Clone, Debug, Default)]
  struct Warnings(Arc<Mutex<Vec<Fields>>>);

  impl<S> Layer<S> for Warnings
  where
    S: Subscriber,
  {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
      if *event.metadata().level() == Level::WARN {
        let mut fields = Fields::default();
        event.record(&mut fields);
        self.0.lock().unwrap().push(fields);
      }
    }
  }

  /// Record the given headers, capturing the warnings emitted.
  fn record_warnings(state: &Mutex<RateLimit>, headers: &HeaderMap) -> Vec<Fields> {
    let warnings = Warnings::default();
    let subscriber = Registry::default().with(warnings.clone());
    let _low = with_default(subscriber, || record(state, headers));
    let captured = take(&mut *warnings.0.lock().unwrap());
    captured
  }


  /// Create a `HeaderMap` from the given header/value pairs.
  fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
      let name = HeaderName::from_bytes(name.as_bytes()).unwrap();
      let _ = headers.insert(name, HeaderValue::from_static(value));
    }
    headers
  }


  /// Check that a low remaining budget is flagged along with the
  /// expiration time.
  #[test]
  fn low_budget() {
    let state = Mutex::new(RateLimit::default());
    let headers = headers(&[
      ("X-Ratelimit-Used", "55"),
      ("X-Ratelimit-Expire", "1609459200.500000000"),
      ("X-Ratelimit-Limit", "60"),
      ("X-Ratelimit-Remaining", "5"),
    ]);

    let low = record(&state, &headers).unwrap();
    let expires = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap() + Duration::milliseconds(500);
    assert_eq!(low.remaining, 5);
    assert_eq!(low.expires, Some(expires));

    let state = state.lock().unwrap();
    assert_eq!(state.calls_remaining(), Some(5));
    assert_eq!(state.used(), Some(55));
    assert_eq!(state.limit(), Some(60));
    assert_eq!(state.expires(), Some(expires));
  }

  /// Check that no warning is emitted while enough calls remain.
  #[test]
  fn sufficient_budget() {
    let state = Mutex::new(RateLimit::default());
    let headers = headers(&[
      ("X-Ratelimit-Expire", "1609459200.500000000"),
      ("X-Ratelimit-Remaining", "50"),
    ]);

    assert_eq!(record(&state, &headers), None);
    let state = state.lock().unwrap();
    assert_eq!(state.calls_remaining(), Some(50));
    assert_eq!(state.expires(), None);
  }

  /// Check that a warning naming the remaining calls and the
  /// expiration is emitted only while the budget is low.
  #[test]
  fn low_budget_warning() {
    let state = Mutex::new(RateLimit::default());
    let low = headers(&[
      ("X-Ratelimit-Expire", "1609459200.000000000"),
      ("X-Ratelimit-Remaining", "5"),
    ]);
    let warnings = record_warnings(&state, &low);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].get("remaining"), Some("5"));
    assert_eq!(warnings[0].get("expires"), Some("2021-01-01 00:00:00 UTC"));
    assert!(
      warnings[0].get("message").unwrap().contains("only 5 API calls remaining"),
      "{:?}",
      warnings[0]
    );

    let sufficient = headers(&[
      ("X-Ratelimit-Expire", "1609459200.000000000"),
      ("X-Ratelimit-Remaining", "50"),
    ]);
    let warnings = record_warnings(&state, &sufficient);
    assert!(warnings.is_empty(), "{warnings:?}");
  }

  /// Check that the threshold itself does not count as low.
  #[test]
  fn threshold_budget() {
    let mut state = RateLimit::default();
    let result = state.update(&headers(&[("x-ratelimit-remaining", "10")]));
    assert_eq!(result, Ok(None));

    let result = state.update(&headers(&[("x-ratelimit-remaining", "9")]));
    let expected = LowBudget {
      remaining: 9,
      expires: None,
    };
    assert_eq!(result, Ok(Some(expected)));
  }

  /// Make sure that a missing or malformed remaining header is
  /// reported and leaves previous state intact.
  #[test]
  fn invalid_remaining() {
    let mut state = RateLimit::default();
    let _ = state
      .update(&headers(&[("x-ratelimit-remaining", "42")]))
      .unwrap();

    let err = state.update(&headers(&[])).unwrap_err();
    assert_eq!(err, RateLimitParseError::Missing(HDR_RATELIMIT_REMAINING));

    let err = state
      .update(&headers(&[("x-ratelimit-remaining", "many")]))
      .unwrap_err();
    let expected = RateLimitParseError::Invalid {
      header: HDR_RATELIMIT_REMAINING,
      value: "many".to_string(),
    };
    assert_eq!(err, expected);
    assert_eq!(state.calls_remaining(), Some(42));

    let state = Mutex::new(state);
    assert_eq!(record(&state, &headers(&[])), None);
  }

  /// Check that an invalid expiration does not suppress the warning.
  #[test]
  fn low_budget_invalid_expiration() {
    let mut state = RateLimit::default();
    let headers = headers(&[
      ("x-ratelimit-remaining", "1"),
      ("x-ratelimit-expire", "soon"),
    ]);
    let low = state.update(&headers).unwrap().unwrap();
    assert_eq!(low.remaining, 1);
    assert_eq!(low.expires, None);
  }
}
