// Copyright (C) 2026 The allyapi Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use chrono::DateTime;
use chrono::Utc;

use crate::error::RateLimitParseError;


/// Parse a Unix time stamp in `seconds.nanoseconds` format.
///
/// The parts on either side of the dot are taken as integers as they
/// are, i.e., `"12.5"` denotes twelve seconds and five nanoseconds.
/// Either part, but not both, may be empty, in which case it counts as
/// zero.
pub(crate) fn parse_unix_timestamp(time: &str) -> Result<DateTime<Utc>, RateLimitParseError> {
  let invalid = || RateLimitParseError::Timestamp(time.to_string());

  let (secs, nsecs) = time.split_once('.').unwrap_or((time, ""));
  if secs.is_empty() && nsecs.is_empty() {
    return Err(invalid())
  }
  let secs = if secs.is_empty() {
    0
  } else {
    secs.parse::<i64>().map_err(|_| invalid())?
  };
  let nsecs = if nsecs.is_empty() {
    0
  } else {
    nsecs.parse::<u32>().map_err(|_| invalid())?
  };

  if nsecs >= 1_000_000_000 {
    return Err(invalid())
  }
  DateTime::from_timestamp(secs, nsecs).ok_or_else(invalid)
}
