// Copyright (C) 2026 The allyapi Developers
// SPDX-License-Identifier: GPL-3.0-or-later

/// Functionality for listing the user's accounts.
pub mod accounts;
/// Functionality for retrieving quotes.
pub mod quotes;

/// The versioned base URL of the REST API.
pub(crate) const API_BASE_URL: &str = "https://devapi.invest.ally.com/v1";
/// The versioned base URL of the streaming API.
pub(crate) const STREAM_BASE_URL: &str = "https://devapi-stream.invest.ally.com/v1";

/// The HTTP header with the number of requests sent against the
/// current limit.
pub(crate) const HDR_RATELIMIT_USED: &str = "x-ratelimit-used";
/// The HTTP header with the Unix time stamp at which the current limit
/// expires.
pub(crate) const HDR_RATELIMIT_EXPIRE: &str = "x-ratelimit-expire";
/// The HTTP header with the total number of requests allowed in the
/// current limit.
pub(crate) const HDR_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
/// The HTTP header with the number of requests remaining in the
/// current limit.
pub(crate) const HDR_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
