// Copyright (C) 2026 The allyapi Developers
// SPDX-License-Identifier: GPL-3.0-or-later

#![allow(clippy::unreadable_literal)]
#![warn(
  bad_style,
  dead_code,
  future_incompatible,
  improper_ctypes,
  late_bound_lifetime_arguments,
  missing_copy_implementations,
  missing_debug_implementations,
  missing_docs,
  no_mangle_generic_items,
  non_shorthand_field_patterns,
  nonstandard_style,
  overflowing_literals,
  path_statements,
  patterns_in_fns_without_body,
  proc_macro_derive_resolution_fallback,
  renamed_and_removed_lints,
  rust_2018_compatibility,
  rust_2018_idioms,
  rustdoc::broken_intra_doc_links,
  stable_features,
  trivial_bounds,
  trivial_numeric_casts,
  type_alias_bounds,
  tyvar_behind_raw_pointer,
  unconditional_recursion,
  unreachable_code,
  unreachable_patterns,
  unstable_features,
  unstable_name_collisions,
  unused,
  unused_comparisons,
  unused_import_braces,
  unused_lifetimes,
  unused_qualifications,
  unused_results,
  while_true,
)]

//! A crate for interacting with the Ally Invest API.
//!
//! Requests are signed with OAuth1 credentials retrieved through a
//! [`CredentialProvider`]. Every response body may contain an
//! arbitrary number of JSON documents, each of which is decoded into
//! an [`ApiResponse`] and written out as soon as it is complete.
//! Rate limit information reported by the server is tracked in the
//! background; call [`Client::wait_for_updates`] before exiting to
//! make sure that all of it has been processed.

/// A module comprising the functionality backing interactions with the
/// API.
pub mod api;

mod client;
mod credentials;
mod decode;
mod error;
mod rate_limit;
mod response;
mod time_util;
mod transport;

pub use crate::client::Builder;
pub use crate::client::Client;
pub use crate::credentials::CredentialProvider;
pub use crate::credentials::Credentials;
pub use crate::credentials::EnvProvider;
pub use crate::credentials::KeyringProvider;
pub use crate::credentials::SERVICE;
pub use crate::error::CredentialError;
pub use crate::error::DecodeError;
pub use crate::error::Error;
pub use crate::error::HttpBody;
pub use crate::error::RateLimitParseError;
pub use crate::error::RequestBuildError;
pub use crate::error::TransportError;
pub use crate::rate_limit::LowBudget;
pub use crate::rate_limit::RateLimit;
pub use crate::response::ApiResponse;
pub use crate::response::Quote;
pub use crate::response::QuoteArray;
pub use crate::response::Quotes;
pub use crate::response::Response;
pub use crate::response::Trade;
pub use crate::transport::ByteStream;
pub use crate::transport::Form;
pub use crate::transport::HttpsTransport;
pub use crate::transport::Transport;
