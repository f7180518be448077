// Copyright (C) 2026 The allyapi Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::io::Write;

use http::Method;

use crate::api::STREAM_BASE_URL;
use crate::transport::Form;
use crate::Client;
use crate::Error;

/// The path of the batch quote endpoint, relative to the REST API.
const QUOTES_PATH: &str = "/market/ext/quotes.json";
/// The path of the streaming quote endpoint, relative to the streaming
/// API.
const STREAM_QUOTES_PATH: &str = "/market/quotes.json";


/// Create the form requesting quotes for the given symbols.
///
/// Symbols are joined by comma in the order given, duplicates
/// included.
fn symbols_form<S>(symbols: &[S]) -> Form
where
  S: AsRef<str>,
{
  let symbols = symbols
    .iter()
    .map(AsRef::as_ref)
    .collect::<Vec<_>>()
    .join(",");

  let mut form = Form::new();
  let _ = form.add("symbols", symbols);
  form
}


/// Retrieve quotes for the given symbols and write them to `out`.
///
/// Nothing is written if any part of the response fails to decode.
pub async fn get_quotes<S, W>(client: &Client, symbols: &[S], out: &mut W) -> Result<usize, Error>
where
  S: AsRef<str>,
  W: Write + ?Sized,
{
  client.post(QUOTES_PATH, &symbols_form(symbols), out).await
}


/// Stream trades for the given symbols, writing each to `out` as it
/// arrives.
///
/// The returned future only resolves once the server closes the
/// connection. Trades written before a failure stay written.
pub async fn stream_quotes<S, W>(
  client: &Client,
  symbols: &[S],
  out: &mut W,
) -> Result<usize, Error>
where
  S: AsRef<str>,
  W: Write + ?Sized,
{
  let endpoint = format!("{STREAM_BASE_URL}{STREAM_QUOTES_PATH}");
  let form = symbols_form(symbols);
  client.stream(&endpoint, Method::POST, Some(&form), out).await
}
