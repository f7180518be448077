// Copyright (C) 2026 The allyapi Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::io::Write;

use crate::Client;
use crate::Error;

/// The path of the account listing endpoint.
const ACCOUNTS_PATH: &str = "/accounts.json";


/// List the user's accounts, writing the result to `out`.
pub async fn show_accounts<W>(client: &Client, out: &mut W) -> Result<usize, Error>
where
  W: Write + ?Sized,
{
  client.get(ACCOUNTS_PATH, out).await
}
