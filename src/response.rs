// Copyright (C) 2026 The allyapi Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::BTreeMap;
use std::ops::Deref;
use std::str::FromStr;

use serde::de::Error as _;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_json::from_slice as from_json;
use serde_json::value::RawValue;
use serde_json::Value;

use crate::error::DecodeError;


/// The fields of a single symbol's quote, keyed by field name.
pub type Quote = BTreeMap<String, String>;


/// Parse an optional field transmitted as a string into a number.
fn parse_field<T>(field: &'static str, value: Option<String>) -> Result<Option<T>, DecodeError>
where
  T: FromStr,
{
  match value {
    None => Ok(None),
    Some(value) => match value.parse::<T>() {
      Ok(number) => Ok(Some(number)),
      Err(_) => Err(DecodeError::Field { field, value }),
    },
  }
}


/// A sequence of quotes.
///
/// The API reports a single quote as a bare object and multiple ones
/// as an array of objects. Both shapes end up as a sequence here.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct QuoteArray(Vec<Quote>);

impl QuoteArray {
  /// Decode a `QuoteArray` from the raw JSON representation of the
  /// quote value.
  ///
  /// The first significant byte decides how the data are interpreted:
  /// `[` introduces a list of quotes and `{` a single one. Anything
  /// else is an error.
  pub fn from_raw(data: &[u8]) -> Result<Self, DecodeError> {
    let start = data
      .iter()
      .position(|byte| !byte.is_ascii_whitespace())
      .unwrap_or(data.len());
    let data = &data[start..];

    match data.first() {
      None => Err(DecodeError::Empty),
      Some(b'[') => Ok(Self(from_json::<Vec<Quote>>(data)?)),
      Some(b'{') => Ok(Self(vec![from_json::<Quote>(data)?])),
      Some(byte) => Err(DecodeError::UnexpectedToken(*byte)),
    }
  }

  /// Retrieve the contained quotes.
  #[inline]
  pub fn into_inner(self) -> Vec<Quote> {
    self.0
  }
}

impl Deref for QuoteArray {
  type Target = [Quote];

  fn deref(&self) -> &Self::Target {
    &self.0
  }
}

impl<'de> Deserialize<'de> for QuoteArray {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    let raw = Box::<RawValue>::deserialize(deserializer)?;
    Self::from_raw(raw.get().as_bytes()).map_err(D::Error::custom)
  }
}


/// The quotes contained in a batch quote response.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Quotes {
  /// The kind of quotes reported.
  #[serde(rename = "quotetype", default, skip_serializing_if = "Option::is_none")]
  pub quote_type: Option<String>,
  /// The quotes, one per symbol.
  #[serde(rename = "quote", default, skip_serializing_if = "Option::is_none")]
  pub quote: Option<QuoteArray>,
}


/// The wire representation of a [`Response`].
#[derive(Deserialize)]
struct ResponseRepr {
  #[serde(rename = "@id", default)]
  id: Option<String>,
  #[serde(rename = "elapsedtime", default)]
  elapsed_time: Option<String>,
  #[serde(default)]
  error: Option<String>,
  #[serde(default)]
  quotes: Option<Quotes>,
  #[serde(default)]
  accounts: Option<Value>,
}


/// The payload of a response to a REST request.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(try_from = "ResponseRepr")]
pub struct Response {
  /// The identifier of the request.
  #[serde(rename = "@id", skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  /// The time it took the server to handle the request.
  #[serde(rename = "elapsedtime", skip_serializing_if = "Option::is_none")]
  pub elapsed_time: Option<u64>,
  /// The error message; "Success" if everything went fine.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  /// Quotes, if quotes were requested.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub quotes: Option<Quotes>,
  /// The account listing, passed through as is.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub accounts: Option<Value>,
}

impl TryFrom<ResponseRepr> for Response {
  type Error = DecodeError;

  fn try_from(other: ResponseRepr) -> Result<Self, Self::Error> {
    Ok(Self {
      id: other.id,
      elapsed_time: parse_field("elapsedtime", other.elapsed_time)?,
      error: other.error,
      quotes: other.quotes,
      accounts: other.accounts,
    })
  }
}


/// The wire representation of a [`Trade`].
#[derive(Deserialize)]
struct TradeRepr {
  #[serde(default)]
  cvol: Option<String>,
  #[serde(default)]
  datetime: Option<String>,
  #[serde(default)]
  exch: Option<BTreeMap<String, Value>>,
  #[serde(default)]
  last: Option<String>,
  #[serde(default)]
  symbol: Option<String>,
  #[serde(default)]
  timestamp: Option<String>,
  #[serde(default)]
  vl: Option<String>,
  #[serde(default)]
  vwap: Option<String>,
}


/// A trade event as reported by the streaming endpoint.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(try_from = "TradeRepr")]
pub struct Trade {
  /// The cumulative volume.
  #[serde(rename = "cvol", skip_serializing_if = "Option::is_none")]
  pub cumulative_volume: Option<u64>,
  /// The date and time of the trade.
  #[serde(rename = "datetime", skip_serializing_if = "Option::is_none")]
  pub date_time: Option<String>,
  /// Information about the exchange the trade happened on.
  #[serde(rename = "exch", skip_serializing_if = "Option::is_none")]
  pub exchange: Option<BTreeMap<String, Value>>,
  /// The price of the trade.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last: Option<f64>,
  /// The symbol traded.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub symbol: Option<String>,
  /// The Unix time stamp of the trade.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timestamp: Option<i64>,
  /// The volume of the trade.
  #[serde(rename = "vl", skip_serializing_if = "Option::is_none")]
  pub volume: Option<u64>,
  /// The volume weighted average price.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub vwap: Option<f64>,
}

impl TryFrom<TradeRepr> for Trade {
  type Error = DecodeError;

  fn try_from(other: TradeRepr) -> Result<Self, Self::Error> {
    Ok(Self {
      cumulative_volume: parse_field("cvol", other.cvol)?,
      date_time: other.datetime,
      exchange: other.exch,
      last: parse_field("last", other.last)?,
      symbol: other.symbol,
      timestamp: parse_field("timestamp", other.timestamp)?,
      volume: parse_field("vl", other.vl)?,
      vwap: parse_field("vwap", other.vwap)?,
    })
  }
}


/// A single unit of data as received from the API.
///
/// REST endpoints populate `response` while the streaming endpoint
/// reports a `status` followed by a series of `trade` events.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ApiResponse {
  /// The connection status, as reported by the streaming endpoint.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
  /// The payload of a REST response.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub response: Option<Response>,
  /// A streamed trade.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub trade: Option<Trade>,
}

impl ApiResponse {
  /// Retrieve the quotes contained in the response, if any.
  pub fn quotes(&self) -> Option<&QuoteArray> {
    self
      .response
      .as_ref()
      .and_then(|response| response.quotes.as_ref())
      .and_then(|quotes| quotes.quote.as_ref())
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  use serde_json::from_str as from_json_str;
  use serde_json::json;
  use serde_json::to_value;


  /// A batch quote response for a single symbol.
  const SINGLE_QUOTE: &str = r#"{
  "response": {
    "@id": "7b0c2a0d:4e1e:4d60:9f5a:3a0e7e6b5b0b",
    "elapsedtime": "12",
    "quotes": {
      "quotetype": "Delayed",
      "quote": {"symbol": "AAPL", "ask": "131.01", "bid": "130.99"}
    },
    "error": "Success"
  }
}"#;


  /// Check that we can decode a response carrying a single quote.
  #[test]
  fn decode_single_quote_response() {
    let response = from_json_str::<ApiResponse>(SINGLE_QUOTE).unwrap();
    let inner = response.response.as_ref().unwrap();
    assert_eq!(inner.elapsed_time, Some(12));
    assert_eq!(inner.error.as_deref(), Some("Success"));

    let quotes = response.quotes().unwrap();
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0]["symbol"], "AAPL");
    assert_eq!(quotes[0]["ask"], "131.01");
  }

  /// Check that a bare quote object and a single element array of the
  /// same quote decode to the same thing.
  #[test]
  fn object_array_equivalence() {
    let quotes = [
      r#"{"symbol": "AAPL", "last": "131.00"}"#,
      r#"{}"#,
      r#"{"symbol": "MSFT", "bid": "", "ask": "222.42", "name": "MICROSOFT CORP"}"#,
    ];

    for quote in quotes {
      let object = QuoteArray::from_raw(quote.as_bytes()).unwrap();
      let array = QuoteArray::from_raw(format!("[{quote}]").as_bytes()).unwrap();
      assert_eq!(object, array);
      assert_eq!(object.len(), 1);
    }
  }

  /// Check that multiple quotes are decoded in order.
  #[test]
  fn decode_quote_array() {
    let data = br#" [{"symbol": "AAPL"}, {"symbol": "MSFT"}]"#;
    let quotes = QuoteArray::from_raw(data).unwrap().into_inner();
    let symbols = quotes
      .iter()
      .map(|quote| quote["symbol"].as_str())
      .collect::<Vec<_>>();
    assert_eq!(symbols, vec!["AAPL", "MSFT"]);
  }

  /// Make sure that empty quote data are rejected.
  #[test]
  fn empty_quote_data() {
    for data in [&b""[..], &b"  \n"[..]] {
      let err = QuoteArray::from_raw(data).unwrap_err();
      assert!(matches!(err, DecodeError::Empty), "{err:?}");
    }
  }

  /// Make sure that quote data of unexpected shape are rejected
  /// explicitly.
  #[test]
  fn unexpected_quote_data() {
    let err = QuoteArray::from_raw(br#""AAPL""#).unwrap_err();
    assert!(matches!(err, DecodeError::UnexpectedToken(b'"')), "{err:?}");

    let err = from_json_str::<Quotes>(r#"{"quote": 42}"#).unwrap_err();
    assert!(err.to_string().contains("0x34"), "{err}");
  }

  /// Check that a streamed trade is decoded with numbers parsed.
  #[test]
  fn decode_trade() {
    let data = r#"{"trade":{
      "cvol":"39179","datetime":"2014-05-29T13:23:46-04:00","exch":{},
      "last":"1.0200","symbol":"F","timestamp":"1401384226","vl":"100",
      "vwap":"1.0200"
    }}"#;
    let trade = from_json_str::<ApiResponse>(data).unwrap().trade.unwrap();
    assert_eq!(trade.cumulative_volume, Some(39179));
    assert_eq!(trade.last, Some(1.02));
    assert_eq!(trade.symbol.as_deref(), Some("F"));
    assert_eq!(trade.timestamp, Some(1401384226));
    assert_eq!(trade.volume, Some(100));
    assert_eq!(trade.vwap, Some(1.02));
    assert_eq!(trade.exchange, Some(BTreeMap::new()));
  }

  /// Check that a malformed numeric field is reported by name.
  #[test]
  fn decode_trade_invalid_field() {
    let data = r#"{"trade":{"symbol":"F","last":"one"}}"#;
    let err = from_json_str::<ApiResponse>(data).unwrap_err();
    assert!(err.to_string().contains("`last`"), "{err}");

    let data = r#"{"response":{"elapsedtime":"1.5"}}"#;
    let err = from_json_str::<ApiResponse>(data).unwrap_err();
    assert!(err.to_string().contains("`elapsedtime`"), "{err}");
  }

  /// Check that absent fields stay absent when serializing.
  #[test]
  fn serialize_omits_absent_fields() {
    let response = from_json_str::<ApiResponse>(r#"{"status":"connected"}"#).unwrap();
    assert_eq!(to_value(&response).unwrap(), json!({"status": "connected"}));

    let response = from_json_str::<ApiResponse>(SINGLE_QUOTE).unwrap();
    let value = to_value(&response).unwrap();
    assert_eq!(value["response"]["elapsedtime"], json!(12));
    assert_eq!(value["response"]["quotes"]["quote"][0]["symbol"], json!("AAPL"));
    assert!(value.get("trade").is_none());
  }

  /// Check that the account listing is passed through.
  #[test]
  fn decode_accounts() {
    let data = r#"{"response":{"elapsedtime":"0","accounts":{"accountsummary":[{"account":"12345678"}]},"error":"Success"}}"#;
    let response = from_json_str::<ApiResponse>(data).unwrap().response.unwrap();
    let accounts = response.accounts.unwrap();
    assert_eq!(accounts["accountsummary"][0]["account"], json!("12345678"));
  }
}
