// Copyright (C) 2026 The allyapi Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::marker::PhantomData;
use std::pin::Pin;

use futures::task::Context;
use futures::task::Poll;
use futures::Stream;
use futures::StreamExt as _;

use hyper::body::Bytes;

use serde::de::DeserializeOwned;
use serde_json::Deserializer;

use tracing::trace;

use crate::error::DecodeError;
use crate::Error;


/// A scanner tracking whether the leading value of a buffer may be
/// complete, without decoding it.
///
/// Only the structure of objects and arrays is followed. Any other
/// leading value is handed to the decoder right away.
#[derive(Debug, Default)]
struct Scanner {
  /// The number of bytes of the buffer scanned so far.
  offset: usize,
  /// The current object/array nesting depth.
  depth: usize,
  /// Whether we are inside a string.
  in_string: bool,
  /// Whether the previous byte was an escaping backslash.
  escaped: bool,
  /// Whether the leading value is complete or could not be judged.
  settled: bool,
}

impl Scanner {
  /// Scan data appended since the last invocation and check whether
  /// the leading value is worth decoding.
  fn settled(&mut self, data: &[u8]) -> bool {
    while !self.settled && self.offset < data.len() {
      let byte = data[self.offset];
      self.offset += 1;

      if self.in_string {
        if self.escaped {
          self.escaped = false
        } else if byte == b'\\' {
          self.escaped = true
        } else if byte == b'"' {
          self.in_string = false
        }
        continue
      }

      match byte {
        b'{' | b'[' => self.depth += 1,
        b'}' | b']' => {
          self.depth = self.depth.saturating_sub(1);
          self.settled = self.depth == 0;
        },
        b'"' if self.depth > 0 => self.in_string = true,
        _ if self.depth == 0 && !byte.is_ascii_whitespace() => self.settled = true,
        _ => (),
      }
    }
    self.settled
  }
}


/// A stream decoding a sequence of JSON values from a stream of byte
/// chunks.
///
/// Values are not required to be separated by anything but optional
/// whitespace and may be split across chunks arbitrarily. Each value
/// is yielded as soon as its last byte has been received.
#[derive(Debug)]
#[must_use = "streams do nothing unless polled"]
pub(crate) struct JsonStream<S, T> {
  /// The wrapped stream of byte chunks.
  inner: S,
  /// Data received but not yet decoded.
  buffer: Vec<u8>,
  /// The state of the scan for the end of the leading value.
  scanner: Scanner,
  /// Whether the wrapped stream is exhausted or we hit an error.
  done: bool,
  /// Phantom data to make sure that we "use" `T`.
  _phantom: PhantomData<T>,
}

impl<S, T> JsonStream<S, T> {
  /// Create a new `JsonStream` object wrapping the provided stream.
  pub(crate) fn new(inner: S) -> Self {
    Self {
      inner,
      buffer: Vec::new(),
      scanner: Scanner::default(),
      done: false,
      _phantom: PhantomData,
    }
  }
}

impl<S, T> JsonStream<S, T>
where
  T: DeserializeOwned,
{
  /// Try decoding the next value from the buffered data.
  ///
  /// Incomplete data are only an error once no more data can arrive.
  fn decode(&mut self, at_end: bool) -> Result<Option<T>, DecodeError> {
    if !at_end && !self.scanner.settled(&self.buffer) {
      return Ok(None)
    }

    let (result, offset) = {
      let mut values = Deserializer::from_slice(&self.buffer).into_iter::<T>();
      let result = values.next();
      (result, values.byte_offset())
    };

    match result {
      None => {
        // Nothing but whitespace is left.
        self.buffer.clear();
        self.scanner = Scanner::default();
        Ok(None)
      },
      Some(Ok(value)) => {
        let _ = self.buffer.drain(..offset);
        self.scanner = Scanner::default();
        Ok(Some(value))
      },
      Some(Err(err)) if err.is_eof() && !at_end => Ok(None),
      Some(Err(err)) => Err(DecodeError::from(err)),
    }
  }
}

impl<S, T> Stream for JsonStream<S, T>
where
  S: Stream<Item = Result<Bytes, Error>> + Unpin,
  T: DeserializeOwned + Unpin,
{
  type Item = Result<T, Error>;

  fn poll_next(mut self: Pin<&mut Self>, ctx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    loop {
      if self.buffer.is_empty() && self.done {
        break Poll::Ready(None)
      }

      let at_end = self.done;
      match self.decode(at_end) {
        Ok(Some(value)) => break Poll::Ready(Some(Ok(value))),
        Ok(None) if at_end => break Poll::Ready(None),
        Ok(None) => (),
        Err(err) => {
          self.buffer.clear();
          self.done = true;
          break Poll::Ready(Some(Err(Error::from(err))))
        },
      }

      match self.inner.poll_next_unpin(ctx) {
        Poll::Pending => break Poll::Pending,
        Poll::Ready(None) => {
          // Decode whatever is left one last time above.
          self.done = true;
        },
        Poll::Ready(Some(Err(err))) => {
          self.buffer.clear();
          self.done = true;
          break Poll::Ready(Some(Err(err)))
        },
        Poll::Ready(Some(Ok(chunk))) => {
          trace!(chunk = chunk.len(), buffered = self.buffer.len());
          self.buffer.extend_from_slice(&chunk);
        },
      }
    }
  }
}
