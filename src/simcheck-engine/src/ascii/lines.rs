// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::io::BufRead;
use std::str::FromStr;

use simcheck_core::{Result, format_err};

/// Line-at-a-time reader that remembers where it is, so format errors can
/// point at the offending line.
pub(crate) struct LineReader<R> {
    inner: R,
    buf: String,
    line_no: usize,
}

impl<R: BufRead> LineReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        LineReader {
            inner,
            buf: String::new(),
            line_no: 0,
        }
    }

    /// 1-based number of the most recently read line.
    pub(crate) fn line_no(&self) -> usize {
        self.line_no
    }

    pub(crate) fn next_line(&mut self) -> Result<Option<&str>> {
        self.buf.clear();
        if self.inner.read_line(&mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        Ok(Some(self.buf.trim()))
    }

    pub(crate) fn expect_line(&mut self, what: &str) -> Result<&str> {
        let line_no = self.line_no + 1;
        match self.next_line()? {
            Some(line) => Ok(line),
            None => format_err!(
                UnexpectedEof,
                format!("line {line_no}: end of file while reading {what}")
            ),
        }
    }

    /// Read the next line and split it on whitespace, requiring at least
    /// `min` tokens.
    pub(crate) fn expect_tokens(&mut self, what: &str, min: usize) -> Result<Tokens<'_>> {
        let line_no = self.line_no + 1;
        let line = self.expect_line(what)?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < min {
            return format_err!(
                BadToken,
                format!(
                    "line {line_no}: {what} needs {min} values, found {}",
                    tokens.len()
                )
            );
        }
        Ok(Tokens { tokens, line_no })
    }

    pub(crate) fn skip_lines(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.expect_line("header")?;
        }
        Ok(())
    }
}

pub(crate) struct Tokens<'a> {
    tokens: Vec<&'a str>,
    line_no: usize,
}

impl Tokens<'_> {
    pub(crate) fn len(&self) -> usize {
        self.tokens.len()
    }

    pub(crate) fn line_no(&self) -> usize {
        self.line_no
    }

    pub(crate) fn parse<T: FromStr>(&self, i: usize, what: &str) -> Result<T> {
        let token = self.tokens[i];
        match token.parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => format_err!(
                BadToken,
                format!(
                    "line {}: {what} is not a number: '{token}'",
                    self.line_no
                )
            ),
        }
    }
}
