// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use lazy_static::lazy_static;
use regex::Regex;

/// Turns the model's time-step lines into coarse percentage updates.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    percent: u32,
}

fn percent_in(line: &str) -> Option<u32> {
    lazy_static! {
        static ref PERCENT_RE: Regex = Regex::new(r"(\d+(?:\.\d*)?)\s*%").unwrap();
    }
    if !(line.contains("TIME STEP") && line.contains("ITERATIONS")) {
        return None;
    }
    let caps = PERCENT_RE.captures(line)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(value.clamp(0.0, 100.0) as u32)
}

impl ProgressTracker {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn percent(&self) -> u32 {
        self.percent
    }

    /// Returns the new percentage when `line` moves progress forward to a
    /// multiple of 5, or by more than 10 points.
    pub fn observe(&mut self, line: &str) -> Option<u32> {
        let next = percent_in(line)?;
        if next > self.percent && (next % 5 == 0 || next - self.percent > 10) {
            self.percent = next;
            Some(next)
        } else {
            None
        }
    }

    /// Completes the bar after a clean exit.
    pub fn finish(&mut self, success: bool) -> Option<u32> {
        if success && self.percent < 100 {
            self.percent = 100;
            Some(100)
        } else {
            None
        }
    }
}
