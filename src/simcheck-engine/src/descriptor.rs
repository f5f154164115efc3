// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use simcheck_core::{Error, ErrorCode, ErrorKind, Result, config_err};

use crate::export::ExportOptions;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum ModelKind {
    #[serde(rename = "adcirc")]
    Adcirc,
    #[serde(rename = "adcirc+swan")]
    AdcircSwan,
}

impl ModelKind {
    pub fn executable(self, parallel: bool) -> &'static str {
        match (self, parallel) {
            (ModelKind::Adcirc, false) => "adcirc",
            (ModelKind::Adcirc, true) => "padcirc",
            (ModelKind::AdcircSwan, false) => "adcswan",
            (ModelKind::AdcircSwan, true) => "padcswan",
        }
    }
}

pub const PREP_EXECUTABLE: &str = "adcprep";

/// One entry of a test suite file.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TestDescriptor {
    pub model: ModelKind,
    pub parallel: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ncpu: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_writer: Option<u32>,
    #[serde(default)]
    pub hotstart: bool,
    pub output_files: Vec<String>,
    #[serde(default)]
    pub rm_files: Vec<String>,
    /// Test directory, relative to the test root.
    pub path: String,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub geographic: bool,
}

impl TestDescriptor {
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.parallel && self.ncpu.unwrap_or(0) == 0 {
            return config_err!(
                BadDescriptor,
                format!("test '{name}': parallel runs need a positive ncpu")
            );
        }
        if self.output_files.is_empty() {
            return config_err!(
                BadDescriptor,
                format!("test '{name}': no output_files to verify")
            );
        }
        for file in self.output_files.iter().chain(self.rm_files.iter()) {
            if file.is_empty() || file.contains('/') || file.contains('\\') || file == ".." {
                return config_err!(
                    BadDescriptor,
                    format!("test '{name}': '{file}' is not a plain file name")
                );
            }
        }
        Ok(())
    }

    /// Compute ranks plus dedicated writer ranks.
    pub fn total_ranks(&self) -> u32 {
        self.ncpu.unwrap_or(1) + self.n_writer.unwrap_or(0)
    }

    pub fn writers(&self) -> u32 {
        self.n_writer.unwrap_or(0)
    }

    pub fn executable(&self) -> &'static str {
        self.model.executable(self.parallel)
    }

    /// How this test's outputs are exported, given the user's threshold.
    pub fn export_options(&self, threshold: f64) -> ExportOptions {
        ExportOptions {
            geographic: self.geographic,
            global: self.global,
            threshold,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct TestSuite {
    pub tests: BTreeMap<String, TestDescriptor>,
}

fn yaml_error(err: serde_yml::Error) -> Error {
    Error::new(
        ErrorKind::Config,
        ErrorCode::BadDescriptor,
        Some(err.to_string()),
    )
}

impl TestSuite {
    /// Parse and validate every descriptor, so a malformed suite fails before
    /// anything runs.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let suite: TestSuite = serde_yml::from_str(contents).map_err(yaml_error)?;
        for (name, test) in suite.tests.iter() {
            test.validate(name)?;
        }
        Ok(suite)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| {
            Error::new(
                ErrorKind::Config,
                ErrorCode::DoesNotExist,
                Some(format!("{}: {err}", path.display())),
            )
        })?;
        let suite: TestSuite = serde_yml::from_reader(BufReader::new(file))
            .map_err(|err| yaml_error(err).context(path.display()))?;
        for (name, test) in suite.tests.iter() {
            test.validate(name).map_err(|err| err.context(path.display()))?;
        }
        Ok(suite)
    }

    pub fn get(&self, name: &str) -> Result<&TestDescriptor> {
        match self.tests.get(name) {
            Some(test) => Ok(test),
            None => config_err!(UnknownTest, format!("no test named '{name}'")),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tests.keys().map(|k| k.as_str())
    }
}
