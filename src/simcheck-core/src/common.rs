// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::{error, result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    DoesNotExist,
    BadHeader,
    BadToken,
    UnexpectedEof,
    NodeOutOfRange,
    UnsupportedFormat,
    StructuralMismatch,
    FieldMissing,
    ShapeMismatch,
    TimeMismatch,
    IterationMismatch,
    ExternalProcessFailure,
    MissingArtifact,
    BadDescriptor,
    BadTolerance,
    UnknownTest,
    Io,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            DoesNotExist => "does_not_exist",
            BadHeader => "bad_header",
            BadToken => "bad_token",
            UnexpectedEof => "unexpected_eof",
            NodeOutOfRange => "node_out_of_range",
            UnsupportedFormat => "unsupported_format",
            StructuralMismatch => "structural_mismatch",
            FieldMissing => "field_missing",
            ShapeMismatch => "shape_mismatch",
            TimeMismatch => "time_mismatch",
            IterationMismatch => "iteration_mismatch",
            ExternalProcessFailure => "external_process_failure",
            MissingArtifact => "missing_artifact",
            BadDescriptor => "bad_descriptor",
            BadTolerance => "bad_tolerance",
            UnknownTest => "unknown_test",
            Io => "io",
        };

        write!(f, "{name}")
    }
}

/// Broad classification of an [`Error`].
///
/// The kind decides how far an error propagates: `Format`, `Structure` and
/// `Alignment` abort the file being compared, `Process` and `Artifact` abort
/// the phase being run, `Config` aborts before anything runs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Structure,
    Alignment,
    Process,
    Artifact,
    Config,
    Io,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub details: Option<String>,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            code: ErrorCode::Io,
            details: Some(err.to_string()),
        }
    }
}

impl Error {
    pub fn new(kind: ErrorKind, code: ErrorCode, details: Option<String>) -> Self {
        Error {
            kind,
            code,
            details,
        }
    }

    pub fn get_details(&self) -> Option<String> {
        self.details.clone()
    }

    /// Prefix the details with some context, typically a file path.
    pub fn context(mut self, context: impl fmt::Display) -> Self {
        self.details = Some(match self.details {
            Some(details) => format!("{context}: {details}"),
            None => context.to_string(),
        });
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Format => "FormatError",
            ErrorKind::Structure => "StructuralError",
            ErrorKind::Alignment => "AlignmentError",
            ErrorKind::Process => "ProcessError",
            ErrorKind::Artifact => "ArtifactError",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Io => "IoError",
        };
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", kind, self.code, details),
            None => write!(f, "{}{{{}}}", kind, self.code),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

#[macro_export]
macro_rules! format_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Format, ErrorCode::$code, Some($str)))
    }};
}

#[macro_export]
macro_rules! structural_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Structure, ErrorCode::$code, Some($str)))
    }};
}

#[macro_export]
macro_rules! alignment_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Alignment, ErrorCode::$code, Some($str)))
    }};
}

#[macro_export]
macro_rules! config_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Config, ErrorCode::$code, Some($str)))
    }};
}

#[macro_export]
macro_rules! artifact_err {
    ($str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Artifact,
            ErrorCode::MissingArtifact,
            Some($str),
        ))
    }};
}

#[macro_export]
macro_rules! process_err {
    ($str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Process,
            ErrorCode::ExternalProcessFailure,
            Some($str),
        ))
    }};
}

#[test]
fn test_error_display() {
    let err = Error::new(
        ErrorKind::Structure,
        ErrorCode::StructuralMismatch,
        Some("node_count 3 != 4".to_owned()),
    );
    assert_eq!(
        "StructuralError{structural_mismatch: node_count 3 != 4}",
        format!("{err}")
    );

    let err = Error::new(ErrorKind::Alignment, ErrorCode::TimeMismatch, None);
    assert_eq!("AlignmentError{time_mismatch}", format!("{err}"));
}

#[test]
fn test_error_context() {
    let err = Error::new(ErrorKind::Format, ErrorCode::BadToken, Some("line 4".into()))
        .context("fort.63");
    assert_eq!(Some("fort.63: line 4".to_owned()), err.get_details());

    let err = Error::new(ErrorKind::Format, ErrorCode::UnexpectedEof, None).context("fort.61");
    assert_eq!(Some("fort.61".to_owned()), err.get_details());
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err: Error = io.into();
    assert_eq!(ErrorKind::Io, err.kind);
    assert_eq!(ErrorCode::Io, err.code);
    assert_eq!(Some("gone".to_owned()), err.details);
}

#[test]
fn test_error_macros() {
    fn bad() -> Result<()> {
        structural_err!(FieldMissing, "zeta".to_owned())
    }
    let err = bad().unwrap_err();
    assert_eq!(ErrorKind::Structure, err.kind);
    assert_eq!(ErrorCode::FieldMissing, err.code);

    fn missing() -> Result<()> {
        artifact_err!("padcirc".to_owned())
    }
    assert_eq!(ErrorCode::MissingArtifact, missing().unwrap_err().code);
}

#[test]
fn test_error_code_names() {
    use ErrorCode::*;
    let codes = [
        DoesNotExist,
        BadHeader,
        BadToken,
        UnexpectedEof,
        NodeOutOfRange,
        UnsupportedFormat,
        StructuralMismatch,
        FieldMissing,
        ShapeMismatch,
        TimeMismatch,
        IterationMismatch,
        ExternalProcessFailure,
        MissingArtifact,
        BadDescriptor,
        BadTolerance,
        UnknownTest,
        Io,
    ];
    let names: std::collections::HashSet<String> = codes.iter().map(|c| c.to_string()).collect();
    assert_eq!(codes.len(), names.len());
    for name in &names {
        assert!(
            name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
            "{name}"
        );
    }
}
