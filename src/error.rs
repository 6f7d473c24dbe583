// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Error reporting for HLL construction, union and decoding.

use std::fmt;

/// Every failure category an [`Error`] can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A construction parameter is outside its valid range.
    ParameterOutOfRange,
    /// Two estimators with incompatible parameters were unioned.
    ParameterMismatch,
    /// Serialized input is malformed.
    Decode(DecodeKind),
    /// An internal invariant was found violated.
    InternalInvariant,
}

/// The specific way a serialized HLL failed to decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DecodeKind {
    /// The schema version nibble is not a registered version.
    UnknownVersion,
    /// The type nibble is not one of the four defined types.
    UnknownType,
    /// The parameters or cutoff byte carry out-of-range values.
    BadParameters,
    /// The input length is inconsistent with the declared type.
    BadLength,
    /// A strict decode found EXPLICIT values out of ascending order.
    NonMonotonicExplicit,
}

impl ErrorKind {
    /// The stable name of this kind, as rendered by `Display`.
    pub const fn into_static(self) -> &'static str {
        match self {
            ErrorKind::ParameterOutOfRange => "ParameterOutOfRange",
            ErrorKind::ParameterMismatch => "ParameterMismatch",
            ErrorKind::Decode(DecodeKind::UnknownVersion) => "Decode::UnknownVersion",
            ErrorKind::Decode(DecodeKind::UnknownType) => "Decode::UnknownType",
            ErrorKind::Decode(DecodeKind::BadParameters) => "Decode::BadParameters",
            ErrorKind::Decode(DecodeKind::BadLength) => "Decode::BadLength",
            ErrorKind::Decode(DecodeKind::NonMonotonicExplicit) => {
                "Decode::NonMonotonicExplicit"
            }
            ErrorKind::InternalInvariant => "InternalInvariant",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.into_static())
    }
}

/// The error returned by every fallible operation in this crate.
///
/// Carries a [`ErrorKind`], a message, optional key/value context naming the
/// offending input, and optionally the lower-level error it wraps.
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    /// Build an error of the given kind with no context or source yet.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Vec::new(),
            source: None,
        }
    }

    /// Create a ParameterOutOfRange error.
    pub(crate) fn parameter_out_of_range(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParameterOutOfRange, message)
    }

    /// Create a ParameterMismatch error.
    pub(crate) fn parameter_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParameterMismatch, message)
    }

    /// Create a Decode error of the given sub-kind.
    pub(crate) fn decode(kind: DecodeKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode(kind), message)
    }

    /// Create an InternalInvariant error.
    pub(crate) fn internal_invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalInvariant, message)
    }

    /// Record a named value describing where the error occurred. Context
    /// shows up in both the `Display` and `Debug` renderings.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Attach the underlying error this one wraps.
    ///
    /// # Panics
    ///
    /// At most one source can be attached; a second call panics.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::error::Error as _;
    /// use hll_storage::error::{DecodeKind, Error, ErrorKind};
    ///
    /// let parse_failure = "not a number".parse::<u32>().unwrap_err();
    /// let error = Error::new(ErrorKind::Decode(DecodeKind::BadParameters), "bad cutoff byte")
    ///     .set_source(parse_failure);
    /// assert!(error.source().is_some());
    /// ```
    pub fn set_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        assert!(self.source.is_none(), "error already has a source attached");
        self.source = Some(source.into());
        self
    }

    /// The kind of failure this error reports.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The human-readable description, without kind, context or source.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

impl fmt::Display for Error {
    /// One line: `Kind: message (key=value, ...); caused by: source`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }

        for (position, (key, value)) in self.context.iter().enumerate() {
            let separator = if position == 0 { " (" } else { ", " };
            write!(f, "{separator}{key}={value}")?;
        }
        if !self.context.is_empty() {
            write!(f, ")")?;
        }

        if let Some(source) = &self.source {
            write!(f, "; caused by: {source}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rendered = f.debug_struct("Error");
        rendered.field("kind", &self.kind);
        rendered.field("message", &self.message);
        // Context keys become fields of their own, which keeps the pretty
        // `{:#?}` form readable in test failures.
        for (key, value) in &self.context {
            rendered.field(key, value);
        }
        if let Some(source) = &self.source {
            rendered.field("source", source);
        }
        rendered.finish()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.source {
            Some(source) => Some(source.as_ref()),
            None => None,
        }
    }
}
