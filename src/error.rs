//! Errors raised while reading, reconstructing and drawing traces
//!
//! Every kind is fatal: the pipeline reads a fixed trace once, so there is
//! nothing to retry and no partial picture worth drawing.
use std::ops::Range;

use derive_more::Display;
use enum_kinds::EnumKind;

use crate::duration::Phase;
use crate::parser::Label;

/// Ways in which a trace can fail to describe a single binary tree.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Inconsistency {
    #[display(fmt = "label is reached more than once (cycle or reused label)")]
    Revisited,
    #[display(fmt = "label is split into two different pairs of children")]
    ConflictingSplit,
    #[display(fmt = "split is not reachable from the root")]
    Unreachable,
}

#[derive(Debug, EnumKind, thiserror::Error)]
#[enum_kind(ErrorKind)]
pub enum Error {
    #[error("malformed trace line {line}: {reason}")]
    MalformedLine {
        line: usize,
        span: Range<usize>,
        text: String,
        reason: String,
    },

    #[error("label {label} has {count} timestamps, expected 3")]
    IncompleteTimestamps { label: Label, count: usize },

    #[error("no root: no split parent is free of being someone's child")]
    NoRoot,

    #[error("ambiguous root: {} labels are never children ({})", .candidates.len(), itertools::join(.candidates, ", "))]
    AmbiguousRoot { candidates: Vec<Label> },

    #[error("inconsistent tree at {label}: {reason}")]
    StructuralInconsistency { label: Label, reason: Inconsistency },

    #[error("label {label} has no timestamps")]
    MissingTimestamps { label: Label },

    #[error("label {label} has negative {phase} duration {value}")]
    NegativeDuration { label: Label, phase: Phase, value: f64 },

    #[error("label {label} has {phase} segment ending at non-finite time {value}")]
    NonFiniteDuration { label: Label, phase: Phase, value: f64 },

    #[error("cannot parse {key} value {value:?}")]
    Metadata { key: String, value: String },

    #[error("render error")]
    Render {
        #[source]
        source: std::io::Error,
    },

    #[error("io error")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from(self)
    }
}

/// Convert missing values into [Error]s.
pub trait OrErrExt<T> {
    fn or_err(self, error: Error) -> Result<T, Error>;
}

impl<T> OrErrExt<T> for Option<T> {
    fn or_err(self, error: Error) -> Result<T, Error> {
        self.ok_or(error)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(Error::NoRoot.kind(), ErrorKind::NoRoot);
        let err = None::<()>.or_err(Error::MissingTimestamps{label: Label::Int(4)}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingTimestamps);
        assert_eq!(err.to_string(), "label 4 has no timestamps");
    }

    #[test]
    fn ambiguous_root_names_candidates() {
        let err = Error::AmbiguousRoot{candidates: vec![Label::Int(1), Label::Int(2)]};
        assert_eq!(err.to_string(), "ambiguous root: 2 labels are never children (1, 2)");
    }
}
