//src/errors.rs

use std::io;
use thiserror::Error;

/// Errors raised while parsing or editing a single hyb record.
#[derive(Error, Debug)]
pub enum HybError {
    #[error("malformed hyb record: {reason}")]
    MalformedRecord { reason: String },

    #[error("line {line_no}: {source}")]
    AtLine {
        line_no: usize,
        source: Box<HybError>,
    },

    #[error("flag \"{0}\" is not defined; add it to custom_flags or allow undefined flags")]
    UndefinedFlag(String),

    #[error("invalid value \"{value}\" for flag \"{key}\"")]
    InvalidFlagValue { key: String, value: String },

    #[error("record {id} has no \"{key}\" flag")]
    MissingFlag { id: String, key: String },

    #[error("segment type could not be identified for reference \"{0}\"")]
    UnknownSegType(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl HybError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        HybError::MalformedRecord {
            reason: reason.into(),
        }
    }

    pub(crate) fn at_line(self, line_no: usize) -> Self {
        HybError::AtLine {
            line_no,
            source: Box::new(self),
        }
    }
}

/// Errors raised while parsing a fold (vienna / viennad / ct) block.
#[derive(Error, Debug)]
pub enum FoldError {
    #[error("malformed fold record \"{id}\": {reason}")]
    MalformedFold { id: String, reason: String },

    #[error("fold block ending at line {line_no}: {source}")]
    AtLine {
        line_no: usize,
        source: Box<FoldError>,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FoldError {
    pub(crate) fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        FoldError::MalformedFold {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn at_line(self, line_no: usize) -> Self {
        FoldError::AtLine {
            line_no,
            source: Box::new(self),
        }
    }
}

/// Reasons a hyb record and a fold record could not be reconciled.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PairingError {
    #[error("sequence lengths {expected} (hyb) and {found} (fold) differ by more than {max_extension}")]
    LengthMismatch {
        expected: usize,
        found: usize,
        max_extension: usize,
    },

    #[error("{mismatches} mismatched bases exceed the allowed {allowed}")]
    TooManyMismatches { mismatches: usize, allowed: usize },

    #[error("segment {seg} has no read coordinates")]
    MissingSegmentCoordinates { seg: u8 },

    #[error("segment {seg} projects outside the fold sequence")]
    SegmentOutsideFold { seg: u8 },

    #[error("hyb energy {hyb} does not match fold energy {fold}")]
    EnergyMismatch { hyb: String, fold: String },

    #[error("fold record \"{fold_id}\" does not belong to hyb record \"{hyb_id}\"")]
    IdMismatch { hyb_id: String, fold_id: String },
}

/// Errors raised while building or applying a segment-type finder.
#[derive(Error, Debug)]
pub enum TypeFinderError {
    #[error("malformed parameter line \"{line}\": {reason}")]
    MalformedParams { line: String, reason: String },

    #[error("conflicting types for \"{id}\": {first} | {second}")]
    ConflictingTypes {
        id: String,
        first: String,
        second: String,
    },

    #[error("multiple segment types found for \"{ref_name}\": {types}")]
    MultipleTypes { ref_name: String, types: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors raised while loading settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("could not parse settings: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid setting: {0}")]
    Invalid(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Crate-level error used by the iteration, analysis and CLI layers.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Hyb(#[from] HybError),

    #[error(transparent)]
    Fold(#[from] FoldError),

    #[error("pairing failed for hyb record {hyb_id}: {source}")]
    Pairing {
        hyb_id: String,
        source: PairingError,
    },

    #[error("hyb and fold streams out of sync: {0}")]
    Desync(String),

    #[error("{count} sequential record pairs skipped (last: {last}); files may be out of sync")]
    TooManySkips { count: usize, last: String },

    #[error(transparent)]
    TypeFinder(#[from] TypeFinderError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("analysis error: {0}")]
    Analysis(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
