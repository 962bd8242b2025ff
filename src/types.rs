//src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default missing-value placeholder in hyb and fold files.
pub const DEFAULT_PLACEHOLDER: &str = ".";

/// Value written for segment types that could not be identified.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Flags defined by the Hyb program itself.
pub const HYB_FLAGS: [&str; 4] = [
    "count_total",
    "count_last_clustering",
    "two_way_merged",
    "seq_IDs_in_cluster",
];

/// Flags added by this toolkit, in canonical order after [`HYB_FLAGS`].
pub const HYBKIT_FLAGS: [&str; 11] = [
    "read_count",
    "orient",
    "det",
    "seg1_type",
    "seg2_type",
    "seg1_det",
    "seg2_det",
    "miRNA_seg",
    "target_reg",
    "ext",
    "dataset",
];

/// Position of `key` in the canonical flag order, if it is a defined flag.
pub fn canonical_flag_index(key: &str) -> Option<usize> {
    HYB_FLAGS
        .iter()
        .chain(HYBKIT_FLAGS.iter())
        .position(|flag| *flag == key)
}

/// Allowed values for flags with a closed domain.
pub(crate) fn flag_value_domain(key: &str) -> Option<&'static [&'static str]> {
    match key {
        "two_way_merged" | "ext" => Some(&["0", "1", "TRUE", "FALSE"]),
        "orient" => Some(&["F", "IF", "R", "IR", "U", "C"]),
        "miRNA_seg" => Some(&["N", "5p", "3p", "B", "U"]),
        "target_reg" => Some(&["5pUTR", "coding", "3pUTR", "5p", "C", "3p", "N", "U"]),
        _ => None,
    }
}

/// Flags whose value must be a non-negative integer.
pub(crate) fn is_count_flag(key: &str) -> bool {
    matches!(key, "count_total" | "count_last_clustering" | "read_count")
}

/// One of the two segments of a chimeric read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegNum {
    One,
    Two,
}

impl SegNum {
    pub fn number(self) -> u8 {
        match self {
            SegNum::One => 1,
            SegNum::Two => 2,
        }
    }

    /// Flag holding this segment's type.
    pub fn type_flag(self) -> &'static str {
        match self {
            SegNum::One => "seg1_type",
            SegNum::Two => "seg2_type",
        }
    }
}

/// A 1-based, inclusive coordinate span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Zero-based, half-open range suitable for slicing.
    pub fn range(&self) -> std::ops::Range<usize> {
        (self.start - 1)..self.end
    }
}

/// Which segment(s) of a hybrid were identified as miRNA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirnaSeg {
    /// Neither segment.
    None,
    FivePrime,
    ThreePrime,
    /// Both segments (a miRNA dimer).
    Both,
    Unknown,
}

impl MirnaSeg {
    pub fn as_str(self) -> &'static str {
        match self {
            MirnaSeg::None => "N",
            MirnaSeg::FivePrime => "5p",
            MirnaSeg::ThreePrime => "3p",
            MirnaSeg::Both => "B",
            MirnaSeg::Unknown => "U",
        }
    }

    pub fn has_mirna(self) -> bool {
        matches!(self, MirnaSeg::FivePrime | MirnaSeg::ThreePrime | MirnaSeg::Both)
    }

    /// The miRNA-bearing segment; dimers report segment 1.
    pub fn mirna_seg(self) -> Option<SegNum> {
        match self {
            MirnaSeg::FivePrime | MirnaSeg::Both => Some(SegNum::One),
            MirnaSeg::ThreePrime => Some(SegNum::Two),
            _ => None,
        }
    }
}

impl FromStr for MirnaSeg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "N" => Ok(MirnaSeg::None),
            "5p" => Ok(MirnaSeg::FivePrime),
            "3p" => Ok(MirnaSeg::ThreePrime),
            "B" => Ok(MirnaSeg::Both),
            "U" => Ok(MirnaSeg::Unknown),
            other => Err(format!("unknown miRNA_seg value \"{}\"", other)),
        }
    }
}

impl fmt::Display for MirnaSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a record contributes to analysis counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountMode {
    /// Use the `read_count` flag.
    Read,
    /// Use the `count_total` flag, defaulting to 1.
    #[default]
    Record,
}

impl FromStr for CountMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Ok(CountMode::Read),
            "record" => Ok(CountMode::Record),
            other => Err(format!("unknown count mode \"{}\"", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_puts_hyb_flags_first() {
        assert_eq!(canonical_flag_index("count_total"), Some(0));
        assert_eq!(canonical_flag_index("read_count"), Some(4));
        assert_eq!(canonical_flag_index("dataset"), Some(14));
        assert_eq!(canonical_flag_index("my_flag"), None);
    }

    #[test]
    fn span_range_is_zero_based() {
        let span = Span::new(3, 5);
        assert_eq!(span.len(), 3);
        assert_eq!(&"ABCDEFG"[span.range()], "CDE");
    }

    #[test]
    fn mirna_seg_round_trips_through_text() {
        for text in ["N", "5p", "3p", "B", "U"] {
            let seg: MirnaSeg = text.parse().unwrap();
            assert_eq!(seg.to_string(), text);
        }
        assert!("X".parse::<MirnaSeg>().is_err());
        assert_eq!(MirnaSeg::ThreePrime.mirna_seg(), Some(SegNum::Two));
        assert!(!MirnaSeg::None.has_mirna());
    }
}
