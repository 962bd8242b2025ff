//src/reconcile.rs

use crate::errors::PairingError;
use crate::fold_record::FoldRecord;
use crate::hyb_record::HybRecord;
use crate::settings::{FoldSeqMode, ReconcileSettings, TrimEnd};
use crate::types::{SegNum, Span};

/// How a hyb record's segments map onto its fold record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldAlignment {
    pub mismatches: usize,
    /// Fold position minus expected position.
    pub shift: isize,
    pub seg1: Span,
    pub seg2: Span,
}

impl FoldAlignment {
    pub fn seg_span(&self, seg: SegNum) -> Span {
        match seg {
            SegNum::One => self.seg1,
            SegNum::Two => self.seg2,
        }
    }

    /// Structure substring covering one segment.
    pub fn seg_fold<'a>(&self, fold: &'a FoldRecord, seg: SegNum) -> &'a str {
        &fold.fold()[self.seg_span(seg).range()]
    }

    /// Fold sequence substring covering one segment.
    pub fn seg_seq<'a>(&self, fold: &'a FoldRecord, seg: SegNum) -> &'a str {
        &fold.seq()[self.seg_span(seg).range()]
    }
}

fn normalize(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'U' => b'T',
        other => other,
    }
}

/// Positional mismatches over the shorter of the two sequences, ignoring
/// case and treating `T` and `U` as equal.
pub fn count_mismatches(a: &str, b: &str) -> usize {
    a.bytes()
        .zip(b.bytes())
        .filter(|(x, y)| normalize(*x) != normalize(*y))
        .count()
}

/// Sequence the fold record is expected to carry, with each segment's span
/// in that sequence's coordinates.
fn expected_layout(
    hyb: &HybRecord,
    mode: FoldSeqMode,
) -> Result<(String, Span, Span), PairingError> {
    let span = |seg: SegNum| {
        hyb.seg(seg)
            .read_span()
            .ok_or(PairingError::MissingSegmentCoordinates { seg: seg.number() })
    };
    let seg1 = span(SegNum::One)?;
    let seg2 = span(SegNum::Two)?;
    Ok(match mode {
        FoldSeqMode::Static => (hyb.seq().to_string(), seg1, seg2),
        FoldSeqMode::Dynamic => {
            let seq = format!("{}{}", &hyb.seq()[seg1.range()], &hyb.seq()[seg2.range()]);
            let dyn_seg2 = Span::new(seg1.len() + 1, seg1.len() + seg2.len());
            (seq, Span::new(1, seg1.len()), dyn_seg2)
        }
    })
}

/// Offsets `(expected, fold)` at which the compared windows start.
fn window(expected_len: usize, fold_len: usize, trim: TrimEnd) -> (usize, usize) {
    let excess = expected_len.abs_diff(fold_len);
    let offset = match trim {
        TrimEnd::Start => excess,
        _ => 0,
    };
    if expected_len > fold_len {
        (offset, 0)
    } else {
        (0, offset)
    }
}

fn window_mismatches(expected: &str, fold: &str, (e_off, f_off): (usize, usize)) -> usize {
    count_mismatches(&expected[e_off..], &fold[f_off..])
}

fn project(span: Span, shift: isize, fold_len: usize, seg: SegNum) -> Result<Span, PairingError> {
    let start = span.start as isize + shift;
    let end = span.end as isize + shift;
    if end < 1 || start > fold_len as isize {
        return Err(PairingError::SegmentOutsideFold { seg: seg.number() });
    }
    Ok(Span::new(start.max(1) as usize, end.min(fold_len as isize) as usize))
}

/// Compare hyb and fold energies when both are present.
pub fn check_energy(hyb: &HybRecord, fold: &FoldRecord) -> Result<(), PairingError> {
    if let (Some(h), Some(f)) = (hyb.energy_value(), fold.energy_value()) {
        if (h - f).abs() > 1e-6 {
            return Err(PairingError::EnergyMismatch {
                hyb: hyb.energy().unwrap_or_default().to_string(),
                fold: fold.energy().unwrap_or_default().to_string(),
            });
        }
    }
    Ok(())
}

/// Correlate a hyb record's segments with its fold record.
pub fn reconcile(
    hyb: &HybRecord,
    fold: &FoldRecord,
    settings: &ReconcileSettings,
) -> Result<FoldAlignment, PairingError> {
    let (expected, seg1, seg2) = expected_layout(hyb, settings.seq_mode)?;
    let (e_len, f_len) = (expected.len(), fold.len());
    if e_len.abs_diff(f_len) > settings.max_extension {
        return Err(PairingError::LengthMismatch {
            expected: e_len,
            found: f_len,
            max_extension: settings.max_extension,
        });
    }

    let (offsets, mismatches) = match settings.trim_end {
        TrimEnd::Auto => {
            let end = window(e_len, f_len, TrimEnd::End);
            let start = window(e_len, f_len, TrimEnd::Start);
            let end_mm = window_mismatches(&expected, fold.seq(), end);
            let start_mm = window_mismatches(&expected, fold.seq(), start);
            if start_mm < end_mm {
                (start, start_mm)
            } else {
                (end, end_mm)
            }
        }
        trim => {
            let offsets = window(e_len, f_len, trim);
            (offsets, window_mismatches(&expected, fold.seq(), offsets))
        }
    };
    if mismatches > settings.allowed_mismatches {
        return Err(PairingError::TooManyMismatches {
            mismatches,
            allowed: settings.allowed_mismatches,
        });
    }
    if !settings.allow_energy_mismatch {
        check_energy(hyb, fold)?;
    }

    let shift = offsets.1 as isize - offsets.0 as isize;
    Ok(FoldAlignment {
        mismatches,
        shift,
        seg1: project(seg1, shift, f_len, SegNum::One)?,
        seg2: project(seg2, shift, f_len, SegNum::Two)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fold_record::tests::{vienna, ART_VIENNA_1, ART_VIENNA_2};
    use crate::hyb_record::tests::{ART_HYB_1, HYB_STR_1};
    use crate::hyb_record::SegmentInfo;
    use crate::settings::HybSettings;

    fn hyb(line: &str) -> HybRecord {
        HybRecord::from_line(line, &HybSettings::default()).unwrap()
    }

    fn overlapping_hyb() -> HybRecord {
        HybRecord::new(
            "1_1000",
            "GGGCCCCCCCCCCCCCCGGGAAAGGGGGGGGGGGGGGAAA",
            Some("-10.0".to_string()),
            SegmentInfo::new("ARTSEG1_SOURCE_NAME_microRNA", 1, 24),
            SegmentInfo::new("ARTSEG2_SOURCE_NAME_mRNA", 17, 40),
        )
        .unwrap()
    }

    fn unique_hyb() -> HybRecord {
        HybRecord::new(
            "r1",
            "ACGTTGCAAGCTTCGA",
            None,
            SegmentInfo::new("a_microRNA", 1, 8),
            SegmentInfo::new("b_mRNA", 9, 16),
        )
        .unwrap()
    }

    #[test]
    fn identical_sequences_give_identity_projection() {
        let record = hyb(ART_HYB_1);
        let fold = vienna(ART_VIENNA_1);
        let alignment = reconcile(&record, &fold, &ReconcileSettings::default()).unwrap();
        assert_eq!(alignment.mismatches, 0);
        assert_eq!(alignment.shift, 0);
        assert_eq!(alignment.seg1, Span::new(1, 20));
        assert_eq!(alignment.seg2, Span::new(21, 40));
        assert_eq!(alignment.seg_fold(&fold, SegNum::One), "...((((((((((((((...");
        assert_eq!(alignment.seg_fold(&fold, SegNum::Two), "...))))))))))))))...");
    }

    #[test]
    fn gapped_segments_keep_read_coordinates_by_default() {
        let record = hyb(HYB_STR_1);
        let fold = FoldRecord::new(record.id(), record.seq(), ".".repeat(49), None).unwrap();
        let alignment = reconcile(&record, &fold, &ReconcileSettings::default()).unwrap();
        assert_eq!(alignment.mismatches, 0);
        assert_eq!(alignment.shift, 0);
        assert_eq!(alignment.seg1, Span::new(1, 21));
        assert_eq!(alignment.seg2, Span::new(23, 49));
        assert_eq!(alignment.seg_seq(&fold, SegNum::One), record.seg_seq(SegNum::One).unwrap());
        assert_eq!(alignment.seg_seq(&fold, SegNum::Two), record.seg_seq(SegNum::Two).unwrap());
    }

    #[test]
    fn dynamic_sequence_duplicates_overlap() {
        let record = overlapping_hyb();
        let fold = vienna(ART_VIENNA_2);
        let dynamic_mode = ReconcileSettings {
            seq_mode: FoldSeqMode::Dynamic,
            ..Default::default()
        };
        let alignment = reconcile(&record, &fold, &dynamic_mode).unwrap();
        assert_eq!(alignment.seg1, Span::new(1, 24));
        assert_eq!(alignment.seg2, Span::new(25, 48));
        assert_eq!(alignment.seg_fold(&fold, SegNum::One), "...((((((((((((((......(");
        assert_eq!(alignment.seg_fold(&fold, SegNum::Two), ")......))))))))))))))...");

        assert!(matches!(
            reconcile(&record, &fold, &ReconcileSettings::default()),
            Err(PairingError::LengthMismatch { expected: 40, found: 48, .. })
        ));
    }

    #[test]
    fn start_truncation_shifts_spans() {
        let record = unique_hyb();
        let k = 3;
        let fold = FoldRecord::new("r1", &record.seq()[k..], ".".repeat(record.len() - k), None).unwrap();
        let settings = ReconcileSettings {
            max_extension: 3,
            ..Default::default()
        };
        let alignment = reconcile(&record, &fold, &settings).unwrap();
        assert_eq!(alignment.mismatches, 0);
        assert_eq!(alignment.shift, -(k as isize));
        assert_eq!(alignment.seg1, Span::new(1, 8 - k));
        assert_eq!(alignment.seg2, Span::new(9 - k, 16 - k));

        let too_strict = ReconcileSettings {
            max_extension: 2,
            ..Default::default()
        };
        assert!(matches!(
            reconcile(&record, &fold, &too_strict),
            Err(PairingError::LengthMismatch { .. })
        ));

        let wrong_end = ReconcileSettings {
            max_extension: 3,
            trim_end: TrimEnd::End,
            ..Default::default()
        };
        assert!(matches!(
            reconcile(&record, &fold, &wrong_end),
            Err(PairingError::TooManyMismatches { .. })
        ));
    }

    #[test]
    fn extension_at_end_keeps_spans() {
        let record = unique_hyb();
        let seq = format!("{}GG", record.seq());
        let fold = FoldRecord::new("r1", seq, ".".repeat(18), None).unwrap();
        let settings = ReconcileSettings {
            max_extension: 2,
            ..Default::default()
        };
        let alignment = reconcile(&record, &fold, &settings).unwrap();
        assert_eq!(alignment.shift, 0);
        assert_eq!(alignment.seg2, Span::new(9, 16));
    }

    #[test]
    fn mismatch_budget_is_enforced() {
        let record = unique_hyb();
        let seq = record.seq().replacen("ACG", "TTG", 1);
        let fold = FoldRecord::new("r1", seq, ".".repeat(16), None).unwrap();
        assert_eq!(count_mismatches(record.seq(), fold.seq()), 2);
        assert!(matches!(
            reconcile(&record, &fold, &ReconcileSettings::default()),
            Err(PairingError::TooManyMismatches { mismatches: 2, allowed: 0 })
        ));
        let lenient = ReconcileSettings {
            allowed_mismatches: 2,
            ..Default::default()
        };
        assert_eq!(reconcile(&record, &fold, &lenient).unwrap().mismatches, 2);
    }

    #[test]
    fn case_and_uracil_are_ignored() {
        assert_eq!(count_mismatches("acgt", "ACGU"), 0);
        assert_eq!(count_mismatches("ACGT", "ACGA"), 1);
    }

    #[test]
    fn missing_coordinates_are_reported() {
        let record = HybRecord::new(
            "r1",
            "ACGTTGCAAGCTTCGA",
            None,
            SegmentInfo::new("a_microRNA", 1, 8),
            SegmentInfo {
                ref_name: Some("b_mRNA".to_string()),
                read_start: Some(9),
                ..Default::default()
            },
        )
        .unwrap();
        let fold = FoldRecord::new("r1", record.seq(), ".".repeat(16), None).unwrap();
        assert_eq!(
            reconcile(&record, &fold, &ReconcileSettings::default()),
            Err(PairingError::MissingSegmentCoordinates { seg: 2 })
        );
    }

    #[test]
    fn segment_outside_fold_is_rejected() {
        let record = HybRecord::new(
            "r1",
            "ACGTTGCAAGCTTCGA",
            None,
            SegmentInfo::new("a_microRNA", 1, 2),
            SegmentInfo::new("b_mRNA", 3, 16),
        )
        .unwrap();
        let fold = FoldRecord::new("r1", &record.seq()[3..], ".".repeat(13), None).unwrap();
        let settings = ReconcileSettings {
            seq_mode: FoldSeqMode::Static,
            max_extension: 3,
            trim_end: TrimEnd::Start,
            ..Default::default()
        };
        assert_eq!(
            reconcile(&record, &fold, &settings),
            Err(PairingError::SegmentOutsideFold { seg: 1 })
        );
    }

    #[test]
    fn energy_check_is_optional() {
        let record = hyb(ART_HYB_1);
        let fold = vienna(ART_VIENNA_1);
        assert!(reconcile(&record, &fold, &ReconcileSettings::default()).is_ok());
        let strict = ReconcileSettings {
            allow_energy_mismatch: false,
            ..Default::default()
        };
        assert!(matches!(
            reconcile(&record, &fold, &strict),
            Err(PairingError::EnergyMismatch { .. })
        ));
    }
}
