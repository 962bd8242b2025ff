//src/mirna.rs

use crate::errors::HybError;
use crate::fold_record::FoldRecord;
use crate::hyb_fold_iter::PairedRecord;
use crate::hyb_record::HybRecord;
use crate::reconcile::FoldAlignment;
use crate::types::{MirnaSeg, SegNum};

/// miRNA / target breakdown of a hybrid.
#[derive(Debug, Clone, PartialEq)]
pub struct MirnaDetails {
    pub mirna_seg: MirnaSeg,
    pub mirna_seg_type: Option<String>,
    pub target_seg_type: Option<String>,
    pub mirna_seq: Option<String>,
    pub target_seq: Option<String>,
    /// Structure of the miRNA segment, when a fold alignment is known.
    pub mirna_fold: Option<String>,
    pub target_fold: Option<String>,
}

impl MirnaDetails {
    pub fn is_mirna_hybrid(&self) -> bool {
        self.mirna_seg.has_mirna()
    }
}

fn target_seg(mirna: SegNum) -> SegNum {
    match mirna {
        SegNum::One => SegNum::Two,
        SegNum::Two => SegNum::One,
    }
}

impl HybRecord {
    /// Set the `miRNA_seg` flag from the segment types, unless it is
    /// already set. Requires both segment types.
    pub fn eval_mirna(&mut self, mirna_types: &[String]) -> Result<MirnaSeg, HybError> {
        if let Some(existing) = self.mirna_seg() {
            return Ok(existing);
        }
        let is_mirna = |seg: SegNum| -> Result<bool, HybError> {
            let seg_type = self.seg_type(seg).ok_or_else(|| HybError::MissingFlag {
                id: self.id().to_string(),
                key: seg.type_flag().to_string(),
            })?;
            Ok(mirna_types.iter().any(|t| t == seg_type))
        };
        let mirna_seg = match (is_mirna(SegNum::One)?, is_mirna(SegNum::Two)?) {
            (true, true) => MirnaSeg::Both,
            (true, false) => MirnaSeg::FivePrime,
            (false, true) => MirnaSeg::ThreePrime,
            (false, false) => MirnaSeg::None,
        };
        self.set_flag("miRNA_seg", mirna_seg.as_str())?;
        Ok(mirna_seg)
    }

    /// Details of an already evaluated record; `None` before `eval_mirna`.
    pub fn mirna_details(&self, fold: Option<(&FoldRecord, &FoldAlignment)>) -> Option<MirnaDetails> {
        let mirna_seg = self.mirna_seg()?;
        let mut details = MirnaDetails {
            mirna_seg,
            mirna_seg_type: None,
            target_seg_type: None,
            mirna_seq: None,
            target_seq: None,
            mirna_fold: None,
            target_fold: None,
        };
        let Some(mirna) = mirna_seg.mirna_seg() else {
            return Some(details);
        };
        let target = target_seg(mirna);
        details.mirna_seg_type = self.seg_type(mirna).map(str::to_string);
        details.target_seg_type = self.seg_type(target).map(str::to_string);
        details.mirna_seq = self.seg_seq(mirna).map(str::to_string);
        details.target_seq = self.seg_seq(target).map(str::to_string);
        if let Some((fold, alignment)) = fold {
            details.mirna_fold = Some(alignment.seg_fold(fold, mirna).to_string());
            details.target_fold = Some(alignment.seg_fold(fold, target).to_string());
        }
        Some(details)
    }
}

impl PairedRecord {
    pub fn mirna_details(&self) -> Option<MirnaDetails> {
        let fold = match (&self.fold, &self.alignment) {
            (Some(fold), Some(alignment)) => Some((fold, alignment)),
            _ => None,
        };
        self.hyb.mirna_details(fold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fold_record::tests::{vienna, ART_VIENNA_1};
    use crate::hyb_record::tests::ART_HYB_1;
    use crate::reconcile::reconcile;
    use crate::settings::{HybSettings, ReconcileSettings};

    fn mirna_types() -> Vec<String> {
        HybSettings::default().mirna_types
    }

    fn typed(seg1: &str, seg2: &str) -> HybRecord {
        let mut record = HybRecord::from_line(ART_HYB_1, &HybSettings::default()).unwrap();
        record.set_seg_types(seg1, seg2).unwrap();
        record
    }

    #[test]
    fn assigns_mirna_segment() {
        let cases = [
            ("microRNA", "mRNA", MirnaSeg::FivePrime),
            ("mRNA", "miRNA", MirnaSeg::ThreePrime),
            ("miRNA", "microRNA", MirnaSeg::Both),
            ("mRNA", "rRNA", MirnaSeg::None),
        ];
        for (seg1, seg2, expected) in cases {
            let mut record = typed(seg1, seg2);
            assert_eq!(record.eval_mirna(&mirna_types()).unwrap(), expected);
            assert_eq!(record.flag("miRNA_seg"), Some(expected.as_str()));
        }
    }

    #[test]
    fn requires_segment_types() {
        let mut record = HybRecord::from_line(ART_HYB_1, &HybSettings::default()).unwrap();
        assert!(matches!(
            record.eval_mirna(&mirna_types()),
            Err(HybError::MissingFlag { .. })
        ));
        assert_eq!(record.mirna_details(None), None);
    }

    #[test]
    fn existing_flag_is_kept() {
        let mut record = typed("mRNA", "mRNA");
        record.set_flag("miRNA_seg", "5p").unwrap();
        assert_eq!(record.eval_mirna(&mirna_types()).unwrap(), MirnaSeg::FivePrime);
    }

    #[test]
    fn details_follow_the_mirna() {
        let mut record = typed("mRNA", "microRNA");
        record.eval_mirna(&mirna_types()).unwrap();
        let fold = vienna(ART_VIENNA_1);
        let alignment = reconcile(&record, &fold, &ReconcileSettings::default()).unwrap();
        let details = record.mirna_details(Some((&fold, &alignment))).unwrap();
        assert!(details.is_mirna_hybrid());
        assert_eq!(details.mirna_seg_type.as_deref(), Some("microRNA"));
        assert_eq!(details.target_seg_type.as_deref(), Some("mRNA"));
        assert_eq!(details.mirna_seq.as_deref(), Some("AAAGGGGGGGGGGGGGGAAA"));
        assert_eq!(details.mirna_fold.as_deref(), Some("...))))))))))))))..."));
        assert_eq!(details.target_fold.as_deref(), Some("...((((((((((((((..."));
    }
}
