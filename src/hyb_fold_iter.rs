//src/hyb_fold_iter.rs

use std::fmt;

use ahash::AHashMap;
use log::{debug, warn};

use crate::errors::{Error, FoldError, HybError, PairingError};
use crate::fold_record::FoldRecord;
use crate::hyb_record::HybRecord;
use crate::reconcile::{reconcile, FoldAlignment};
use crate::settings::{ErrorCheck, ErrorMode, IterSettings, ReconcileSettings, Settings};
use crate::types::SegNum;

/// Why a pair was not matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipKind {
    HybRecordInvalid,
    HybRecordIndel,
    FoldRecordNoFold,
    MaxMismatch,
    IdMismatch,
}

impl SkipKind {
    pub const ALL: [SkipKind; 5] = [
        SkipKind::HybRecordInvalid,
        SkipKind::HybRecordIndel,
        SkipKind::FoldRecordNoFold,
        SkipKind::MaxMismatch,
        SkipKind::IdMismatch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SkipKind::HybRecordInvalid => "hyb_record_invalid",
            SkipKind::HybRecordIndel => "hyb_record_indel",
            SkipKind::FoldRecordNoFold => "fold_record_nofold",
            SkipKind::MaxMismatch => "max_mismatch",
            SkipKind::IdMismatch => "id_mismatch",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkipReason {
    pub kind: SkipKind,
    pub hyb_id: Option<String>,
    pub message: String,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

/// A hyb record with its fold record and, when reconciled, their alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedRecord {
    pub hyb: HybRecord,
    pub fold: Option<FoldRecord>,
    pub alignment: Option<FoldAlignment>,
}

impl PairedRecord {
    /// Structure substring of one segment, when aligned.
    pub fn seg_fold(&self, seg: SegNum) -> Option<&str> {
        let fold = self.fold.as_ref()?;
        Some(self.alignment?.seg_fold(fold, seg))
    }
}

/// A pair returned despite a failed check.
#[derive(Debug, Clone, PartialEq)]
pub struct UnpairedRecord {
    pub hyb: HybRecord,
    pub fold: Option<FoldRecord>,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IterStep {
    Paired(PairedRecord),
    Unpaired(UnpairedRecord),
    Skipped(SkipReason),
}

/// Outcome counts for one pass over a hyb/fold stream pair.
#[derive(Debug, Clone, Default)]
pub struct IterReport {
    pub pairs_read: usize,
    pub paired: usize,
    pub unpaired: usize,
    pub skipped: usize,
    pub desynced: bool,
    pub by_kind: AHashMap<SkipKind, usize>,
}

impl IterReport {
    pub fn count(&self, kind: SkipKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn report(&self) -> String {
        let mut lines = vec![
            format!("pairs_read\t{}", self.pairs_read),
            format!("paired\t{}", self.paired),
            format!("unpaired\t{}", self.unpaired),
            format!("skipped\t{}", self.skipped),
        ];
        for kind in SkipKind::ALL {
            let count = self.count(kind);
            if count > 0 {
                lines.push(format!("{}\t{}", kind.as_str(), count));
            }
        }
        if self.desynced {
            lines.push("streams_desynced\ttrue".to_string());
        }
        lines.join("\n")
    }
}

/// Walks a hyb stream and a fold stream in lockstep.
pub struct HybFoldIter<H, F> {
    hyb: H,
    fold: F,
    settings: IterSettings,
    reconcile: ReconcileSettings,
    sequential_skips: usize,
    finished: bool,
    report: IterReport,
}

impl<H, F> HybFoldIter<H, F>
where
    H: Iterator<Item = Result<HybRecord, HybError>>,
    F: Iterator<Item = Result<FoldRecord, FoldError>>,
{
    pub fn new(hyb: H, fold: F, settings: IterSettings, reconcile: ReconcileSettings) -> Self {
        HybFoldIter {
            hyb,
            fold,
            settings,
            reconcile,
            sequential_skips: 0,
            finished: false,
            report: IterReport::default(),
        }
    }

    pub fn from_settings(hyb: H, fold: F, settings: &Settings) -> Self {
        Self::new(hyb, fold, settings.iter.clone(), settings.fold.reconcile.clone())
    }

    pub fn report(&self) -> &IterReport {
        &self.report
    }

    pub fn into_report(self) -> IterReport {
        self.report
    }

    /// Advance both streams by one record.
    pub fn next_step(&mut self) -> Option<Result<IterStep, Error>> {
        if self.finished {
            return None;
        }
        let step = match (self.hyb.next(), self.fold.next()) {
            (None, None) => {
                self.finished = true;
                return None;
            }
            (Some(_), None) => return self.desync("fold stream ended before the hyb stream"),
            (None, Some(_)) => return self.desync("hyb stream ended before the fold stream"),
            (Some(hyb), Some(fold)) => {
                self.report.pairs_read += 1;
                self.evaluate(hyb, fold)
            }
        };
        if step.is_err() {
            self.finished = true;
        }
        Some(step)
    }

    fn desync(&mut self, what: &str) -> Option<Result<IterStep, Error>> {
        self.finished = true;
        self.report.desynced = true;
        let message = format!("{} after {} pairs", what, self.report.pairs_read);
        match self.settings.error_mode {
            ErrorMode::Raise => return Some(Err(Error::Desync(message))),
            mode if mode.warns() => warn!("{}", message),
            _ => debug!("{}", message),
        }
        None
    }

    fn evaluate(
        &mut self,
        hyb: Result<HybRecord, HybError>,
        fold: Result<FoldRecord, FoldError>,
    ) -> Result<IterStep, Error> {
        let hyb = match hyb {
            Ok(hyb) => hyb,
            Err(e) => return self.fail(SkipKind::HybRecordInvalid, None, None, e.into()),
        };
        let fold = match fold {
            Ok(fold) => fold,
            Err(e) if self.settings.checks(ErrorCheck::FoldRecordNoFold) => {
                return self.fail(SkipKind::FoldRecordNoFold, Some(hyb), None, e.into());
            }
            Err(e) => {
                debug!("no fold for {}: {}", hyb.id(), e);
                return Ok(self.paired(hyb, None, None));
            }
        };
        if self.settings.require_id_match && !fold.id().starts_with(hyb.id()) {
            let err = Error::Pairing {
                hyb_id: hyb.id().to_string(),
                source: PairingError::IdMismatch {
                    hyb_id: hyb.id().to_string(),
                    fold_id: fold.id().to_string(),
                },
            };
            return self.fail(SkipKind::IdMismatch, Some(hyb), Some(fold), err);
        }
        match reconcile(&hyb, &fold, &self.reconcile) {
            Ok(alignment) => Ok(self.paired(hyb, Some(fold), Some(alignment))),
            Err(reason) => {
                let (kind, check) = match reason {
                    PairingError::MissingSegmentCoordinates { .. } => {
                        (SkipKind::HybRecordIndel, ErrorCheck::HybRecordIndel)
                    }
                    _ => (SkipKind::MaxMismatch, ErrorCheck::MaxMismatch),
                };
                if !self.settings.checks(check) {
                    debug!("{} left unaligned: {}", hyb.id(), reason);
                    return Ok(self.paired(hyb, Some(fold), None));
                }
                let err = Error::Pairing {
                    hyb_id: hyb.id().to_string(),
                    source: reason,
                };
                self.fail(kind, Some(hyb), Some(fold), err)
            }
        }
    }

    fn paired(
        &mut self,
        hyb: HybRecord,
        fold: Option<FoldRecord>,
        alignment: Option<FoldAlignment>,
    ) -> IterStep {
        self.sequential_skips = 0;
        self.report.paired += 1;
        IterStep::Paired(PairedRecord {
            hyb,
            fold,
            alignment,
        })
    }

    fn fail(
        &mut self,
        kind: SkipKind,
        hyb: Option<HybRecord>,
        fold: Option<FoldRecord>,
        err: Error,
    ) -> Result<IterStep, Error> {
        let mode = self.settings.error_mode;
        if mode == ErrorMode::Raise {
            return Err(err);
        }
        let reason = SkipReason {
            kind,
            hyb_id: hyb.as_ref().map(|h| h.id().to_string()),
            message: err.to_string(),
        };
        if mode.warns() {
            warn!("{}", reason);
        } else {
            debug!("{}", reason);
        }
        *self.report.by_kind.entry(kind).or_insert(0) += 1;

        match hyb {
            Some(hyb) if mode.returns() => {
                self.sequential_skips = 0;
                self.report.unpaired += 1;
                Ok(IterStep::Unpaired(UnpairedRecord { hyb, fold, reason }))
            }
            _ => {
                self.sequential_skips += 1;
                self.report.skipped += 1;
                if self.sequential_skips > self.settings.max_sequential_skips {
                    return Err(Error::TooManySkips {
                        count: self.sequential_skips,
                        last: reason.to_string(),
                    });
                }
                Ok(IterStep::Skipped(reason))
            }
        }
    }
}

impl<H, F> Iterator for HybFoldIter<H, F>
where
    H: Iterator<Item = Result<HybRecord, HybError>>,
    F: Iterator<Item = Result<FoldRecord, FoldError>>,
{
    type Item = Result<PairedRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.next_step()? {
                Ok(IterStep::Paired(paired)) => return Some(Ok(paired)),
                Ok(IterStep::Unpaired(unpaired)) => {
                    return Some(Ok(PairedRecord {
                        hyb: unpaired.hyb,
                        fold: unpaired.fold,
                        alignment: None,
                    }))
                }
                Ok(IterStep::Skipped(_)) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
