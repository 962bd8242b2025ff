// src/lib.rs
pub mod types;
pub mod errors;
pub mod settings;
pub mod util;
pub mod hyb_record;
pub mod hyb_file;
pub mod fold_record;
pub mod fold_file;
pub mod reconcile;
pub mod hyb_fold_iter;
pub mod type_finder;
pub mod mirna;
pub mod filter;
pub mod analysis;

use std::path::{Path, PathBuf};

use log::info;

pub use crate::analysis::{
    MirnaCountAnalysis, MirnaFoldAnalysis, MirnaTargetAnalysis, SummaryAnalysis, TargetFilter, TypeAnalysis,
};
pub use crate::errors::{Error, FoldError, HybError, PairingError, Result, SettingsError, TypeFinderError};
pub use crate::filter::{filter_records, MatchMode, Property, RecordFilter};
pub use crate::fold_file::{create_fold, open_fold, FoldFormat, FoldReader, FoldWriter};
pub use crate::fold_record::FoldRecord;
pub use crate::hyb_file::{create_hyb, open_hyb, HybReader, HybWriter};
pub use crate::hyb_fold_iter::{HybFoldIter, IterReport, IterStep, PairedRecord, SkipKind};
pub use crate::hyb_record::{HybRecord, SegmentInfo};
pub use crate::reconcile::{reconcile, FoldAlignment};
pub use crate::settings::Settings;
pub use crate::type_finder::TypeFinder;
pub use crate::types::{CountMode, MirnaSeg, SegNum, Span};

/// Fill in segment types (unless already present) and the `miRNA_seg` flag.
pub fn annotate_record(record: &mut HybRecord, finder: &TypeFinder, settings: &Settings) -> Result<()> {
    if record.seg1_type().is_none() || record.seg2_type().is_none() {
        record.eval_types(finder, &settings.hyb)?;
    }
    record.eval_mirna(&settings.hyb.mirna_types)?;
    Ok(())
}

/// Summary analyses of one or more hyb files, kept per file and combined.
pub struct SummaryResults {
    pub per_file: Vec<(PathBuf, SummaryAnalysis)>,
    pub combined: SummaryAnalysis,
    /// Output delimiter used by the text getters.
    pub sep: String,
}

impl SummaryResults {
    /// Combined summary as delimited text.
    pub fn get_summary_text(&self) -> String {
        let mut output = self.combined.to_lines(&self.sep).join("\n");
        output.push('\n');
        output
    }

    /// Summary of a single input file as delimited text.
    pub fn get_file_summary_text(&self, path: &Path) -> Option<String> {
        self.per_file
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, analysis)| {
                let mut output = analysis.to_lines(&self.sep).join("\n");
                output.push('\n');
                output
            })
    }
}

/// Read each hyb file once, typing every record and adding it to a summary.
pub fn summarize_hyb_files(
    paths: &[PathBuf],
    finder: &TypeFinder,
    settings: &Settings,
) -> Result<SummaryResults> {
    let mut combined = SummaryAnalysis::new(settings);
    let mut per_file = Vec::with_capacity(paths.len());

    for path in paths {
        let mut analysis = SummaryAnalysis::new(settings);
        let mut n_records = 0usize;
        for record in open_hyb(path, settings.hyb.clone())? {
            let mut record = record?;
            annotate_record(&mut record, finder, settings)?;
            analysis.add(&record)?;
            n_records += 1;
        }
        info!("{}: {} records summarized", path.display(), n_records);
        combined.combine(&analysis);
        per_file.push((path.clone(), analysis));
    }

    Ok(SummaryResults {
        per_file,
        combined,
        sep: settings.analysis.out_delim.clone(),
    })
}

/// Count each miRNA's targets over one or more hyb files.
pub fn analyze_mirna_targets(
    paths: &[PathBuf],
    finder: &TypeFinder,
    filter: &TargetFilter,
    settings: &Settings,
) -> Result<MirnaTargetAnalysis> {
    let mut analysis = MirnaTargetAnalysis::new(settings).with_filter(filter.clone());
    for path in paths {
        for record in open_hyb(path, settings.hyb.clone())? {
            let mut record = record?;
            annotate_record(&mut record, finder, settings)?;
            analysis.add(&record)?;
        }
    }
    info!(
        "{} miRNAs with {} counted targets",
        analysis.targets.len(),
        analysis.total()
    );
    Ok(analysis)
}

/// Pair a hyb file with its fold file and run the miRNA fold analysis.
pub fn analyze_mirna_folds(
    hyb_path: &Path,
    fold_path: &Path,
    finder: &TypeFinder,
    settings: &Settings,
) -> Result<(MirnaFoldAnalysis, IterReport)> {
    let hyb = open_hyb(hyb_path, settings.hyb.clone())?;
    let fold = open_fold(fold_path, settings.fold.format, &settings.fold.placeholder)?;
    let mut pairs = HybFoldIter::from_settings(hyb, fold, settings);
    let mut analysis = MirnaFoldAnalysis::new(settings);

    for paired in pairs.by_ref() {
        let mut paired = paired?;
        annotate_record(&mut paired.hyb, finder, settings)?;
        analysis.add(&paired)?;
    }
    let report = pairs.into_report();
    info!("{}", report.report());
    Ok((analysis, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyb_record::tests::{ART_HYB_1, HYB_STR_1};
    use std::fs;

    #[test]
    fn summarizes_files_separately_and_combined() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.hyb");
        let second = dir.path().join("second.hyb");
        fs::write(&first, format!("{}\n{}\n", HYB_STR_1, ART_HYB_1)).unwrap();
        fs::write(&second, format!("{}\n", HYB_STR_1)).unwrap();

        let paths = vec![first.clone(), second.clone()];
        let results = summarize_hyb_files(&paths, &TypeFinder::Hybformat, &Settings::default()).unwrap();

        assert_eq!(results.per_file.len(), 2);
        assert_eq!(results.combined.mirna.five_prime, 3);
        assert_eq!(
            results.combined.types.hybrid_types.get("microRNA-mRNA"),
            Some(&3)
        );
        let text = results.get_summary_text();
        assert!(text.starts_with("hybrid_type,count\nmicroRNA-mRNA,3\n"));
        assert!(text.contains("5p_mirna_hybrids,3\n"));

        let second_text = results.get_file_summary_text(&second).unwrap();
        assert!(second_text.contains("5p_mirna_hybrids,1\n"));
        assert!(results.get_file_summary_text(Path::new("missing.hyb")).is_none());
    }

    #[test]
    fn target_analysis_over_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.hyb");
        fs::write(&path, format!("{}\n{}\n", HYB_STR_1, HYB_STR_1)).unwrap();
        let analysis =
            analyze_mirna_targets(&[path], &TypeFinder::Hybformat, &TargetFilter::default(), &Settings::default())
                .unwrap();
        assert_eq!(analysis.total(), 2);
        let lines = analysis.to_lines(",");
        assert_eq!(
            lines[2],
            "MIMAT0000078_MirBase_miR-23a_microRNA,microRNA,ENSG00000188229_ENST00000340384_TUBB2C_mRNA,mRNA,2"
        );
    }

    #[test]
    fn untypeable_records_fail_the_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.hyb");
        let line = HYB_STR_1.replace("MIMAT0000078_MirBase_miR-23a_microRNA", "plainname");
        fs::write(&path, format!("{}\n", line)).unwrap();
        let result = summarize_hyb_files(&[path], &TypeFinder::Hybformat, &Settings::default());
        assert!(matches!(result, Err(Error::Hyb(HybError::UnknownSegType(_)))));
    }
}
