//src/analysis.rs

use ahash::AHashMap;
use log::{debug, warn};

use crate::errors::{Error, HybError};
use crate::hyb_fold_iter::PairedRecord;
use crate::hyb_record::HybRecord;
use crate::settings::Settings;
use crate::types::{CountMode, MirnaSeg, SegNum};

/// Number of miRNA positions always reported by the fold analysis.
pub const MIRNA_FOLD_POSITIONS: usize = 27;

/// Entries sorted by count (descending), then by name.
fn sorted_counts(counts: &AHashMap<String, u64>) -> Vec<(&str, u64)> {
    let mut rows: Vec<(&str, u64)> = counts.iter().map(|(k, &v)| (k.as_str(), v)).collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    rows
}

fn count_lines(header: &str, counts: &AHashMap<String, u64>, sep: &str) -> Vec<String> {
    let mut lines = vec![format!("{}{}count", header, sep)];
    lines.extend(
        sorted_counts(counts)
            .into_iter()
            .map(|(key, count)| format!("{}{}{}", key, sep, count)),
    );
    lines
}

fn merge_counts(into: &mut AHashMap<String, u64>, from: &AHashMap<String, u64>) {
    for (key, count) in from {
        *into.entry(key.clone()).or_insert(0) += count;
    }
}

fn missing(record: &HybRecord, key: &str) -> Error {
    Error::Hyb(HybError::MissingFlag {
        id: record.id().to_string(),
        key: key.to_string(),
    })
}

/// Counts of hybrid types and of individual segment types.
#[derive(Debug, Clone)]
pub struct TypeAnalysis {
    count_mode: CountMode,
    type_sep: String,
    mirna_sort: bool,
    mirna_types: Vec<String>,
    pub hybrid_types: AHashMap<String, u64>,
    pub seg1_types: AHashMap<String, u64>,
    pub seg2_types: AHashMap<String, u64>,
    pub all_seg_types: AHashMap<String, u64>,
}

impl TypeAnalysis {
    pub fn new(settings: &Settings) -> Self {
        TypeAnalysis {
            count_mode: settings.analysis.count_mode,
            type_sep: settings.analysis.type_sep.clone(),
            mirna_sort: settings.analysis.mirna_sort,
            mirna_types: settings.hyb.mirna_types.clone(),
            hybrid_types: AHashMap::new(),
            seg1_types: AHashMap::new(),
            seg2_types: AHashMap::new(),
            all_seg_types: AHashMap::new(),
        }
    }

    /// Name of the hybrid type: the miRNA type first when sorting by
    /// miRNA, otherwise the two types in lexical order.
    pub fn hybrid_type(&self, seg1_type: &str, seg2_type: &str) -> String {
        let is_mirna = |t: &str| self.mirna_types.iter().any(|m| m == t);
        let (first, second) = if self.mirna_sort && is_mirna(seg1_type) {
            (seg1_type, seg2_type)
        } else if self.mirna_sort && is_mirna(seg2_type) {
            (seg2_type, seg1_type)
        } else if seg1_type <= seg2_type {
            (seg1_type, seg2_type)
        } else {
            (seg2_type, seg1_type)
        };
        format!("{}{}{}", first, self.type_sep, second)
    }

    /// Requires both segment types to be set.
    pub fn add(&mut self, record: &HybRecord) -> Result<(), Error> {
        let seg1_type = record.seg1_type().ok_or_else(|| missing(record, "seg1_type"))?;
        let seg2_type = record.seg2_type().ok_or_else(|| missing(record, "seg2_type"))?;
        let count = record.count(self.count_mode)?;
        let hybrid_type = self.hybrid_type(seg1_type, seg2_type);

        *self.hybrid_types.entry(hybrid_type).or_insert(0) += count;
        *self.seg1_types.entry(seg1_type.to_string()).or_insert(0) += count;
        *self.seg2_types.entry(seg2_type.to_string()).or_insert(0) += count;
        for seg_type in [seg1_type, seg2_type] {
            *self.all_seg_types.entry(seg_type.to_string()).or_insert(0) += count;
        }
        Ok(())
    }

    pub fn combine(&mut self, other: &TypeAnalysis) {
        merge_counts(&mut self.hybrid_types, &other.hybrid_types);
        merge_counts(&mut self.seg1_types, &other.seg1_types);
        merge_counts(&mut self.seg2_types, &other.seg2_types);
        merge_counts(&mut self.all_seg_types, &other.all_seg_types);
    }

    pub fn to_lines(&self, sep: &str) -> Vec<String> {
        let mut lines = count_lines("hybrid_type", &self.hybrid_types, sep);
        lines.push(String::new());
        lines.extend(count_lines("seg_type", &self.all_seg_types, sep));
        lines
    }
}

/// Counts of hybrids by where their miRNA sits.
#[derive(Debug, Clone, Default)]
pub struct MirnaCountAnalysis {
    count_mode: CountMode,
    pub five_prime: u64,
    pub three_prime: u64,
    pub dimer: u64,
    pub all_mirna: u64,
    pub no_mirna: u64,
    pub unknown: u64,
}

impl MirnaCountAnalysis {
    pub fn new(settings: &Settings) -> Self {
        MirnaCountAnalysis {
            count_mode: settings.analysis.count_mode,
            ..Default::default()
        }
    }

    /// Requires the `miRNA_seg` flag (see [`HybRecord::eval_mirna`]).
    pub fn add(&mut self, record: &HybRecord) -> Result<(), Error> {
        let mirna_seg = record.mirna_seg().ok_or_else(|| missing(record, "miRNA_seg"))?;
        let count = record.count(self.count_mode)?;
        match mirna_seg {
            MirnaSeg::FivePrime => self.five_prime += count,
            MirnaSeg::ThreePrime => self.three_prime += count,
            MirnaSeg::Both => self.dimer += count,
            MirnaSeg::None => self.no_mirna += count,
            MirnaSeg::Unknown => self.unknown += count,
        }
        if mirna_seg.has_mirna() {
            self.all_mirna += count;
        }
        Ok(())
    }

    pub fn combine(&mut self, other: &MirnaCountAnalysis) {
        self.five_prime += other.five_prime;
        self.three_prime += other.three_prime;
        self.dimer += other.dimer;
        self.all_mirna += other.all_mirna;
        self.no_mirna += other.no_mirna;
        self.unknown += other.unknown;
    }

    pub fn to_lines(&self, sep: &str) -> Vec<String> {
        let rows = [
            ("5p_mirna_hybrids", self.five_prime),
            ("3p_mirna_hybrids", self.three_prime),
            ("mirna_dimer_hybrids", self.dimer),
            ("all_mirna_hybrids", self.all_mirna),
            ("no_mirna_hybrids", self.no_mirna),
        ];
        let mut lines = vec![format!("miRNA_type{}count", sep)];
        lines.extend(rows.iter().map(|(key, count)| format!("{}{}{}", key, sep, count)));
        if self.unknown > 0 {
            lines.push(format!("unknown_mirna_hybrids{}{}", sep, self.unknown));
        }
        lines
    }
}

/// Type and miRNA counts gathered in one pass.
#[derive(Debug, Clone)]
pub struct SummaryAnalysis {
    pub types: TypeAnalysis,
    pub mirna: MirnaCountAnalysis,
}

impl SummaryAnalysis {
    pub fn new(settings: &Settings) -> Self {
        SummaryAnalysis {
            types: TypeAnalysis::new(settings),
            mirna: MirnaCountAnalysis::new(settings),
        }
    }

    pub fn add(&mut self, record: &HybRecord) -> Result<(), Error> {
        self.types.add(record)?;
        self.mirna.add(record)
    }

    pub fn combine(&mut self, other: &SummaryAnalysis) {
        self.types.combine(&other.types);
        self.mirna.combine(&other.mirna);
    }

    pub fn to_lines(&self, sep: &str) -> Vec<String> {
        let mut lines = self.types.to_lines(sep);
        lines.push(String::new());
        lines.extend(self.mirna.to_lines(sep));
        lines
    }
}

/// Per-position pairing of miRNAs in their folds.
#[derive(Debug, Clone)]
pub struct MirnaFoldAnalysis {
    count_mode: CountMode,
    skip_no_fold: bool,
    /// Paired-base counts; index 0 is miRNA position 1.
    pub base_counts: Vec<u64>,
    pub all_evaluated: u64,
    pub all_mirna: u64,
    pub no_mirna: u64,
    pub all_folds: u64,
    pub no_folds: u64,
}

impl MirnaFoldAnalysis {
    pub fn new(settings: &Settings) -> Self {
        MirnaFoldAnalysis {
            count_mode: settings.analysis.count_mode,
            skip_no_fold: settings.analysis.skip_no_fold,
            base_counts: vec![0; MIRNA_FOLD_POSITIONS],
            all_evaluated: 0,
            all_mirna: 0,
            no_mirna: 0,
            all_folds: 0,
            no_folds: 0,
        }
    }

    pub fn add(&mut self, paired: &PairedRecord) -> Result<(), Error> {
        let record = &paired.hyb;
        let mirna_seg = record.mirna_seg().ok_or_else(|| missing(record, "miRNA_seg"))?;
        let count = record.count(self.count_mode)?;
        self.all_evaluated += count;

        let Some(seg) = mirna_seg.mirna_seg() else {
            self.no_mirna += count;
            return Ok(());
        };
        self.all_mirna += count;

        let Some(mirna_fold) = paired.seg_fold(seg) else {
            if !self.skip_no_fold {
                return Err(Error::Analysis(format!(
                    "record {} has no aligned fold record",
                    record.id()
                )));
            }
            debug!("{}: no aligned fold, counted as no_folds", record.id());
            self.no_folds += count;
            return Ok(());
        };

        let has_open = mirna_fold.contains('(');
        let has_close = mirna_fold.contains(')');
        if has_open == has_close || mirna_fold.len() < 5 {
            warn!("{}: bad miRNA fold \"{}\"", record.id(), mirna_fold);
            self.no_folds += count;
            return Ok(());
        }

        self.all_folds += count;
        if mirna_fold.len() > self.base_counts.len() {
            self.base_counts.resize(mirna_fold.len(), 0);
        }
        for (i, c) in mirna_fold.chars().enumerate() {
            if c == '(' || c == ')' {
                self.base_counts[i] += count;
            }
        }
        Ok(())
    }

    pub fn combine(&mut self, other: &MirnaFoldAnalysis) {
        if other.base_counts.len() > self.base_counts.len() {
            self.base_counts.resize(other.base_counts.len(), 0);
        }
        for (i, count) in other.base_counts.iter().enumerate() {
            self.base_counts[i] += count;
        }
        self.all_evaluated += other.all_evaluated;
        self.all_mirna += other.all_mirna;
        self.no_mirna += other.no_mirna;
        self.all_folds += other.all_folds;
        self.no_folds += other.no_folds;
    }

    /// Fraction of counted folds paired at each position; empty when
    /// no folds were counted.
    pub fn base_fractions(&self) -> Vec<f64> {
        if self.all_folds == 0 {
            return Vec::new();
        }
        self.base_counts
            .iter()
            .map(|&c| c as f64 / self.all_folds as f64)
            .collect()
    }

    pub fn to_lines(&self, sep: &str) -> Vec<String> {
        let rows = [
            ("all_evaluated", self.all_evaluated),
            ("all_mirna", self.all_mirna),
            ("no_mirna", self.no_mirna),
            ("all_folds", self.all_folds),
            ("no_folds", self.no_folds),
        ];
        let mut lines = vec![format!("data_type{}count", sep)];
        lines.extend(rows.iter().map(|(key, count)| format!("{}{}{}", key, sep, count)));
        lines.push(String::new());

        let join = |label: &str, values: Vec<String>| {
            std::iter::once(label.to_string())
                .chain(values)
                .collect::<Vec<_>>()
                .join(sep)
        };
        lines.push(join(
            "index",
            (1..=self.base_counts.len()).map(|i| i.to_string()).collect(),
        ));
        lines.push(join(
            "i_count",
            self.base_counts.iter().map(|c| c.to_string()).collect(),
        ));
        let fractions = self.base_fractions();
        if !fractions.is_empty() {
            lines.push(join(
                "i_fraction",
                fractions.iter().map(|f| format!("{:.4}", f)).collect(),
            ));
        }
        lines
    }
}

/// `(reference name, segment type)` of one side of a miRNA hybrid.
pub type SegKey = (String, String);

/// Restricts which miRNA / target pairs a target analysis counts. With no
/// field set every pair is counted; otherwise a pair is counted when any
/// set field matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetFilter {
    pub mirna_contains: Option<String>,
    pub mirna_matches: Option<String>,
    pub target_contains: Option<String>,
    pub target_matches: Option<String>,
}

impl TargetFilter {
    pub fn is_empty(&self) -> bool {
        self.mirna_contains.is_none()
            && self.mirna_matches.is_none()
            && self.target_contains.is_none()
            && self.target_matches.is_none()
    }

    pub fn accepts(&self, mirna: &str, target: &str) -> bool {
        if self.is_empty() {
            return true;
        }
        let contains = |pattern: &Option<String>, name: &str| {
            pattern.as_deref().is_some_and(|p| name.contains(p))
        };
        let matches = |pattern: &Option<String>, name: &str| pattern.as_deref() == Some(name);
        contains(&self.mirna_contains, mirna)
            || matches(&self.mirna_matches, mirna)
            || contains(&self.target_contains, target)
            || matches(&self.target_matches, target)
    }
}

/// Counts of each miRNA's targets, keyed by reference name and type.
#[derive(Debug, Clone)]
pub struct MirnaTargetAnalysis {
    count_mode: CountMode,
    double_count_duplexes: bool,
    spacer_line: bool,
    filter: TargetFilter,
    pub targets: AHashMap<SegKey, AHashMap<SegKey, u64>>,
}

impl MirnaTargetAnalysis {
    pub fn new(settings: &Settings) -> Self {
        MirnaTargetAnalysis {
            count_mode: settings.analysis.count_mode,
            double_count_duplexes: settings.analysis.double_count_duplexes,
            spacer_line: settings.analysis.target_spacer_line,
            filter: TargetFilter::default(),
            targets: AHashMap::new(),
        }
    }

    pub fn with_filter(mut self, filter: TargetFilter) -> Self {
        self.filter = filter;
        self
    }

    fn seg_key(record: &HybRecord, seg: SegNum) -> Result<SegKey, Error> {
        let name = record.seg(seg).ref_name.clone().ok_or_else(|| {
            Error::Analysis(format!(
                "record {} has no reference name for segment {}",
                record.id(),
                seg.number()
            ))
        })?;
        let seg_type = record
            .seg_type(seg)
            .ok_or_else(|| missing(record, seg.type_flag()))?;
        Ok((name, seg_type.to_string()))
    }

    /// Requires the `miRNA_seg` flag. Records without a miRNA are ignored.
    pub fn add(&mut self, record: &HybRecord) -> Result<(), Error> {
        let mirna_seg = record.mirna_seg().ok_or_else(|| missing(record, "miRNA_seg"))?;
        let Some(mirna) = mirna_seg.mirna_seg() else {
            return Ok(());
        };
        let target = match mirna {
            SegNum::One => SegNum::Two,
            SegNum::Two => SegNum::One,
        };
        let count = record.count(self.count_mode)?;
        let mirna_key = Self::seg_key(record, mirna)?;
        let target_key = Self::seg_key(record, target)?;

        let mut pairs = vec![(mirna_key.clone(), target_key.clone())];
        if self.double_count_duplexes && mirna_seg == MirnaSeg::Both {
            pairs.push((target_key, mirna_key));
        }
        for (mirna_key, target_key) in pairs {
            if !self.filter.accepts(&mirna_key.0, &target_key.0) {
                continue;
            }
            *self
                .targets
                .entry(mirna_key)
                .or_default()
                .entry(target_key)
                .or_insert(0) += count;
        }
        Ok(())
    }

    pub fn combine(&mut self, other: &MirnaTargetAnalysis) {
        for (mirna, targets) in &other.targets {
            let into = self.targets.entry(mirna.clone()).or_default();
            for (target, count) in targets {
                *into.entry(target.clone()).or_insert(0) += count;
            }
        }
    }

    /// Targets of one miRNA, most counted first, then by name.
    pub fn sorted_targets(&self, mirna: &SegKey) -> Vec<(&SegKey, u64)> {
        let mut rows: Vec<(&SegKey, u64)> = self
            .targets
            .get(mirna)
            .map(|targets| targets.iter().map(|(k, &v)| (k, v)).collect())
            .unwrap_or_default();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        rows
    }

    /// Total target count per miRNA, in miRNA name order.
    pub fn mirna_totals(&self) -> Vec<(&SegKey, u64)> {
        let mut rows: Vec<(&SegKey, u64)> = self
            .targets
            .iter()
            .map(|(mirna, targets)| (mirna, targets.values().sum()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        rows
    }

    /// Counts of each target type for one miRNA.
    pub fn target_type_counts(&self, mirna: &SegKey) -> AHashMap<String, u64> {
        let mut counts = AHashMap::new();
        if let Some(targets) = self.targets.get(mirna) {
            for ((_, target_type), count) in targets {
                *counts.entry(target_type.clone()).or_insert(0) += count;
            }
        }
        counts
    }

    pub fn total(&self) -> u64 {
        self.targets.values().flat_map(|t| t.values()).sum()
    }

    pub fn to_lines(&self, sep: &str) -> Vec<String> {
        let mut lines = vec![["mirna", "mirna_type", "target", "target_type", "count"].join(sep)];
        for (mirna, total) in self.mirna_totals() {
            lines.push(["mirna", "-", "total", "-", total.to_string().as_str()].join(sep));
            for ((target, target_type), count) in self.sorted_targets(mirna) {
                let count_str = count.to_string();
                let row = [
                    mirna.0.as_str(),
                    mirna.1.as_str(),
                    target.as_str(),
                    target_type.as_str(),
                    count_str.as_str(),
                ];
                lines.push(row.join(sep));
            }
            if self.spacer_line {
                lines.push(String::new());
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fold_record::tests::{vienna, ART_VIENNA_1};
    use crate::hyb_record::tests::ART_HYB_1;
    use crate::reconcile::reconcile;
    use crate::settings::{HybSettings, ReconcileSettings};

    fn typed(id: &str, seg1: &str, seg2: &str) -> HybRecord {
        let line = ART_HYB_1.replacen("1_1000\t", &format!("{}\t", id), 1);
        let mut record = HybRecord::from_line(&line, &HybSettings::default()).unwrap();
        record.set_seg_types(seg1, seg2).unwrap();
        record.eval_mirna(&HybSettings::default().mirna_types).unwrap();
        record
    }

    #[test]
    fn hybrid_type_puts_mirna_first() {
        let settings = Settings::default();
        let analysis = TypeAnalysis::new(&settings);
        assert_eq!(analysis.hybrid_type("mRNA", "microRNA"), "microRNA-mRNA");
        assert_eq!(analysis.hybrid_type("tRNA", "mRNA"), "mRNA-tRNA");

        let mut unsorted = settings.clone();
        unsorted.analysis.mirna_sort = false;
        let analysis = TypeAnalysis::new(&unsorted);
        assert_eq!(analysis.hybrid_type("mRNA", "microRNA"), "mRNA-microRNA");
    }

    #[test]
    fn type_counts_sorted_by_count() {
        let settings = Settings::default();
        let mut analysis = TypeAnalysis::new(&settings);
        analysis.add(&typed("a", "microRNA", "mRNA")).unwrap();
        analysis.add(&typed("b", "mRNA", "microRNA")).unwrap();
        analysis.add(&typed("c", "rRNA", "mRNA")).unwrap();
        let lines = analysis.to_lines(",");
        assert_eq!(
            lines,
            vec![
                "hybrid_type,count",
                "microRNA-mRNA,2",
                "mRNA-rRNA,1",
                "",
                "seg_type,count",
                "mRNA,3",
                "microRNA,2",
                "rRNA,1",
            ]
        );
        assert_eq!(analysis.seg1_types.get("microRNA"), Some(&1));
    }

    #[test]
    fn type_analysis_requires_types() {
        let mut analysis = TypeAnalysis::new(&Settings::default());
        let record = HybRecord::from_line(ART_HYB_1, &HybSettings::default()).unwrap();
        assert!(analysis.add(&record).is_err());
    }

    #[test]
    fn read_count_mode_uses_flag() {
        let mut settings = Settings::default();
        settings.analysis.count_mode = CountMode::Read;
        let mut analysis = MirnaCountAnalysis::new(&settings);
        let mut record = typed("a", "microRNA", "mRNA");
        assert!(analysis.add(&record).is_err());
        record.set_flag("read_count", "4").unwrap();
        analysis.add(&record).unwrap();
        assert_eq!(analysis.five_prime, 4);
        assert_eq!(analysis.all_mirna, 4);
    }

    #[test]
    fn summaries_combine() {
        let settings = Settings::default();
        let mut first = SummaryAnalysis::new(&settings);
        first.add(&typed("a", "microRNA", "mRNA")).unwrap();
        first.add(&typed("b", "mRNA", "mRNA")).unwrap();
        let mut second = SummaryAnalysis::new(&settings);
        second.add(&typed("c", "microRNA", "miRNA")).unwrap();
        second.add(&typed("d", "mRNA", "microRNA")).unwrap();

        first.combine(&second);
        assert_eq!(first.mirna.five_prime, 1);
        assert_eq!(first.mirna.three_prime, 1);
        assert_eq!(first.mirna.dimer, 1);
        assert_eq!(first.mirna.all_mirna, 3);
        assert_eq!(first.mirna.no_mirna, 1);
        assert_eq!(first.types.hybrid_types.get("microRNA-mRNA"), Some(&2));

        let lines = first.to_lines("\t");
        assert!(lines.contains(&"miRNA_type\tcount".to_string()));
        assert!(lines.contains(&"all_mirna_hybrids\t3".to_string()));
    }

    #[test]
    fn fold_analysis_counts_paired_bases() {
        let settings = Settings::default();
        let mut analysis = MirnaFoldAnalysis::new(&settings);

        let hyb = typed("a", "mRNA", "microRNA");
        let fold = vienna(ART_VIENNA_1);
        let alignment = reconcile(&hyb, &fold, &ReconcileSettings::default()).unwrap();
        analysis
            .add(&PairedRecord {
                hyb,
                fold: Some(fold),
                alignment: Some(alignment),
            })
            .unwrap();
        analysis
            .add(&PairedRecord {
                hyb: typed("b", "mRNA", "rRNA"),
                fold: None,
                alignment: None,
            })
            .unwrap();
        analysis
            .add(&PairedRecord {
                hyb: typed("c", "microRNA", "mRNA"),
                fold: None,
                alignment: None,
            })
            .unwrap();

        assert_eq!(analysis.all_evaluated, 3);
        assert_eq!(analysis.no_mirna, 1);
        assert_eq!(analysis.all_mirna, 2);
        assert_eq!(analysis.all_folds, 1);
        assert_eq!(analysis.no_folds, 1);
        // "...))))))))))))))..." pairs positions 4 through 17.
        assert_eq!(analysis.base_counts[2], 0);
        assert_eq!(analysis.base_counts[3], 1);
        assert_eq!(analysis.base_counts[16], 1);
        assert_eq!(analysis.base_counts[17], 0);
        assert_eq!(analysis.base_counts.len(), MIRNA_FOLD_POSITIONS);

        let lines = analysis.to_lines(",");
        assert_eq!(lines[0], "data_type,count");
        assert!(lines.iter().any(|l| l.starts_with("index,1,2,3")));
        assert!(lines.iter().any(|l| l.starts_with("i_fraction,0.0000,0.0000,0.0000,1.0000")));
    }

    #[test]
    fn missing_fold_fails_when_not_skipping() {
        let mut settings = Settings::default();
        settings.analysis.skip_no_fold = false;
        let mut analysis = MirnaFoldAnalysis::new(&settings);
        let result = analysis.add(&PairedRecord {
            hyb: typed("c", "microRNA", "mRNA"),
            fold: None,
            alignment: None,
        });
        assert!(matches!(result, Err(Error::Analysis(_))));
    }

    fn key(name: &str, seg_type: &str) -> SegKey {
        (name.to_string(), seg_type.to_string())
    }

    #[test]
    fn targets_counted_per_mirna() {
        let settings = Settings::default();
        let mut analysis = MirnaTargetAnalysis::new(&settings);
        analysis.add(&typed("a", "microRNA", "mRNA")).unwrap();
        analysis.add(&typed("b", "microRNA", "mRNA")).unwrap();
        analysis.add(&typed("c", "mRNA", "microRNA")).unwrap();
        analysis.add(&typed("d", "mRNA", "rRNA")).unwrap();

        assert_eq!(analysis.total(), 3);
        let seg1_mirna = key("ARTSEG1_SOURCE_NAME_microRNA", "microRNA");
        assert_eq!(
            analysis.sorted_targets(&seg1_mirna),
            vec![(&key("ARTSEG2_SOURCE_NAME_mRNA", "mRNA"), 2)]
        );
        assert_eq!(analysis.target_type_counts(&seg1_mirna).get("mRNA"), Some(&2));
        assert_eq!(
            analysis.to_lines(","),
            vec![
                "mirna,mirna_type,target,target_type,count",
                "mirna,-,total,-,2",
                "ARTSEG1_SOURCE_NAME_microRNA,microRNA,ARTSEG2_SOURCE_NAME_mRNA,mRNA,2",
                "",
                "mirna,-,total,-,1",
                "ARTSEG2_SOURCE_NAME_mRNA,microRNA,ARTSEG1_SOURCE_NAME_microRNA,mRNA,1",
                "",
            ]
        );
    }

    #[test]
    fn duplexes_count_both_ways_when_asked() {
        let mut settings = Settings::default();
        let dimer = typed("e", "microRNA", "miRNA");
        let mut single = MirnaTargetAnalysis::new(&settings);
        single.add(&dimer).unwrap();
        assert_eq!(single.total(), 1);

        settings.analysis.double_count_duplexes = true;
        let mut double = MirnaTargetAnalysis::new(&settings);
        double.add(&dimer).unwrap();
        assert_eq!(double.total(), 2);
        let reversed = key("ARTSEG2_SOURCE_NAME_mRNA", "miRNA");
        assert_eq!(
            double.sorted_targets(&reversed),
            vec![(&key("ARTSEG1_SOURCE_NAME_microRNA", "microRNA"), 1)]
        );
    }

    #[test]
    fn target_filter_and_combine() {
        let settings = Settings::default();
        let filter = TargetFilter {
            target_matches: Some("ARTSEG2_SOURCE_NAME_mRNA".to_string()),
            ..Default::default()
        };
        let mut first = MirnaTargetAnalysis::new(&settings).with_filter(filter);
        first.add(&typed("a", "microRNA", "mRNA")).unwrap();
        first.add(&typed("c", "mRNA", "microRNA")).unwrap();
        assert_eq!(first.total(), 1);

        let by_mirna = TargetFilter {
            mirna_contains: Some("ARTSEG2".to_string()),
            ..Default::default()
        };
        assert!(by_mirna.accepts("ARTSEG2_SOURCE_NAME_mRNA", "other"));
        assert!(!by_mirna.accepts("ARTSEG1_SOURCE_NAME_microRNA", "other"));

        let mut second = MirnaTargetAnalysis::new(&settings);
        second.add(&typed("b", "microRNA", "mRNA")).unwrap();
        second.add(&typed("c", "mRNA", "microRNA")).unwrap();
        first.combine(&second);
        assert_eq!(first.total(), 3);
        assert_eq!(first.mirna_totals().len(), 2);
    }

    #[test]
    fn target_analysis_requires_mirna_flag() {
        let mut analysis = MirnaTargetAnalysis::new(&Settings::default());
        let record = HybRecord::from_line(ART_HYB_1, &HybSettings::default()).unwrap();
        assert!(matches!(analysis.add(&record), Err(Error::Hyb(HybError::MissingFlag { .. }))));
    }
}
