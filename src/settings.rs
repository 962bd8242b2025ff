//src/settings.rs

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::SettingsError;
use crate::fold_file::FoldFormat;
use crate::types::{CountMode, DEFAULT_PLACEHOLDER};

/// All tunables for a run. Passed explicitly to readers, the pairing
/// iterator and the analyses; there is no process-wide settings state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub hyb: HybSettings,
    pub fold: FoldSettings,
    pub iter: IterSettings,
    pub analysis: AnalysisSettings,
}

impl Settings {
    /// Load settings from a YAML file. Missing keys keep their defaults.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_yaml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.hyb.placeholder.is_empty() || self.hyb.placeholder.contains('\t') {
            return Err(SettingsError::Invalid(format!(
                "hyb placeholder \"{}\" must be non-empty and tab-free",
                self.hyb.placeholder
            )));
        }
        if self.analysis.out_delim.is_empty() {
            return Err(SettingsError::Invalid("analysis out_delim is empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybSettings {
    pub placeholder: String,
    /// Write flags in canonical order rather than insertion order.
    pub reorder_flags: bool,
    pub allow_undefined_flags: bool,
    pub custom_flags: Vec<String>,
    /// Read `read_count` from ids of the form `<read_id>_<read_count>`.
    pub hybformat_id: bool,
    /// Read segment types from refs of the form `<gene>_<transcript>_<name>_<type>`.
    pub hybformat_ref: bool,
    pub mirna_types: Vec<String>,
    pub allow_unknown_seg_types: bool,
    pub check_complete_seg_types: bool,
}

impl Default for HybSettings {
    fn default() -> Self {
        HybSettings {
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            reorder_flags: true,
            allow_undefined_flags: false,
            custom_flags: Vec::new(),
            hybformat_id: false,
            hybformat_ref: false,
            mirna_types: vec!["miRNA".to_string(), "microRNA".to_string()],
            allow_unknown_seg_types: false,
            check_complete_seg_types: false,
        }
    }
}

impl HybSettings {
    pub fn is_placeholder(&self, field: &str) -> bool {
        field == self.placeholder
    }

    pub fn is_custom_flag(&self, key: &str) -> bool {
        self.custom_flags.iter().any(|flag| flag == key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoldSettings {
    pub placeholder: String,
    /// Fold file format; inferred from the file suffix when unset.
    pub format: Option<FoldFormat>,
    pub reconcile: ReconcileSettings,
}

impl Default for FoldSettings {
    fn default() -> Self {
        FoldSettings {
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            format: None,
            reconcile: ReconcileSettings::default(),
        }
    }
}

/// Which hyb-derived sequence a fold record is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldSeqMode {
    /// The full hyb read sequence.
    #[default]
    Static,
    /// Segment 1 subsequence followed by segment 2 subsequence.
    Dynamic,
}

/// End of the longer sequence that is trimmed before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimEnd {
    Start,
    End,
    /// Whichever end gives fewer mismatches; ties go to `End`.
    #[default]
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    pub seq_mode: FoldSeqMode,
    pub allowed_mismatches: usize,
    pub max_extension: usize,
    pub trim_end: TrimEnd,
    pub allow_energy_mismatch: bool,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        ReconcileSettings {
            seq_mode: FoldSeqMode::Static,
            allowed_mismatches: 0,
            max_extension: 0,
            trim_end: TrimEnd::Auto,
            allow_energy_mismatch: true,
        }
    }
}

/// What the pairing iterator does when a check fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    Raise,
    WarnReturn,
    Return,
    #[default]
    WarnSkip,
    Skip,
}

impl ErrorMode {
    pub fn warns(self) -> bool {
        matches!(self, ErrorMode::WarnReturn | ErrorMode::WarnSkip)
    }

    pub fn returns(self) -> bool {
        matches!(self, ErrorMode::WarnReturn | ErrorMode::Return)
    }
}

impl FromStr for ErrorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "raise" => Ok(ErrorMode::Raise),
            "warn_return" => Ok(ErrorMode::WarnReturn),
            "return" => Ok(ErrorMode::Return),
            "warn_skip" => Ok(ErrorMode::WarnSkip),
            "skip" => Ok(ErrorMode::Skip),
            other => Err(format!("unknown error mode \"{}\"", other)),
        }
    }
}

/// Optional pairing checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCheck {
    /// The hyb record lacks segment read coordinates.
    HybRecordIndel,
    /// The fold block could not be read.
    FoldRecordNoFold,
    /// Reconciliation failed.
    MaxMismatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterSettings {
    pub error_mode: ErrorMode,
    pub error_checks: Vec<ErrorCheck>,
    pub max_sequential_skips: usize,
    /// Require each fold id to start with its hyb record's id.
    pub require_id_match: bool,
}

impl Default for IterSettings {
    fn default() -> Self {
        IterSettings {
            error_mode: ErrorMode::WarnSkip,
            error_checks: vec![
                ErrorCheck::HybRecordIndel,
                ErrorCheck::FoldRecordNoFold,
                ErrorCheck::MaxMismatch,
            ],
            max_sequential_skips: 20,
            require_id_match: false,
        }
    }
}

impl IterSettings {
    pub fn checks(&self, check: ErrorCheck) -> bool {
        self.error_checks.contains(&check)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub count_mode: CountMode,
    pub type_sep: String,
    /// Put the miRNA type first when naming a hybrid type.
    pub mirna_sort: bool,
    pub out_delim: String,
    /// Fold analysis counts records without a fold instead of failing.
    pub skip_no_fold: bool,
    /// Target analysis counts a miRNA dimer once from each side.
    pub double_count_duplexes: bool,
    /// Blank line after each miRNA's targets in target analysis output.
    pub target_spacer_line: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            count_mode: CountMode::Record,
            type_sep: "-".to_string(),
            mirna_sort: true,
            out_delim: ",".to_string(),
            skip_no_fold: true,
            double_count_duplexes: false,
            target_spacer_line: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.hyb.placeholder, ".");
        assert!(settings.hyb.reorder_flags);
        assert_eq!(settings.fold.reconcile.allowed_mismatches, 0);
        assert_eq!(settings.fold.reconcile.seq_mode, FoldSeqMode::Static);
        assert_eq!(settings.iter.error_mode, ErrorMode::WarnSkip);
        assert_eq!(settings.iter.max_sequential_skips, 20);
        assert_eq!(settings.analysis.count_mode, CountMode::Record);
        assert!(!settings.analysis.double_count_duplexes);
        assert_eq!(settings.hyb.mirna_types, vec!["miRNA", "microRNA"]);
    }

    #[test]
    fn yaml_overrides_only_named_keys() {
        let yaml = "hyb:\n  custom_flags: [my_flag]\niter:\n  error_mode: raise\n  max_sequential_skips: 5\nfold:\n  format: viennad\n  reconcile:\n    trim_end: start\n";
        let settings = Settings::from_yaml_str(yaml).unwrap();
        assert_eq!(settings.hyb.custom_flags, vec!["my_flag"]);
        assert!(settings.hyb.reorder_flags);
        assert_eq!(settings.iter.error_mode, ErrorMode::Raise);
        assert_eq!(settings.iter.max_sequential_skips, 5);
        assert_eq!(settings.fold.format, Some(FoldFormat::Viennad));
        assert_eq!(settings.fold.reconcile.trim_end, TrimEnd::Start);
        assert_eq!(settings.fold.reconcile.seq_mode, FoldSeqMode::Static);
    }

    #[test]
    fn invalid_yaml_is_reported() {
        assert!(matches!(
            Settings::from_yaml_str("iter:\n  error_mode: explode\n"),
            Err(SettingsError::Yaml(_))
        ));
        assert!(matches!(
            Settings::from_yaml_str("hyb:\n  placeholder: \"\"\n"),
            Err(SettingsError::Invalid(_))
        ));
    }

    #[test]
    fn error_mode_parses_cli_spellings() {
        assert_eq!("warn-return".parse::<ErrorMode>().unwrap(), ErrorMode::WarnReturn);
        assert_eq!("SKIP".parse::<ErrorMode>().unwrap(), ErrorMode::Skip);
        assert!("loud".parse::<ErrorMode>().is_err());
    }
}
