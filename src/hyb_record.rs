//src/hyb_record.rs

use std::fmt;

use crate::errors::HybError;
use crate::settings::HybSettings;
use crate::types::{
    canonical_flag_index, flag_value_domain, is_count_flag, CountMode, MirnaSeg, SegNum, Span,
    HYBKIT_FLAGS, HYB_FLAGS,
};

const NUCLEOTIDES: &[u8] = b"ACGUTN";

/// Alignment details for one segment of a hyb record (columns 4-9 / 10-15).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentInfo {
    pub ref_name: Option<String>,
    pub read_start: Option<usize>,
    pub read_end: Option<usize>,
    pub ref_start: Option<usize>,
    pub ref_end: Option<usize>,
    /// Alignment score, kept as written.
    pub score: Option<String>,
}

impl SegmentInfo {
    pub fn new(ref_name: &str, read_start: usize, read_end: usize) -> Self {
        SegmentInfo {
            ref_name: Some(ref_name.to_string()),
            read_start: Some(read_start),
            read_end: Some(read_end),
            ..Default::default()
        }
    }

    pub fn read_span(&self) -> Option<Span> {
        match (self.read_start, self.read_end) {
            (Some(start), Some(end)) => Some(Span::new(start, end)),
            _ => None,
        }
    }

    pub fn ref_span(&self) -> Option<Span> {
        match (self.ref_start, self.ref_end) {
            (Some(start), Some(end)) => Some(Span::new(start, end)),
            _ => None,
        }
    }

    pub fn score_value(&self) -> Option<f64> {
        self.score.as_deref().and_then(|s| s.parse().ok())
    }

    fn from_fields(fields: &[&str], settings: &HybSettings) -> Result<Self, HybError> {
        let text = |field: &str| -> Option<String> {
            if settings.is_placeholder(field) {
                None
            } else {
                Some(field.to_string())
            }
        };
        let coord = |field: &str, name: &str| -> Result<Option<usize>, HybError> {
            if settings.is_placeholder(field) {
                return Ok(None);
            }
            // Digits only, no sign or zero padding, so the field writes back unchanged.
            let canonical = field.bytes().all(|b| b.is_ascii_digit())
                && !(field.len() > 1 && field.starts_with('0'));
            let value = if canonical { field.parse::<usize>().ok() } else { None };
            value.map(Some).ok_or_else(|| {
                HybError::malformed(format!("{} \"{}\" is not a non-negative integer", name, field))
            })
        };

        Ok(SegmentInfo {
            ref_name: text(fields[0]),
            read_start: coord(fields[1], "read_start")?,
            read_end: coord(fields[2], "read_end")?,
            ref_start: coord(fields[3], "ref_start")?,
            ref_end: coord(fields[4], "ref_end")?,
            score: text(fields[5]),
        })
    }

    fn push_fields(&self, out: &mut Vec<String>, placeholder: &str) {
        let or_placeholder = |value: Option<String>| value.unwrap_or_else(|| placeholder.to_string());
        out.push(or_placeholder(self.ref_name.clone()));
        for coord in [self.read_start, self.read_end, self.ref_start, self.ref_end] {
            out.push(or_placeholder(coord.map(|c| c.to_string())));
        }
        out.push(or_placeholder(self.score.clone()));
    }

    fn validate(&self, seg: SegNum, seq_len: usize) -> Result<(), HybError> {
        let n = seg.number();
        if let Some(span) = self.read_span() {
            if span.start == 0 || span.start > span.end {
                return Err(HybError::malformed(format!(
                    "segment {} read span {}-{} is inverted or zero-based",
                    n, span.start, span.end
                )));
            }
            if span.end > seq_len {
                return Err(HybError::malformed(format!(
                    "segment {} read span {}-{} exceeds sequence length {}",
                    n, span.start, span.end, seq_len
                )));
            }
        }
        if let Some(span) = self.ref_span() {
            if span.start > span.end {
                return Err(HybError::malformed(format!(
                    "segment {} reference span {}-{} is inverted",
                    n, span.start, span.end
                )));
            }
        }
        if let Some(score) = &self.score {
            if score.parse::<f64>().is_err() {
                return Err(HybError::malformed(format!(
                    "segment {} score \"{}\" is not numeric",
                    n, score
                )));
            }
        }
        Ok(())
    }
}

/// Ordered `key=value` flags of a hyb record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flags(Vec<(String, String)>);

impl Flags {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, key: &str, value: String) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key.to_string(), value)),
        }
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(idx).1)
    }

    fn render(&self, settings: &HybSettings) -> String {
        let mut entries: Vec<&(String, String)> = self.0.iter().collect();
        if settings.reorder_flags {
            let defined = HYB_FLAGS.len() + HYBKIT_FLAGS.len();
            entries.sort_by_key(|(key, _)| {
                canonical_flag_index(key)
                    .or_else(|| {
                        settings
                            .custom_flags
                            .iter()
                            .position(|flag| flag == key)
                            .map(|i| defined + i)
                    })
                    .unwrap_or(usize::MAX)
            });
        }
        entries
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(";")
    }

    fn parse(field: &str, settings: &HybSettings) -> Result<Self, HybError> {
        let mut flags = Flags::default();
        let field = field.trim_end_matches(';');
        if field.is_empty() {
            return Ok(flags);
        }
        for item in field.split(';') {
            let (key, value) = item.split_once('=').ok_or_else(|| {
                HybError::malformed(format!("flag \"{}\" is not of the form key=value", item))
            })?;
            if flags.contains(key) {
                return Err(HybError::malformed(format!("flag \"{}\" appears twice", key)));
            }
            validate_flag(key, value, settings)?;
            flags.insert(key, value.to_string());
        }
        Ok(flags)
    }
}

fn validate_flag(key: &str, value: &str, settings: &HybSettings) -> Result<(), HybError> {
    if key.is_empty() || key.contains(['=', ';', '\t']) {
        return Err(HybError::UndefinedFlag(key.to_string()));
    }
    let defined = canonical_flag_index(key).is_some() || settings.is_custom_flag(key);
    if !defined && !settings.allow_undefined_flags {
        return Err(HybError::UndefinedFlag(key.to_string()));
    }
    let invalid = || HybError::InvalidFlagValue {
        key: key.to_string(),
        value: value.to_string(),
    };
    if value.is_empty() || value.contains([';', '\t', '\n']) {
        return Err(invalid());
    }
    if is_count_flag(key) && value.parse::<u64>().is_err() {
        return Err(invalid());
    }
    if let Some(domain) = flag_value_domain(key) {
        if !domain.contains(&value) {
            return Err(invalid());
        }
    }
    Ok(())
}

/// Which sequence a FASTA record is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastaTarget {
    Hybrid,
    Segment(SegNum),
}

/// One chimeric read: two aligned segments of a single sequence. Only the
/// flags change after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct HybRecord {
    id: String,
    seq: String,
    /// Hybrid folding energy, kept as written.
    energy: Option<String>,
    seg1: SegmentInfo,
    seg2: SegmentInfo,
    flags: Flags,
}

impl HybRecord {
    pub fn new(
        id: impl Into<String>,
        seq: impl Into<String>,
        energy: Option<String>,
        seg1: SegmentInfo,
        seg2: SegmentInfo,
    ) -> Result<Self, HybError> {
        let record = HybRecord {
            id: id.into(),
            seq: seq.into(),
            energy,
            seg1,
            seg2,
            flags: Flags::default(),
        };
        record.validate()?;
        Ok(record)
    }

    /// Parse one line of a hyb file.
    pub fn from_line(line: &str, settings: &HybSettings) -> Result<Self, HybError> {
        let line = line.trim_end_matches(['\n', '\r']);
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 15 && fields.len() != 16 {
            return Err(HybError::malformed(format!(
                "expected 15 or 16 tab-separated columns, found {}",
                fields.len()
            )));
        }
        if settings.is_placeholder(fields[0]) {
            return Err(HybError::malformed("record id is missing"));
        }
        if settings.is_placeholder(fields[1]) {
            return Err(HybError::malformed(format!("record {} has no sequence", fields[0])));
        }
        let energy = if settings.is_placeholder(fields[2]) {
            None
        } else {
            Some(fields[2].to_string())
        };

        let mut record = HybRecord {
            id: fields[0].to_string(),
            seq: fields[1].to_string(),
            energy,
            seg1: SegmentInfo::from_fields(&fields[3..9], settings)?,
            seg2: SegmentInfo::from_fields(&fields[9..15], settings)?,
            flags: match fields.get(15) {
                Some(field) => Flags::parse(field, settings)?,
                None => Flags::default(),
            },
        };
        record.validate()?;

        if settings.hybformat_id {
            record.parse_hybformat_id()?;
        }
        if settings.hybformat_ref {
            record.parse_hybformat_ref()?;
        }
        Ok(record)
    }

    /// Render the record with default settings.
    pub fn to_line(&self) -> String {
        self.to_line_with(&HybSettings::default())
    }

    pub fn to_line_with(&self, settings: &HybSettings) -> String {
        let placeholder = settings.placeholder.as_str();
        let mut fields = Vec::with_capacity(16);
        fields.push(self.id.clone());
        fields.push(self.seq.clone());
        fields.push(self.energy.clone().unwrap_or_else(|| placeholder.to_string()));
        self.seg1.push_fields(&mut fields, placeholder);
        self.seg2.push_fields(&mut fields, placeholder);
        if !self.flags.is_empty() {
            fields.push(self.flags.render(settings));
        }
        fields.join("\t")
    }

    fn validate(&self) -> Result<(), HybError> {
        if self.id.is_empty() || self.id.contains(char::is_whitespace) {
            return Err(HybError::malformed(format!("invalid record id \"{}\"", self.id)));
        }
        if self.seq.is_empty() {
            return Err(HybError::malformed(format!("record {} has no sequence", self.id)));
        }
        if let Some(bad) = self
            .seq
            .bytes()
            .find(|b| !NUCLEOTIDES.contains(&b.to_ascii_uppercase()))
        {
            return Err(HybError::malformed(format!(
                "record {} has invalid nucleotide '{}'",
                self.id, bad as char
            )));
        }
        if let Some(energy) = &self.energy {
            if energy.parse::<f64>().is_err() {
                return Err(HybError::malformed(format!(
                    "record {} energy \"{}\" is not numeric",
                    self.id, energy
                )));
            }
        }
        self.seg1.validate(SegNum::One, self.seq.len())?;
        self.seg2.validate(SegNum::Two, self.seq.len())?;
        Ok(())
    }

    /// `<read_id>_<read_count>` ids carry the read count.
    fn parse_hybformat_id(&mut self) -> Result<(), HybError> {
        let count = self
            .id
            .rsplit_once('_')
            .map(|(_, count)| count)
            .filter(|count| count.parse::<u64>().is_ok())
            .ok_or_else(|| {
                HybError::malformed(format!(
                    "id \"{}\" is not of the form <read_id>_<read_count>",
                    self.id
                ))
            })?
            .to_string();
        if !self.flags.contains("read_count") {
            self.flags.insert("read_count", count);
        }
        Ok(())
    }

    /// `<gene>_<transcript>_<name>_<type>` references carry the segment type.
    fn parse_hybformat_ref(&mut self) -> Result<(), HybError> {
        for seg in [SegNum::One, SegNum::Two] {
            let Some(ref_name) = self.seg(seg).ref_name.clone() else {
                continue;
            };
            let parts: Vec<&str> = ref_name.split('_').collect();
            if parts.len() < 4 {
                return Err(HybError::malformed(format!(
                    "reference \"{}\" is not of the form <gene>_<transcript>_<name>_<type>",
                    ref_name
                )));
            }
            if !self.flags.contains(seg.type_flag()) {
                self.flags.insert(seg.type_flag(), parts[parts.len() - 1].to_string());
            }
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn seq(&self) -> &str {
        &self.seq
    }

    pub fn energy(&self) -> Option<&str> {
        self.energy.as_deref()
    }

    pub fn seg1(&self) -> &SegmentInfo {
        &self.seg1
    }

    pub fn seg2(&self) -> &SegmentInfo {
        &self.seg2
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    pub fn seg(&self, seg: SegNum) -> &SegmentInfo {
        match seg {
            SegNum::One => &self.seg1,
            SegNum::Two => &self.seg2,
        }
    }

    /// Portion of the read covered by a segment.
    pub fn seg_seq(&self, seg: SegNum) -> Option<&str> {
        self.seg(seg).read_span().map(|span| &self.seq[span.range()])
    }

    /// Segment 1 subsequence followed by segment 2 subsequence. Overlapping
    /// bases appear twice.
    pub fn dynamic_seq(&self) -> Option<String> {
        let seg1 = self.seg_seq(SegNum::One)?;
        let seg2 = self.seg_seq(SegNum::Two)?;
        Some(format!("{}{}", seg1, seg2))
    }

    pub fn energy_value(&self) -> Option<f64> {
        self.energy.as_deref().and_then(|e| e.parse().ok())
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    pub fn flag(&self, key: &str) -> Option<&str> {
        self.flags.get(key)
    }

    /// Set a defined flag, validating its value.
    pub fn set_flag(&mut self, key: &str, value: impl Into<String>) -> Result<(), HybError> {
        self.set_flag_with(key, value, &HybSettings::default())
    }

    /// Set a flag, honouring `custom_flags` and `allow_undefined_flags`.
    pub fn set_flag_with(
        &mut self,
        key: &str,
        value: impl Into<String>,
        settings: &HybSettings,
    ) -> Result<(), HybError> {
        let value = value.into();
        validate_flag(key, &value, settings)?;
        self.flags.insert(key, value);
        Ok(())
    }

    pub fn remove_flag(&mut self, key: &str) -> Option<String> {
        self.flags.remove(key)
    }

    pub fn seg_type(&self, seg: SegNum) -> Option<&str> {
        self.flag(seg.type_flag())
    }

    pub fn seg1_type(&self) -> Option<&str> {
        self.seg_type(SegNum::One)
    }

    pub fn seg2_type(&self) -> Option<&str> {
        self.seg_type(SegNum::Two)
    }

    pub fn seg_types(&self) -> (Option<&str>, Option<&str>) {
        (self.seg1_type(), self.seg2_type())
    }

    pub fn set_seg_types(&mut self, seg1_type: &str, seg2_type: &str) -> Result<(), HybError> {
        self.set_flag("seg1_type", seg1_type)?;
        self.set_flag("seg2_type", seg2_type)
    }

    pub fn read_count(&self) -> Option<u64> {
        self.flag("read_count").and_then(|v| v.parse().ok())
    }

    /// Number of hybrids this record stands for (`count_total`, else 1).
    pub fn record_count(&self) -> u64 {
        self.flag("count_total")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1)
    }

    pub fn count(&self, mode: CountMode) -> Result<u64, HybError> {
        match mode {
            CountMode::Record => Ok(self.record_count()),
            CountMode::Read => self.read_count().ok_or_else(|| HybError::MissingFlag {
                id: self.id.clone(),
                key: "read_count".to_string(),
            }),
        }
    }

    pub fn mirna_seg(&self) -> Option<MirnaSeg> {
        self.flag("miRNA_seg").and_then(|v| v.parse().ok())
    }

    /// FASTA text (`>name\nseq`) for the hybrid or one of its segments.
    /// With `annotate`, the name carries the dataset and the segment reference.
    pub fn fasta_record(&self, target: FastaTarget, annotate: bool) -> Option<String> {
        let mut name = match (annotate, self.flag("dataset")) {
            (true, Some(dataset)) => format!("{}:{}", dataset, self.id),
            _ => self.id.clone(),
        };
        let seq = match target {
            FastaTarget::Hybrid => self.seq.as_str(),
            FastaTarget::Segment(seg) => {
                let info = self.seg(seg);
                let span = info.read_span()?;
                name.push_str(&format!(":{}-{}", span.start, span.end));
                if annotate {
                    if let Some(ref_name) = &info.ref_name {
                        name.push(':');
                        name.push_str(ref_name);
                    }
                }
                &self.seq[span.range()]
            }
        };
        Some(format!(">{}\n{}", name, seq))
    }
}

impl fmt::Display for HybRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}
