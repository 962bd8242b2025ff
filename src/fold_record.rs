//src/fold_record.rs

use std::fmt;

use crate::errors::FoldError;
use crate::types::{SegNum, DEFAULT_PLACEHOLDER};

const FOLD_CHARS: &[u8] = b"().";

/// Per-segment annotation carried by viennad and ct blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FoldSegDetail {
    /// Sequence with every base outside the segment replaced by `-`.
    pub highlight: String,
    pub ref_name: Option<String>,
    pub ref_start: Option<usize>,
    pub ref_end: Option<usize>,
}

impl FoldSegDetail {
    /// Structure characters at the highlighted positions.
    pub fn seg_fold(&self, fold: &str) -> String {
        self.highlight
            .bytes()
            .zip(fold.bytes())
            .filter(|(h, _)| *h != b'-')
            .map(|(_, f)| f as char)
            .collect()
    }

    fn to_line(&self, placeholder: &str) -> String {
        let or_placeholder =
            |value: Option<String>| value.unwrap_or_else(|| placeholder.to_string());
        [
            self.highlight.clone(),
            or_placeholder(self.ref_name.clone()),
            or_placeholder(self.ref_start.map(|v| v.to_string())),
            or_placeholder(self.ref_end.map(|v| v.to_string())),
        ]
        .join("\t")
    }
}

/// Predicted secondary structure of a hybrid sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldRecord {
    id: String,
    seq: String,
    /// Dot-bracket structure, one character per base.
    fold: String,
    /// Folding energy, kept as written.
    energy: Option<String>,
    seg_details: Option<[FoldSegDetail; 2]>,
}

impl FoldRecord {
    pub fn new(
        id: impl Into<String>,
        seq: impl Into<String>,
        fold: impl Into<String>,
        energy: Option<String>,
    ) -> Result<Self, FoldError> {
        let record = FoldRecord {
            id: id.into(),
            seq: seq.into(),
            fold: fold.into(),
            energy,
            seg_details: None,
        };
        record.validate()?;
        Ok(record)
    }

    fn validate(&self) -> Result<(), FoldError> {
        if self.id.is_empty() {
            return Err(FoldError::malformed("", "record id is missing"));
        }
        if self.seq.is_empty() || !self.seq.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(FoldError::malformed(
                &self.id,
                format!("invalid sequence \"{}\"", self.seq),
            ));
        }
        if self.seq.len() != self.fold.len() {
            return Err(FoldError::malformed(
                &self.id,
                format!(
                    "sequence length {} does not match fold length {}",
                    self.seq.len(),
                    self.fold.len()
                ),
            ));
        }
        if let Some(bad) = self.fold.bytes().find(|b| !FOLD_CHARS.contains(b)) {
            return Err(FoldError::malformed(
                &self.id,
                format!("invalid structure character '{}'", bad as char),
            ));
        }
        if let Some(energy) = &self.energy {
            if energy.parse::<f64>().is_err() {
                return Err(FoldError::malformed(
                    &self.id,
                    format!("energy \"{}\" is not numeric", energy),
                ));
            }
        }
        if let Some(details) = &self.seg_details {
            if details.iter().any(|d| d.highlight.len() != self.seq.len()) {
                return Err(FoldError::malformed(
                    &self.id,
                    "segment highlight length does not match sequence length",
                ));
            }
        }
        Ok(())
    }

    /// Parse a 3-line vienna block: `>id`, sequence, `structure<ws>(energy)`.
    pub fn from_vienna_lines(lines: &[&str], placeholder: &str) -> Result<Self, FoldError> {
        if lines.len() != 3 {
            let id = lines.first().map(|l| l.trim()).unwrap_or_default();
            return Err(FoldError::malformed(
                id,
                format!("vienna blocks have 3 lines, found {}", lines.len()),
            ));
        }
        let id = lines[0].trim();
        let id = id.strip_prefix('>').unwrap_or(id);
        let (fold, energy) = split_structure_line(id, lines[2], placeholder)?;
        FoldRecord::new(id, lines[1].trim(), fold, energy)
    }

    /// Parse a 5- or 6-line viennad block as written by the Hyb pipeline.
    pub fn from_viennad_lines(lines: &[&str], placeholder: &str) -> Result<Self, FoldError> {
        let id = lines.first().map(|l| l.trim()).unwrap_or_default();
        let lines = match lines {
            [body @ .., last] if lines.len() == 6 && last.trim().is_empty() => body,
            _ => lines,
        };
        if lines.len() != 5 {
            return Err(FoldError::malformed(
                id,
                format!("viennad blocks have 5 or 6 lines, found {}", lines.len()),
            ));
        }
        let seg1 = parse_seg_detail(id, lines[2], placeholder)?;
        let seg2 = parse_seg_detail(id, lines[3], placeholder)?;
        let (fold, energy) = split_structure_line(id, lines[4], placeholder)?;
        let record = FoldRecord {
            id: id.to_string(),
            seq: lines[1].trim().to_string(),
            fold,
            energy,
            seg_details: Some([seg1, seg2]),
        };
        record.validate()?;
        Ok(record)
    }

    /// Parse a connection-table block: a `N<tab>dG = x<tab>dH = y<tab>name`
    /// header followed by one line per base.
    pub fn from_ct_lines(lines: &[&str]) -> Result<Self, FoldError> {
        let header = lines.first().map(|l| l.trim()).unwrap_or_default();
        let items: Vec<&str> = header.split('\t').map(str::trim).collect();
        let id = items.last().copied().unwrap_or_default();
        if items.len() < 3 || !header.contains("dG") {
            return Err(FoldError::malformed(id, "ct header lacks the dG field"));
        }
        let expected: usize = items[0]
            .parse()
            .map_err(|_| FoldError::malformed(id, format!("ct length \"{}\" is not a number", items[0])))?;
        if lines.len() != expected + 1 {
            return Err(FoldError::malformed(
                id,
                format!("ct header announces {} bases, found {}", expected, lines.len() - 1),
            ));
        }
        let energy = items
            .iter()
            .find(|item| item.starts_with("dG"))
            .and_then(|item| item.split_whitespace().last())
            .map(str::to_string);

        let mut seq = String::with_capacity(expected);
        let mut fold = String::with_capacity(expected);
        let mut highlights = [String::with_capacity(expected), String::with_capacity(expected)];
        let mut in_seg2 = false;
        for (i, line) in lines[1..].iter().enumerate() {
            let pos = i + 1;
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 6 {
                return Err(FoldError::malformed(
                    id,
                    format!("ct line {} has {} columns, expected at least 6", pos, cols.len()),
                ));
            }
            let number = |col: usize| -> Result<usize, FoldError> {
                cols[col].parse().map_err(|_| {
                    FoldError::malformed(id, format!("ct line {} column {} is not a number", pos, col + 1))
                })
            };
            if number(0)? != pos {
                return Err(FoldError::malformed(id, format!("ct line {} is out of order", pos)));
            }
            let base = cols[1];
            let pair = number(4)?;
            let fold_char = match pair {
                0 => '.',
                p if p == pos || p > expected => {
                    return Err(FoldError::malformed(
                        id,
                        format!("ct line {} pairs with invalid position {}", pos, p),
                    ))
                }
                p if p > pos => '(',
                _ => ')',
            };
            // Column 6 numbering restarts where segment 2 begins.
            if pos > 1 && number(5)? < pos {
                in_seg2 = true;
            }
            seq.push_str(base);
            fold.push(fold_char);
            let (active, inactive) = if in_seg2 { (1, 0) } else { (0, 1) };
            highlights[active].push_str(base);
            highlights[inactive].push('-');
        }

        let (seg1_ref, seg2_ref) = guess_ref_names(id);
        let [h1, h2] = highlights;
        let record = FoldRecord {
            id: id.to_string(),
            seq,
            fold,
            energy,
            seg_details: Some([
                FoldSegDetail {
                    highlight: h1,
                    ref_name: seg1_ref,
                    ..Default::default()
                },
                FoldSegDetail {
                    highlight: h2,
                    ref_name: seg2_ref,
                    ..Default::default()
                },
            ]),
        };
        record.validate()?;
        Ok(record)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn seq(&self) -> &str {
        &self.seq
    }

    pub fn fold(&self) -> &str {
        &self.fold
    }

    pub fn energy(&self) -> Option<&str> {
        self.energy.as_deref()
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    pub fn energy_value(&self) -> Option<f64> {
        self.energy.as_deref().and_then(|e| e.parse().ok())
    }

    pub fn seg_detail(&self, seg: SegNum) -> Option<&FoldSegDetail> {
        let details = self.seg_details.as_ref()?;
        Some(match seg {
            SegNum::One => &details[0],
            SegNum::Two => &details[1],
        })
    }

    pub fn to_vienna_string(&self) -> String {
        self.to_vienna_string_with(DEFAULT_PLACEHOLDER)
    }

    pub fn to_vienna_string_with(&self, placeholder: &str) -> String {
        format!(">{}\n{}\n{}", self.id, self.seq, self.structure_line(placeholder))
    }

    /// Viennad text, available when the record carries segment details.
    pub fn to_viennad_string(&self, placeholder: &str) -> Option<String> {
        let [seg1, seg2] = self.seg_details.as_ref()?;
        Some(format!(
            "{}\n{}\n{}\n{}\n{}\n",
            self.id,
            self.seq,
            seg1.to_line(placeholder),
            seg2.to_line(placeholder),
            self.structure_line(placeholder)
        ))
    }

    fn structure_line(&self, placeholder: &str) -> String {
        format!(
            "{}\t({})",
            self.fold,
            self.energy.as_deref().unwrap_or(placeholder)
        )
    }
}

impl fmt::Display for FoldRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_vienna_string())
    }
}

fn split_structure_line(
    id: &str,
    line: &str,
    placeholder: &str,
) -> Result<(String, Option<String>), FoldError> {
    let line = line.trim();
    let Some((fold, rest)) = line.split_once(char::is_whitespace) else {
        return Ok((line.to_string(), None));
    };
    let inner = rest
        .trim()
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| {
            FoldError::malformed(id, format!("energy \"{}\" is not parenthesised", rest.trim()))
        })?
        .trim();
    let energy = if inner.is_empty() || inner == placeholder {
        None
    } else {
        Some(inner.to_string())
    };
    Ok((fold.to_string(), energy))
}

fn parse_seg_detail(id: &str, line: &str, placeholder: &str) -> Result<FoldSegDetail, FoldError> {
    let items: Vec<&str> = line.trim().split('\t').collect();
    if items.len() != 2 && items.len() != 4 {
        return Err(FoldError::malformed(
            id,
            "segment line is not of the form highlight<tab>ref[<tab>start<tab>end]",
        ));
    }
    let text = |field: &str| (field != placeholder).then(|| field.to_string());
    let coord = |idx: usize| items.get(idx).and_then(|v| v.parse::<usize>().ok());
    Ok(FoldSegDetail {
        highlight: items[0].to_string(),
        ref_name: text(items[1]),
        ref_start: coord(2),
        ref_end: coord(3),
    })
}

/// Split `seg1ref-seg2ref` at its middle dash.
fn guess_ref_names(name: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = name.split('-').collect();
    if parts.len() < 2 {
        return (None, None);
    }
    let mid = parts.len() / 2;
    (Some(parts[..mid].join("-")), Some(parts[mid..].join("-")))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const ART_VIENNA_1: &str = ">1_1000_ARTSEG1_SOURCE_NAME_microRNA-ARTSEG2_SOURCE_NAME_mRNA\nGGGCCCCCCCCCCCCCCGGGAAAGGGGGGGGGGGGGGAAA\n...((((((((((((((......))))))))))))))...\t(-15)";

    pub(crate) const ART_VIENNA_2: &str = ">1_1000_ARTSEG1_SOURCE_NAME_microRNA-ARTSEG2_SOURCE_NAME_mRNA\nGGGCCCCCCCCCCCCCCGGGAAAGCGGGAAAGGGGGGGGGGGGGGAAA\n...((((((((((((((......()......))))))))))))))...\t(-15)";

    pub(crate) fn vienna(text: &str) -> FoldRecord {
        let lines: Vec<&str> = text.lines().collect();
        FoldRecord::from_vienna_lines(&lines, ".").unwrap()
    }

    #[test]
    fn vienna_round_trip() {
        let record = vienna(ART_VIENNA_1);
        assert_eq!(
            record.id,
            "1_1000_ARTSEG1_SOURCE_NAME_microRNA-ARTSEG2_SOURCE_NAME_mRNA"
        );
        assert_eq!(record.energy.as_deref(), Some("-15"));
        assert_eq!(record.to_vienna_string(), ART_VIENNA_1);
        assert_eq!(vienna(ART_VIENNA_2).to_vienna_string(), ART_VIENNA_2);
    }

    #[test]
    fn rnafold_energy_with_inner_space() {
        let record = FoldRecord::from_vienna_lines(&[">r", "ACGUA", "((.))  ( -3.20)"], ".").unwrap();
        assert_eq!(record.energy.as_deref(), Some("-3.20"));
        assert_eq!(record.energy_value(), Some(-3.2));
    }

    #[test]
    fn missing_energy_writes_placeholder() {
        let record = FoldRecord::from_vienna_lines(&[">r", "ACGUA", "((.))"], ".").unwrap();
        assert_eq!(record.energy, None);
        assert_eq!(record.to_vienna_string(), ">r\nACGUA\n((.))\t(.)");
        let placeholder = FoldRecord::from_vienna_lines(&[">r", "ACGUA", "((.))\t(.)"], ".").unwrap();
        assert_eq!(placeholder.energy, None);
    }

    #[test]
    fn malformed_vienna_blocks() {
        let cases: [&[&str]; 5] = [
            &[">r", "ACGUA"],
            &[">r", "ACGUA", "((.))\t(99"],
            &[">r", "ACGUA", "((.)\t(-1)"],
            &[">r", "ACGUA", "((x))\t(-1)"],
            &["abc", "123", ".(.\t(-1)"],
        ];
        for lines in cases {
            assert!(
                matches!(
                    FoldRecord::from_vienna_lines(lines, "."),
                    Err(FoldError::MalformedFold { .. })
                ),
                "{:?} should fail",
                lines
            );
        }
    }

    #[test]
    fn new_never_truncates() {
        assert!(FoldRecord::new("r", "ACGU", "((.))", None).is_err());
        assert!(FoldRecord::new("r", "ACGU", "(..)", Some("abc".into())).is_err());
    }

    #[test]
    fn viennad_block() {
        let lines = [
            "r1_5_a-b",
            "GGGAAACCC",
            "GGGA-----\tmiR-1_microRNA\t1\t4",
            "----AACCC\tgeneX_mRNA\t.\t.",
            "(((...)))\t(-4.5)",
            "",
        ];
        let record = FoldRecord::from_viennad_lines(&lines, ".").unwrap();
        let seg1 = record.seg_detail(SegNum::One).unwrap();
        assert_eq!(seg1.ref_name.as_deref(), Some("miR-1_microRNA"));
        assert_eq!(seg1.ref_end, Some(4));
        assert_eq!(seg1.seg_fold(&record.fold), "(((.");
        let seg2 = record.seg_detail(SegNum::Two).unwrap();
        assert_eq!(seg2.ref_start, None);
        assert_eq!(seg2.seg_fold(&record.fold), "..)))");
        assert_eq!(
            record.to_viennad_string(".").unwrap(),
            lines.join("\n")
        );
        assert!(FoldRecord::from_viennad_lines(&lines[..4], ".").is_err());
    }

    #[test]
    fn ct_block_converts_to_dot_bracket() {
        let lines = [
            "6\tdG = -2.1\tdH = -10.0\tmiR1-geneX",
            "1\tG\t0\t2\t6\t1\t0\t0",
            "2\tG\t1\t3\t5\t2\t0\t0",
            "3\tA\t2\t4\t0\t3\t0\t0",
            "4\tA\t3\t5\t0\t1\t0\t0",
            "5\tC\t4\t6\t2\t2\t0\t0",
            "6\tC\t5\t0\t1\t3\t0\t0",
        ];
        let record = FoldRecord::from_ct_lines(&lines).unwrap();
        assert_eq!(record.id, "miR1-geneX");
        assert_eq!(record.seq, "GGAACC");
        assert_eq!(record.fold, "((..))");
        assert_eq!(record.energy.as_deref(), Some("-2.1"));
        let seg1 = record.seg_detail(SegNum::One).unwrap();
        let seg2 = record.seg_detail(SegNum::Two).unwrap();
        assert_eq!(seg1.highlight, "GGA---");
        assert_eq!(seg2.highlight, "---ACC");
        assert_eq!(seg1.ref_name.as_deref(), Some("miR1"));
        assert_eq!(seg2.ref_name.as_deref(), Some("geneX"));

        assert!(FoldRecord::from_ct_lines(&lines[..5]).is_err());
        let mut self_paired = lines;
        self_paired[3] = "3\tA\t2\t4\t3\t3\t0\t0";
        assert!(FoldRecord::from_ct_lines(&self_paired).is_err());
    }
}
