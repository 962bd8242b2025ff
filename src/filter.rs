//src/filter.rs

use std::str::FromStr;

use crate::errors::HybError;
use crate::hyb_record::HybRecord;
use crate::types::MirnaSeg;

/// Record field a string property inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrField {
    Id,
    Seq,
    Seg1,
    Seg2,
    AnySeg,
    Seg1Type,
    Seg2Type,
    AnySegType,
}

impl StrField {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "id" => StrField::Id,
            "seq" => StrField::Seq,
            "seg1" => StrField::Seg1,
            "seg2" => StrField::Seg2,
            "any_seg" => StrField::AnySeg,
            "seg1_type" => StrField::Seg1Type,
            "seg2_type" => StrField::Seg2Type,
            "any_seg_type" => StrField::AnySegType,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            StrField::Id => "id",
            StrField::Seq => "seq",
            StrField::Seg1 => "seg1",
            StrField::Seg2 => "seg2",
            StrField::AnySeg => "any_seg",
            StrField::Seg1Type => "seg1_type",
            StrField::Seg2Type => "seg2_type",
            StrField::AnySegType => "any_seg_type",
        }
    }

    fn values<'a>(self, record: &'a HybRecord) -> Vec<Option<&'a str>> {
        match self {
            StrField::Id => vec![Some(record.id())],
            StrField::Seq => vec![Some(record.seq())],
            StrField::Seg1 => vec![record.seg1().ref_name.as_deref()],
            StrField::Seg2 => vec![record.seg2().ref_name.as_deref()],
            StrField::AnySeg => vec![record.seg1().ref_name.as_deref(), record.seg2().ref_name.as_deref()],
            StrField::Seg1Type => vec![record.seg1_type()],
            StrField::Seg2Type => vec![record.seg2_type()],
            StrField::AnySegType => vec![record.seg1_type(), record.seg2_type()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrCompare {
    Is(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
}

impl StrCompare {
    fn test(&self, value: &str) -> bool {
        match self {
            StrCompare::Is(s) => value == s.as_str(),
            StrCompare::Prefix(s) => value.starts_with(s.as_str()),
            StrCompare::Suffix(s) => value.ends_with(s.as_str()),
            StrCompare::Contains(s) => value.contains(s.as_str()),
        }
    }
}

/// A testable property of a hyb record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Property {
    HasSegTypes,
    HasMirna,
    MirnaDimer,
    MirnaNotDimer,
    FivePrimeMirna,
    ThreePrimeMirna,
    NoMirna,
    Str(StrField, StrCompare),
}

impl FromStr for Property {
    type Err = String;

    /// Accepts flag-style names (`has_mirna`, `5p_mirna`) and string
    /// comparisons written `<field>_<is|prefix|suffix|contains>=<value>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let simple = match s {
            "has_seg_types" => Some(Property::HasSegTypes),
            "has_mirna" => Some(Property::HasMirna),
            "mirna_dimer" => Some(Property::MirnaDimer),
            "mirna_not_dimer" => Some(Property::MirnaNotDimer),
            "5p_mirna" => Some(Property::FivePrimeMirna),
            "3p_mirna" => Some(Property::ThreePrimeMirna),
            "no_mirna" => Some(Property::NoMirna),
            _ => None,
        };
        if let Some(prop) = simple {
            return Ok(prop);
        }
        let (name, value) = s
            .split_once('=')
            .ok_or_else(|| format!("unknown property \"{}\"", s))?;
        let value = value.to_string();
        let (field, compare) = if let Some(f) = name.strip_suffix("_is") {
            (f, StrCompare::Is(value))
        } else if let Some(f) = name.strip_suffix("_prefix") {
            (f, StrCompare::Prefix(value))
        } else if let Some(f) = name.strip_suffix("_suffix") {
            (f, StrCompare::Suffix(value))
        } else if let Some(f) = name.strip_suffix("_contains") {
            (f, StrCompare::Contains(value))
        } else {
            return Err(format!("property \"{}\" has no is/prefix/suffix/contains comparison", name));
        };
        let field = StrField::parse(field).ok_or_else(|| format!("unknown field \"{}\"", field))?;
        Ok(Property::Str(field, compare))
    }
}

impl HybRecord {
    /// Test a property. Unknown values (an unset type or reference, or no
    /// `miRNA_seg` flag) are errors unless `allow_unknown`, when they test false.
    pub fn has_property(&self, prop: &Property, allow_unknown: bool) -> Result<bool, HybError> {
        let missing = |key: &str| -> Result<bool, HybError> {
            if allow_unknown {
                Ok(false)
            } else {
                Err(HybError::MissingFlag {
                    id: self.id().to_string(),
                    key: key.to_string(),
                })
            }
        };
        match prop {
            Property::HasSegTypes => Ok(self.seg1_type().is_some() && self.seg2_type().is_some()),
            Property::Str(field, compare) => {
                let values = field.values(self);
                if values.iter().any(Option::is_none) {
                    return missing(field.name());
                }
                Ok(values.into_iter().flatten().any(|v| compare.test(v)))
            }
            mirna_prop => {
                let Some(seg) = self.mirna_seg() else {
                    return missing("miRNA_seg");
                };
                Ok(match mirna_prop {
                    Property::HasMirna => seg.has_mirna(),
                    Property::MirnaDimer => seg == MirnaSeg::Both,
                    Property::MirnaNotDimer => {
                        matches!(seg, MirnaSeg::FivePrime | MirnaSeg::ThreePrime)
                    }
                    Property::FivePrimeMirna => matches!(seg, MirnaSeg::FivePrime | MirnaSeg::Both),
                    Property::ThreePrimeMirna => matches!(seg, MirnaSeg::ThreePrime | MirnaSeg::Both),
                    _ => seg == MirnaSeg::None,
                })
            }
        }
    }
}

/// How include clauses combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    All,
    Any,
}

/// Keeps records matching the include clauses and none of the exclude clauses.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub include: Vec<Property>,
    pub exclude: Vec<Property>,
    pub mode: MatchMode,
    pub allow_unknown: bool,
}

impl RecordFilter {
    pub fn matches(&self, record: &HybRecord) -> Result<bool, HybError> {
        let mut included = match self.mode {
            MatchMode::All => true,
            MatchMode::Any => self.include.is_empty(),
        };
        for prop in &self.include {
            let hit = record.has_property(prop, self.allow_unknown)?;
            match self.mode {
                MatchMode::All if !hit => {
                    included = false;
                    break;
                }
                MatchMode::Any if hit => {
                    included = true;
                    break;
                }
                _ => {}
            }
        }
        if !included {
            return Ok(false);
        }
        for prop in &self.exclude {
            if record.has_property(prop, self.allow_unknown)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Lazily keep matching records, preserving input order. Errors pass through.
pub fn filter_records<'a, I>(
    records: I,
    filter: &'a RecordFilter,
) -> impl Iterator<Item = Result<HybRecord, HybError>> + 'a
where
    I: Iterator<Item = Result<HybRecord, HybError>> + 'a,
{
    records.filter_map(move |record| match record {
        Ok(record) => match filter.matches(&record) {
            Ok(true) => Some(Ok(record)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        },
        Err(e) => Some(Err(e)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyb_record::tests::{ART_HYB_1, HYB_STR_1};
    use crate::settings::HybSettings;

    fn record_with(id: &str, types: Option<(&str, &str)>) -> HybRecord {
        let line = ART_HYB_1.replacen("1_1000\t", &format!("{}\t", id), 1);
        let mut record = HybRecord::from_line(&line, &HybSettings::default()).unwrap();
        if let Some((seg1, seg2)) = types {
            record.set_seg_types(seg1, seg2).unwrap();
        }
        record
    }

    #[test]
    fn parses_property_names() {
        assert_eq!("has_mirna".parse::<Property>().unwrap(), Property::HasMirna);
        assert_eq!(
            "any_seg_type_is=rRNA".parse::<Property>().unwrap(),
            Property::Str(StrField::AnySegType, StrCompare::Is("rRNA".into()))
        );
        assert_eq!(
            "seg1_prefix=MIMAT".parse::<Property>().unwrap(),
            Property::Str(StrField::Seg1, StrCompare::Prefix("MIMAT".into()))
        );
        assert!("seg3_is=x".parse::<Property>().is_err());
        assert!("mystery".parse::<Property>().is_err());
    }

    #[test]
    fn string_properties() {
        let record = HybRecord::from_line(HYB_STR_1, &HybSettings::default()).unwrap();
        let prop = |s: &str| s.parse::<Property>().unwrap();
        assert!(record.has_property(&prop("seg1_contains=miR-23a"), false).unwrap());
        assert!(record.has_property(&prop("any_seg_suffix=_mRNA"), false).unwrap());
        assert!(!record.has_property(&prop("id_is=other"), false).unwrap());
        assert!(record.has_property(&prop("seg1_type_is=microRNA"), false).is_err());
        assert!(!record.has_property(&prop("seg1_type_is=microRNA"), true).unwrap());
    }

    #[test]
    fn mirna_properties() {
        let mut record = record_with("r", Some(("microRNA", "microRNA")));
        assert!(record.has_property(&Property::HasMirna, false).is_err());
        record.eval_mirna(&HybSettings::default().mirna_types).unwrap();
        assert!(record.has_property(&Property::MirnaDimer, false).unwrap());
        assert!(record.has_property(&Property::FivePrimeMirna, false).unwrap());
        assert!(record.has_property(&Property::ThreePrimeMirna, false).unwrap());
        assert!(!record.has_property(&Property::MirnaNotDimer, false).unwrap());
        assert!(!record.has_property(&Property::NoMirna, false).unwrap());
    }

    #[test]
    fn excluding_rrna_keeps_order_and_unset_types() {
        let records = vec![
            record_with("a", Some(("microRNA", "mRNA"))),
            record_with("b", Some(("rRNA", "mRNA"))),
            record_with("c", None),
            record_with("d", Some(("mRNA", "rRNA"))),
            record_with("e", Some(("lncRNA", "mRNA"))),
        ];
        let filter = RecordFilter {
            exclude: vec!["any_seg_type_is=rRNA".parse().unwrap()],
            allow_unknown: true,
            ..Default::default()
        };
        let kept: Vec<String> = filter_records(records.into_iter().map(Ok), &filter)
            .map(|r| r.unwrap().id().to_string())
            .collect();
        assert_eq!(kept, vec!["a", "c", "e"]);
    }

    #[test]
    fn include_modes() {
        let record = record_with("r", Some(("microRNA", "mRNA")));
        let props: Vec<Property> = vec![
            "seg1_type_is=microRNA".parse().unwrap(),
            "seg2_type_is=rRNA".parse().unwrap(),
        ];
        let all = RecordFilter {
            include: props.clone(),
            ..Default::default()
        };
        assert!(!all.matches(&record).unwrap());
        let any = RecordFilter {
            include: props,
            mode: MatchMode::Any,
            ..Default::default()
        };
        assert!(any.matches(&record).unwrap());
    }
}
