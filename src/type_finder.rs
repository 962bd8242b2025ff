//src/type_finder.rs

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use ahash::AHashMap;

use crate::errors::{Error, HybError, TypeFinderError};
use crate::hyb_record::HybRecord;
use crate::settings::HybSettings;
use crate::types::{SegNum, UNKNOWN_TYPE};

/// How a search string is compared against a reference name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    StartsWith,
    Contains,
    EndsWith,
    Matches,
}

impl SearchType {
    /// Order in which rule groups are tried.
    const ORDER: [SearchType; 4] = [
        SearchType::StartsWith,
        SearchType::Contains,
        SearchType::EndsWith,
        SearchType::Matches,
    ];

    fn hit(self, ref_name: &str, search: &str) -> bool {
        match self {
            SearchType::StartsWith => ref_name.starts_with(search),
            SearchType::Contains => ref_name.contains(search),
            SearchType::EndsWith => ref_name.ends_with(search),
            SearchType::Matches => ref_name == search,
        }
    }
}

impl FromStr for SearchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "startswith" => Ok(SearchType::StartsWith),
            "contains" => Ok(SearchType::Contains),
            "endswith" => Ok(SearchType::EndsWith),
            "matches" => Ok(SearchType::Matches),
            other => Err(format!(
                "search type \"{}\" is not one of startswith, contains, endswith, matches",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringMatchRule {
    pub search_type: SearchType,
    pub search: String,
    pub seg_type: String,
}

/// Rules read from `search_type,search_string,seg_type` lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringMatchParams {
    rules: Vec<StringMatchRule>,
}

/// Non-blank, non-comment lines of a parameter file.
fn content_lines<R: BufRead>(reader: R) -> impl Iterator<Item = std::io::Result<String>> {
    reader.lines().filter(|line| match line {
        Ok(l) => !l.trim().is_empty() && !l.trim_start().starts_with('#'),
        Err(_) => true,
    })
}

impl StringMatchParams {
    pub fn new(rules: Vec<StringMatchRule>) -> Self {
        StringMatchParams { rules }
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, TypeFinderError> {
        let mut rules = Vec::new();
        for line in content_lines(reader) {
            let line = line?;
            let line = line.trim_end();
            let malformed = |reason: String| TypeFinderError::MalformedParams {
                line: line.to_string(),
                reason,
            };
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() != 3 {
                return Err(malformed(format!(
                    "three comma-separated entries expected, found {}",
                    fields.len()
                )));
            }
            rules.push(StringMatchRule {
                search_type: fields[0].parse().map_err(malformed)?,
                search: fields[1].to_string(),
                seg_type: fields[2].to_string(),
            });
        }
        Ok(StringMatchParams { rules })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, TypeFinderError> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    pub fn rules(&self) -> &[StringMatchRule] {
        &self.rules
    }

    fn find(&self, ref_name: &str, check_complete: bool) -> Result<Option<String>, TypeFinderError> {
        let mut found: Vec<&str> = Vec::new();
        'groups: for search_type in SearchType::ORDER {
            for rule in self.rules.iter().filter(|r| r.search_type == search_type) {
                if search_type.hit(ref_name, &rule.search) {
                    if !found.contains(&rule.seg_type.as_str()) {
                        found.push(&rule.seg_type);
                    }
                    if !check_complete {
                        break 'groups;
                    }
                }
            }
        }
        match found.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(only.to_string())),
            many => {
                let mut types = many.to_vec();
                types.sort_unstable();
                Err(TypeFinderError::MultipleTypes {
                    ref_name: ref_name.to_string(),
                    types: types.join(", "),
                })
            }
        }
    }
}

/// Reference name to segment type lookup.
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    map: AHashMap<String, String>,
}

impl IdMap {
    fn insert(&mut self, id: &str, seg_type: &str) -> Result<(), TypeFinderError> {
        match self.map.get(id) {
            Some(existing) if existing != seg_type => Err(TypeFinderError::ConflictingTypes {
                id: id.to_string(),
                first: existing.clone(),
                second: seg_type.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.map.insert(id.to_string(), seg_type.to_string());
                Ok(())
            }
        }
    }

    /// Add `id,type` lines.
    pub fn add_mapped_ids<R: BufRead>(&mut self, reader: R) -> Result<(), TypeFinderError> {
        for line in content_lines(reader) {
            let line = line?;
            let line = line.trim_end();
            match line.split(',').collect::<Vec<_>>().as_slice() {
                [id, seg_type] => self.insert(id, seg_type)?,
                fields => {
                    return Err(TypeFinderError::MalformedParams {
                        line: line.to_string(),
                        reason: format!(
                            "two comma-separated entries expected, found {}",
                            fields.len()
                        ),
                    })
                }
            }
        }
        Ok(())
    }

    /// Map the first whitespace-delimited token of every line to `seg_type`.
    pub fn add_type_file<R: BufRead>(&mut self, seg_type: &str, reader: R) -> Result<(), TypeFinderError> {
        for line in content_lines(reader) {
            let line = line?;
            if let Some(id) = line.split_whitespace().next() {
                self.insert(id, seg_type)?;
            }
        }
        Ok(())
    }

    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self, TypeFinderError> {
        let mut id_map = IdMap::default();
        for path in paths {
            id_map.add_mapped_ids(BufReader::new(File::open(path)?))?;
        }
        Ok(id_map)
    }

    pub fn from_type_file_pairs<P: AsRef<Path>>(pairs: &[(String, P)]) -> Result<Self, TypeFinderError> {
        let mut id_map = IdMap::default();
        for (seg_type, path) in pairs {
            id_map.add_type_file(seg_type, BufReader::new(File::open(path)?))?;
        }
        Ok(id_map)
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.map.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Strategy for assigning a segment type from its reference name.
#[derive(Debug, Clone)]
pub enum TypeFinder {
    /// Last `_`-separated field of `<gene>_<transcript>_<name>_<type>`.
    Hybformat,
    StringMatch(StringMatchParams),
    IdMap(IdMap),
}

impl TypeFinder {
    pub fn find(&self, ref_name: &str, check_complete: bool) -> Result<Option<String>, TypeFinderError> {
        match self {
            TypeFinder::Hybformat => Ok(ref_name
                .rsplit_once('_')
                .map(|(_, seg_type)| seg_type)
                .filter(|seg_type| !seg_type.is_empty())
                .map(str::to_string)),
            TypeFinder::StringMatch(params) => params.find(ref_name, check_complete),
            TypeFinder::IdMap(id_map) => Ok(id_map.get(ref_name).map(str::to_string)),
        }
    }
}

impl HybRecord {
    /// Set `seg1_type` and `seg2_type` from the segment references. Segments
    /// that cannot be typed get `unknown` when `allow_unknown_seg_types` is set.
    pub fn eval_types(&mut self, finder: &TypeFinder, settings: &HybSettings) -> Result<(), Error> {
        let mut found = Vec::with_capacity(2);
        for seg in [SegNum::One, SegNum::Two] {
            let ref_name = self.seg(seg).ref_name.as_deref();
            let seg_type = match ref_name {
                Some(name) => finder.find(name, settings.check_complete_seg_types)?,
                None => None,
            };
            match seg_type {
                Some(seg_type) => found.push(seg_type),
                None if settings.allow_unknown_seg_types => found.push(UNKNOWN_TYPE.to_string()),
                None => {
                    let name = ref_name.unwrap_or(settings.placeholder.as_str()).to_string();
                    return Err(HybError::UnknownSegType(name).into());
                }
            }
        }
        self.set_seg_types(&found[0], &found[1])?;
        Ok(())
    }
}
