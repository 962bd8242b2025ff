//src/hyb_file.rs

use std::io::{self, BufRead, Write};
use std::path::Path;

use log::warn;

use crate::errors::HybError;
use crate::hyb_record::HybRecord;
use crate::settings::HybSettings;
use crate::util::{create_writer, is_hyb_path, open_reader, OutputWriter};

/// Lazily parses hyb records, one per non-blank line.
pub struct HybReader<R: BufRead> {
    reader: R,
    settings: HybSettings,
    line: String,
    line_no: usize,
}

impl<R: BufRead> HybReader<R> {
    pub fn new(reader: R, settings: HybSettings) -> Self {
        HybReader {
            reader,
            settings,
            line: String::new(),
            line_no: 0,
        }
    }

    pub fn settings(&self) -> &HybSettings {
        &self.settings
    }

    /// Number of lines consumed so far.
    pub fn line_no(&self) -> usize {
        self.line_no
    }
}

/// Open a `.hyb` or `.hyb.gz` file.
pub fn open_hyb(path: &Path, settings: HybSettings) -> io::Result<HybReader<Box<dyn BufRead>>> {
    if !is_hyb_path(path) {
        warn!("{} does not have a .hyb suffix", path.display());
    }
    Ok(HybReader::new(open_reader(path)?, settings))
}

impl<R: BufRead> Iterator for HybReader<R> {
    type Item = Result<HybRecord, HybError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(HybError::Io(e).at_line(self.line_no + 1))),
            }
            self.line_no += 1;
            if self.line.trim().is_empty() {
                continue;
            }
            return Some(
                HybRecord::from_line(&self.line, &self.settings)
                    .map_err(|e| e.at_line(self.line_no)),
            );
        }
    }
}

/// Writes complete hyb lines.
pub struct HybWriter<W: Write> {
    writer: W,
    settings: HybSettings,
}

impl<W: Write> HybWriter<W> {
    pub fn new(writer: W, settings: HybSettings) -> Self {
        HybWriter { writer, settings }
    }

    pub fn write_record(&mut self, record: &HybRecord) -> io::Result<()> {
        let mut line = record.to_line_with(&self.settings);
        line.push('\n');
        self.writer.write_all(line.as_bytes())
    }

    pub fn write_records<'a, I>(&mut self, records: I) -> io::Result<()>
    where
        I: IntoIterator<Item = &'a HybRecord>,
    {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl HybWriter<OutputWriter> {
    /// Flush and close the file, reporting any gzip trailer error.
    pub fn finish(self) -> io::Result<()> {
        self.writer.finish()
    }
}

/// Create a hyb output file, compressed when the path ends in `.gz`.
pub fn create_hyb(path: &Path, settings: HybSettings) -> io::Result<HybWriter<OutputWriter>> {
    Ok(HybWriter::new(create_writer(path)?, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyb_record::tests::{ART_HYB_1, HYB_STR_1};
    use std::io::Cursor;

    #[test]
    fn reads_records_and_skips_blank_lines() {
        let text = format!("{}\n\n{}\n", HYB_STR_1, ART_HYB_1);
        let reader = HybReader::new(Cursor::new(text), HybSettings::default());
        let records: Vec<HybRecord> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id(), "1_1000");
    }

    #[test]
    fn errors_carry_line_numbers_and_reading_continues() {
        let text = format!("{}\nbroken\tline\n{}\n", HYB_STR_1, ART_HYB_1);
        let mut reader = HybReader::new(Cursor::new(text), HybSettings::default());
        assert!(reader.next().unwrap().is_ok());
        match reader.next().unwrap() {
            Err(HybError::AtLine { line_no, source }) => {
                assert_eq!(line_no, 2);
                assert!(matches!(*source, HybError::MalformedRecord { .. }));
            }
            other => panic!("expected a line error, got {:?}", other),
        }
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().is_none());
    }

    #[test]
    fn writer_round_trips_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.hyb.gz");
        let records: Vec<HybRecord> = [HYB_STR_1, ART_HYB_1]
            .iter()
            .map(|l| HybRecord::from_line(l, &HybSettings::default()).unwrap())
            .collect();
        let mut writer = create_hyb(&path, HybSettings::default()).unwrap();
        writer.write_records(&records).unwrap();
        writer.finish().unwrap();
        let reread: Vec<HybRecord> = open_hyb(&path, HybSettings::default())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(reread, records);
    }
}
