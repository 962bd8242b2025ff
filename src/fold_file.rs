//src/fold_file.rs

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::FoldError;
use crate::fold_record::FoldRecord;
use crate::util::{create_writer, has_suffix, open_reader, OutputWriter};

/// Upper bound on lines reserved up front for one block.
const MAX_PRESIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldFormat {
    Vienna,
    Viennad,
    Ct,
}

impl FoldFormat {
    /// Infer the format from `.vienna`, `.viennad` or `.ct`, with optional `.gz`.
    pub fn from_path(path: &Path) -> Option<Self> {
        if has_suffix(path, &[".viennad"]) {
            Some(FoldFormat::Viennad)
        } else if has_suffix(path, &[".vienna"]) {
            Some(FoldFormat::Vienna)
        } else if has_suffix(path, &[".ct"]) {
            Some(FoldFormat::Ct)
        } else {
            None
        }
    }
}

impl FromStr for FoldFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vienna" => Ok(FoldFormat::Vienna),
            "viennad" => Ok(FoldFormat::Viennad),
            "ct" => Ok(FoldFormat::Ct),
            other => Err(format!("unknown fold format \"{}\"", other)),
        }
    }
}

/// Lazily parses fold records one block at a time. A malformed block is
/// reported on its own and reading continues with the next block.
pub struct FoldReader<R: BufRead> {
    reader: R,
    format: FoldFormat,
    placeholder: String,
    line: String,
    line_no: usize,
    /// Vienna header line that cut the previous block short.
    pending: Option<String>,
}

impl<R: BufRead> FoldReader<R> {
    pub fn new(reader: R, format: FoldFormat, placeholder: &str) -> Self {
        FoldReader {
            reader,
            format,
            placeholder: placeholder.to_string(),
            line: String::new(),
            line_no: 0,
            pending: None,
        }
    }

    pub fn format(&self) -> FoldFormat {
        self.format
    }

    /// Next line with its newline stripped, or `None` at end of input.
    fn read_line(&mut self) -> io::Result<Option<String>> {
        self.line.clear();
        if self.reader.read_line(&mut self.line)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        Ok(Some(self.line.trim_end_matches(['\n', '\r']).to_string()))
    }

    fn read_nonblank(&mut self) -> io::Result<Option<String>> {
        while let Some(line) = self.read_line()? {
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    /// Collect `count` more non-blank lines after `first`.
    fn read_block(&mut self, first: String, count: usize) -> Result<Vec<String>, FoldError> {
        // `count` comes from the input, so the allocation is capped.
        let mut block = Vec::with_capacity(count.min(MAX_PRESIZE) + 1);
        block.push(first);
        for _ in 0..count {
            match self.read_nonblank()? {
                Some(line) => block.push(line),
                None => {
                    return Err(FoldError::malformed(
                        block[0].trim(),
                        format!("block truncated after {} lines", block.len()),
                    ))
                }
            }
        }
        Ok(block)
    }

    /// Vienna blocks start at a `>` line. A header seen early ends the
    /// current block and is kept as the start of the next one.
    fn read_vienna_block(&mut self, first: String) -> Result<Vec<String>, FoldError> {
        if !first.starts_with('>') {
            while let Some(line) = self.read_nonblank()? {
                if line.starts_with('>') {
                    self.pending = Some(line);
                    break;
                }
            }
            return Err(FoldError::malformed(
                first.trim(),
                "vienna block does not start with '>'",
            ));
        }
        let mut block = vec![first];
        while block.len() < 3 {
            match self.read_nonblank()? {
                Some(line) if line.starts_with('>') => {
                    self.pending = Some(line);
                    break;
                }
                Some(line) => block.push(line),
                None => break,
            }
        }
        if block.len() < 3 {
            return Err(FoldError::malformed(
                block[0].trim(),
                format!("block truncated after {} lines", block.len()),
            ));
        }
        Ok(block)
    }

    fn next_block(&mut self) -> Result<Option<FoldRecord>, FoldError> {
        let first = match self.pending.take() {
            Some(line) => line,
            None => match self.read_nonblank()? {
                Some(line) => line,
                None => return Ok(None),
            },
        };
        let placeholder = self.placeholder.clone();
        let record = match self.format {
            FoldFormat::Vienna => {
                let block = self.read_vienna_block(first)?;
                let lines: Vec<&str> = block.iter().map(String::as_str).collect();
                FoldRecord::from_vienna_lines(&lines, &placeholder)?
            }
            FoldFormat::Viennad => {
                let mut block = vec![first];
                while let Some(line) = self.read_line()? {
                    if line.trim().is_empty() {
                        break;
                    }
                    block.push(line);
                }
                let lines: Vec<&str> = block.iter().map(String::as_str).collect();
                FoldRecord::from_viennad_lines(&lines, &placeholder)?
            }
            FoldFormat::Ct => {
                let count = first
                    .split_whitespace()
                    .next()
                    .and_then(|n| n.parse::<usize>().ok())
                    .ok_or_else(|| FoldError::malformed(first.trim(), "ct header has no length"))?;
                let block = self.read_block(first, count)?;
                let lines: Vec<&str> = block.iter().map(String::as_str).collect();
                FoldRecord::from_ct_lines(&lines)?
            }
        };
        Ok(Some(record))
    }
}

/// Open a fold file, inferring the format from its suffix when not given.
pub fn open_fold(
    path: &Path,
    format: Option<FoldFormat>,
    placeholder: &str,
) -> Result<FoldReader<Box<dyn BufRead>>, FoldError> {
    let format = format.or_else(|| FoldFormat::from_path(path)).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("cannot infer fold format of {}", path.display()),
        )
    })?;
    Ok(FoldReader::new(open_reader(path)?, format, placeholder))
}

impl<R: BufRead> Iterator for FoldReader<R> {
    type Item = Result<FoldRecord, FoldError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_block()
            .map_err(|e| e.at_line(self.line_no))
            .transpose()
    }
}

/// Writes fold records as vienna blocks, or viennad blocks when asked and
/// the record carries segment details. Ct input is written as vienna.
pub struct FoldWriter<W: Write> {
    writer: W,
    format: FoldFormat,
    placeholder: String,
}

impl<W: Write> FoldWriter<W> {
    pub fn new(writer: W, format: FoldFormat, placeholder: &str) -> Self {
        FoldWriter {
            writer,
            format,
            placeholder: placeholder.to_string(),
        }
    }

    pub fn write_record(&mut self, record: &FoldRecord) -> io::Result<()> {
        let text = match self.format {
            FoldFormat::Viennad => record.to_viennad_string(&self.placeholder).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("fold record {} has no segment details for viennad output", record.id()),
                )
            })?,
            FoldFormat::Vienna | FoldFormat::Ct => {
                let mut text = record.to_vienna_string_with(&self.placeholder);
                text.push('\n');
                text
            }
        };
        self.writer.write_all(text.as_bytes())
    }

    pub fn write_records<'a, I>(&mut self, records: I) -> io::Result<()>
    where
        I: IntoIterator<Item = &'a FoldRecord>,
    {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl FoldWriter<OutputWriter> {
    /// Flush and close the file, reporting any gzip trailer error.
    pub fn finish(self) -> io::Result<()> {
        self.writer.finish()
    }
}

pub fn create_fold(
    path: &Path,
    format: FoldFormat,
    placeholder: &str,
) -> io::Result<FoldWriter<OutputWriter>> {
    Ok(FoldWriter::new(create_writer(path)?, format, placeholder))
}
