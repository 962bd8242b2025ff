//src/util.rs

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

pub fn is_gz(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Lowercased file name with any trailing `.gz` removed.
fn base_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match name.strip_suffix(".gz") {
        Some(stripped) => stripped.to_string(),
        None => name,
    }
}

/// Case-insensitive suffix check that looks through a `.gz` extension.
pub fn has_suffix(path: &Path, suffixes: &[&str]) -> bool {
    let name = base_name(path);
    suffixes.iter().any(|suffix| name.ends_with(&suffix.to_lowercase()))
}

pub fn is_hyb_path(path: &Path) -> bool {
    has_suffix(path, &[".hyb"])
}

/// Open a file for line reading, decompressing `.gz` input.
pub fn open_reader(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let f = File::open(path)?;
    let reader: Box<dyn BufRead> = if is_gz(path) {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    Ok(reader)
}

/// Output file, gzip-compressed or plain.
pub enum OutputWriter {
    Plain(BufWriter<File>),
    Gz(BufWriter<GzEncoder<File>>),
}

impl OutputWriter {
    /// Flush buffered output and, for gz files, write the gzip trailer.
    /// Dropping the writer instead loses any error from the trailer write.
    pub fn finish(self) -> io::Result<()> {
        match self {
            OutputWriter::Plain(mut writer) => writer.flush(),
            OutputWriter::Gz(writer) => {
                let mut encoder = writer.into_inner().map_err(|e| e.into_error())?;
                encoder.try_finish()?;
                encoder.get_mut().flush()
            }
        }
    }
}

impl Write for OutputWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputWriter::Plain(writer) => writer.write(buf),
            OutputWriter::Gz(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputWriter::Plain(writer) => writer.flush(),
            OutputWriter::Gz(writer) => writer.flush(),
        }
    }
}

/// Create a file for writing, compressing when the path ends in `.gz`.
pub fn create_writer(path: &Path) -> io::Result<OutputWriter> {
    let f = File::create(path)?;
    Ok(if is_gz(path) {
        OutputWriter::Gz(BufWriter::new(GzEncoder::new(f, Compression::default())))
    } else {
        OutputWriter::Plain(BufWriter::new(f))
    })
}
