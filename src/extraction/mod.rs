//! Fixed-width record extraction.
//!
//! Turns the lines of one raw daily file into [`RegistrationRecord`]s. Each
//! line is decoded and sliced independently, so a short or undecodable line
//! becomes a [`LineError`] while the rest of the file is still read. The
//! registration date comes from the filename via [`SourceFile`].

pub mod layout;
pub mod source_file;

pub use layout::{FieldLayout, column};
pub use source_file::SourceFile;

use crate::error::{LineError, PipelineError, Result};
use crate::models::{RegistrationRecord, SourceEncoding, normalize_vin};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

/// Number of line errors kept verbatim per file; the rest are only counted
const MAX_ERROR_SAMPLES: usize = 10;

/// Parses fixed-width lines into registration records
#[derive(Debug, Clone, Default)]
pub struct RecordExtractor {
    layout: FieldLayout,
    encoding: SourceEncoding,
}

impl RecordExtractor {
    pub fn new(layout: FieldLayout, encoding: SourceEncoding) -> Self {
        Self { layout, encoding }
    }

    pub fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    /// Parse one decoded line
    pub fn parse_line(
        &self,
        line: &str,
        line_number: usize,
        source: &SourceFile,
    ) -> std::result::Result<RegistrationRecord, LineError> {
        let width = line.chars().count();
        if width < self.layout.min_width {
            return Err(LineError::TooShort {
                line: line_number,
                width,
                minimum: self.layout.min_width,
            });
        }

        let make = column(line, &self.layout.make).trim().to_uppercase();
        if make.is_empty() {
            return Err(LineError::MissingField {
                line: line_number,
                field: "make",
            });
        }

        let model = column(line, &self.layout.model).trim().to_string();
        if model.is_empty() {
            return Err(LineError::MissingField {
                line: line_number,
                field: "model",
            });
        }

        Ok(RegistrationRecord {
            make,
            model,
            vin: normalize_vin(column(line, &self.layout.vin)),
            fuel_code: column(line, &self.layout.fuel).trim().to_string(),
            registration_date: source.date,
            source_file: source.name.clone(),
        })
    }

    /// Lazily extract records from `reader`. Blank lines are skipped; every
    /// other line yields either a record or a [`LineError`].
    pub fn records<'a, R: BufRead>(&'a self, reader: R, source: &'a SourceFile) -> Records<'a, R> {
        Records {
            extractor: self,
            source,
            reader,
            buffer: Vec::new(),
            line_number: 0,
            exhausted: false,
        }
    }

    /// Extract every record of a raw file on disk.
    ///
    /// Fails only when the filename is malformed or the file cannot be
    /// opened; bad lines are counted in the returned [`FileExtraction`].
    pub fn extract_file(&self, path: &Path) -> Result<FileExtraction> {
        let source = SourceFile::from_path(path)?;
        let file = File::open(path).map_err(|e| PipelineError::ExtractionFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut extraction = FileExtraction::new(source.clone());
        for item in self.records(BufReader::new(file), &source) {
            extraction.push(item);
        }

        if extraction.malformed_lines > 0 {
            warn!(
                "{}: {} malformed lines skipped ({} records extracted)",
                source.name,
                extraction.malformed_lines,
                extraction.records.len()
            );
        } else {
            debug!(
                "{}: {} records extracted",
                source.name,
                extraction.records.len()
            );
        }

        Ok(extraction)
    }

    fn decode_and_parse(
        &self,
        bytes: &[u8],
        line_number: usize,
        source: &SourceFile,
    ) -> std::result::Result<RegistrationRecord, LineError> {
        let line = self
            .encoding
            .decode(bytes)
            .ok_or(LineError::Decoding {
                line: line_number,
                encoding: self.encoding.name(),
            })?;
        self.parse_line(&line, line_number, source)
    }
}

/// Lazy iterator over the extraction results of one file
pub struct Records<'a, R> {
    extractor: &'a RecordExtractor,
    source: &'a SourceFile,
    reader: R,
    buffer: Vec<u8>,
    line_number: usize,
    exhausted: bool,
}

impl<R: BufRead> Iterator for Records<'_, R> {
    type Item = std::result::Result<RegistrationRecord, LineError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.exhausted {
            self.buffer.clear();
            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => self.exhausted = true,
                Ok(_) => {
                    self.line_number += 1;
                    let bytes = strip_line_ending(&self.buffer);
                    if bytes.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Some(
                        self.extractor
                            .decode_and_parse(bytes, self.line_number, self.source),
                    );
                }
                Err(e) => {
                    // An I/O failure ends the file; what was read so far stands
                    self.exhausted = true;
                    return Some(Err(LineError::Read {
                        line: self.line_number + 1,
                        reason: e.to_string(),
                    }));
                }
            }
        }
        None
    }
}

fn strip_line_ending(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    bytes.strip_suffix(b"\r").unwrap_or(bytes)
}

/// Everything extracted from one raw file
#[derive(Debug, Clone)]
pub struct FileExtraction {
    pub source: SourceFile,
    pub records: Vec<RegistrationRecord>,
    pub malformed_lines: usize,
    /// The first few line errors, for reporting
    pub error_samples: Vec<LineError>,
}

impl FileExtraction {
    fn new(source: SourceFile) -> Self {
        Self {
            source,
            records: Vec::new(),
            malformed_lines: 0,
            error_samples: Vec::new(),
        }
    }

    fn push(&mut self, item: std::result::Result<RegistrationRecord, LineError>) {
        match item {
            Ok(record) => self.records.push(record),
            Err(error) => {
                self.malformed_lines += 1;
                if self.error_samples.len() < MAX_ERROR_SAMPLES {
                    self.error_samples.push(error);
                }
            }
        }
    }
}
