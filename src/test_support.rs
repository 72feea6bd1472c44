//! Fixture builders shared by unit tests.

use crate::constants::layout;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// A fixed-width line built from field values at the default offsets
pub struct FixtureLine {
    pub make: String,
    pub model: String,
    pub vin: String,
    pub fuel: String,
}

impl FixtureLine {
    pub fn new(make: &str, model: &str, vin: &str, fuel: &str) -> Self {
        Self {
            make: make.to_string(),
            model: model.to_string(),
            vin: vin.to_string(),
            fuel: fuel.to_string(),
        }
    }

    pub fn render(&self) -> String {
        let mut line = String::new();
        line.push_str(&pad("01022025", layout::MAKE.start));
        line.push_str(&pad(&self.make, layout::MAKE.len()));
        line.push_str(&pad(&self.model, layout::MODEL.len()));
        line.push_str(&pad(&self.vin, layout::VIN.len()));
        line.push_str(&pad("", layout::FUEL.start - layout::VIN.end));
        line.push_str(&pad(&self.fuel, layout::FUEL.len()));
        line.push_str(&pad("", 10));
        line
    }
}

fn pad(value: &str, width: usize) -> String {
    let truncated: String = value.chars().take(width).collect();
    format!("{:<width$}", truncated, width = width)
}

pub fn write_raw_file(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    let mut content = lines.join("\n");
    content.push('\n');
    // Latin-1 on disk, as published
    let bytes: Vec<u8> = content.chars().map(|c| c as u32 as u8).collect();
    fs::write(&path, bytes).unwrap();
    path
}

/// In-memory zip with one stored entry
pub fn zip_archive(entry_name: &str, content: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut writer = ZipWriter::new(Cursor::new(&mut buf));
        let options: FileOptions<'_, ()> =
            FileOptions::default().compression_method(CompressionMethod::Stored);
        writer.start_file(entry_name, options).unwrap();
        writer.write_all(content).unwrap();
        writer.finish().unwrap();
    }
    buf
}
