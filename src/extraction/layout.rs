//! Fixed-width column layout of the authority's registration files.

use crate::constants::layout;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Character offsets (half-open) of the fields the pipeline reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLayout {
    pub make: Range<usize>,
    pub model: Range<usize>,
    pub vin: Range<usize>,
    pub fuel: Range<usize>,
    /// Lines with fewer characters are malformed
    pub min_width: usize,
}

impl Default for FieldLayout {
    fn default() -> Self {
        Self {
            make: layout::MAKE,
            model: layout::MODEL,
            vin: layout::VIN,
            fuel: layout::FUEL,
            min_width: layout::MIN_WIDTH,
        }
    }
}

impl FieldLayout {
    pub fn validate(&self) -> Result<()> {
        for (name, range) in self.fields() {
            if range.start >= range.end {
                return Err(PipelineError::configuration(format!(
                    "layout field '{}' has an empty range {:?}",
                    name, range
                )));
            }
        }
        // Every field except the trailing fuel window must fit in a valid line
        for (name, range) in self.fields().into_iter().filter(|(n, _)| *n != "fuel") {
            if range.end > self.min_width {
                return Err(PipelineError::configuration(format!(
                    "layout field '{}' ends at {} beyond the minimum width {}",
                    name, range.end, self.min_width
                )));
            }
        }
        Ok(())
    }

    fn fields(&self) -> [(&'static str, &Range<usize>); 4] {
        [
            ("make", &self.make),
            ("model", &self.model),
            ("vin", &self.vin),
            ("fuel", &self.fuel),
        ]
    }
}

/// Slice `line` by character positions. Positions past the end of the line
/// are clamped, so a window that overruns the line is truncated.
pub fn column<'a>(line: &'a str, range: &Range<usize>) -> &'a str {
    let start = byte_offset(line, range.start);
    let end = byte_offset(line, range.end).max(start);
    &line[start..end]
}

fn byte_offset(line: &str, char_index: usize) -> usize {
    line.char_indices()
        .nth(char_index)
        .map(|(i, _)| i)
        .unwrap_or(line.len())
}
