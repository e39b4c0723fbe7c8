use serde::{Deserialize, Serialize};

/// One generated brand, as read from a line like `1. Acme: Build Better`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandRecord {
    pub name: String,
    pub slogan: String,
}

impl BrandRecord {
    /// Text offered for copying to the clipboard.
    pub fn copy_text(&self) -> String {
        format!("{} - {}", self.name, self.slogan)
    }
}

/// Derive the ordered brand list from everything received so far.
///
/// Each non-blank line is read as `<ordinal>. <name>: <slogan>`. The line is
/// split once on `:` and the part before it once on `.`; lines where either
/// split fails are skipped, which is how a half-received trailing line drops
/// out until the rest of it arrives. The name is trimmed, the slogan is kept
/// as it appears after the colon.
///
/// The result depends only on `accumulated`, so callers simply re-run it on the
/// whole text after every chunk.
///
/// ```
/// use brandgen::brand_parser::derive_records;
///
/// let records = derive_records("1. Acme: Build Better\n2. Zen");
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].name, "Acme");
/// assert_eq!(records[0].slogan, " Build Better");
/// ```
pub fn derive_records(accumulated: &str) -> Vec<BrandRecord> {
    accumulated
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Option<BrandRecord> {
    let (numbered_name, slogan) = line.split_once(':')?;
    let (_ordinal, name) = numbered_name.split_once('.')?;
    Some(BrandRecord {
        name: name.trim().to_string(),
        slogan: slogan.to_string(),
    })
}
