//! Minimal `key=value` properties files
//!
//! Used for the index-details store and the remote index descriptor. Lines
//! starting with `#` or `!` are comments; the first `=` or `:` separates key
//! from value; surrounding whitespace is trimmed.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::Result;

pub type Properties = BTreeMap<String, String>;

pub fn parse(content: &str) -> Properties {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let split = line.find(['=', ':'])?;
            let key = line[..split].trim();
            let value = line[split + 1..].trim();
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

pub fn format(header: &str, properties: &Properties) -> String {
    let mut out = String::new();
    for line in header.lines() {
        out.push_str("# ");
        out.push_str(line);
        out.push('\n');
    }
    for (key, value) in properties {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out
}

pub fn load(path: &Path) -> Result<Properties> {
    Ok(parse(&fs::read_to_string(path)?))
}

/// Write through a sibling temp file so readers never see a torn file.
pub fn store(path: &Path, header: &str, properties: &Properties) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("properties.tmp");
    fs::write(&tmp, format(header, properties))?;
    fs::rename(&tmp, path)?;
    Ok(())
}
