use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use simscore::{Element, Method, RunSummary};

/// Writes a run summary as pretty-printed JSON.
pub fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summary).context("cannot serialise run summary")?;
    writer.flush().with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}

/// One line per supported isotope combination of an element.
pub fn catalogue_lines(element: Element) -> Vec<String> {
    Method::catalogue(element)
        .iter()
        .map(|method| {
            method
                .ratios()
                .iter()
                .map(|r| r.label())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_lines() {
        let lines = catalogue_lines(Element::Sulphur);
        assert_eq!(lines[0], "34S/32S");
        assert!(lines.contains(&"34S/32S, 33S/32S, 36S/32S".to_string()));
        assert_eq!(catalogue_lines(Element::Chlorine), vec!["37Cl/35Cl".to_string()]);
    }
}
