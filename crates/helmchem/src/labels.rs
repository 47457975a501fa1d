//! Harvesting R-group labels out of structure strings, whether they're written inline (`[*:1]`) or in a CXSMILES
//! extension (`|$;_R1;;_R2$|`)

// Standard Library Imports
use std::sync::LazyLock;

// External Crate Imports
use itertools::Itertools;
use regex::Regex;

static INLINE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\*:([1-9]\d*)\]|\[\w+:([1-9]\d*)\]").unwrap());

/// Every R-group marker in the structure, in order of appearance and including any repeats
#[must_use]
pub fn label_markers(smiles: &str) -> Vec<String> {
    if let Some(extension) = extension(smiles) {
        extension
            .split('R')
            .skip(1)
            .filter_map(|token| {
                let end = token.find(|c: char| !c.is_ascii_digit()).unwrap_or(token.len());
                (end > 0).then(|| format!("R{}", &token[..end]))
            })
            .collect()
    } else {
        INLINE_LABEL
            .captures_iter(smiles)
            .filter_map(|c| c.get(1).or_else(|| c.get(2)))
            .map(|number| format!("R{}", number.as_str()))
            .collect()
    }
}

/// The distinct R-group labels of a structure, in order of first appearance
#[must_use]
pub fn extract_labels(smiles: &str) -> Vec<String> {
    label_markers(smiles).into_iter().unique().collect()
}

fn extension(smiles: &str) -> Option<&str> {
    smiles.split('|').nth(1)
}
