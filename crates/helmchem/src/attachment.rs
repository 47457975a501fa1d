use serde::{Deserialize, Serialize};

/// The reserved label used by hydrogen-bonding base pairs instead of an R-group
pub const PAIR_LABEL: &str = "pair";

/// A point on a monomer's structure where it can bond to another monomer, or be capped when left free
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct Attachment {
    pub alternate_id: String,
    pub label: String,
    pub cap_group_name: String,
    pub cap_group_smiles: String,
}

impl Attachment {
    pub fn new(
        alternate_id: impl Into<String>,
        label: impl Into<String>,
        cap_group_name: impl Into<String>,
        cap_group_smiles: impl Into<String>,
    ) -> Self {
        Self {
            alternate_id: alternate_id.into(),
            label: label.into(),
            cap_group_name: cap_group_name.into(),
            cap_group_smiles: cap_group_smiles.into(),
        }
    }

    /// A hydrogen cap for the `R<number>` label, which is what freshly registered structures are given
    #[must_use]
    pub fn hydrogen(number: u32) -> Self {
        Self::new(
            format!("R{number}-H"),
            format!("R{number}"),
            "H",
            format!("[*:{number}][H]"),
        )
    }

    /// The numeric part of an `R<number>` label
    #[must_use]
    pub fn label_number(&self) -> Option<u32> {
        label_number(&self.label)
    }
}

/// Parses the number out of an `R<number>` label, rejecting zero and leading zeroes
#[must_use]
pub fn label_number(label: &str) -> Option<u32> {
    let digits = label.strip_prefix('R')?;
    if digits.starts_with('0') || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hydrogen_caps() {
        let cap = Attachment::hydrogen(3);
        assert_eq!(cap.alternate_id, "R3-H");
        assert_eq!(cap.label, "R3");
        assert_eq!(cap.cap_group_name, "H");
        assert_eq!(cap.cap_group_smiles, "[*:3][H]");
        assert_eq!(cap.label_number(), Some(3));
    }

    #[test]
    fn label_numbers() {
        assert_eq!(label_number("R1"), Some(1));
        assert_eq!(label_number("R12"), Some(12));
        assert_eq!(label_number("R0"), None);
        assert_eq!(label_number("R01"), None);
        assert_eq!(label_number("R"), None);
        assert_eq!(label_number("pair"), None);
        assert_eq!(label_number("r1"), None);
        assert_eq!(label_number("R1a"), None);
    }
}
