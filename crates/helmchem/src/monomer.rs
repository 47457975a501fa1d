// Standard Library Imports
use std::str::FromStr;

// External Crate Imports
use derive_more::Display;
use serde::{Deserialize, Serialize};

// Local Crate Imports
use crate::{Attachment, errors::MonomerIssue};

// Public API ==========================================================================================================

/// The kinds of polymer a monomer can belong to, ordered the way a registry enumerates them
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Serialize, Deserialize)]
pub enum PolymerType {
    #[display("BLOB")]
    #[serde(rename = "BLOB")]
    Blob,
    #[display("CHEM")]
    #[serde(rename = "CHEM")]
    Chem,
    #[display("PEPTIDE")]
    #[serde(rename = "PEPTIDE")]
    Peptide,
    #[display("RNA")]
    #[serde(rename = "RNA")]
    Rna,
}

impl PolymerType {
    pub const ALL: [Self; 4] = [Self::Blob, Self::Chem, Self::Peptide, Self::Rna];

    /// Only CHEM monomers count as chemical modifiers: they aren't built from a backbone, so most structural rules
    /// don't apply to them
    #[must_use]
    pub const fn is_chemical(self) -> bool {
        matches!(self, Self::Chem)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blob => "BLOB",
            Self::Chem => "CHEM",
            Self::Peptide => "PEPTIDE",
            Self::Rna => "RNA",
        }
    }
}

impl FromStr for PolymerType {
    type Err = MonomerIssue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| MonomerIssue::UnknownPolymerType(s.to_owned()))
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Serialize, Deserialize)]
pub enum MonomerType {
    Backbone,
    Branch,
    Undefined,
}

impl FromStr for MonomerType {
    type Err = MonomerIssue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Backbone, Self::Branch, Self::Undefined]
            .into_iter()
            .find(|t| t.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| MonomerIssue::UnknownMonomerType(s.to_owned()))
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct Monomer {
    pub polymer_type: PolymerType,
    pub alternate_id: String,
    pub name: String,
    pub monomer_type: MonomerType,
    pub natural_analog: Option<String>,
    pub canonical_smiles: Option<String>,
    pub molfile: Option<String>,
    pub attachments: Vec<Attachment>,
    pub is_new: bool,
}

impl Monomer {
    pub fn new(
        polymer_type: PolymerType,
        alternate_id: impl Into<String>,
        name: impl Into<String>,
        monomer_type: MonomerType,
    ) -> Self {
        Self {
            polymer_type,
            alternate_id: alternate_id.into(),
            name: name.into(),
            monomer_type,
            natural_analog: None,
            canonical_smiles: None,
            molfile: None,
            attachments: Vec::new(),
            is_new: false,
        }
    }

    #[must_use]
    pub fn with_smiles(mut self, smiles: impl Into<String>) -> Self {
        self.canonical_smiles = Some(smiles.into());
        self
    }

    #[must_use]
    pub fn with_natural_analog(mut self, analog: impl Into<String>) -> Self {
        self.natural_analog = Some(analog.into());
        self
    }

    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// The structure string, if there is a non-empty one
    #[must_use]
    pub fn smiles(&self) -> Option<&str> {
        self.canonical_smiles.as_deref().filter(|s| !s.is_empty())
    }

    /// Non-chemical monomers with multi-character ids are modified versions of some natural monomer
    #[must_use]
    pub fn is_modified(&self) -> bool {
        !self.polymer_type.is_chemical() && self.alternate_id.chars().count() > 1
    }

    #[must_use]
    pub fn attachment(&self, label: &str) -> Option<&Attachment> {
        self.attachments
            .iter()
            .find(|a| a.label.eq_ignore_ascii_case(label))
    }

    #[must_use]
    pub fn has_attachment(&self, label: &str) -> bool {
        self.attachment(label).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polymer_type_from_str() {
        assert_eq!("PEPTIDE".parse(), Ok(PolymerType::Peptide));
        assert_eq!("rna".parse(), Ok(PolymerType::Rna));
        assert_eq!("Chem".parse(), Ok(PolymerType::Chem));
        assert_eq!("BLOB".parse(), Ok(PolymerType::Blob));
        assert_eq!(
            "DNA".parse::<PolymerType>(),
            Err(MonomerIssue::UnknownPolymerType("DNA".to_owned()))
        );
    }

    #[test]
    fn polymer_type_order_is_alphabetical() {
        let mut types = vec![
            PolymerType::Rna,
            PolymerType::Peptide,
            PolymerType::Blob,
            PolymerType::Chem,
        ];
        types.sort();
        let names: Vec<_> = types.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["BLOB", "CHEM", "PEPTIDE", "RNA"]);
    }

    #[test]
    fn monomer_type_from_str() {
        assert_eq!("Backbone".parse(), Ok(MonomerType::Backbone));
        assert_eq!("branch".parse(), Ok(MonomerType::Branch));
        assert_eq!("UNDEFINED".parse(), Ok(MonomerType::Undefined));
        assert!("Sugar".parse::<MonomerType>().is_err());
    }

    #[test]
    fn only_chem_is_chemical() {
        let chemical: Vec<_> = PolymerType::ALL.into_iter().filter(|t| t.is_chemical()).collect();
        assert_eq!(chemical, [PolymerType::Chem]);
    }

    #[test]
    fn modified_monomers() {
        let alanine = Monomer::new(PolymerType::Peptide, "A", "Alanine", MonomerType::Backbone);
        let selenocysteine = Monomer::new(PolymerType::Peptide, "seC", "Selenocysteine", MonomerType::Backbone);
        let linker = Monomer::new(PolymerType::Chem, "SMCC", "SMCC linker", MonomerType::Undefined);
        assert!(!alanine.is_modified());
        assert!(selenocysteine.is_modified());
        assert!(!linker.is_modified());
    }

    #[test]
    fn attachment_lookup_ignores_case() {
        let cysteine = Monomer::new(PolymerType::Peptide, "C", "Cysteine", MonomerType::Backbone)
            .with_smiles("N([*:1])[C@@H](CS[*:3])C([*:2])=O")
            .with_attachment(Attachment::new("R3-H", "R3", "H", "[*:3][H]"));
        assert!(cysteine.has_attachment("R3"));
        assert!(cysteine.has_attachment("r3"));
        assert!(!cysteine.has_attachment("R1"));
        assert_eq!(cysteine.smiles(), Some("N([*:1])[C@@H](CS[*:3])C([*:2])=O"));
        assert_eq!(
            Monomer::new(PolymerType::Chem, "X", "", MonomerType::Undefined)
                .with_smiles("")
                .smiles(),
            None
        );
    }
}
