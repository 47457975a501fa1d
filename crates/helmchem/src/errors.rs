use miette::Diagnostic;
use thiserror::Error;

use crate::{BondOrder, Monomer, MonomerType, PolymerType};

// FIXME: Consider splitting the chemistry errors out once there is more than one toolkit
#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
#[error("could not accept the {polymer_type} monomer {id:?}: {reason}")]
pub struct MonomerError {
    pub polymer_type: String,
    pub id: String,
    pub reason: MonomerIssue,
}

impl MonomerError {
    pub fn new(polymer_type: impl ToString, id: &str, reason: impl Into<MonomerIssue>) -> Self {
        let polymer_type = polymer_type.to_string();
        let id = id.to_owned();
        let reason = reason.into();

        Self {
            polymer_type,
            id,
            reason,
        }
    }

    pub(crate) fn for_monomer(monomer: &Monomer, reason: impl Into<MonomerIssue>) -> Self {
        Self::new(monomer.polymer_type, &monomer.alternate_id, reason)
    }

    pub fn not_in_registry(polymer_type: PolymerType, id: &str) -> Self {
        Self::new(polymer_type, id, MonomerIssue::NotInRegistry)
    }
}

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum MonomerIssue {
    #[error("no polymer type was given")]
    MissingPolymerType,

    #[error("{0:?} is not a supported polymer type")]
    #[diagnostic(help("supported polymer types are PEPTIDE, RNA, CHEM and BLOB"))]
    UnknownPolymerType(String),

    #[error("no monomer type was given")]
    MissingMonomerType,

    #[error("{0:?} is not a known monomer type")]
    #[diagnostic(help("monomer types are Backbone, Branch and Undefined"))]
    UnknownMonomerType(String),

    #[error("a {polymer_type} monomer cannot have the monomer type {monomer_type}")]
    #[diagnostic(help(
        "chemical modifiers must be Undefined, every other polymer type needs a Backbone or Branch monomer"
    ))]
    InconsistentMonomerType {
        polymer_type: PolymerType,
        monomer_type: MonomerType,
    },

    #[error("the monomer id is empty")]
    MissingId,

    #[error("non-chemical monomers must have a structure")]
    MissingStructure,

    #[error("non-chemical monomers must have at least one attachment")]
    MissingAttachments,

    #[error("the structure is not chemically valid")]
    InvalidStructure,

    #[error("the R-group {0} is used more than once in the structure")]
    DuplicateLabel(String),

    #[error("the structure has {labels} R-group{} but {attachments} attachment{} were declared",
        if *.labels == 1 { "" } else { "s" }, if *.attachments == 1 { "" } else { "s" })]
    LabelCountMismatch { labels: usize, attachments: usize },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Attachment(#[from] AttachmentError),

    #[error("the R-group {0} in the structure has no matching attachment")]
    UnmatchedLabel(String),

    #[error("modified monomers need a natural analog")]
    #[diagnostic(help("give the single-letter monomer this one is a variant of"))]
    MissingNaturalAnalog,

    #[error("the natural analog {0:?} is not a single letter")]
    InvalidNaturalAnalog(String),

    #[error("the structure has no atom for the R-group {0}")]
    AttachmentAtomNotFound(String),

    #[error("the R-group {label} atom has {bonds} bonds, but must have exactly one")]
    AttachmentAtomBonds { label: String, bonds: usize },

    #[error("the R-group {label} atom is joined by a {order} bond, but must use a single bond")]
    AttachmentBondOrder { label: String, order: BondOrder },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Chemistry(#[from] ChemistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Transport(#[from] CodecError),

    #[error("it could not be found in the monomer registry")]
    NotInRegistry,
}

// ---------------------------------------------------------------------------------------------------------------------

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
#[error("the attachment {attachment_id:?} of monomer {monomer_id:?} is invalid: {reason}")]
pub struct AttachmentError {
    pub monomer_id: String,
    pub attachment_id: String,
    pub reason: AttachmentIssue,
}

impl AttachmentError {
    pub(crate) fn new(monomer_id: &str, attachment_id: &str, reason: AttachmentIssue) -> Self {
        let monomer_id = monomer_id.to_owned();
        let attachment_id = attachment_id.to_owned();

        Self {
            monomer_id,
            attachment_id,
            reason,
        }
    }
}

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum AttachmentIssue {
    #[error("{0:?} is not an R-group label")]
    #[diagnostic(help("attachment labels look like R1, R2, R3..."))]
    InvalidLabel(String),

    #[error("the cap group structure is not chemically valid")]
    InvalidCapStructure,

    #[error("the cap group structure must contain exactly one R-group, but it has {0}")]
    CapLabelCount(usize),

    #[error("the cap group is attached at {found}, but the attachment is labelled {expected}")]
    CapLabelMismatch { found: String, expected: String },
}

// ---------------------------------------------------------------------------------------------------------------------

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum ChemistryError {
    #[error("unexpected {} at offset {offset} of the SMILES string", describe_char(.found))]
    Syntax { offset: usize, found: Option<char> },

    #[error("the ring bond {0} was opened but never closed")]
    UnclosedRing(u32),

    #[error("a branch was opened but never closed")]
    UnclosedBranch,

    #[error("the structure contains no atoms")]
    Empty,

    #[error("the extension labels {labels} atoms, but the structure only has {atoms}")]
    ExtensionMismatch { labels: usize, atoms: usize },

    #[error("this chemistry toolkit cannot canonicalize structures")]
    CanonicalizationUnsupported,
}

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum CodecError {
    #[error("the structure payload contains an unknown escape sequence \\{0}")]
    UnknownEscape(char),

    #[error("the structure payload ends in the middle of an escape sequence")]
    TrailingEscape,
}

fn describe_char(c: &Option<char>) -> String {
    c.map_or_else(|| "end of input".to_owned(), |c| format!("{c:?}"))
}
