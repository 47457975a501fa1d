//! Monomers for HELM notation: their attachment points, the rules that make them well-formed, and a case-insensitive
//! registry to look them up in

pub mod attachment;
pub mod chemistry;
pub mod codec;
pub mod errors;
pub mod labels;
pub mod library;
pub mod monomer;
pub mod registry;
pub mod smiles;
#[cfg(test)]
mod testing_tools;
pub mod validator;

pub use attachment::Attachment;
pub use chemistry::{BondOrder, ChemistryManipulator, MoleculeHandle};
pub use codec::{EscapedCodec, PlainCodec, StructureCodec, StructureEncoding};
pub use errors::{AttachmentError, AttachmentIssue, ChemistryError, CodecError, MonomerError, MonomerIssue};
pub use labels::{extract_labels, label_markers};
pub use library::{AttachmentRecord, MonomerLibrary, MonomerRecord};
pub use monomer::{Monomer, MonomerType, PolymerType};
pub use registry::MonomerRegistry;
pub use smiles::SmilesReader;
pub use validator::{validate_attachment, validate_monomer};

pub type Result<T, E = Box<MonomerError>> = std::result::Result<T, E>;
