//! Parsing, serializing, validating, and editing HELM2 notation for complex biomolecules

mod document;
pub mod errors;
mod monomer_notation;
mod parser;
#[cfg(test)]
mod testing_tools;
mod transforms;
mod validation;

pub use document::{
    ConnectionNotation, Endpoint, GroupMember, GroupNotation, HELM_VERSION, HelmDocument, Label, PolymerNotation,
    Position, PositionItem,
};
pub use errors::{ConnectionIssue, HelmError, ParseError, ParseErrorKind, Section, SectionIssue};
pub use monomer_notation::{
    ChainLink, Mixture, MixtureKind, MixtureMember, MonomerNotation, MonomerRef, Ratio, Repeat, Token, Wildcard,
};
pub use parser::parse;

pub type Result<T, E = Box<HelmError>> = std::result::Result<T, E>;
