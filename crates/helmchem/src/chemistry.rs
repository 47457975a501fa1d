use derive_more::Display;

use crate::errors::ChemistryError;

/// The capabilities monomer validation needs from a cheminformatics toolkit
pub trait ChemistryManipulator: Send + Sync {
    fn validate_structure(&self, smiles: &str) -> bool {
        self.parse_structure(smiles).is_ok()
    }

    fn parse_structure(&self, smiles: &str) -> Result<Box<dyn MoleculeHandle>, ChemistryError>;

    /// Produces a registry-unique form of a structure, so that the same molecule written two ways shares one key
    fn canonicalize(&self, smiles: &str) -> Result<String, ChemistryError>;
}

/// An index into the atoms of a parsed molecule
pub type AtomId = usize;

pub trait MoleculeHandle {
    /// Finds the atom standing in for the R-group `R<label>`
    fn attachment_atom(&self, label: u32) -> Option<AtomId>;

    fn bond_count(&self, atom: AtomId) -> usize;

    /// The order of the `n`th bond touching `atom`
    fn bond_order(&self, atom: AtomId, n: usize) -> Option<BondOrder>;
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
pub enum BondOrder {
    #[display("single")]
    Single,
    #[display("double")]
    Double,
    #[display("triple")]
    Triple,
    #[display("quadruple")]
    Quadruple,
    #[display("aromatic")]
    Aromatic,
    /// A single bond carrying `/` or `\` stereochemistry
    #[display("stereo")]
    Stereo,
}
