// Standard Library Imports
use std::{
    collections::{BTreeMap, btree_map::Entry},
    fmt::{self, Display, Formatter},
    sync::Arc,
};

// External Crate Imports
use ahash::HashMap;
use log::{debug, info, trace};
use static_assertions::assert_impl_all;

// Local Crate Imports
use crate::{ChemistryManipulator, Monomer, PolymerType, library::MonomerLibrary};

// Public API ==========================================================================================================

/// Monomers indexed by polymer type and (case-insensitive) id, as well as by structure
///
/// Every method that changes the registry takes `&mut self`, so sharing one between threads needs a lock with a single
/// writer, typically an `RwLock<MonomerRegistry>`.
#[derive(Clone, Default)]
pub struct MonomerRegistry {
    monomers: BTreeMap<PolymerType, BTreeMap<FoldedId, Arc<Monomer>>>,
    structures: HashMap<String, Arc<Monomer>>,
    chemistry: Option<Arc<dyn ChemistryManipulator>>,
}

assert_impl_all!(MonomerRegistry: Send, Sync);

impl MonomerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that asks `chemistry` for the canonical form of each structure before indexing it
    #[must_use]
    pub fn with_chemistry(chemistry: Arc<dyn ChemistryManipulator>) -> Self {
        Self {
            chemistry: Some(chemistry),
            ..Self::default()
        }
    }

    /// Loads and validates a KDL monomer library, then registers everything in it
    pub fn from_kdl(
        file_name: impl AsRef<str>,
        kdl_text: impl AsRef<str>,
        chemistry: Arc<dyn ChemistryManipulator>,
    ) -> miette::Result<Self> {
        let library = MonomerLibrary::new(file_name, kdl_text, &*chemistry)?;
        let mut registry = Self::with_chemistry(chemistry);
        for monomer in &library.monomers {
            registry.add(monomer);
        }
        info!(monomers = registry.len(); "loaded monomer library");
        Ok(registry)
    }

    /// Stores a copy of `monomer`, unless one with the same polymer type and id is already present
    ///
    /// Returns `true` if the monomer was added. Adding an id that's already taken leaves the registry untouched.
    pub fn add(&mut self, monomer: &Monomer) -> bool {
        let id = FoldedId::new(&monomer.alternate_id);
        let Entry::Vacant(slot) = self
            .monomers
            .entry(monomer.polymer_type)
            .or_default()
            .entry(id)
        else {
            debug!(
                polymer_type:% = monomer.polymer_type, id = monomer.alternate_id.as_str();
                "ignoring a monomer with an id that is already registered"
            );
            return false;
        };

        let mut monomer = monomer.clone();
        let structure_key = monomer.smiles().map(|smiles| {
            self.chemistry
                .as_ref()
                .and_then(|c| c.canonicalize(smiles).ok())
                .unwrap_or_else(|| smiles.to_owned())
        });
        if let Some(key) = &structure_key {
            monomer.canonical_smiles = Some(key.clone());
        }

        trace!(polymer_type:% = monomer.polymer_type, id = monomer.alternate_id.as_str(); "registering monomer");
        let monomer = Arc::new(monomer);
        if let Some(key) = structure_key {
            self.structures.entry(key).or_insert_with(|| Arc::clone(&monomer));
        }
        slot.insert(monomer);
        true
    }

    /// Like [`MonomerRegistry::add`], but marks the stored copy as newly created
    pub fn add_new(&mut self, monomer: &Monomer) -> bool {
        let mut monomer = monomer.clone();
        monomer.is_new = true;
        self.add(&monomer)
    }

    #[must_use]
    pub fn get(&self, polymer_type: PolymerType, id: &str) -> Option<&Monomer> {
        self.monomers
            .get(&polymer_type)?
            .get(&FoldedId::new(id))
            .map(AsRef::as_ref)
    }

    /// Looks a monomer up by its structure key (the canonical SMILES where available)
    #[must_use]
    pub fn get_by_structure(&self, structure: &str) -> Option<&Monomer> {
        self.structures.get(structure).map(AsRef::as_ref)
    }

    /// The key a structure would be indexed under in this registry
    #[must_use]
    pub fn structure_key(&self, smiles: &str) -> String {
        self.chemistry
            .as_ref()
            .and_then(|c| c.canonicalize(smiles).ok())
            .unwrap_or_else(|| smiles.to_owned())
    }

    #[must_use]
    pub fn has(&self, polymer_type: PolymerType, id: &str) -> bool {
        self.get(polymer_type, id).is_some()
    }

    /// Every monomer of one polymer type, in alphabetical order of their case-folded ids
    pub fn all_of_type(&self, polymer_type: PolymerType) -> impl Iterator<Item = &Monomer> {
        self.monomers
            .get(&polymer_type)
            .into_iter()
            .flat_map(BTreeMap::values)
            .map(AsRef::as_ref)
    }

    /// Every monomer, grouped by polymer type, then ordered by id
    pub fn all_monomers(&self) -> impl Iterator<Item = &Monomer> {
        self.monomers.values().flat_map(BTreeMap::values).map(AsRef::as_ref)
    }

    pub fn polymer_types(&self) -> impl Iterator<Item = PolymerType> + '_ {
        self.monomers
            .iter()
            .filter(|(_, monomers)| !monomers.is_empty())
            .map(|(&polymer_type, _)| polymer_type)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.monomers.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.monomers.clear();
        self.structures.clear();
    }
}

impl Display for MonomerRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (polymer_type, monomers) in &self.monomers {
            writeln!(f, "{polymer_type}: {} monomers", monomers.len())?;
        }
        write!(f, "{} distinct structures", self.structures.len())
    }
}

// Private Types =======================================================================================================

/// A monomer id with its case folded away, so that `seC` and `SEC` land in the same slot
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
struct FoldedId(String);

impl FoldedId {
    fn new(id: &str) -> Self {
        Self(id.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use crate::{Attachment, ChemistryError, MonomerType, SmilesReader, library::DEFAULT_KDL};

    use super::*;

    static DEFAULT_REGISTRY: LazyLock<MonomerRegistry> = LazyLock::new(|| {
        MonomerRegistry::from_kdl("monomer_library.kdl", DEFAULT_KDL, Arc::new(SmilesReader)).unwrap()
    });

    fn alanine() -> Monomer {
        Monomer::new(PolymerType::Peptide, "A", "Alanine", MonomerType::Backbone)
            .with_natural_analog("A")
            .with_smiles("C[C@H](N[*:1])C([*:2])=O")
            .with_attachment(Attachment::hydrogen(1))
            .with_attachment(Attachment::new("R2-OH", "R2", "OH", "O[*:2]"))
    }

    fn glycine() -> Monomer {
        Monomer::new(PolymerType::Peptide, "G", "Glycine", MonomerType::Backbone)
            .with_natural_analog("G")
            .with_smiles("[*:1]NCC([*:2])=O")
            .with_attachment(Attachment::hydrogen(1))
            .with_attachment(Attachment::new("R2-OH", "R2", "OH", "O[*:2]"))
    }

    /// Pretends that every structure is the same molecule
    struct Collapse;

    impl ChemistryManipulator for Collapse {
        fn parse_structure(&self, smiles: &str) -> Result<Box<dyn crate::MoleculeHandle>, ChemistryError> {
            SmilesReader.parse_structure(smiles)
        }

        fn canonicalize(&self, _smiles: &str) -> Result<String, ChemistryError> {
            Ok("*".to_owned())
        }
    }

    #[test]
    fn add_is_idempotent() {
        let mut registry = MonomerRegistry::new();
        assert!(registry.add(&alanine()));
        let snapshot = registry.all_monomers().cloned().collect::<Vec<_>>();
        assert!(!registry.add(&alanine()));
        assert_eq!(registry.all_monomers().cloned().collect::<Vec<_>>(), snapshot);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn first_write_wins() {
        let mut registry = MonomerRegistry::new();
        assert!(registry.add(&alanine()));
        let mut impostor = glycine();
        impostor.alternate_id = "a".to_owned();
        assert!(!registry.add(&impostor));
        assert_eq!(registry.get(PolymerType::Peptide, "A").unwrap().name, "Alanine");
        // The ignored monomer's structure isn't indexed either
        assert_eq!(registry.get_by_structure("[*:1]NCC([*:2])=O"), None);
    }

    #[test]
    fn stored_monomers_are_copies() {
        let mut registry = MonomerRegistry::new();
        let mut original = alanine();
        registry.add(&original);
        original.name = "Changed after adding".to_owned();

        let mut fetched = registry.get(PolymerType::Peptide, "A").cloned().unwrap();
        fetched.name = "Changed after fetching".to_owned();
        fetched.attachments.clear();

        let stored = registry.get(PolymerType::Peptide, "A").unwrap();
        assert_eq!(stored.name, "Alanine");
        assert_eq!(stored.attachments.len(), 2);
    }

    #[test]
    fn lookups_ignore_case() {
        let mut registry = MonomerRegistry::new();
        let mut selenocysteine = alanine();
        selenocysteine.alternate_id = "seC".to_owned();
        registry.add(&selenocysteine);
        assert!(registry.has(PolymerType::Peptide, "seC"));
        assert!(registry.has(PolymerType::Peptide, "SEC"));
        assert!(registry.has(PolymerType::Peptide, "sec"));
        assert!(!registry.has(PolymerType::Rna, "seC"));
        assert_eq!(registry.get(PolymerType::Peptide, "SeC").unwrap().alternate_id, "seC");
    }

    #[test]
    fn both_indexes_share_monomers() {
        let mut registry = MonomerRegistry::new();
        registry.add(&alanine());
        let by_id = registry.get(PolymerType::Peptide, "A").unwrap();
        let by_structure = registry.get_by_structure("C[C@H](N[*:1])C([*:2])=O").unwrap();
        assert!(std::ptr::eq(by_id, by_structure));

        let linker = Monomer::new(PolymerType::Chem, "Linker", "", MonomerType::Undefined);
        registry.add(&linker);
        assert!(registry.has(PolymerType::Chem, "Linker"));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.to_string(), "CHEM: 1 monomers\nPEPTIDE: 1 monomers\n1 distinct structures");
    }

    #[test]
    fn canonical_structure_keys() {
        let mut registry = MonomerRegistry::with_chemistry(Arc::new(Collapse));
        assert!(registry.add(&alanine()));
        assert!(registry.add(&glycine()));
        // Glycine collapses onto alanine's structure, so the structure index keeps the first
        assert_eq!(registry.get_by_structure("*").unwrap().alternate_id, "A");
        assert_eq!(registry.get(PolymerType::Peptide, "G").unwrap().smiles(), Some("*"));
        assert_eq!(registry.structure_key("CCO"), "*");
        assert_eq!(MonomerRegistry::new().structure_key("CCO"), "CCO");
    }

    #[test]
    fn add_new_marks_monomers() {
        let mut registry = MonomerRegistry::new();
        assert!(registry.add_new(&alanine()));
        assert!(registry.add(&glycine()));
        assert!(registry.get(PolymerType::Peptide, "A").unwrap().is_new);
        assert!(!registry.get(PolymerType::Peptide, "G").unwrap().is_new);
    }

    #[test]
    fn iteration_order() {
        let mut registry = MonomerRegistry::new();
        for id in ["b", "C", "a", "D"] {
            let mut monomer = glycine();
            monomer.alternate_id = id.to_owned();
            registry.add(&monomer);
        }
        registry.add(&Monomer::new(PolymerType::Chem, "Z", "", MonomerType::Undefined));

        let ids: Vec<_> = registry
            .all_of_type(PolymerType::Peptide)
            .map(|m| m.alternate_id.as_str())
            .collect();
        assert_eq!(ids, ["a", "b", "C", "D"]);

        let ids: Vec<_> = registry.all_monomers().map(|m| m.alternate_id.as_str()).collect();
        assert_eq!(ids, ["Z", "a", "b", "C", "D"]);
        assert_eq!(
            registry.polymer_types().collect::<Vec<_>>(),
            [PolymerType::Chem, PolymerType::Peptide]
        );
    }

    #[test]
    fn clear_empties_both_indexes() {
        let mut registry = MonomerRegistry::new();
        registry.add(&alanine());
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.get_by_structure("C[C@H](N[*:1])C([*:2])=O"), None);
        assert!(registry.add(&alanine()));
    }

    #[test]
    fn default_library() {
        let registry = &*DEFAULT_REGISTRY;
        for id in ["A", "C", "D", "G", "K", "X", "seC"] {
            assert!(registry.has(PolymerType::Peptide, id), "missing peptide {id}");
        }
        for id in ["R", "dR", "mR", "LR", "P", "sP", "A", "C", "G", "T", "U", "N", "5meC", "am6"] {
            assert!(registry.has(PolymerType::Rna, id), "missing nucleotide {id}");
        }
        for id in ["SMPEG2", "MCC", "SMCC", "PEG2", "EG"] {
            assert!(registry.has(PolymerType::Chem, id), "missing linker {id}");
        }
        assert!(!registry.has(PolymerType::Peptide, "Z"));
        assert_eq!(registry.get(PolymerType::Rna, "dR").unwrap().attachments.len(), 3);
    }
}
