use std::sync::Arc;

use divan::{AllocProfiler, black_box};
use helmchem::{
    MonomerLibrary, MonomerRegistry, PolymerType, SmilesReader, extract_labels, library::DEFAULT_KDL,
    validate_monomer,
};
use once_cell::sync::Lazy;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

const STRUCTURES: [&str; 4] = [
    "C[C@H](N[*:1])C([*:2])=O",
    "[*:1]N[C@@H](Cc1c[nH]c2ccccc12)C([*:2])=O",
    "[*]OC[C@H]1O[C@@H]([*])[C@H](O)[C@@H]1O[*] |$_R1;;;;;;_R3;;;;;_R2$|",
    "O=C(ON1C(=O)CCC1=O)[C@H]1CC[C@@H](CN2C(=O)CC([*:1])C2=O)CC1",
];

static LIBRARY: Lazy<MonomerLibrary> =
    Lazy::new(|| MonomerLibrary::new("monomer_library.kdl", DEFAULT_KDL, &SmilesReader).unwrap());

static REGISTRY: Lazy<MonomerRegistry> = Lazy::new(|| {
    let mut registry = MonomerRegistry::with_chemistry(Arc::new(SmilesReader));
    for monomer in &LIBRARY.monomers {
        registry.add(monomer);
    }
    registry
});

fn main() {
    Lazy::force(&LIBRARY);
    Lazy::force(&REGISTRY);
    divan::main();
}

#[divan::bench]
fn load_monomer_library() -> MonomerLibrary {
    MonomerLibrary::new("monomer_library.kdl", DEFAULT_KDL, &SmilesReader).unwrap()
}

#[divan::bench]
fn validate_library_monomers() {
    for monomer in &LIBRARY.monomers {
        black_box(validate_monomer(monomer, &SmilesReader).unwrap());
    }
}

#[divan::bench]
fn extract_structure_labels() {
    for smiles in STRUCTURES {
        black_box(extract_labels(smiles));
    }
}

#[divan::bench(args = ["A", "seC", "SEC", "Z"])]
fn registry_lookup(id: &str) -> bool {
    REGISTRY.has(PolymerType::Peptide, id)
}
