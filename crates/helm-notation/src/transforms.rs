//! In-place edits of a [`HelmDocument`]: renaming monomers, merging documents, and registering inline structures

use std::collections::hash_map::Entry;

use ahash::{HashMap, HashMapExt, HashSet};
use helmchem::{
    Attachment, ChemistryManipulator, Monomer, MonomerRegistry, MonomerType, PolymerType, attachment::label_number,
    extract_labels, validate_monomer,
};
use log::debug;

use crate::{HelmDocument, MonomerRef, Position, PositionItem, Result, errors::HelmError};

// Public API ==========================================================================================================

impl HelmDocument {
    /// Renames every reference to `old_id` in polymers of `polymer_type`, returning how many were replaced
    ///
    /// Monomer positions in the connections of those polymers are renamed too, but aren't counted.
    pub fn replace_monomer(&mut self, polymer_type: PolymerType, old_id: &str, new_id: &str) -> usize {
        let mut replaced = 0;
        let mut renamed_polymers = HashSet::default();
        for polymer in self.polymers.iter_mut().filter(|p| p.polymer_type == polymer_type) {
            for element in &mut polymer.elements {
                element.for_each_monomer_mut(&mut |monomer, _| {
                    if monomer.is_id(old_id) {
                        *monomer = MonomerRef::id(new_id);
                        replaced += 1;
                    }
                });
            }
            renamed_polymers.insert(polymer.id.clone());
        }

        for connection in &mut self.connections {
            for (id, endpoint) in [
                (&connection.source, &mut connection.source_end),
                (&connection.target, &mut connection.target_end),
            ] {
                if renamed_polymers.contains(id) {
                    endpoint.position.rename_monomer(old_id, new_id);
                }
            }
        }
        replaced
    }

    /// Appends `other` to this document
    ///
    /// Incoming polymer and group ids that are already taken get the next free number for their prefix (so a second
    /// `PEPTIDE1` might become `PEPTIDE3`), and every reference to them is updated. Existing annotations win over
    /// incoming ones.
    pub fn combine(&mut self, mut other: Self) {
        let mut taken: HashSet<String> = self.ids().map(str::to_owned).collect();
        let mut renames = HashMap::new();
        for id in other.ids() {
            if taken.contains(id) {
                let new_id = next_free_id(id, &taken);
                renames.insert(id.to_owned(), new_id.clone());
                taken.insert(new_id);
            } else {
                taken.insert(id.to_owned());
            }
        }

        let rename = |id: &mut String| {
            if let Some(new_id) = renames.get(id) {
                id.clone_from(new_id);
            }
        };
        for polymer in &mut other.polymers {
            rename(&mut polymer.id);
        }
        for group in &mut other.groups {
            rename(&mut group.id);
            for member in &mut group.members {
                rename(&mut member.id);
            }
        }
        for connection in &mut other.connections {
            rename(&mut connection.source);
            rename(&mut connection.target);
        }

        self.polymers.append(&mut other.polymers);
        self.connections.append(&mut other.connections);
        self.groups.append(&mut other.groups);
        for (key, value) in other.annotations {
            self.annotations.entry(key).or_insert(value);
        }
        if self.annotation_text.is_none() {
            self.annotation_text = other.annotation_text;
        }
    }

    /// Swaps every inline SMILES for the id of a registered monomer, returning the number of references replaced
    ///
    /// Structures that the registry already knows reuse that monomer. Anything else is validated and registered as a
    /// new monomer with a temporary id (`PM#1`, `NM#1`, `CM#1`, ...) and hydrogen caps on each of its R-groups. Every
    /// new structure is validated before any of them are registered, so on error the registry is left untouched.
    pub fn replace_smiles_with_temporary_ids(
        &mut self,
        registry: &mut MonomerRegistry,
        chemistry: &(impl ChemistryManipulator + ?Sized),
    ) -> Result<usize> {
        let mut ids = HashMap::new();
        let mut pending = Vec::new();
        for polymer in self.polymers.iter_mut().filter(|p| p.polymer_type != PolymerType::Blob) {
            let mut structures = Vec::new();
            for element in &mut polymer.elements {
                element.for_each_monomer_mut(&mut |monomer, branched| {
                    if let MonomerRef::Smiles(smiles) = monomer {
                        structures.push((smiles.clone(), branched));
                    }
                });
            }

            for (smiles, branched) in structures {
                if let Entry::Vacant(slot) = ids.entry((polymer.polymer_type, smiles)) {
                    let (polymer_type, smiles) = slot.key();
                    let id = plan_structure(registry, &mut pending, chemistry, *polymer_type, smiles, branched)?;
                    slot.insert(id);
                }
            }
        }

        for PendingMonomer { monomer, .. } in &pending {
            debug!(
                polymer_type:% = monomer.polymer_type, id = monomer.alternate_id.as_str();
                "registering an inline structure"
            );
            registry.add_new(monomer);
        }

        let mut replaced = 0;
        for polymer in &mut self.polymers {
            let polymer_type = polymer.polymer_type;
            for element in &mut polymer.elements {
                element.for_each_monomer_mut(&mut |monomer, _| {
                    let id = match monomer {
                        MonomerRef::Smiles(smiles) => ids.get(&(polymer_type, smiles.clone())).cloned(),
                        _ => None,
                    };
                    if let Some(id) = id {
                        *monomer = MonomerRef::Id(id);
                        replaced += 1;
                    }
                });
            }
        }
        Ok(replaced)
    }
}

// Private Helper Functions ============================================================================================

impl Position {
    fn rename_monomer(&mut self, old_id: &str, new_id: &str) {
        match self {
            Self::Monomer(id) if id.eq_ignore_ascii_case(old_id) => *id = new_id.to_owned(),
            Self::Set { items, .. } => {
                for item in items {
                    if let PositionItem::Monomer(id) = item {
                        if id.eq_ignore_ascii_case(old_id) {
                            *id = new_id.to_owned();
                        }
                    }
                }
            }
            _ => (),
        }
    }
}

/// `PEPTIDE1` is split into `PEPTIDE` and `1`, then renumbered past the highest `PEPTIDE` id taken so far
fn next_free_id(id: &str, taken: &HashSet<String>) -> String {
    let prefix = id.trim_end_matches(|c: char| c.is_ascii_digit());
    let highest = taken
        .iter()
        .filter_map(|taken| taken.strip_prefix(prefix)?.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{prefix}{}", highest + 1)
}

/// A validated inline structure, waiting to be added to the registry
struct PendingMonomer {
    structure: String,
    monomer: Monomer,
}

/// Finds the id for an inline structure, validating a new monomer for it (and queueing it in `pending`) if neither the
/// registry nor `pending` already has that structure
fn plan_structure(
    registry: &MonomerRegistry,
    pending: &mut Vec<PendingMonomer>,
    chemistry: &(impl ChemistryManipulator + ?Sized),
    polymer_type: PolymerType,
    smiles: &str,
    branched: bool,
) -> Result<String> {
    let structure = registry.structure_key(smiles);
    let known = registry
        .get_by_structure(&structure)
        .filter(|m| m.polymer_type == polymer_type)
        .or_else(|| {
            pending
                .iter()
                .find(|p| p.monomer.polymer_type == polymer_type && p.structure == structure)
                .map(|p| &p.monomer)
        });
    if let Some(known) = known {
        return Ok(known.alternate_id.clone());
    }

    let (prefix, monomer_type, natural_analog) = match polymer_type {
        PolymerType::Peptide => ("PM", MonomerType::Backbone, Some("X")),
        PolymerType::Rna if branched => ("NM", MonomerType::Branch, Some("N")),
        PolymerType::Rna => ("NM", MonomerType::Backbone, Some("N")),
        PolymerType::Chem | PolymerType::Blob => ("CM", MonomerType::Undefined, None),
    };
    let taken = |id: &str| {
        registry.has(polymer_type, id)
            || pending
                .iter()
                .any(|p| p.monomer.polymer_type == polymer_type && p.monomer.alternate_id.eq_ignore_ascii_case(id))
    };
    let mut number = 1;
    while taken(&format!("{prefix}#{number}")) {
        number += 1;
    }
    let id = format!("{prefix}#{number}");

    let mut monomer = Monomer::new(polymer_type, &id, &id, monomer_type).with_smiles(smiles);
    monomer.natural_analog = natural_analog.map(str::to_owned);
    monomer.attachments = extract_labels(smiles)
        .iter()
        .filter_map(|label| label_number(label))
        .map(Attachment::hydrogen)
        .collect();
    validate_monomer(&monomer, chemistry).map_err(|e| Box::new(HelmError::Monomer(*e)))?;

    pending.push(PendingMonomer { structure, monomer });
    Ok(id)
}
