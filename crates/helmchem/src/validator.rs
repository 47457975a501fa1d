// External Crate Imports
use itertools::Itertools;

// Local Crate Imports
use crate::{
    Attachment, BondOrder, ChemistryManipulator, Monomer, MonomerType, PolymerType, Result,
    attachment::{PAIR_LABEL, label_number},
    errors::{AttachmentError, AttachmentIssue, MonomerError, MonomerIssue},
    labels::{extract_labels, label_markers},
};

// Public API ==========================================================================================================

/// Checks that a monomer is structurally and chemically well-formed, stopping at the first problem found
pub fn validate_monomer(monomer: &Monomer, chemistry: &(impl ChemistryManipulator + ?Sized)) -> Result<()> {
    let error = |reason: MonomerIssue| Box::new(MonomerError::for_monomer(monomer, reason));
    let is_chemical = monomer.polymer_type.is_chemical();

    let consistent_type = match monomer.polymer_type {
        PolymerType::Chem => monomer.monomer_type == MonomerType::Undefined,
        _ => matches!(monomer.monomer_type, MonomerType::Backbone | MonomerType::Branch),
    };
    if !consistent_type {
        return Err(error(MonomerIssue::InconsistentMonomerType {
            polymer_type: monomer.polymer_type,
            monomer_type: monomer.monomer_type,
        }));
    }

    if monomer.alternate_id.trim().is_empty() {
        return Err(error(MonomerIssue::MissingId));
    }

    if !is_chemical {
        if monomer.smiles().is_none() {
            return Err(error(MonomerIssue::MissingStructure));
        }
        if monomer.attachments.is_empty() {
            return Err(error(MonomerIssue::MissingAttachments));
        }
    }

    if let Some(smiles) = monomer.smiles() {
        if !chemistry.validate_structure(smiles) {
            return Err(error(MonomerIssue::InvalidStructure));
        }

        let markers = label_markers(smiles);
        if let Some(duplicate) = markers.iter().duplicates().next() {
            return Err(error(MonomerIssue::DuplicateLabel(duplicate.clone())));
        }

        if markers.len() != monomer.attachments.len() {
            return Err(error(MonomerIssue::LabelCountMismatch {
                labels: markers.len(),
                attachments: monomer.attachments.len(),
            }));
        }
    }

    for attachment in &monomer.attachments {
        validate_attachment(&monomer.alternate_id, attachment, chemistry)
            .map_err(|e| error(MonomerIssue::Attachment(e)))?;
    }

    let labels = monomer.smiles().map(extract_labels).unwrap_or_default();
    if let Some(unmatched) = labels.iter().find(|label| {
        !monomer
            .attachments
            .iter()
            .any(|a| a.alternate_id.starts_with(label.as_str()))
    }) {
        return Err(error(MonomerIssue::UnmatchedLabel(unmatched.clone())));
    }

    if monomer.is_modified() {
        match monomer.natural_analog.as_deref().map(str::trim) {
            None | Some("") => return Err(error(MonomerIssue::MissingNaturalAnalog)),
            Some(analog) if !is_single_letter(analog) => {
                return Err(error(MonomerIssue::InvalidNaturalAnalog(analog.to_owned())));
            }
            Some(_) => (),
        }
    }

    if let Some(smiles) = monomer.smiles() {
        let molecule = chemistry
            .parse_structure(smiles)
            .map_err(|e| error(MonomerIssue::Chemistry(e)))?;
        for label in labels {
            let atom = label_number(&label)
                .and_then(|n| molecule.attachment_atom(n))
                .ok_or_else(|| error(MonomerIssue::AttachmentAtomNotFound(label.clone())))?;

            let bonds = molecule.bond_count(atom);
            if bonds != 1 {
                return Err(error(MonomerIssue::AttachmentAtomBonds { label, bonds }));
            }

            match molecule.bond_order(atom, 0) {
                Some(BondOrder::Single) => (),
                Some(order) => return Err(error(MonomerIssue::AttachmentBondOrder { label, order })),
                None => return Err(error(MonomerIssue::AttachmentAtomBonds { label, bonds: 0 })),
            }
        }
    }

    Ok(())
}

/// Checks a single attachment: its label, and a cap group structure carrying exactly that label
///
/// Monomer definitions only ever carry R-group labels. The [`PAIR_LABEL`] pseudo-label belongs to base-pairing
/// connections between polymers, and has no cap group, so it's rejected here like any other non-R label.
pub fn validate_attachment(
    monomer_id: &str,
    attachment: &Attachment,
    chemistry: &(impl ChemistryManipulator + ?Sized),
) -> Result<(), AttachmentError> {
    let error = |reason| AttachmentError::new(monomer_id, &attachment.alternate_id, reason);

    if attachment.label_number().is_none() {
        return Err(error(AttachmentIssue::InvalidLabel(attachment.label.clone())));
    }

    if !chemistry.validate_structure(&attachment.cap_group_smiles) {
        return Err(error(AttachmentIssue::InvalidCapStructure));
    }

    let cap_labels = label_markers(&attachment.cap_group_smiles);
    let [cap_label] = cap_labels.as_slice() else {
        return Err(error(AttachmentIssue::CapLabelCount(cap_labels.len())));
    };

    if cap_label != &attachment.label {
        return Err(error(AttachmentIssue::CapLabelMismatch {
            found: cap_label.clone(),
            expected: attachment.label.clone(),
        }));
    }

    Ok(())
}

fn is_single_letter(analog: &str) -> bool {
    let mut chars = analog.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_alphabetic())
}
