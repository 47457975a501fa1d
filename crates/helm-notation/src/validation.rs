//! Consistency checks for a parsed [`HelmDocument`], each reporting only the first problem it finds

use ahash::{HashSet, HashSetExt};
use helmchem::{MonomerError, MonomerRegistry, PolymerType, extract_labels};
use log::debug;

use crate::{
    Endpoint, HelmDocument, Label, MonomerRef, PolymerNotation, PositionItem, Result,
    errors::{ConnectionIssue, HelmError},
};

/// An attachment point that a connection has used up
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
enum Claim {
    RGroup(u32),
    Pair,
}

// Public API ==========================================================================================================

impl HelmDocument {
    /// Runs every check, in order: unique ids, grouping, monomers, then connections
    pub fn validate(&self, registry: &MonomerRegistry) -> Result<()> {
        self.validate_unique_ids()
            .and_then(|()| self.validate_grouping())
            .and_then(|()| self.validate_monomers(registry))
            .and_then(|()| self.validate_connections(registry))
            .inspect_err(|e| debug!(reason:% = e; "rejected HELM document"))
    }

    /// Polymers and groups share a single namespace
    pub fn validate_unique_ids(&self) -> Result<()> {
        let mut seen = HashSet::new();
        match self.ids().find(|&id| !seen.insert(id)) {
            Some(id) => Err(Box::new(HelmError::DuplicateId { id: id.to_owned() })),
            None => Ok(()),
        }
    }

    /// Every group member must be a polymer, or a group that eventually resolves to polymers; groups may be
    /// referenced before they're declared, but never from inside themselves
    pub fn validate_grouping(&self) -> Result<()> {
        for group in &self.groups {
            let mut path = vec![group.id.as_str()];
            if let Some(member) = group.members.iter().find(|m| !self.resolves(&m.id, &mut path)) {
                return Err(Box::new(HelmError::Grouping {
                    group_id: group.id.clone(),
                    unresolved_member: member.id.clone(),
                }));
            }
        }
        Ok(())
    }

    /// Every monomer id must be in the registry for its polymer's type; wildcards, inline SMILES, and the free text
    /// of BLOBs are skipped
    pub fn validate_monomers(&self, registry: &MonomerRegistry) -> Result<()> {
        for polymer in self.polymers.iter().filter(|p| p.polymer_type != PolymerType::Blob) {
            let polymer_type = polymer.polymer_type;
            if let Some(id) = polymer
                .monomers()
                .filter_map(MonomerRef::as_id)
                .find(|id| !registry.has(polymer_type, id))
            {
                return Err(Box::new(MonomerError::not_in_registry(polymer_type, id).into()));
            }
        }
        Ok(())
    }

    /// Each endpoint must point at a real monomer with the named attachment point, and no attachment point can be
    /// used by more than one connection
    pub fn validate_connections(&self, registry: &MonomerRegistry) -> Result<()> {
        let mut claims = HashSet::new();
        for connection in &self.connections {
            for (id, endpoint) in [
                (&connection.source, &connection.source_end),
                (&connection.target, &connection.target_end),
            ] {
                self.validate_endpoint(registry, id, endpoint, &mut claims)?;
            }
        }
        Ok(())
    }
}

// Private Helper Methods ==============================================================================================

impl HelmDocument {
    fn resolves<'d>(&'d self, id: &'d str, path: &mut Vec<&'d str>) -> bool {
        if self.polymer(id).is_some() {
            return true;
        }
        let Some(group) = self.group(id) else {
            return false;
        };
        if path.contains(&id) {
            return false;
        }

        path.push(id);
        let resolved = group.members.iter().all(|m| self.resolves(&m.id, path));
        path.pop();
        resolved
    }

    fn validate_endpoint<'d>(
        &'d self,
        registry: &MonomerRegistry,
        id: &str,
        endpoint: &Endpoint,
        claims: &mut HashSet<(&'d str, usize, Claim)>,
    ) -> Result<()> {
        let fail = |reason| {
            Box::new(HelmError::Connection {
                polymer: id.to_owned(),
                position: endpoint.position.clone(),
                label: endpoint.label,
                reason,
            })
        };

        let Some(polymer) = self.polymer(id) else {
            // Connections to a whole group can't be checked any further
            return if self.group(id).is_some() {
                Ok(())
            } else {
                Err(fail(ConnectionIssue::UnknownPolymer))
            };
        };
        let Some(items) = endpoint.position.items() else {
            return Ok(());
        };

        // Positions are resolved arithmetically, so enormous repeats are never expanded
        let mut resolved = Vec::with_capacity(items.len());
        let mut ambiguous = false;
        for item in items {
            match item {
                PositionItem::Index(index) => {
                    let index = index as usize;
                    let Some(monomer) = polymer.monomer_at(index) else {
                        return Err(fail(ConnectionIssue::PositionOutOfRange {
                            count: polymer.monomer_count(),
                        }));
                    };
                    resolved.push((index, monomer));
                }
                PositionItem::Monomer(monomer_id) => {
                    let mut matches = |m: &MonomerRef| m.is_id(&monomer_id);
                    let Some((index, monomer)) = polymer.find_monomer(&mut matches) else {
                        return Err(fail(ConnectionIssue::MonomerNotInPolymer(monomer_id)));
                    };
                    ambiguous |= polymer.count_where(&mut matches) > 1;
                    resolved.push((index, monomer));
                }
            }
        }

        // Every occurrence of a monomer id shares its attachments, so checking the first is enough
        if let Some(label) = endpoint.label.r_group() {
            for &(_, monomer) in &resolved {
                check_attachment(registry, polymer, monomer, &label).map_err(fail)?;
            }
        }

        let claim = match endpoint.label {
            Label::R(number) => Some(Claim::RGroup(number)),
            Label::Pair => Some(Claim::Pair),
            Label::Wildcard(_) => None,
        };
        // Only an endpoint that resolves to a single monomer actually claims anything
        if let (Some(claim), &[(index, _)], false) = (claim, resolved.as_slice(), ambiguous) {
            if !claims.insert((polymer.id.as_str(), index, claim)) {
                return Err(fail(ConnectionIssue::DoubleOccupancy));
            }
        }
        Ok(())
    }
}

fn check_attachment(
    registry: &MonomerRegistry,
    polymer: &PolymerNotation,
    monomer: &MonomerRef,
    label: &str,
) -> Result<(), ConnectionIssue> {
    // The contents of a BLOB are opaque, so any attachment could be there
    if polymer.polymer_type == PolymerType::Blob {
        return Ok(());
    }
    match monomer {
        MonomerRef::Wildcard(_) => Ok(()),
        MonomerRef::Smiles(smiles) => {
            if extract_labels(smiles).iter().any(|l| l == label) {
                Ok(())
            } else {
                Err(ConnectionIssue::MissingAttachment(smiles.clone()))
            }
        }
        MonomerRef::Id(id) => {
            let monomer = registry
                .get(polymer.polymer_type, id)
                .ok_or_else(|| ConnectionIssue::UnknownMonomer(id.clone()))?;
            if monomer.has_attachment(label) {
                Ok(())
            } else {
                Err(ConnectionIssue::MissingAttachment(id.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, LazyLock};

    use helmchem::{SmilesReader, library::DEFAULT_KDL};

    use crate::{Position, errors::HelmError, parse};

    use super::*;

    static REGISTRY: LazyLock<MonomerRegistry> = LazyLock::new(|| {
        MonomerRegistry::from_kdl("monomer_library.kdl", DEFAULT_KDL, Arc::new(SmilesReader)).unwrap()
    });

    const CONJUGATE: &str = concat!(
        r#"PEPTIDE1{A.X.G.C.(_,N).(A:10,G:30,R:30).T.C.F.D.W"mutation".(A:?+G:1.5).C}"#,
        r#"|RNA1{R(A)P.(R(N)P)'4'.(R(G)P)'3-7'"mutation"}|CHEM1{?}|BLOB1{BEAD}"Animated Polystyrene""#,
        r#"$PEPTIDE1,BLOB1,X:R3-?:?"Specific Conjugation"|PEPTIDE1,CHEM1,(A+T):R3-?:?"#,
        r"|PEPTIDE1,PEPTIDE1,(4,8):pair-12:pair",
        r"$G1(PEPTIDE1:1+RNA1:2.5-2.7+BLOB1)|G2(G1:45,CHEM1:55)",
        r#"${"Name":"lipid nanoparticle with RNA payload and peptide ligand"}$V2.0"#
    );

    const TWO_PEPTIDES: &str = concat!(
        "PEPTIDE1{A.A.A.A.A.A.A.A.A.A.A.A.A.A.A.A.A.A.A.A.A.C.C.D.D.D.D.D.D.D.D.D.D.D.D.D.D.D.D.D.D.D.E.E.E.E.E.E.E.E",
        ".E.E.E.E.E.E.E.E.E.E.E.E.E.E.E}|PEPTIDE2{C.G.G.G.G.G.G.G.G.G.G.G.G.G.G.G.G.G.G.G.G.G.G.G.G.C.S.S.S.S.S.S.S.S",
        ".S.P.P.P.P.P.P.P.P.P.K.K.K.K.K.K.K.K.K.K.K.K.K}|CHEM1{[SMPEG2]}$"
    );

    fn document(text: &str) -> HelmDocument {
        parse(text).unwrap()
    }

    fn connection_issue(result: Result<()>) -> ConnectionIssue {
        match *result.unwrap_err() {
            HelmError::Connection { reason, .. } => reason,
            error => panic!("expected a connection error, but got {error:?}"),
        }
    }

    #[test]
    fn unique_ids() {
        assert!(document(CONJUGATE).validate_unique_ids().is_ok());

        let duplicate_group = CONJUGATE.replace("|G2(", "|G1(");
        assert_eq!(
            *document(&duplicate_group).validate_unique_ids().unwrap_err(),
            HelmError::DuplicateId { id: "G1".to_owned() }
        );

        let duplicate_polymer = "PEPTIDE1{A}|PEPTIDE1{C}$$$$V2.0";
        assert!(document(duplicate_polymer).validate_unique_ids().is_err());
    }

    #[test]
    fn grouping() {
        assert!(document(CONJUGATE).validate_grouping().is_ok());

        for (from, to, group, member) in [("CHEM1:55", "CHEM3:55", "G2", "CHEM3"), ("G1:45", "G3:45", "G2", "G3")] {
            let broken = CONJUGATE.replace(from, to);
            assert_eq!(
                *document(&broken).validate_grouping().unwrap_err(),
                HelmError::Grouping {
                    group_id: group.to_owned(),
                    unresolved_member: member.to_owned()
                }
            );
        }

        let forward_reference = "PEPTIDE1{A}|PEPTIDE2{C}$$G1(G2,PEPTIDE1)|G2(PEPTIDE2)$$V2.0";
        assert!(document(forward_reference).validate_grouping().is_ok());

        let cycle = "PEPTIDE1{A}$$G1(G2,PEPTIDE1)|G2(G1)$$V2.0";
        assert_eq!(
            *document(cycle).validate_grouping().unwrap_err(),
            HelmError::Grouping {
                group_id: "G1".to_owned(),
                unresolved_member: "G2".to_owned()
            }
        );
    }

    #[test]
    fn monomers() {
        let valid = CONJUGATE.replace("R(A)P.(R(N)P)", "[am6]P.(R(N)P)");
        assert!(document(&valid).validate_monomers(&REGISTRY).is_ok());

        for invalid in [
            valid.replacen("PEPTIDE1{A.", "PEPTIDE1{Z.", 1),
            valid.replace("(A:10,G:30,R:30)", "(A:10,Z:30,R:30)"),
        ] {
            let error = document(&invalid).validate_monomers(&REGISTRY).unwrap_err();
            assert_eq!(*error, HelmError::Monomer(MonomerError::not_in_registry(PolymerType::Peptide, "Z")));
        }

        // Lookups are case-insensitive, and SMILES, wildcards, and BLOBs are never looked up
        let document = document("PEPTIDE1{a.SEC.[CC(N[*:1])C([*:2])=O]._}|BLOB1{Anything}$$$$V2.0");
        assert!(document.validate_monomers(&REGISTRY).is_ok());
    }

    #[test]
    fn connections() {
        let repeated = document("PEPTIDE1{F.L.C'3'}|PEPTIDE2{C.D}$PEPTIDE2,PEPTIDE1,1:R3-4:R3$$$V2.0");
        assert!(repeated.validate_connections(&REGISTRY).is_ok());

        let valid = [
            "PEPTIDE1,CHEM1,C:R3-1:R1",
            "PEPTIDE1,PEPTIDE2,(C,D):R3-1:R3",
            "PEPTIDE1,CHEM1,(C,D):?-1:?",
            "PEPTIDE1,G1,C:R3-?:?",
        ];
        for connection in valid {
            let text = format!("{TWO_PEPTIDES}{connection}$G1(PEPTIDE2)$$V2.0");
            assert!(document(&text).validate_connections(&REGISTRY).is_ok(), "{connection}");
        }

        let invalid = [
            ("PEPTIDE1,CHEM1,G:R3-1:R1", ConnectionIssue::MonomerNotInPolymer("G".to_owned())),
            ("PEPTIDE1,CHEM1,(C,P):?-1:?", ConnectionIssue::MonomerNotInPolymer("P".to_owned())),
            ("PEPTIDE1,CHEM1,A:R3-1:R1", ConnectionIssue::MissingAttachment("A".to_owned())),
            ("PEPTIDE1,CHEM1,C:R3-1:R3", ConnectionIssue::MissingAttachment("SMPEG2".to_owned())),
            ("PEPTIDE1,CHEM1,C:R3-2:R1", ConnectionIssue::PositionOutOfRange { count: 1 }),
            ("PEPTIDE1,CHEM2,C:R3-1:R1", ConnectionIssue::UnknownPolymer),
            ("PEPTIDE1,PEPTIDE2,22:R3-1:R3|PEPTIDE2,CHEM1,1:R3-1:R1", ConnectionIssue::DoubleOccupancy),
        ];
        for (connection, issue) in invalid {
            let text = format!("{TWO_PEPTIDES}{connection}$$$V2.0");
            assert_eq!(connection_issue(document(&text).validate_connections(&REGISTRY)), issue, "{connection}");
        }
    }

    #[test]
    fn positions_inside_repeats() {
        let text = "PEPTIDE1{(A.G)'3'}|PEPTIDE2{C}$PEPTIDE1,PEPTIDE2,5:R1-1:R3$$$V2.0";
        assert!(document(text).validate(&REGISTRY).is_ok());
        assert_eq!(document(text).polymers[0].monomer_at(4), Some(&MonomerRef::id("G")));

        let past_the_end = text.replace("5:R1", "7:R1");
        assert_eq!(
            connection_issue(document(&past_the_end).validate_connections(&REGISTRY)),
            ConnectionIssue::PositionOutOfRange { count: 6 }
        );

        // Neither the count nor the position lookup expands the repeat
        let text = "PEPTIDE1{A'4000000000'}$PEPTIDE1,PEPTIDE1,1:R1-1:R2$$$V2.0";
        let huge = document(text);
        assert_eq!(huge.total_monomer_count(), 4_000_000_000);
        assert!(huge.validate(&REGISTRY).is_ok());
    }

    #[test]
    fn repeated_and_annotated_mixtures() {
        let text = r#"PEPTIDE1{A.(A:10,G:30,R:30)'4'"Group is repeated".C}$PEPTIDE1,PEPTIDE1,1:R1-14:R3$$$V2.0"#;
        let repeated = document(text);
        assert_eq!(repeated.polymers[0].monomer_count(), 14);
        assert!(repeated.validate_monomers(&REGISTRY).is_ok());
        assert!(repeated.validate(&REGISTRY).is_ok());

        let valid = CONJUGATE.replace("(A:10,G:30,R:30)", r#"(A:10,G:30,R:30)'4'"Group is repeated""#);
        let valid = valid.replace("R(A)P.(R(N)P)", "[am6]P.(R(N)P)");
        assert!(document(&valid).validate_monomers(&REGISTRY).is_ok());
    }

    #[test]
    fn connection_errors_name_the_endpoint() {
        let text = format!("{TWO_PEPTIDES}PEPTIDE1,CHEM1,C:R3-2:R1$$$V2.0");
        assert_eq!(
            *document(&text).validate_connections(&REGISTRY).unwrap_err(),
            HelmError::Connection {
                polymer: "CHEM1".to_owned(),
                position: Position::Index(2),
                label: Label::R(1),
                reason: ConnectionIssue::PositionOutOfRange { count: 1 }
            }
        );
    }

    #[test]
    fn inline_structures_and_blobs() {
        let text = concat!(
            "PEPTIDE1{A.C}|CHEM1{[*C(=O)CCC[*] |$_R1;;;;;;_R2$|]}|BLOB1{Bead}",
            "$PEPTIDE1,CHEM1,2:R3-1:R2|CHEM1,BLOB1,1:R1-1:R7$$$V2.0"
        );
        assert!(document(text).validate_connections(&REGISTRY).is_ok());

        let text = "PEPTIDE1{A.C}|CHEM1{[*C(=O)CCC[*:1]]}$PEPTIDE1,CHEM1,2:R3-1:R2$$$V2.0";
        assert_eq!(
            connection_issue(document(text).validate_connections(&REGISTRY)),
            ConnectionIssue::MissingAttachment("*C(=O)CCC[*:1]".to_owned())
        );
    }

    #[test]
    fn base_pairing() {
        let paired = concat!(
            "RNA1{[sP].R(C)[sP].R(U)P.R(G)P.R([dabA])P.R(G)P.R(A)P.R(G)P.R(G)P.[dR](G)P.R(U)}",
            "|RNA2{R(A)P.R(C)P.R(C)P.R(C)P.R(U)P.R(C)P.R(U)P.R(C)P.R(A)P.R(G)}",
            "$RNA1,RNA2,9:pair-23:pair|RNA1,RNA2,6:pair-26:pair|RNA1,RNA2,21:pair-11:pair|RNA1,RNA2,15:pair-17:pair",
            "|RNA1,RNA2,12:pair-20:pair|RNA1,RNA2,24:pair-8:pair|RNA1,RNA2,30:pair-2:pair|RNA1,RNA2,18:pair-14:pair",
            "|RNA1,RNA2,27:pair-5:pair|RNA1,RNA2,3:pair-29:pair$$$V2.0"
        );
        let document = document(paired);
        assert!(document.validate_connections(&REGISTRY).is_ok());
        assert!(document.validate(&REGISTRY).is_ok());

        let doubled = concat!(
            "RNA1{R(U)P.R(T)P.R(G)P.R(C)P.R(A)}|RNA2{R(U)P.R(G)P.R(C)P.R(A)P.R(A)}",
            "$RNA1,RNA2,14:pair-2:pair|RNA1,RNA2,11:pair-5:pair|RNA1,RNA2,2:pair-14:pair",
            "|RNA1,RNA2,8:pair-14:pair|RNA1,RNA2,5:pair-11:pair$$$V2.0"
        );
        assert_eq!(
            *parse(doubled).unwrap().validate_connections(&REGISTRY).unwrap_err(),
            HelmError::Connection {
                polymer: "RNA2".to_owned(),
                position: Position::Index(14),
                label: Label::Pair,
                reason: ConnectionIssue::DoubleOccupancy
            }
        );

        // A paired base can still be linked through its R-groups
        let linked = "RNA1{R(A)P.R(C)}|RNA2{R(G)P.R(U)}$RNA1,RNA2,2:pair-5:pair|RNA1,RNA2,2:R1-4:R3$$$V2.0";
        assert!(parse(linked).unwrap().validate_connections(&REGISTRY).is_ok());
    }

    #[test]
    fn validate_stops_at_the_first_failure() {
        let text = "PEPTIDE1{Z}|PEPTIDE1{A}$$$$V2.0";
        assert!(matches!(
            *document(text).validate(&REGISTRY).unwrap_err(),
            HelmError::DuplicateId { .. }
        ));

        let text = "PEPTIDE1{Z}$PEPTIDE1,PEPTIDE1,9:R1-1:R2$$$V2.0";
        assert!(matches!(
            *document(text).validate(&REGISTRY).unwrap_err(),
            HelmError::Monomer(_)
        ));
    }
}
