use std::{
    collections::BTreeMap,
    fmt::{self, Formatter},
};

use helmchem::{PolymerType, attachment::PAIR_LABEL};
use itertools::Itertools;

use crate::{MixtureKind, MonomerNotation, MonomerRef, Ratio, Wildcard};

/// The only version of the notation this crate reads and writes
pub const HELM_VERSION: &str = "V2.0";

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct HelmDocument {
    pub polymers: Vec<PolymerNotation>,
    pub connections: Vec<ConnectionNotation>,
    pub groups: Vec<GroupNotation>,
    pub annotations: BTreeMap<String, String>,
    /// The extra section, kept verbatim when it isn't a flat `{"key":"value"}` object
    pub annotation_text: Option<String>,
    pub version: String,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct PolymerNotation {
    pub id: String,
    pub polymer_type: PolymerType,
    pub elements: Vec<MonomerNotation>,
    pub annotation: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ConnectionNotation {
    pub source: String,
    pub target: String,
    pub source_end: Endpoint,
    pub target_end: Endpoint,
    pub annotation: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Endpoint {
    pub position: Position,
    pub label: Label,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum Position {
    Index(u32),
    Monomer(String),
    Wildcard(Wildcard),
    Set { kind: MixtureKind, items: Vec<PositionItem> },
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum PositionItem {
    Index(u32),
    Monomer(String),
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Label {
    R(u32),
    /// The hydrogen-bonding pseudo-label used between paired bases
    Pair,
    Wildcard(Wildcard),
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct GroupNotation {
    pub id: String,
    pub kind: MixtureKind,
    pub members: Vec<GroupMember>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct GroupMember {
    pub id: String,
    pub ratio: Option<Ratio>,
}

// Public API ==========================================================================================================

impl Default for HelmDocument {
    fn default() -> Self {
        Self {
            polymers: Vec::new(),
            connections: Vec::new(),
            groups: Vec::new(),
            annotations: BTreeMap::new(),
            annotation_text: None,
            version: HELM_VERSION.to_owned(),
        }
    }
}

impl HelmDocument {
    #[must_use]
    pub fn polymer(&self, id: &str) -> Option<&PolymerNotation> {
        self.polymers.iter().find(|p| p.id == id)
    }

    #[must_use]
    pub fn group(&self, id: &str) -> Option<&GroupNotation> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Polymer ids, then group ids, in document order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        let polymers = self.polymers.iter().map(|p| p.id.as_str());
        polymers.chain(self.groups.iter().map(|g| g.id.as_str()))
    }

    /// The number of leaf monomers across every polymer, with repeats expanded to their lower bound
    #[must_use]
    pub fn total_monomer_count(&self) -> usize {
        self.polymers.iter().fold(0, |n, p| n.saturating_add(p.monomer_count()))
    }
}

impl PolymerNotation {
    #[must_use]
    pub fn new(id: impl Into<String>, polymer_type: PolymerType) -> Self {
        Self {
            id: id.into(),
            polymer_type,
            elements: Vec::new(),
            annotation: None,
        }
    }

    /// Saturates at `usize::MAX` rather than overflowing on enormous repeats
    #[must_use]
    pub fn monomer_count(&self) -> usize {
        self.count_where(&mut |_| true)
    }

    pub fn count_where(&self, predicate: &mut dyn FnMut(&MonomerRef) -> bool) -> usize {
        self.elements
            .iter()
            .fold(0, |n, e| n.saturating_add(e.count_where(&mut *predicate)))
    }

    /// The monomer at a connection position, counting from 1 with repeats expanded
    #[must_use]
    pub fn monomer_at(&self, position: usize) -> Option<&MonomerRef> {
        let mut offset = position.checked_sub(1)?;
        for element in &self.elements {
            let count = element.monomer_count();
            if offset < count {
                return element.monomer_at(offset);
            }
            offset -= count;
        }
        None
    }

    /// The first position (counting from 1) holding a monomer that matches `predicate`, along with that monomer
    pub fn find_monomer(&self, predicate: &mut dyn FnMut(&MonomerRef) -> bool) -> Option<(usize, &MonomerRef)> {
        let mut offset: usize = 1;
        for element in &self.elements {
            if let Some((i, monomer)) = element.find_monomer(predicate) {
                return Some((offset.saturating_add(i), monomer));
            }
            offset = offset.saturating_add(element.monomer_count());
        }
        None
    }

    pub fn monomers(&self) -> impl Iterator<Item = &MonomerRef> {
        self.elements.iter().flat_map(MonomerNotation::monomers)
    }
}

impl Endpoint {
    #[must_use]
    pub const fn new(position: Position, label: Label) -> Self {
        Self { position, label }
    }
}

impl Position {
    /// The positions this one could stand for, or `None` for a wildcard
    pub(crate) fn items(&self) -> Option<Vec<PositionItem>> {
        match self {
            Self::Index(index) => Some(vec![PositionItem::Index(*index)]),
            Self::Monomer(id) => Some(vec![PositionItem::Monomer(id.clone())]),
            Self::Wildcard(_) => None,
            Self::Set { items, .. } => Some(items.clone()),
        }
    }
}

impl Label {
    /// The `R`-label this names, if it names one
    #[must_use]
    pub fn r_group(&self) -> Option<String> {
        if let Self::R(n) = self {
            Some(format!("R{n}"))
        } else {
            None
        }
    }
}

// HELM2 Serialization =================================================================================================

impl fmt::Display for HelmDocument {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let extra = if self.annotations.is_empty() {
            self.annotation_text.clone().unwrap_or_default()
        } else {
            let pairs = self.annotations.iter().map(|(k, v)| format!("\"{k}\":\"{v}\""));
            format!("{{{}}}", pairs.format(","))
        };
        write!(
            f,
            "{}${}${}${extra}${}",
            self.polymers.iter().join("|"),
            self.connections.iter().join("|"),
            self.groups.iter().join("|"),
            self.version
        )
    }
}

impl fmt::Display for PolymerNotation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{{}}}", self.id, self.elements.iter().join("."))?;
        if let Some(annotation) = &self.annotation {
            write!(f, "\"{annotation}\"")?;
        }
        Ok(())
    }
}

impl fmt::Display for ConnectionNotation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}-{}", self.source, self.target, self.source_end, self.target_end)?;
        if let Some(annotation) = &self.annotation {
            write!(f, "\"{annotation}\"")?;
        }
        Ok(())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.position, self.label)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Monomer(id) => write_position_id(f, id),
            Self::Wildcard(wildcard) => write!(f, "{wildcard}"),
            Self::Set { kind, items } => write!(f, "({})", items.iter().format(&kind.to_string())),
        }
    }
}

impl fmt::Display for PositionItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Monomer(id) => write_position_id(f, id),
        }
    }
}

fn write_position_id(f: &mut Formatter<'_>, id: &str) -> fmt::Result {
    let bare = id.starts_with(|c: char| c.is_ascii_alphabetic()) && id.chars().all(|c| c.is_ascii_alphanumeric());
    if bare { write!(f, "{id}") } else { write!(f, "[{id}]") }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::R(n) => write!(f, "R{n}"),
            Self::Pair => f.write_str(PAIR_LABEL),
            Self::Wildcard(wildcard) => write!(f, "{wildcard}"),
        }
    }
}

impl fmt::Display for GroupNotation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.id, self.members.iter().format(&self.kind.to_string()))
    }
}

impl fmt::Display for GroupMember {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        if let Some(ratio) = self.ratio {
            write!(f, ":{ratio}")?;
        }
        Ok(())
    }
}
