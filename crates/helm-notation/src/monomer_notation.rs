//! The recursive token tree that makes up the body of a polymer

use std::fmt::{self, Formatter};

use derive_more::{Display, From};
use itertools::Itertools;
use rust_decimal::Decimal;

/// One element of a polymer body, with the repeat and annotation that may follow it
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct MonomerNotation {
    pub token: Token,
    pub repeat: Option<Repeat>,
    pub annotation: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, From)]
pub enum Token {
    Single(MonomerRef),
    /// Monomers written back-to-back, like the sugar, base and phosphate of `R(A)P`
    Chain(Vec<ChainLink>),
    List(Vec<MonomerNotation>),
    Mixture(Mixture),
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ChainLink {
    pub monomer: MonomerRef,
    pub branched: bool,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Mixture {
    pub kind: MixtureKind,
    pub members: Vec<MixtureMember>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct MixtureMember {
    pub notation: MonomerNotation,
    pub ratio: Option<Ratio>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Display)]
pub enum MixtureKind {
    #[default]
    #[display(",")]
    Or,
    #[display("+")]
    And,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum MonomerRef {
    Id(String),
    Smiles(String),
    Wildcard(Wildcard),
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
pub enum Wildcard {
    #[display("?")]
    Unknown,
    #[display("_")]
    Gap,
    #[display("*")]
    Any,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Repeat {
    Count(u32),
    Range(u32, u32),
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Ratio {
    Value(Decimal),
    Range(Decimal, Decimal),
    Unknown,
}

// Public API ==========================================================================================================

impl MonomerNotation {
    #[must_use]
    pub fn new(token: Token) -> Self {
        Self {
            token,
            repeat: None,
            annotation: None,
        }
    }

    #[must_use]
    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = Some(repeat);
        self
    }

    #[must_use]
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }

    /// How many times this element occurs, taking the lower bound of repeat ranges
    #[must_use]
    pub fn multiplicity(&self) -> usize {
        match self.repeat {
            Some(Repeat::Count(n) | Repeat::Range(n, _)) => n as usize,
            None => 1,
        }
    }

    /// The number of leaf monomers this element expands to, saturating at `usize::MAX`
    #[must_use]
    pub fn monomer_count(&self) -> usize {
        self.count_where(&mut |_| true)
    }

    /// How many expanded positions hold a monomer matching `predicate`, saturating at `usize::MAX`
    pub fn count_where(&self, predicate: &mut dyn FnMut(&MonomerRef) -> bool) -> usize {
        self.count_once_where(predicate).saturating_mul(self.multiplicity())
    }

    fn count_once_where(&self, predicate: &mut dyn FnMut(&MonomerRef) -> bool) -> usize {
        match &self.token {
            Token::Single(monomer) => usize::from(predicate(monomer)),
            Token::Chain(links) => links.iter().filter(|l| predicate(&l.monomer)).count(),
            Token::List(elements) => elements
                .iter()
                .fold(0, |n, e| n.saturating_add(e.count_where(&mut *predicate))),
            Token::Mixture(mixture) => mixture
                .members
                .iter()
                .fold(0, |n, m| n.saturating_add(m.notation.count_where(&mut *predicate))),
        }
    }

    /// The monomer at a zero-based offset into this element's expanded positions
    ///
    /// Repeats are never expanded: the offset is reduced modulo the length of one repetition instead.
    #[must_use]
    pub fn monomer_at(&self, offset: usize) -> Option<&MonomerRef> {
        if offset >= self.monomer_count() {
            return None;
        }
        let offset = offset % self.count_once_where(&mut |_| true);
        match &self.token {
            Token::Single(monomer) => Some(monomer),
            Token::Chain(links) => links.get(offset).map(|l| &l.monomer),
            Token::List(elements) => monomer_in(elements.iter(), offset),
            Token::Mixture(mixture) => monomer_in(mixture.members.iter().map(|m| &m.notation), offset),
        }
    }

    /// The zero-based offset of the first monomer matching `predicate`, along with that monomer
    pub fn find_monomer(&self, predicate: &mut dyn FnMut(&MonomerRef) -> bool) -> Option<(usize, &MonomerRef)> {
        if self.multiplicity() == 0 {
            return None;
        }
        match &self.token {
            Token::Single(monomer) => predicate(monomer).then_some((0, monomer)),
            Token::Chain(links) => links
                .iter()
                .enumerate()
                .find(|(_, l)| predicate(&l.monomer))
                .map(|(i, l)| (i, &l.monomer)),
            Token::List(elements) => find_in(elements.iter(), predicate),
            Token::Mixture(mixture) => find_in(mixture.members.iter().map(|m| &m.notation), predicate),
        }
    }

    /// Each monomer reference written in this element, visited once regardless of repeats
    pub fn monomers(&self) -> Box<dyn Iterator<Item = &MonomerRef> + '_> {
        match &self.token {
            Token::Single(monomer) => Box::new(std::iter::once(monomer)),
            Token::Chain(links) => Box::new(links.iter().map(|l| &l.monomer)),
            Token::List(elements) => Box::new(elements.iter().flat_map(Self::monomers)),
            Token::Mixture(mixture) => Box::new(mixture.members.iter().flat_map(|m| m.notation.monomers())),
        }
    }

    /// Visits every monomer reference mutably, along with whether it sits in a branch
    pub fn for_each_monomer_mut(&mut self, f: &mut impl FnMut(&mut MonomerRef, bool)) {
        match &mut self.token {
            Token::Single(monomer) => f(monomer, false),
            Token::Chain(links) => {
                for link in links {
                    f(&mut link.monomer, link.branched);
                }
            }
            Token::List(elements) => {
                for element in elements {
                    element.for_each_monomer_mut(f);
                }
            }
            Token::Mixture(mixture) => {
                for member in &mut mixture.members {
                    member.notation.for_each_monomer_mut(f);
                }
            }
        }
    }
}

impl Token {
    /// Collapses a run of links into the simplest token that represents it
    pub(crate) fn from_links(mut links: Vec<ChainLink>) -> Self {
        if let [ChainLink { branched: false, .. }] = links.as_slice() {
            if let Some(link) = links.pop() {
                return Self::Single(link.monomer);
            }
        }
        Self::Chain(links)
    }
}

impl MonomerRef {
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    #[must_use]
    pub fn as_id(&self) -> Option<&str> {
        if let Self::Id(id) = self {
            Some(id)
        } else {
            None
        }
    }

    /// Case-insensitive, like the registry's keys
    #[must_use]
    pub fn is_id(&self, id: &str) -> bool {
        self.as_id().is_some_and(|own| own.eq_ignore_ascii_case(id))
    }
}

impl Wildcard {
    pub(crate) const fn from_char(c: char) -> Option<Self> {
        match c {
            '?' => Some(Self::Unknown),
            '_' => Some(Self::Gap),
            '*' => Some(Self::Any),
            _ => None,
        }
    }
}

impl MixtureKind {
    pub(crate) const fn from_char(c: char) -> Option<Self> {
        match c {
            ',' => Some(Self::Or),
            '+' => Some(Self::And),
            _ => None,
        }
    }
}

// Private Helper Functions ============================================================================================

fn monomer_in<'a>(
    elements: impl IntoIterator<Item = &'a MonomerNotation>,
    mut offset: usize,
) -> Option<&'a MonomerRef> {
    for element in elements {
        let count = element.monomer_count();
        if offset < count {
            return element.monomer_at(offset);
        }
        offset -= count;
    }
    None
}

fn find_in<'a>(
    elements: impl IntoIterator<Item = &'a MonomerNotation>,
    predicate: &mut dyn FnMut(&MonomerRef) -> bool,
) -> Option<(usize, &'a MonomerRef)> {
    let mut offset: usize = 0;
    for element in elements {
        if let Some((i, monomer)) = element.find_monomer(predicate) {
            return Some((offset.saturating_add(i), monomer));
        }
        offset = offset.saturating_add(element.monomer_count());
    }
    None
}

// HELM2 Serialization =================================================================================================

impl fmt::Display for MonomerNotation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token)?;
        if let Some(repeat) = self.repeat {
            write!(f, "'{repeat}'")?;
        }
        if let Some(annotation) = &self.annotation {
            write!(f, "\"{annotation}\"")?;
        }
        Ok(())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(monomer) => write!(f, "{monomer}"),
            Self::Chain(links) => links.iter().try_for_each(|link| {
                if link.branched {
                    write!(f, "({})", link.monomer)
                } else {
                    write!(f, "{}", link.monomer)
                }
            }),
            Self::List(elements) => write!(f, "({})", elements.iter().join(".")),
            Self::Mixture(mixture) => write!(f, "{mixture}"),
        }
    }
}

impl fmt::Display for Mixture {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let members = self.members.iter().map(|member| match member.ratio {
            Some(ratio) => format!("{}:{ratio}", member.notation),
            None => member.notation.to_string(),
        });
        write!(f, "({})", members.format(&self.kind.to_string()))
    }
}

impl fmt::Display for MonomerRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) if id.chars().count() == 1 => write!(f, "{id}"),
            Self::Id(id) | Self::Smiles(id) => write!(f, "[{id}]"),
            Self::Wildcard(wildcard) => write!(f, "{wildcard}"),
        }
    }
}

impl fmt::Display for Repeat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Range(min, max) => write!(f, "{min}-{max}"),
        }
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{value}"),
            Self::Range(min, max) => write!(f, "{min}-{max}"),
            Self::Unknown => write!(f, "?"),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn single(id: &str) -> MonomerNotation {
        MonomerNotation::new(Token::Single(MonomerRef::id(id)))
    }

    fn nucleotide(sugar: &str, base: &str, phosphate: &str) -> MonomerNotation {
        let link = |id: &str, branched| ChainLink {
            monomer: MonomerRef::id(id),
            branched,
        };
        MonomerNotation::new(Token::Chain(vec![
            link(sugar, false),
            link(base, true),
            link(phosphate, false),
        ]))
    }

    #[test]
    fn counting_monomers() {
        assert_eq!(single("A").monomer_count(), 1);
        assert_eq!(single("A").with_repeat(Repeat::Count(3)).monomer_count(), 3);
        assert_eq!(single("A").with_repeat(Repeat::Range(3, 7)).monomer_count(), 3);
        assert_eq!(nucleotide("R", "A", "P").monomer_count(), 3);

        let list = MonomerNotation::new(Token::List(vec![single("A"), single("X"), single("C")]));
        assert_eq!(list.with_repeat(Repeat::Count(4)).monomer_count(), 12);

        let mixture = MonomerNotation::new(Token::Mixture(Mixture {
            kind: MixtureKind::Or,
            members: vec![
                MixtureMember {
                    notation: single("A"),
                    ratio: Some(Ratio::Value(dec!(10))),
                },
                MixtureMember {
                    notation: nucleotide("R", "G", "P"),
                    ratio: None,
                },
            ],
        }));
        assert_eq!(mixture.monomer_count(), 4);
    }

    #[test]
    fn indexing_positions() {
        let repeated = MonomerNotation::new(Token::List(vec![single("A"), nucleotide("R", "C", "P")]))
            .with_repeat(Repeat::Count(2));
        let positions: Vec<_> = (0..9).map(|i| repeated.monomer_at(i).and_then(MonomerRef::as_id)).collect();
        assert_eq!(
            positions,
            [Some("A"), Some("R"), Some("C"), Some("P"), Some("A"), Some("R"), Some("C"), Some("P"), None]
        );
        assert_eq!(repeated.monomers().count(), 4);

        assert_eq!(repeated.find_monomer(&mut |m| m.is_id("c")), Some((2, &MonomerRef::id("C"))));
        assert_eq!(repeated.find_monomer(&mut |m| m.is_id("G")), None);
        assert_eq!(repeated.count_where(&mut |m| m.is_id("P")), 2);
    }

    #[test]
    fn huge_repeats_are_never_expanded() {
        let repeat = Repeat::Count(4_000_000_000);
        let nested = MonomerNotation::new(Token::List(vec![
            MonomerNotation::new(Token::List(vec![single("A").with_repeat(repeat)])).with_repeat(repeat),
        ]))
        .with_repeat(repeat);
        assert_eq!(nested.monomer_count(), usize::MAX);

        let long = MonomerNotation::new(Token::List(vec![single("G"), single("A")])).with_repeat(repeat);
        assert_eq!(long.monomer_count(), 8_000_000_000);
        assert_eq!(long.monomer_at(7_999_999_999), Some(&MonomerRef::id("A")));
        assert_eq!(long.monomer_at(7_999_999_998), Some(&MonomerRef::id("G")));
        assert_eq!(long.monomer_at(8_000_000_000), None);
    }

    #[test]
    fn links_collapse_to_singles() {
        let link = |id: &str, branched| ChainLink {
            monomer: MonomerRef::id(id),
            branched,
        };
        assert_eq!(Token::from_links(vec![link("P", false)]), Token::Single(MonomerRef::id("P")));
        assert!(matches!(Token::from_links(vec![link("A", true)]), Token::Chain(_)));
        assert!(matches!(
            Token::from_links(vec![link("R", false), link("P", false)]),
            Token::Chain(_)
        ));
    }

    #[test]
    fn serialization() {
        assert_eq!(nucleotide("dR", "A", "sP").to_string(), "[dR](A)[sP]");
        assert_eq!(
            single("W").with_annotation("mutation").with_repeat(Repeat::Range(3, 7)).to_string(),
            r#"W'3-7'"mutation""#
        );
        let smiles = MonomerNotation::new(Token::Single(MonomerRef::Smiles("C[C@H](N[*:1])C([*:2])=O".to_owned())));
        assert_eq!(smiles.to_string(), "[C[C@H](N[*:1])C([*:2])=O]");

        let mixture = Mixture {
            kind: MixtureKind::And,
            members: vec![
                MixtureMember {
                    notation: single("A"),
                    ratio: Some(Ratio::Unknown),
                },
                MixtureMember {
                    notation: single("G"),
                    ratio: Some(Ratio::Range(dec!(2.5), dec!(2.7))),
                },
            ],
        };
        assert_eq!(mixture.to_string(), "(A:?+G:2.5-2.7)");
        assert_eq!(MonomerRef::Wildcard(Wildcard::Gap).to_string(), "_");
    }
}
