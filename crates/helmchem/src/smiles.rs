//! A small SMILES reader: enough of the language to find attachment atoms and inspect their bonds, without any
//! attempt at canonicalization

// External Crate Imports
use ahash::HashMap;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit0, digit1, one_of, satisfy, u32},
    combinator::{all_consuming, map, opt, recognize},
    multi::many0_count,
    sequence::{pair, preceded, tuple},
};

// Local Crate Imports
use crate::{
    BondOrder, ChemistryManipulator, MoleculeHandle,
    chemistry::AtomId,
    errors::ChemistryError,
};

// Public API ==========================================================================================================

/// The built-in [`ChemistryManipulator`], which reads SMILES (and the atom labels of CXSMILES extensions)
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct SmilesReader;

impl ChemistryManipulator for SmilesReader {
    fn parse_structure(&self, smiles: &str) -> Result<Box<dyn MoleculeHandle>, ChemistryError> {
        Ok(Box::new(Molecule::parse(smiles)?))
    }

    fn canonicalize(&self, _smiles: &str) -> Result<String, ChemistryError> {
        Err(ChemistryError::CanonicalizationUnsupported)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Molecule {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
}

impl Molecule {
    pub fn parse(smiles: &str) -> Result<Self, ChemistryError> {
        let (graph, extension) = match smiles.split_once(char::is_whitespace) {
            Some((graph, rest)) => (graph, Some(rest.trim_start())),
            None => (smiles, None),
        };

        let mut molecule = GraphBuilder::default().build(graph)?;
        if let Some(extension) = extension.filter(|e| e.starts_with('|')) {
            molecule.apply_atom_labels(extension)?;
        }
        Ok(molecule)
    }

    #[must_use]
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    #[must_use]
    pub fn bond_count_total(&self) -> usize {
        self.bonds.len()
    }

    #[must_use]
    pub fn symbol(&self, atom: AtomId) -> Option<&str> {
        self.atoms.get(atom).map(|a| a.symbol.as_str())
    }

    fn bonds_of(&self, atom: AtomId) -> impl Iterator<Item = &Bond> {
        self.bonds
            .iter()
            .filter(move |Bond { atoms: (a, b), .. }| *a == atom || *b == atom)
    }

    // CXSMILES atom labels live between a pair of `$`s, one `;`-separated entry per atom
    fn apply_atom_labels(&mut self, extension: &str) -> Result<(), ChemistryError> {
        let Some((_, rest)) = extension.split_once('$') else {
            return Ok(());
        };
        let labels = rest.split_once('$').map_or(rest, |(labels, _)| labels);

        for (atom, entry) in labels.split(';').enumerate() {
            let Some(number) = entry.strip_prefix("_R").and_then(|n| n.parse().ok()) else {
                continue;
            };
            let atoms = self.atoms.len();
            let target = self.atoms.get_mut(atom).ok_or(ChemistryError::ExtensionMismatch {
                labels: atom + 1,
                atoms,
            })?;
            target.label = Some(number);
        }
        Ok(())
    }
}

impl MoleculeHandle for Molecule {
    fn attachment_atom(&self, label: u32) -> Option<AtomId> {
        self.atoms
            .iter()
            .position(|a| a.label == Some(label))
            .or_else(|| self.atoms.iter().position(|a| a.map_number == Some(label)))
    }

    fn bond_count(&self, atom: AtomId) -> usize {
        self.bonds_of(atom).count()
    }

    fn bond_order(&self, atom: AtomId, n: usize) -> Option<BondOrder> {
        self.bonds_of(atom).nth(n).map(|b| b.order)
    }
}

// Private Types =======================================================================================================

#[derive(Clone, Eq, PartialEq, Debug)]
struct Atom {
    symbol: String,
    aromatic: bool,
    map_number: Option<u32>,
    label: Option<u32>,
}

impl Atom {
    fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_owned(),
            aromatic: symbol.starts_with(|c: char| c.is_ascii_lowercase()),
            map_number: None,
            label: None,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
struct Bond {
    atoms: (AtomId, AtomId),
    order: BondOrder,
}

#[derive(Default)]
struct GraphBuilder {
    molecule: Molecule,
    previous: Option<AtomId>,
    pending: Option<BondOrder>,
    branches: Vec<AtomId>,
    rings: HashMap<u32, (AtomId, Option<BondOrder>)>,
}

impl GraphBuilder {
    fn build(mut self, graph: &str) -> Result<Molecule, ChemistryError> {
        let syntax = |offset: usize| ChemistryError::Syntax {
            offset,
            found: graph[offset..].chars().next(),
        };

        let mut offset = 0;
        while let Some(c) = graph[offset..].chars().next() {
            let width = match c {
                '(' => {
                    let atom = self.previous.ok_or_else(|| syntax(offset))?;
                    self.branches.push(atom);
                    1
                }
                ')' => {
                    if self.pending.is_some() {
                        return Err(syntax(offset));
                    }
                    self.previous = Some(self.branches.pop().ok_or_else(|| syntax(offset))?);
                    1
                }
                '-' | '=' | '#' | '$' | ':' | '/' | '\\' => {
                    if self.pending.is_some() || self.previous.is_none() {
                        return Err(syntax(offset));
                    }
                    self.pending = Some(bond_order(c));
                    1
                }
                '.' => {
                    if self.pending.is_some() {
                        return Err(syntax(offset));
                    }
                    self.previous = None;
                    1
                }
                '0'..='9' => {
                    let number = c.to_digit(10).unwrap_or_default();
                    self.ring_bond(number).ok_or_else(|| syntax(offset))?;
                    1
                }
                '%' => {
                    let digits = graph.get(offset + 1..offset + 3).filter(|d| d.bytes().all(|b| b.is_ascii_digit()));
                    let number = digits.and_then(|d| d.parse().ok()).ok_or_else(|| syntax(offset))?;
                    self.ring_bond(number).ok_or_else(|| syntax(offset))?;
                    3
                }
                '[' => {
                    let close = graph[offset..].find(']').ok_or_else(|| syntax(graph.len()))?;
                    let content = &graph[offset + 1..offset + close];
                    let (_, atom) = all_consuming(bracket_atom)(content).map_err(|e| {
                        let rest = match e {
                            nom::Err::Error(e) | nom::Err::Failure(e) => e.input.len(),
                            nom::Err::Incomplete(_) => 0,
                        };
                        syntax(offset + 1 + content.len() - rest)
                    })?;
                    self.add_atom(atom);
                    close + 1
                }
                _ => {
                    let symbol = organic_symbol(&graph[offset..]).ok_or_else(|| syntax(offset))?;
                    self.add_atom(Atom::new(symbol));
                    symbol.len()
                }
            };
            offset += width;
        }

        if self.pending.is_some() {
            return Err(syntax(graph.len()));
        }
        if !self.branches.is_empty() {
            return Err(ChemistryError::UnclosedBranch);
        }
        if let Some(&ring) = self.rings.keys().min() {
            return Err(ChemistryError::UnclosedRing(ring));
        }
        if self.molecule.atoms.is_empty() {
            return Err(ChemistryError::Empty);
        }
        Ok(self.molecule)
    }

    fn add_atom(&mut self, atom: Atom) {
        let id = self.molecule.atoms.len();
        self.molecule.atoms.push(atom);
        if let Some(previous) = self.previous {
            let order = self.pending.take();
            self.bond(previous, id, order);
        }
        self.previous = Some(id);
    }

    fn ring_bond(&mut self, number: u32) -> Option<()> {
        let atom = self.previous?;
        let order = self.pending.take();
        if let Some((other, opening_order)) = self.rings.remove(&number) {
            self.bond(other, atom, order.or(opening_order));
        } else {
            self.rings.insert(number, (atom, order));
        }
        Some(())
    }

    fn bond(&mut self, a: AtomId, b: AtomId, order: Option<BondOrder>) {
        let atoms = &self.molecule.atoms;
        let order = order.unwrap_or(if atoms[a].aromatic && atoms[b].aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        });
        self.molecule.bonds.push(Bond {
            atoms: (a, b),
            order,
        });
    }
}

const fn bond_order(c: char) -> BondOrder {
    match c {
        '=' => BondOrder::Double,
        '#' => BondOrder::Triple,
        '$' => BondOrder::Quadruple,
        ':' => BondOrder::Aromatic,
        '/' | '\\' => BondOrder::Stereo,
        _ => BondOrder::Single,
    }
}

/// Organic Symbol = "Cl" | "Br" | "B" | "C" | "N" | "O" | "P" | "S" | "F" | "I"
///   | "b" | "c" | "n" | "o" | "p" | "s" | "*" ;
fn organic_symbol(i: &str) -> Option<&str> {
    ["Cl", "Br", "B", "C", "N", "O", "P", "S", "F", "I", "b", "c", "n", "o", "p", "s", "*"]
        .into_iter()
        .find(|symbol| i.starts_with(symbol))
}

/// Bracket Atom = [ Isotope ] , Symbol , { "@" } , [ "H" , digits ] , [ Charge ] , [ ":" , Map Number ] ;
fn bracket_atom(i: &str) -> IResult<&str, Atom> {
    let isotope = digit0;
    let chirality = many0_count(char('@'));
    let hydrogens = opt(pair(char('H'), digit0));
    let charge = opt(pair(one_of("+-"), alt((digit1, recognize(many0_count(one_of("+-")))))));
    let map_number = opt(preceded(char(':'), u32));
    map(
        tuple((isotope, element_symbol, chirality, hydrogens, charge, map_number)),
        |(_, symbol, _, _, _, map_number)| Atom {
            map_number,
            ..Atom::new(symbol)
        },
    )(i)
}

/// Element Symbol = "*" | "se" | "as" | "b" | "c" | "n" | "o" | "p" | "s" | uppercase , [ lowercase ] ;
fn element_symbol(i: &str) -> IResult<&str, &str> {
    let aromatic = alt((tag("se"), tag("as"), recognize(one_of("bcnops"))));
    let element = recognize(pair(
        satisfy(|c| c.is_ascii_uppercase()),
        opt(satisfy(|c| c.is_ascii_lowercase())),
    ));
    alt((tag("*"), aromatic, element))(i)
}
