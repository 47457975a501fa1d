//! A character-driven state machine turning HELM2 text into a [`HelmDocument`]

mod primitives;

use std::mem;

use helmchem::PolymerType;
use log::trace;

use crate::{
    ChainLink, HELM_VERSION, HelmDocument, Mixture, MixtureKind, MixtureMember, MonomerNotation, MonomerRef,
    PolymerNotation, Ratio, Result, Token, Wildcard,
    errors::{HelmError, ParseError, ParseErrorKind, Section, SectionIssue},
};

use primitives::{LeafResult, parse_item};

/// Parses a complete HELM2 document, failing at the first character that can't extend the notation read so far
pub fn parse(text: &str) -> Result<HelmDocument> {
    let mut parser = Parser::new(text);
    for (offset, c) in text.char_indices() {
        while let Flow::Reprocess = parser.step(offset, c)? {}
    }
    parser.finish()
}

// Parser State ========================================================================================================

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum State {
    SectionPolymers,
    PolymerId { start: usize },
    ElementStart,
    MonomerToken { start: usize },
    StructureBlob {
        open: usize,
        depth: u32,
        extension: bool,
        branch: Option<usize>,
    },
    Branch { open: usize },
    BranchClose { open: usize },
    AfterElement,
    RepeatSpec { start: usize },
    Ratio { start: usize },
    QuotedAnnotation { start: usize, target: Annotated },
    PolymerEnd,
    FlatSection {
        section: Section,
        start: usize,
        quote: Option<usize>,
    },
    VersionTag { start: usize },
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Annotated {
    Element,
    Polymer,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Flow {
    Advance,
    Reprocess,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Separator {
    List,
    Mixture(MixtureKind),
}

impl Separator {
    const fn from_char(c: char) -> Option<Self> {
        match c {
            '.' => Some(Self::List),
            ',' => Some(Self::Mixture(MixtureKind::Or)),
            '+' => Some(Self::Mixture(MixtureKind::And)),
            _ => None,
        }
    }

    const fn as_char(self) -> char {
        match self {
            Self::List => '.',
            Self::Mixture(MixtureKind::Or) => ',',
            Self::Mixture(MixtureKind::And) => '+',
        }
    }
}

/// An open `(`, collecting elements until it's closed
#[derive(Debug)]
struct Frame {
    open: usize,
    separator: Option<Separator>,
    items: Vec<(MonomerNotation, Option<Ratio>)>,
}

struct Parser<'t> {
    text: &'t str,
    state: State,
    document: HelmDocument,
    polymer: Option<PolymerNotation>,
    body_open: usize,
    links: Vec<ChainLink>,
    pending: Option<MonomerNotation>,
    pending_ratio: Option<Ratio>,
    frames: Vec<Frame>,
}

// State Transitions ===================================================================================================

impl<'t> Parser<'t> {
    fn new(text: &'t str) -> Self {
        Self {
            text,
            state: State::SectionPolymers,
            document: HelmDocument::default(),
            polymer: None,
            body_open: 0,
            links: Vec::new(),
            pending: None,
            pending_ratio: None,
            frames: Vec::new(),
        }
    }

    fn step(&mut self, offset: usize, c: char) -> Result<Flow> {
        let text = self.text;
        match self.state {
            State::SectionPolymers => {
                if !c.is_ascii_uppercase() {
                    return Err(error(text, offset, ParseErrorKind::ExpectedPolymerId));
                }
                self.state = State::PolymerId { start: offset };
            }
            State::PolymerId { start } => {
                if c.is_ascii_alphanumeric() {
                    return Ok(Flow::Advance);
                }
                let id = &text[start..offset];
                let polymer_type = leaf(text, primitives::polymer_id, start, id)?;
                if c != '{' {
                    return Err(error(text, offset, ParseErrorKind::ExpectedPolymerBody));
                }
                self.polymer = Some(PolymerNotation::new(id, polymer_type));
                self.body_open = offset;
                self.state = State::ElementStart;
            }
            State::ElementStart => self.element_start(offset, c)?,
            State::MonomerToken { start } => {
                if c.is_ascii_alphanumeric() {
                    return Ok(Flow::Advance);
                }
                self.links.push(link(MonomerRef::id(&text[start..offset]), false));
                self.state = State::AfterElement;
                return Ok(Flow::Reprocess);
            }
            State::StructureBlob {
                open,
                depth,
                extension,
                branch,
            } => self.structure_blob(offset, c, open, depth, extension, branch)?,
            State::Branch { open } => {
                let monomer = match c {
                    '[' => {
                        self.state = State::StructureBlob {
                            open: offset,
                            depth: 1,
                            extension: false,
                            branch: Some(open),
                        };
                        return Ok(Flow::Advance);
                    }
                    c if c.is_ascii_alphabetic() => MonomerRef::id(c),
                    c => Wildcard::from_char(c)
                        .map(MonomerRef::Wildcard)
                        .ok_or_else(|| error(text, offset, ParseErrorKind::ExpectedBranchMonomer))?,
                };
                self.links.push(link(monomer, true));
                self.state = State::BranchClose { open };
            }
            State::BranchClose { .. } => {
                if c != ')' {
                    return Err(error(text, offset, ParseErrorKind::ExpectedBranchClose));
                }
                self.state = State::AfterElement;
            }
            State::AfterElement => self.after_element(offset, c)?,
            State::RepeatSpec { start } => {
                if c == '\'' {
                    let repeat = leaf(text, primitives::repeat, start, &text[start..offset])?;
                    if let Some(pending) = &mut self.pending {
                        pending.repeat = Some(repeat);
                    }
                    self.state = State::AfterElement;
                }
            }
            State::Ratio { start } => {
                if c.is_ascii_digit() || matches!(c, '.' | '-' | '?') {
                    return Ok(Flow::Advance);
                }
                self.pending_ratio = Some(leaf(text, primitives::ratio, start, &text[start..offset])?);
                self.state = State::AfterElement;
                return Ok(Flow::Reprocess);
            }
            State::QuotedAnnotation { start, target } => {
                if c == '"' {
                    let annotation = Some(text[start..offset].to_owned());
                    match target {
                        Annotated::Element => {
                            if let Some(pending) = &mut self.pending {
                                pending.annotation = annotation;
                            }
                            self.state = State::AfterElement;
                        }
                        Annotated::Polymer => {
                            if let Some(polymer) = &mut self.polymer {
                                polymer.annotation = annotation;
                            }
                            self.state = State::PolymerEnd;
                        }
                    }
                }
            }
            State::PolymerEnd => match c {
                '"' => {
                    if self.polymer.as_ref().is_some_and(|p| p.annotation.is_some()) {
                        return Err(error(text, offset, ParseErrorKind::MisplacedAnnotation));
                    }
                    self.state = State::QuotedAnnotation {
                        start: offset + 1,
                        target: Annotated::Polymer,
                    };
                }
                '|' => {
                    self.finish_polymer();
                    self.state = State::SectionPolymers;
                }
                '$' => {
                    self.finish_polymer();
                    self.state = flat_section(Section::Connections, offset + 1);
                }
                _ => return Err(error(text, offset, ParseErrorKind::ExpectedPolymerEnd)),
            },
            State::FlatSection { section, start, quote } => match c {
                '"' => {
                    let quote = if quote.is_some() { None } else { Some(offset) };
                    self.state = State::FlatSection { section, start, quote };
                }
                '$' if quote.is_none() => {
                    self.read_section(section, start, offset)?;
                    self.state = match section {
                        Section::Connections => flat_section(Section::Groupings, offset + 1),
                        Section::Groupings => flat_section(Section::Extra, offset + 1),
                        _ => State::VersionTag { start: offset + 1 },
                    };
                }
                _ => (),
            },
            State::VersionTag { .. } => {
                if c == '$' {
                    return Err(section_error(Section::Version, SectionIssue::TooManySections));
                }
            }
        }
        Ok(Flow::Advance)
    }

    fn element_start(&mut self, offset: usize, c: char) -> Result<()> {
        let text = self.text;
        let monomer = match c {
            '(' => {
                self.frames.push(Frame {
                    open: offset,
                    separator: None,
                    items: Vec::new(),
                });
                return Ok(());
            }
            '[' => {
                self.state = State::StructureBlob {
                    open: offset,
                    depth: 1,
                    extension: false,
                    branch: None,
                };
                return Ok(());
            }
            c if c.is_ascii_alphabetic() && self.is_rna() => MonomerRef::id(c),
            c if c.is_ascii_alphanumeric() => {
                self.state = State::MonomerToken { start: offset };
                return Ok(());
            }
            c => Wildcard::from_char(c)
                .map(MonomerRef::Wildcard)
                .ok_or_else(|| error(text, offset, ParseErrorKind::ExpectedMonomer))?,
        };
        self.links.push(link(monomer, false));
        self.state = State::AfterElement;
        Ok(())
    }

    fn structure_blob(
        &mut self,
        offset: usize,
        c: char,
        open: usize,
        mut depth: u32,
        mut extension: bool,
        branch: Option<usize>,
    ) -> Result<()> {
        // Extension segments (`|...|`) are opaque, so brackets are only counted outside of them
        match c {
            '|' => extension = !extension,
            '[' if !extension => depth += 1,
            ']' if !extension => depth -= 1,
            _ => (),
        }

        if depth > 0 {
            self.state = State::StructureBlob {
                open,
                depth,
                extension,
                branch,
            };
            return Ok(());
        }

        let content = &self.text[open + 1..offset];
        if content.is_empty() {
            return Err(error(self.text, offset, ParseErrorKind::EmptyBrackets));
        }
        self.links.push(link(blob_monomer(content), branch.is_some()));
        self.state = branch.map_or(State::AfterElement, |open| State::BranchClose { open });
        Ok(())
    }

    fn after_element(&mut self, offset: usize, c: char) -> Result<()> {
        let text = self.text;
        // In RNA, monomers written back-to-back (`R(A)P`) extend the same element
        let chain_open = self.is_rna() && !self.links.is_empty();
        match c {
            '(' if chain_open => self.state = State::Branch { open: offset },
            '[' if chain_open => {
                self.state = State::StructureBlob {
                    open: offset,
                    depth: 1,
                    extension: false,
                    branch: None,
                };
            }
            c if chain_open && (c.is_ascii_alphabetic() || Wildcard::from_char(c).is_some()) => {
                let monomer = Wildcard::from_char(c).map_or_else(|| MonomerRef::id(c), MonomerRef::Wildcard);
                self.links.push(link(monomer, false));
            }
            '\'' => {
                self.seal();
                if self.pending_ratio.is_some() || self.pending.as_ref().is_none_or(|p| p.repeat.is_some()) {
                    return Err(error(text, offset, ParseErrorKind::MisplacedRepeat));
                }
                self.state = State::RepeatSpec { start: offset + 1 };
            }
            '"' => {
                self.seal();
                if self.pending_ratio.is_some() || self.pending.as_ref().is_none_or(|p| p.annotation.is_some()) {
                    return Err(error(text, offset, ParseErrorKind::MisplacedAnnotation));
                }
                self.state = State::QuotedAnnotation {
                    start: offset + 1,
                    target: Annotated::Element,
                };
            }
            ':' => {
                self.seal();
                let in_mixture = self
                    .frames
                    .last()
                    .is_some_and(|frame| frame.separator != Some(Separator::List));
                if !in_mixture {
                    return Err(error(text, offset, ParseErrorKind::RatioOutsideMixture));
                }
                if self.pending_ratio.is_some() {
                    return Err(error(text, offset, ParseErrorKind::MisplacedRatio));
                }
                self.state = State::Ratio { start: offset + 1 };
            }
            ')' => {
                if self.frames.is_empty() {
                    return Err(error(text, offset, ParseErrorKind::UnexpectedClose));
                }
                self.finish_element(offset, None)?;
                self.close_frame();
            }
            '}' => {
                if !self.frames.is_empty() {
                    return Err(error(text, offset, ParseErrorKind::ExpectedSeparator));
                }
                self.finish_element(offset, None)?;
                self.state = State::PolymerEnd;
            }
            c => {
                let separator = Separator::from_char(c)
                    .ok_or_else(|| error(text, offset, ParseErrorKind::ExpectedSeparator))?;
                self.finish_element(offset, Some(separator))?;
                self.state = State::ElementStart;
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<HelmDocument> {
        let text = self.text;
        match self.state {
            State::VersionTag { start } => {
                let tag = &text[start..];
                if tag.is_empty() {
                    return Err(section_error(Section::Version, SectionIssue::LegacyFormat));
                }
                if tag != HELM_VERSION {
                    let issue = SectionIssue::UnsupportedVersion(tag.to_owned());
                    return Err(section_error(Section::Version, issue));
                }
                self.document.version = tag.to_owned();
                Ok(self.document)
            }
            State::StructureBlob { open, .. } => Err(unclosed(text, open, ParseErrorKind::UnclosedBracket)),
            State::Branch { open } | State::BranchClose { open } => {
                Err(unclosed(text, open, ParseErrorKind::UnclosedParen))
            }
            State::RepeatSpec { start } | State::QuotedAnnotation { start, .. } => {
                Err(unclosed(text, start - 1, ParseErrorKind::UnclosedQuote))
            }
            State::ElementStart | State::MonomerToken { .. } | State::AfterElement | State::Ratio { .. } => {
                Err(match self.frames.last() {
                    Some(frame) => unclosed(text, frame.open, ParseErrorKind::UnclosedParen),
                    None => unclosed(text, self.body_open, ParseErrorKind::UnclosedBody),
                })
            }
            State::FlatSection { quote: Some(quote), .. } => {
                Err(unclosed(text, quote, ParseErrorKind::UnclosedQuote))
            }
            State::FlatSection { section, .. } => {
                let found = match section {
                    Section::Connections => 2,
                    Section::Groupings => 3,
                    _ => 4,
                };
                Err(missing_sections(found))
            }
            State::SectionPolymers | State::PolymerId { .. } | State::PolymerEnd => Err(missing_sections(1)),
        }
    }
}

// Element Builders ====================================================================================================

impl Parser<'_> {
    fn is_rna(&self) -> bool {
        self.polymer
            .as_ref()
            .is_some_and(|p| p.polymer_type == PolymerType::Rna)
    }

    /// Closes off the chain of monomers being read, so that it can take a repeat, annotation, or ratio
    fn seal(&mut self) {
        if !self.links.is_empty() {
            let links = mem::take(&mut self.links);
            self.pending = Some(MonomerNotation::new(Token::from_links(links)));
        }
    }

    fn finish_element(&mut self, offset: usize, separator: Option<Separator>) -> Result<()> {
        let text = self.text;
        self.seal();
        let notation = self
            .pending
            .take()
            .ok_or_else(|| error(text, offset, ParseErrorKind::ExpectedMonomer))?;
        let ratio = self.pending_ratio.take();

        let Some(frame) = self.frames.last_mut() else {
            if let Some(separator @ Separator::Mixture(_)) = separator {
                let kind = ParseErrorKind::SeparatorOutsideGroup(separator.as_char());
                return Err(error(text, offset, kind));
            }
            if let Some(polymer) = &mut self.polymer {
                polymer.elements.push(notation);
            }
            return Ok(());
        };

        if let Some(separator) = separator {
            match frame.separator {
                Some(expected) if expected != separator => {
                    let kind = ParseErrorKind::MixedSeparators {
                        expected: expected.as_char(),
                        found: separator.as_char(),
                    };
                    return Err(error(text, offset, kind));
                }
                _ => frame.separator = Some(separator),
            }
        }
        frame.items.push((notation, ratio));

        if frame.separator == Some(Separator::List) && frame.items.iter().any(|(_, ratio)| ratio.is_some()) {
            return Err(error(text, offset, ParseErrorKind::RatioOutsideMixture));
        }
        Ok(())
    }

    fn close_frame(&mut self) {
        let Some(Frame { separator, items, .. }) = self.frames.pop() else {
            return;
        };
        let has_ratio = items.iter().any(|(_, ratio)| ratio.is_some());
        let token = match separator {
            Some(Separator::Mixture(kind)) => mixture(kind, items),
            None if has_ratio => mixture(MixtureKind::Or, items),
            Some(Separator::List) | None => Token::List(items.into_iter().map(|(notation, _)| notation).collect()),
        };
        self.pending = Some(MonomerNotation::new(token));
    }

    fn finish_polymer(&mut self) {
        if let Some(polymer) = self.polymer.take() {
            trace!(id = polymer.id.as_str(), monomers = polymer.monomer_count(); "parsed polymer");
            self.document.polymers.push(polymer);
        }
    }

    fn read_section(&mut self, section: Section, start: usize, end: usize) -> Result<()> {
        let text = self.text;
        let body = &text[start..end];
        match section {
            Section::Connections => {
                self.document.connections = section_items(body)
                    .map(|(item_start, item)| {
                        checked_item(text, start + item_start, item)?;
                        leaf(text, primitives::connection, start + item_start, item)
                    })
                    .collect::<Result<_>>()?;
            }
            Section::Groupings => {
                self.document.groups = section_items(body)
                    .map(|(item_start, item)| {
                        checked_item(text, start + item_start, item)?;
                        leaf(text, primitives::group, start + item_start, item)
                    })
                    .collect::<Result<_>>()?;
            }
            Section::Extra if !body.is_empty() => match parse_item(primitives::annotation_map, body) {
                Ok(annotations) => self.document.annotations = annotations,
                Err(_) => self.document.annotation_text = Some(body.to_owned()),
            },
            _ => (),
        }
        Ok(())
    }
}

// Helper Functions ====================================================================================================

const fn flat_section(section: Section, start: usize) -> State {
    State::FlatSection {
        section,
        start,
        quote: None,
    }
}

const fn link(monomer: MonomerRef, branched: bool) -> ChainLink {
    ChainLink { monomer, branched }
}

fn mixture(kind: MixtureKind, items: Vec<(MonomerNotation, Option<Ratio>)>) -> Token {
    let members = items
        .into_iter()
        .map(|(notation, ratio)| MixtureMember { notation, ratio })
        .collect();
    Token::Mixture(Mixture { kind, members })
}

/// Bracketed text holding any structure syntax is an inline SMILES, anything else is just a long monomer id
fn blob_monomer(content: &str) -> MonomerRef {
    const STRUCTURE_SYNTAX: [char; 15] = [
        '[', ']', '(', ')', '{', '}', '=', '@', '*', '|', ':', '.', '/', '\\', '%',
    ];
    if content.contains(&STRUCTURE_SYNTAX[..]) || content.contains(char::is_whitespace) {
        MonomerRef::Smiles(content.to_owned())
    } else {
        MonomerRef::id(content)
    }
}

/// Splits a flat section on `|`s that aren't quoted, yielding each item with its offset into the section
fn section_items(section: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut items = Vec::new();
    if !section.is_empty() {
        let mut quoted = false;
        let mut start = 0;
        for (i, c) in section.char_indices() {
            match c {
                '"' => quoted = !quoted,
                '|' if !quoted => {
                    items.push((start, &section[start..i]));
                    start = i + 1;
                }
                _ => (),
            }
        }
        items.push((start, &section[start..]));
    }
    items.into_iter()
}

fn checked_item(text: &str, offset: usize, item: &str) -> Result<()> {
    if item.is_empty() {
        Err(error(text, offset, ParseErrorKind::EmptyItem))
    } else {
        Ok(())
    }
}

/// Runs a leaf grammar over `item`, which starts at `start` in the full `text`
fn leaf<'a, O>(
    text: &str,
    parser: impl FnMut(&'a str) -> LeafResult<'a, O>,
    start: usize,
    item: &'a str,
) -> Result<O> {
    parse_item(parser, item).map_err(|e| error(text, start + item.len() - e.input.len(), e.kind))
}

fn error(text: &str, offset: usize, kind: ParseErrorKind) -> Box<HelmError> {
    Box::new(ParseError::new(text, offset, kind).into())
}

fn unclosed(text: &str, opener: usize, kind: ParseErrorKind) -> Box<HelmError> {
    Box::new(ParseError::unclosed(text, opener, kind).into())
}

fn section_error(section: Section, reason: SectionIssue) -> Box<HelmError> {
    Box::new(HelmError::SectionGrammar { section, reason })
}

fn missing_sections(found: usize) -> Box<HelmError> {
    let section = match found {
        1 => Section::Connections,
        2 => Section::Groupings,
        3 => Section::Extra,
        _ => Section::Version,
    };
    section_error(section, SectionIssue::MissingSections { found })
}
