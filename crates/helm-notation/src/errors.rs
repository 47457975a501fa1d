use std::fmt;

use derive_more::Display;
use helmchem::MonomerError;
use miette::{Diagnostic, LabeledSpan, SourceSpan};
use nom::error::ErrorKind;
use thiserror::Error;

use crate::{Label, Position};

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum HelmError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error("the {section} section is malformed: {reason}")]
    #[diagnostic(help("a HELM2 document has five '$'-separated sections and ends with the version tag V2.0"))]
    SectionGrammar { section: Section, reason: SectionIssue },

    #[error("the id {id:?} is used by more than one polymer or group")]
    #[diagnostic(help("polymer and group ids share a single namespace, so each must be unique"))]
    DuplicateId { id: String },

    #[error("the member {unresolved_member:?} of group {group_id} does not resolve to a polymer or an acyclic group")]
    #[diagnostic(help("group members must be declared polymers or groups, and a group cannot contain itself"))]
    Grouping {
        group_id: String,
        unresolved_member: String,
    },

    #[error("the connection endpoint {position}:{label} on {polymer} is invalid: {reason}")]
    Connection {
        polymer: String,
        position: Position,
        label: Label,
        reason: ConnectionIssue,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Monomer(#[from] MonomerError),
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
pub enum Section {
    #[display("polymer")]
    Polymers,
    #[display("connection")]
    Connections,
    #[display("grouping")]
    Groupings,
    #[display("extra annotation")]
    Extra,
    #[display("version")]
    Version,
}

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum SectionIssue {
    #[error("expected 5 '$'-separated sections, but only found {found}")]
    MissingSections { found: usize },

    #[error("expected 5 '$'-separated sections, but found more")]
    TooManySections,

    #[error("no version tag was given, so this looks like a HELM1 document")]
    #[diagnostic(help("convert the document to HELM2 before parsing it"))]
    LegacyFormat,

    #[error("{0:?} is not a supported version tag")]
    #[diagnostic(help("only \"V2.0\" documents are supported"))]
    UnsupportedVersion(String),
}

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum ConnectionIssue {
    #[error("no polymer or group with this id has been declared")]
    UnknownPolymer,

    #[error("the polymer only has {count} monomer position{}", if *.count == 1 { "" } else { "s" })]
    PositionOutOfRange { count: usize },

    #[error("the polymer doesn't contain the monomer {0:?}")]
    MonomerNotInPolymer(String),

    #[error("the monomer {0:?} could not be found in the monomer registry")]
    UnknownMonomer(String),

    #[error("the monomer {0:?} doesn't have this attachment point")]
    MissingAttachment(String),

    #[error("this attachment point is already used by another connection")]
    DoubleOccupancy,
}

// ---------------------------------------------------------------------------------------------------------------------

/// The first character of a HELM document that couldn't extend the notation parsed so far
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("invalid HELM notation at offset {offset}: {kind}")]
pub struct ParseError {
    src: String,
    span: SourceSpan,
    pub offset: usize,
    pub found: Option<char>,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub(crate) fn new(src: &str, offset: usize, kind: ParseErrorKind) -> Self {
        let found = src.get(offset..).and_then(|rest| rest.chars().next());
        let span = SourceSpan::from(offset..offset + found.map_or(0, char::len_utf8));
        Self {
            src: src.to_owned(),
            span,
            offset,
            found,
            kind,
        }
    }

    /// For delimiters left open at the end of input: the error sits at the end, but the label points at the opener
    pub(crate) fn unclosed(src: &str, opener: usize, kind: ParseErrorKind) -> Self {
        Self {
            span: SourceSpan::from(opener..opener + 1),
            ..Self::new(src, src.len(), kind)
        }
    }
}

// NOTE: Manually implemented so the label text can come from `self.kind`
impl Diagnostic for ParseError {
    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.src)
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.kind.help()
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let label = self.kind.label().map_or_else(|| describe_char(self.found), str::to_owned);
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            Some(label),
            self.span,
        ))))
    }
}

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error("expected a polymer id like PEPTIDE1, RNA1, CHEM1 or BLOB1")]
    ExpectedPolymerId,

    #[error("expected '{{' to open the polymer body")]
    ExpectedPolymerBody,

    #[error("expected a monomer: an id, a [bracketed] id or structure, a wildcard, or '(' to open a group")]
    ExpectedMonomer,

    #[error("expected a monomer inside the branch")]
    ExpectedBranchMonomer,

    #[error("expected ')' to close the branch")]
    ExpectedBranchClose,

    #[error("expected a separator, a repeat, an annotation, or the end of the group or polymer")]
    ExpectedSeparator,

    #[error("expected '|', '$', or an annotation after the polymer body")]
    ExpectedPolymerEnd,

    #[error("cannot mix '{found}' with '{expected}' in the same group")]
    #[diagnostic(help("nest one group inside another if you need both"))]
    MixedSeparators { expected: char, found: char },

    #[error("'{0}' can only separate the members of a group")]
    #[diagnostic(help("wrap these monomers in parentheses"))]
    SeparatorOutsideGroup(char),

    #[error("ratios are only allowed on the members of a mixture")]
    RatioOutsideMixture,

    #[error("found ')' without a matching '('")]
    UnexpectedClose,

    #[error("a repeat must directly follow a monomer or group, and only one is allowed")]
    MisplacedRepeat,

    #[error("an annotation must directly follow a monomer, group or polymer, and only one is allowed")]
    MisplacedAnnotation,

    #[error("a ratio must directly follow a mixture member, and only one is allowed")]
    MisplacedRatio,

    #[error("expected a repeat count like '3' or a repeat range like '3-7'")]
    ExpectedRepeat,

    #[error("expected a ratio like 10 or 2.5-2.7, or '?' for an unknown ratio")]
    ExpectedRatio,

    #[error("brackets must contain a monomer id or a structure")]
    EmptyBrackets,

    #[error("this '[' was never closed")]
    UnclosedBracket,

    #[error("this '(' was never closed")]
    UnclosedParen,

    #[error("this '{{' was never closed")]
    UnclosedBody,

    #[error("this quote was never closed")]
    UnclosedQuote,

    #[error("expected a connection like PEPTIDE1,PEPTIDE1,2:R3-5:R3")]
    ExpectedConnection,

    #[error("expected a polymer or group id")]
    ExpectedEntityId,

    #[error("expected ',' between the ids and the endpoints of a connection")]
    ExpectedComma,

    #[error("expected '-' between the two endpoints of a connection")]
    ExpectedEndpointSeparator,

    #[error("expected a position: an index, a monomer id, a wildcard, or a set like (4,8)")]
    ExpectedPosition,

    #[error("expected ':' between a position and its attachment label")]
    ExpectedColon,

    #[error("expected an attachment label like R1, pair, or '?'")]
    ExpectedLabel,

    #[error("expected ',' or '+' between the items of a set")]
    ExpectedSetSeparator,

    #[error("expected a group like G1(PEPTIDE1,PEPTIDE2)")]
    ExpectedGroup,

    #[error("expected a group id like G1")]
    ExpectedGroupId,

    #[error("counts cannot start with 0")]
    #[diagnostic(help("positions and repeats are numbered from 1"))]
    ExpectedNoLeadingZero,

    #[error("expected an ASCII digit 1-9")]
    ExpectedDigit,

    #[error("the end of a range must not be smaller than its start")]
    ReversedRange,

    #[error("items in this section can't be empty")]
    EmptyItem,

    #[error("could not interpret the rest of the item")]
    #[diagnostic(help("check the unparsed region for errors, or remove it"))]
    Incomplete,

    #[diagnostic(help(
        "this is an internal error that you shouldn't ever see! If you have gotten this error, \
        then please report it as a bug!"
    ))]
    #[error("internal `nom` error: {0:?}")]
    NomError(ErrorKind),
}

impl ParseErrorKind {
    fn label(&self) -> Option<&'static str> {
        Some(match self {
            Self::UnclosedBracket | Self::UnclosedParen | Self::UnclosedBody | Self::UnclosedQuote => "opened here",
            Self::MixedSeparators { .. } => "conflicting separator",
            Self::EmptyBrackets => "empty",
            Self::ExpectedNoLeadingZero => "expected non-zero",
            Self::Incomplete => "input was valid up until this point",
            Self::NomError(_) => "the region that triggered this bug!",
            _ => return None,
        })
    }

    pub(crate) const fn is_generic(&self) -> bool {
        matches!(self, Self::NomError(_))
    }
}

impl From<ErrorKind> for ParseErrorKind {
    fn from(value: ErrorKind) -> Self {
        match value {
            ErrorKind::Eof => Self::Incomplete,
            kind => Self::NomError(kind),
        }
    }
}

fn describe_char(c: Option<char>) -> String {
    c.map_or_else(|| "unexpected end of input".to_owned(), |c| format!("unexpected {c:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_locations() {
        let error = ParseError::new("PEPTIDE1{A.B}", 5, ParseErrorKind::ExpectedMonomer);
        assert_eq!(error.found, Some('D'));
        assert_eq!(error.span, SourceSpan::from(5..6));

        let error = ParseError::new("PEPTIDE1{A", 10, ParseErrorKind::ExpectedSeparator);
        assert_eq!(error.found, None);
        assert_eq!(error.span, SourceSpan::from(10..10));

        let error = ParseError::unclosed("PEPTIDE1{[C", 9, ParseErrorKind::UnclosedBracket);
        assert_eq!(error.offset, 11);
        assert_eq!(error.found, None);
        assert_eq!(error.span, SourceSpan::from(9..10));
    }

    #[test]
    fn error_messages() {
        let error = HelmError::SectionGrammar {
            section: Section::Version,
            reason: SectionIssue::UnsupportedVersion("V3.0".to_owned()),
        };
        assert_eq!(
            error.to_string(),
            r#"the version section is malformed: "V3.0" is not a supported version tag"#
        );

        let error = HelmError::Connection {
            polymer: "PEPTIDE1".to_owned(),
            position: Position::Index(7),
            label: Label::R(3),
            reason: ConnectionIssue::PositionOutOfRange { count: 5 },
        };
        assert_eq!(
            error.to_string(),
            "the connection endpoint 7:R3 on PEPTIDE1 is invalid: the polymer only has 5 monomer positions"
        );
    }
}
