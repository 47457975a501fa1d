use std::{collections::BTreeMap, str::FromStr};

use helmchem::{PolymerType, attachment::PAIR_LABEL};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{is_not, tag, tag_no_case},
    character::complete::{alpha1, alphanumeric0, char, digit1, multispace0, one_of, u32},
    combinator::{all_consuming, cut, map, map_opt, map_res, not, opt, recognize, value},
    error::{ErrorKind, FromExternalError, ParseError},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
};
use rust_decimal::Decimal;

use crate::{
    ConnectionNotation, Endpoint, GroupMember, GroupNotation, Label, MixtureKind, Position, PositionItem, Ratio,
    Repeat, Wildcard, errors::ParseErrorKind,
};

pub(crate) type LeafResult<'a, O> = IResult<&'a str, O, LeafError<'a>>;

/// A `nom` error remembering the unparsed input, so that it can be turned back into a document offset
#[derive(Clone, Eq, PartialEq, Debug)]
pub(crate) struct LeafError<'a> {
    pub input: &'a str,
    pub kind: ParseErrorKind,
}

impl<'a> ParseError<&'a str> for LeafError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        Self {
            input,
            kind: kind.into(),
        }
    }

    fn append(_input: &str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    // Of two failed branches, report the one that got further
    fn or(self, other: Self) -> Self {
        if other.input.len() < self.input.len() { other } else { self }
    }
}

impl<'a> FromExternalError<&'a str, ParseErrorKind> for LeafError<'a> {
    fn from_external_error(input: &'a str, _kind: ErrorKind, e: ParseErrorKind) -> Self {
        Self { input, kind: e }
    }
}

/// Gives a generic `nom` failure a more helpful kind, leaving more specific errors untouched
fn expect<'a, O>(
    mut parser: impl Parser<&'a str, O, LeafError<'a>>,
    kind: ParseErrorKind,
) -> impl FnMut(&'a str) -> LeafResult<'a, O> {
    move |i| {
        parser.parse(i).map_err(|e| {
            e.map(|e| {
                if e.kind.is_generic() {
                    LeafError { input: i, kind: kind.clone() }
                } else {
                    e
                }
            })
        })
    }
}

/// Runs a parser over a whole item of a flat section
pub(crate) fn parse_item<'a, O>(
    parser: impl Parser<&'a str, O, LeafError<'a>>,
    item: &'a str,
) -> Result<O, LeafError<'a>> {
    match all_consuming(parser).parse(item) {
        Ok((_, output)) => Ok(output),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(e),
        Err(nom::Err::Incomplete(_)) => Err(LeafError {
            input: "",
            kind: ParseErrorKind::Incomplete,
        }),
    }
}

// Counts and Ratios ===================================================================================================

/// Count = digit - "0" , { digit } ;
pub(crate) fn count(i: &str) -> LeafResult<u32> {
    let not_zero = expect(cut(not(char('0'))), ParseErrorKind::ExpectedNoLeadingZero);
    let digits = expect(u32, ParseErrorKind::ExpectedDigit);
    preceded(not_zero, digits)(i)
}

/// Repeat = Count , [ "-" , Count ] ;
pub(crate) fn repeat(i: &str) -> LeafResult<Repeat> {
    let bounds = pair(count, opt(preceded(char('-'), cut(count))));
    let parser = map_res(bounds, |(min, max)| match max {
        None => Ok(Repeat::Count(min)),
        Some(max) if min <= max => Ok(Repeat::Range(min, max)),
        Some(_) => Err(ParseErrorKind::ReversedRange),
    });
    expect(parser, ParseErrorKind::ExpectedRepeat)(i)
}

/// Number = digit , { digit } , [ "." , digit , { digit } ] ;
fn number(i: &str) -> LeafResult<Decimal> {
    let parser = recognize(pair(digit1, opt(pair(char('.'), digit1))));
    map_opt(parser, |n| Decimal::from_str(n).ok())(i)
}

/// Ratio = "?" | Number , [ "-" , Number ] ;
pub(crate) fn ratio(i: &str) -> LeafResult<Ratio> {
    let parser = alt((
        value(Ratio::Unknown, char('?')),
        map(separated_pair(number, char('-'), number), |(min, max)| {
            Ratio::Range(min, max)
        }),
        map(number, Ratio::Value),
    ));
    expect(parser, ParseErrorKind::ExpectedRatio)(i)
}

// Identifiers =========================================================================================================

/// Polymer Type = "PEPTIDE" | "RNA" | "CHEM" | "BLOB" ;
fn polymer_type(i: &str) -> LeafResult<PolymerType> {
    alt((
        value(PolymerType::Peptide, tag("PEPTIDE")),
        value(PolymerType::Rna, tag("RNA")),
        value(PolymerType::Chem, tag("CHEM")),
        value(PolymerType::Blob, tag("BLOB")),
    ))(i)
}

/// Polymer Id = Polymer Type , Count ;
pub(crate) fn polymer_id(i: &str) -> LeafResult<PolymerType> {
    let parser = terminated(polymer_type, count);
    expect(parser, ParseErrorKind::ExpectedPolymerId)(i)
}

/// Entity Id = letter , { letter | digit } ;
fn entity_id(i: &str) -> LeafResult<&str> {
    let parser = recognize(pair(alpha1, alphanumeric0));
    expect(parser, ParseErrorKind::ExpectedEntityId)(i)
}

/// Group Id = "G" , Count ;
fn group_id(i: &str) -> LeafResult<&str> {
    let parser = recognize(pair(char('G'), count));
    expect(parser, ParseErrorKind::ExpectedGroupId)(i)
}

/// Monomer Id = letter , { letter | digit } | "[" , { any - "]" }- , "]" ;
fn monomer_id(i: &str) -> LeafResult<&str> {
    let bare = recognize(pair(alpha1, alphanumeric0));
    let bracketed = delimited(char('['), is_not("]"), char(']'));
    alt((bare, bracketed))(i)
}

/// Wildcard = "?" | "_" | "*" ;
fn wildcard(i: &str) -> LeafResult<Wildcard> {
    map_opt(one_of("?_*"), Wildcard::from_char)(i)
}

/// Annotation = '"' , { any - '"' } , '"' ;
fn annotation(i: &str) -> LeafResult<String> {
    let text = map(opt(is_not("\"")), Option::unwrap_or_default);
    map(delimited(char('"'), text, cut(char('"'))), str::to_owned)(i)
}

// Connections =========================================================================================================

/// Connection = Entity Id , "," , Entity Id , "," , Endpoint , "-" , Endpoint , [ Annotation ] ;
pub(crate) fn connection(i: &str) -> LeafResult<ConnectionNotation> {
    let comma = || expect(char(','), ParseErrorKind::ExpectedComma);
    let dash = expect(char('-'), ParseErrorKind::ExpectedEndpointSeparator);
    let parser = tuple((
        terminated(entity_id, comma()),
        terminated(entity_id, comma()),
        separated_pair(endpoint, dash, endpoint),
        opt(annotation),
    ));
    map(parser, |(source, target, (source_end, target_end), annotation)| {
        ConnectionNotation {
            source: source.to_owned(),
            target: target.to_owned(),
            source_end,
            target_end,
            annotation,
        }
    })(i)
}

/// Endpoint = Position , ":" , Label ;
fn endpoint(i: &str) -> LeafResult<Endpoint> {
    let colon = expect(char(':'), ParseErrorKind::ExpectedColon);
    map(separated_pair(position, colon, label), |(position, label)| {
        Endpoint::new(position, label)
    })(i)
}

/// Position = Wildcard | Position Item | Position Set ;
fn position(i: &str) -> LeafResult<Position> {
    let item = map(position_item, |item| match item {
        PositionItem::Index(index) => Position::Index(index),
        PositionItem::Monomer(id) => Position::Monomer(id),
    });
    let parser = alt((map(wildcard, Position::Wildcard), position_set, item));
    expect(parser, ParseErrorKind::ExpectedPosition)(i)
}

/// Position Item = Count | Monomer Id ;
fn position_item(i: &str) -> LeafResult<PositionItem> {
    alt((
        map(count, PositionItem::Index),
        map(monomer_id, |id| PositionItem::Monomer(id.to_owned())),
    ))(i)
}

/// Position Set = "(" , Position Item , { ( "," | "+" ) , Position Item } , ")" ;
fn position_set(i: &str) -> LeafResult<Position> {
    let (i, _) = char('(')(i)?;
    let (i, (kind, items)) = cut(separated_members(position_item))(i)?;
    let (i, _) = cut(char(')'))(i)?;
    Ok((i, Position::Set { kind, items }))
}

/// Label = "pair" | Wildcard | "R" , Count ;
fn label(i: &str) -> LeafResult<Label> {
    let parser = alt((
        value(Label::Pair, tag_no_case(PAIR_LABEL)),
        map(wildcard, Label::Wildcard),
        map(preceded(char('R'), count), Label::R),
    ));
    expect(parser, ParseErrorKind::ExpectedLabel)(i)
}

// Groups ==============================================================================================================

/// Group = Group Id , "(" , Group Member , { ( "," | "+" ) , Group Member } , ")" ;
pub(crate) fn group(i: &str) -> LeafResult<GroupNotation> {
    let members = delimited(char('('), cut(separated_members(group_member)), cut(char(')')));
    let parser = pair(group_id, expect(members, ParseErrorKind::ExpectedGroup));
    map(parser, |(id, (kind, members))| GroupNotation {
        id: id.to_owned(),
        kind,
        members,
    })(i)
}

/// Group Member = Entity Id , [ ":" , Ratio ] ;
fn group_member(i: &str) -> LeafResult<GroupMember> {
    let parser = pair(entity_id, opt(preceded(char(':'), cut(ratio))));
    map(parser, |(id, ratio)| GroupMember {
        id: id.to_owned(),
        ratio,
    })(i)
}

/// Members separated by either all ","s or all "+"s, where a lone member counts as ","
fn separated_members<'a, O>(
    mut member: impl FnMut(&'a str) -> LeafResult<'a, O> + Copy,
) -> impl FnMut(&'a str) -> LeafResult<'a, (MixtureKind, Vec<O>)> {
    move |i| {
        let (mut rest, first) = member(i)?;
        let mut members = vec![first];
        let mut kind = None;
        while let Ok((after, separator)) = one_of::<_, _, LeafError>(",+")(rest) {
            let separator = MixtureKind::from_char(separator).unwrap_or_default();
            if let Some(expected) = kind.filter(|&k| k != separator) {
                return Err(nom::Err::Failure(LeafError {
                    input: rest,
                    kind: ParseErrorKind::MixedSeparators {
                        expected: kind_char(expected),
                        found: kind_char(separator),
                    },
                }));
            }
            kind = Some(separator);
            let (after, next) = cut(member)(after)?;
            members.push(next);
            rest = after;
        }
        Ok((rest, (kind.unwrap_or_default(), members)))
    }
}

fn kind_char(kind: MixtureKind) -> char {
    match kind {
        MixtureKind::Or => ',',
        MixtureKind::And => '+',
    }
}

// Extra Annotations ===================================================================================================

/// Annotation Map = "{" , [ Key Value , { "," , Key Value } ] , "}" ;
/// Key Value = Quoted , ":" , Quoted ;
pub(crate) fn annotation_map(i: &str) -> LeafResult<BTreeMap<String, String>> {
    let ws = |c| delimited(multispace0, char(c), multispace0);
    let quoted = || delimited(char('"'), map(opt(is_not("\"")), Option::unwrap_or_default), char('"'));
    let key_value = separated_pair(quoted(), ws(':'), quoted());
    let pairs = separated_list0(ws(','), key_value);
    let parser = delimited(ws('{'), pairs, ws('}'));
    map(parser, |pairs| {
        pairs.into_iter().map(|(k, v): (&str, &str)| (k.to_owned(), v.to_owned())).collect()
    })(i)
}
