// Standard Library Imports
use std::collections::hash_map::Entry;

// External Crate Imports
use ahash::{HashMap, HashMapExt};
use knuffel::{Decode, span::Span};
use miette::{Diagnostic, LabeledSpan, NamedSource, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Local Crate Imports
use crate::{
    Attachment, ChemistryManipulator, EscapedCodec, Monomer, PolymerType, StructureCodec, StructureEncoding,
    errors::{MonomerError, MonomerIssue},
    validator::validate_monomer,
};

/// A library of the common peptide, nucleotide, and linker monomers
pub const DEFAULT_KDL: &str = include_str!("../data/monomer_library.kdl");

// Public API ==========================================================================================================

/// A validated collection of monomers, read from KDL
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct MonomerLibrary {
    pub monomers: Vec<Monomer>,
}

impl MonomerLibrary {
    pub fn new(
        file_name: impl AsRef<str>,
        kdl_text: impl AsRef<str>,
        chemistry: &dyn ChemistryManipulator,
    ) -> Result<Self> {
        let parsed_library: MonomerLibraryKdl = knuffel::parse(file_name.as_ref(), kdl_text.as_ref())?;
        parsed_library
            .validate(chemistry)
            .map_err(|e| e.finalize(file_name, kdl_text).into())
    }

    pub fn records(&self, encoding: StructureEncoding) -> impl Iterator<Item = MonomerRecord> + '_ {
        self.monomers
            .iter()
            .map(move |monomer| MonomerRecord::from_monomer(monomer, encoding))
    }

    /// Writes the library back out in the same KDL format it's read from
    #[must_use]
    pub fn to_kdl(&self, encoding: StructureEncoding) -> String {
        let mut kdl = String::new();
        for record in self.records(encoding) {
            record.write_kdl(&mut kdl);
        }
        kdl
    }
}

/// A monomer as it crosses system boundaries: every field is plain text, and the structure payload has been encoded
/// for transport
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct MonomerRecord {
    pub id: String,
    pub polymer_type: Option<String>,
    pub monomer_type: Option<String>,
    pub name: Option<String>,
    pub natural_analog: Option<String>,
    pub smiles: Option<String>,
    pub structure: Option<String>,
    pub structure_encoding: StructureEncoding,
    pub attachments: Vec<AttachmentRecord>,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub id: String,
    pub label: String,
    pub cap_group_name: String,
    pub cap_group_smiles: String,
}

impl MonomerRecord {
    #[must_use]
    pub fn from_monomer(monomer: &Monomer, encoding: StructureEncoding) -> Self {
        Self {
            id: monomer.alternate_id.clone(),
            polymer_type: Some(monomer.polymer_type.to_string()),
            monomer_type: Some(monomer.monomer_type.to_string()),
            name: Some(monomer.name.clone()).filter(|n| !n.is_empty()),
            natural_analog: monomer.natural_analog.clone(),
            smiles: monomer.canonical_smiles.clone(),
            structure: monomer.molfile.as_deref().map(|m| encoding.codec().encode(m)),
            structure_encoding: encoding,
            attachments: monomer.attachments.iter().map(AttachmentRecord::from).collect(),
        }
    }

    /// Decodes the record into a [`Monomer`]; this doesn't check the monomer is well-formed, see
    /// [`validate_monomer`] for that
    pub fn into_monomer(self) -> crate::Result<Monomer> {
        let error = |reason: MonomerIssue| {
            let polymer_type = self.polymer_type.as_deref().unwrap_or("unknown");
            Box::new(MonomerError::new(polymer_type, &self.id, reason))
        };

        let polymer_type: PolymerType = self
            .polymer_type
            .as_deref()
            .ok_or(MonomerIssue::MissingPolymerType)
            .and_then(str::parse)
            .map_err(error)?;
        let monomer_type = self
            .monomer_type
            .as_deref()
            .ok_or(MonomerIssue::MissingMonomerType)
            .and_then(str::parse)
            .map_err(error)?;
        let molfile = self
            .structure
            .as_deref()
            .map(|payload| self.structure_encoding.codec().decode(payload))
            .transpose()
            .map_err(|e| error(e.into()))?;

        Ok(Monomer {
            polymer_type,
            alternate_id: self.id,
            name: self.name.unwrap_or_default(),
            monomer_type,
            natural_analog: self.natural_analog,
            canonical_smiles: self.smiles,
            molfile,
            attachments: self.attachments.into_iter().map(Attachment::from).collect(),
            is_new: false,
        })
    }

    fn write_kdl(&self, kdl: &mut String) {
        let quote = |s: &str| format!("\"{}\"", EscapedCodec.encode(s));

        kdl.push_str(&format!("monomer {}", quote(&self.id)));
        if let Some(polymer_type) = &self.polymer_type {
            kdl.push_str(&format!(" polymer={}", quote(polymer_type)));
        }
        if let Some(monomer_type) = &self.monomer_type {
            kdl.push_str(&format!(" type={}", quote(monomer_type)));
        }
        kdl.push_str(" {\n");
        for (node, value) in [
            ("name", &self.name),
            ("analog", &self.natural_analog),
            ("smiles", &self.smiles),
        ] {
            if let Some(value) = value {
                kdl.push_str(&format!("    {node} {}\n", quote(value)));
            }
        }
        if let Some(structure) = &self.structure {
            kdl.push_str(&format!(
                "    structure {} encoding={}\n",
                quote(structure),
                quote(&self.structure_encoding.to_string())
            ));
        }
        for attachment in &self.attachments {
            kdl.push_str(&format!(
                "    attachment {} label={} cap={} smiles={}\n",
                quote(&attachment.id),
                quote(&attachment.label),
                quote(&attachment.cap_group_name),
                quote(&attachment.cap_group_smiles)
            ));
        }
        kdl.push_str("}\n");
    }
}

impl From<&Attachment> for AttachmentRecord {
    fn from(value: &Attachment) -> Self {
        Self {
            id: value.alternate_id.clone(),
            label: value.label.clone(),
            cap_group_name: value.cap_group_name.clone(),
            cap_group_smiles: value.cap_group_smiles.clone(),
        }
    }
}

impl From<AttachmentRecord> for Attachment {
    fn from(value: AttachmentRecord) -> Self {
        Self::new(value.id, value.label, value.cap_group_name, value.cap_group_smiles)
    }
}

// KDL File Schema =====================================================================================================

#[derive(Debug, Decode)]
#[knuffel(span_type=Span)]
struct MonomerLibraryKdl {
    #[knuffel(children(name = "monomer"))]
    monomers: Vec<MonomerKdl>,
}

#[derive(Debug, Decode)]
#[knuffel(span_type=Span)]
struct MonomerKdl {
    #[knuffel(span)]
    span: Span,
    #[knuffel(argument)]
    id: String,
    #[knuffel(property(name = "polymer"))]
    polymer_type: Option<String>,
    #[knuffel(property(name = "type"))]
    monomer_type: Option<String>,
    #[knuffel(child, unwrap(argument))]
    name: Option<String>,
    #[knuffel(child, unwrap(argument))]
    analog: Option<String>,
    #[knuffel(child, unwrap(argument))]
    smiles: Option<String>,
    #[knuffel(child)]
    structure: Option<StructureKdl>,
    #[knuffel(children(name = "attachment"))]
    attachments: Vec<AttachmentKdl>,
}

#[derive(Debug, Decode)]
#[knuffel(span_type=Span)]
struct StructureKdl {
    #[knuffel(argument)]
    payload: String,
    #[knuffel(property)]
    encoding: Option<String>,
}

#[derive(Debug, Decode)]
#[knuffel(span_type=Span)]
struct AttachmentKdl {
    #[knuffel(span)]
    span: Span,
    #[knuffel(argument)]
    id: String,
    #[knuffel(property)]
    label: String,
    #[knuffel(property)]
    cap: String,
    #[knuffel(property)]
    smiles: String,
}

// Contextual Validation Trait  ========================================================================================

type LibraryResult<T> = Result<T, LibraryErrorKind>;

trait ValidateInto<'c, T> {
    type Context: 'c;

    fn validate(self, ctx: Self::Context) -> LibraryResult<T>;
}

// Monomer Library Validation ==========================================================================================

impl<'c> ValidateInto<'c, MonomerLibrary> for MonomerLibraryKdl {
    type Context = &'c dyn ChemistryManipulator;

    fn validate(self, ctx: Self::Context) -> LibraryResult<MonomerLibrary> {
        let mut seen: HashMap<(PolymerType, String), Span> = HashMap::new();
        let mut monomers = Vec::with_capacity(self.monomers.len());

        for monomer_kdl in self.monomers {
            let span = monomer_kdl.span;
            let monomer = monomer_kdl.validate(ctx)?;

            let key = (monomer.polymer_type, monomer.alternate_id.to_lowercase());
            match seen.entry(key) {
                Entry::Occupied(e) => {
                    return Err(LibraryErrorKind::DuplicateMonomer(
                        *e.get(),
                        span,
                        monomer.polymer_type,
                        monomer.alternate_id,
                    ));
                }
                Entry::Vacant(e) => e.insert(span),
            };
            monomers.push(monomer);
        }

        Ok(MonomerLibrary { monomers })
    }
}

impl<'c> ValidateInto<'c, Monomer> for MonomerKdl {
    type Context = &'c dyn ChemistryManipulator;

    fn validate(self, ctx: Self::Context) -> LibraryResult<Monomer> {
        let span = self.span;
        let attachment_spans: Vec<_> = self.attachments.iter().map(|a| (a.id.clone(), a.span)).collect();

        let monomer = MonomerRecord::from(self)
            .into_monomer()
            .map_err(|e| LibraryErrorKind::Monomer(span, *e))?;

        validate_monomer(&monomer, ctx).map_err(|e| {
            // Point at the offending attachment node, when there is one
            let span = match &e.reason {
                MonomerIssue::Attachment(attachment) => attachment_spans
                    .iter()
                    .find(|(id, _)| id == &attachment.attachment_id)
                    .map_or(span, |&(_, s)| s),
                _ => span,
            };
            LibraryErrorKind::Monomer(span, *e)
        })?;

        Ok(monomer)
    }
}

// Infallible Conversions =============================================================================================

impl From<MonomerKdl> for MonomerRecord {
    fn from(value: MonomerKdl) -> Self {
        let (structure, structure_encoding) = match value.structure {
            Some(StructureKdl { payload, encoding }) => {
                let encoding = match encoding.as_deref() {
                    Some(e) if e.eq_ignore_ascii_case("escaped") => StructureEncoding::Escaped,
                    _ => StructureEncoding::Plain,
                };
                (Some(payload), encoding)
            }
            None => (None, StructureEncoding::default()),
        };

        Self {
            id: value.id,
            polymer_type: value.polymer_type,
            monomer_type: value.monomer_type,
            name: value.name,
            natural_analog: value.analog,
            smiles: value.smiles,
            structure,
            structure_encoding,
            attachments: value
                .attachments
                .into_iter()
                .map(|a| AttachmentRecord {
                    id: a.id,
                    label: a.label,
                    cap_group_name: a.cap,
                    cap_group_smiles: a.smiles,
                })
                .collect(),
        }
    }
}

// Validation Error Types and Trait Implementations  ===================================================================

#[derive(Debug, Error)]
#[error("failed to validate monomer library file")]
struct LibraryError {
    kdl: NamedSource<String>,
    #[source]
    kind: LibraryErrorKind,
}

// NOTE: This is manually implemented because the list of labels is dynamic and needs to be extracted from `self.kind`
impl Diagnostic for LibraryError {
    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.kdl)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        Some(Box::new(self.kind.labels().into_iter().map(|(s, l)| {
            LabeledSpan::new_with_span(Some(l.to_owned()), *s)
        })))
    }

    fn diagnostic_source(&self) -> Option<&dyn Diagnostic> {
        Some(&self.kind)
    }
}

#[derive(Clone, Debug, Diagnostic, Error)]
enum LibraryErrorKind {
    #[error("the {2} monomer {3:?} has already been defined")]
    #[diagnostic(help(
        "monomer ids are case-insensitive within a polymer type, so remove the duplicate or pick a new id"
    ))]
    DuplicateMonomer(Span, Span, PolymerType, String),

    #[error("the monomer library contained an invalid monomer")]
    Monomer(
        Span,
        #[source]
        #[diagnostic_source]
        MonomerError,
    ),
}

impl LibraryErrorKind {
    fn labels(&self) -> Vec<(&Span, &'static str)> {
        match self {
            Self::DuplicateMonomer(s1, s2, _, _) => vec![(s1, "first defined here"), (s2, "then again here")],
            Self::Monomer(s, _) => vec![(s, "invalid monomer")],
        }
    }

    fn finalize(self, file_name: impl AsRef<str>, kdl: impl AsRef<str>) -> LibraryError {
        let kdl = NamedSource::new(file_name, kdl.as_ref().to_owned());
        LibraryError { kdl, kind: self }
    }
}
