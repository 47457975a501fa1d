//! Moving structure payloads (molfiles, mostly) in and out of single-line interchange fields

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::errors::CodecError;

/// How a structure payload was encoded for transport
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureEncoding {
    #[default]
    #[display("plain")]
    Plain,
    #[display("escaped")]
    Escaped,
}

impl StructureEncoding {
    #[must_use]
    pub fn codec(self) -> &'static dyn StructureCodec {
        match self {
            Self::Plain => &PlainCodec,
            Self::Escaped => &EscapedCodec,
        }
    }
}

pub trait StructureCodec {
    fn encode(&self, structure: &str) -> String;

    fn decode(&self, payload: &str) -> Result<String, CodecError>;
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct PlainCodec;

impl StructureCodec for PlainCodec {
    fn encode(&self, structure: &str) -> String {
        structure.to_owned()
    }

    fn decode(&self, payload: &str) -> Result<String, CodecError> {
        Ok(payload.to_owned())
    }
}

/// Escapes control characters, quotes, and backslashes so multi-line structures survive single-line transport
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct EscapedCodec;

impl StructureCodec for EscapedCodec {
    fn encode(&self, structure: &str) -> String {
        let mut payload = String::with_capacity(structure.len());
        for c in structure.chars() {
            match c {
                '\\' => payload.push_str(r"\\"),
                '\n' => payload.push_str(r"\n"),
                '\r' => payload.push_str(r"\r"),
                '\t' => payload.push_str(r"\t"),
                '"' => payload.push_str(r#"\""#),
                c => payload.push(c),
            }
        }
        payload
    }

    fn decode(&self, payload: &str) -> Result<String, CodecError> {
        let mut structure = String::with_capacity(payload.len());
        let mut chars = payload.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                structure.push(c);
                continue;
            }
            let unescaped = match chars.next().ok_or(CodecError::TrailingEscape)? {
                '\\' => '\\',
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                '"' => '"',
                other => return Err(CodecError::UnknownEscape(other)),
            };
            structure.push(unescaped);
        }
        Ok(structure)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    const MOLFILE: &str = indoc! {r#"

          Marvin  06150820052D

          3  2  0  0  0  0            999 V2000
           -0.7145    0.4125    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
            0.0000    0.8250    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
            0.7145    0.4125    0.0000 R#  0  0  0  0  0  0  0  0  0  0  0  0
          1  2  1  0  0  0  0
          2  3  1  0  0  0  0
        M  RGP  1   3   1
        M  END
    "#};

    #[test]
    fn escaped_payloads_are_single_line() {
        let payload = EscapedCodec.encode(MOLFILE);
        assert!(!payload.contains('\n'));
        assert_eq!(EscapedCodec.decode(&payload).unwrap(), MOLFILE);
    }

    #[test]
    fn escape_sequences() {
        assert_eq!(EscapedCodec.encode("a\\b\t\"c\"\r\n"), r#"a\\b\t\"c\"\r\n"#);
        assert_eq!(EscapedCodec.decode(r"C\nO").unwrap(), "C\nO");
        assert_eq!(EscapedCodec.decode(r"C\q"), Err(CodecError::UnknownEscape('q')));
        assert_eq!(EscapedCodec.decode(r"C\"), Err(CodecError::TrailingEscape));
    }

    #[test]
    fn codecs_by_encoding() {
        assert_eq!(StructureEncoding::Plain.codec().decode(r"C\n").unwrap(), r"C\n");
        assert_eq!(StructureEncoding::Escaped.codec().decode(r"C\n").unwrap(), "C\n");
        assert_eq!(StructureEncoding::default(), StructureEncoding::Plain);
        assert_eq!(StructureEncoding::Escaped.to_string(), "escaped");
    }
}
