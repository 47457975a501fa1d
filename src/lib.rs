//! The `helmcheck` front end: loading a monomer library, then parsing, validating, and summarising HELM2 notation

use std::{fs, path::PathBuf, sync::Arc};

use clap::Parser;
use helm_notation::{HelmDocument, parse};
use helmchem::{MonomerRegistry, SmilesReader, library::DEFAULT_KDL};
use log::info;
use miette::{IntoDiagnostic, WrapErr};

/// Parses and validates HELM2 notation, reading from the arguments or, without any, from an interactive prompt
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// HELM2 strings to check, one per argument
    pub notations: Vec<String>,

    /// A KDL monomer library to use in place of the bundled one
    #[arg(short, long)]
    pub library: Option<PathBuf>,

    /// Only parse the notation, skipping the monomer and connection checks
    #[arg(long, default_value_t = false)]
    pub no_validate: bool,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Loads the library named on the command line, falling back to the bundled monomers
pub fn load_registry(library: Option<&PathBuf>) -> miette::Result<MonomerRegistry> {
    let Some(path) = library else {
        return MonomerRegistry::from_kdl("monomer_library.kdl", DEFAULT_KDL, Arc::new(SmilesReader));
    };
    info!(path:? = path; "loading monomer library");
    let kdl = fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read the monomer library at {}", path.display()))?;
    MonomerRegistry::from_kdl(path.to_string_lossy(), kdl, Arc::new(SmilesReader))
}

/// Checks a single notation, returning a short report of what was found in it
pub fn notation_info(notation: &str, registry: Option<&MonomerRegistry>) -> helm_notation::Result<String> {
    let document = parse(notation.trim())?;
    if let Some(registry) = registry {
        document.validate(registry)?;
    }
    Ok(summarise(&document))
}

// Helper Functions ====================================================================================================

fn summarise(document: &HelmDocument) -> String {
    format!(
        "Polymers: {}\nMonomers: {}\nCanonical: {document}\n\n",
        document.polymers.len(),
        document.total_monomer_count()
    )
}
