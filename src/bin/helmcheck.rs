use std::{process, str::FromStr};

use clap::Parser;
use helm_next::{Args, load_registry, notation_info};
use log::{LevelFilter, debug};
use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme, IntoDiagnostic};
use rustyline::DefaultEditor;

fn main() -> miette::Result<()> {
    let args = Args::parse();

    let log_level = LevelFilter::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {}. Using 'warn' instead.", args.log_level);
        LevelFilter::Warn
    });
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();
    debug!(args:?; "parsed arguments");

    let registry = load_registry(args.library.as_ref())?;
    let registry = (!args.no_validate).then_some(&registry);

    if !args.notations.is_empty() {
        let mut failed = false;
        for notation in &args.notations {
            match notation_info(notation, registry) {
                Ok(info) => print!("{info}"),
                Err(diagnostic) => {
                    render_error(*diagnostic);
                    failed = true;
                }
            }
        }
        if failed {
            process::exit(1);
        }
        return Ok(());
    }

    let mut rl = DefaultEditor::new().into_diagnostic()?;
    while let Ok(notation) = rl.readline("HELM: ") {
        rl.add_history_entry(&notation).into_diagnostic()?;
        match notation_info(&notation, registry) {
            Ok(info) => print!("{info}"),
            Err(diagnostic) => render_error(*diagnostic),
        }
    }
    Ok(())
}

fn render_error(diagnostic: impl Into<Box<dyn Diagnostic + 'static>>) {
    let mut buf = String::new();
    let rendered = GraphicalReportHandler::new_themed(GraphicalTheme::unicode())
        .render_report(&mut buf, diagnostic.into().as_ref());
    if rendered.is_ok() {
        println!("{buf}");
    }
}
