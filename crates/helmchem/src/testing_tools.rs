macro_rules! assert_miette_contains {
    ($diag:expr, [$($needle:expr),+ $(,)?]) => {{
        use miette::{GraphicalReportHandler, GraphicalTheme};

        let mut out = String::new();
        GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor())
            .with_width(120)
            .render_report(&mut out, $diag.unwrap_err().as_ref())
            .unwrap();
        $(
            assert!(out.contains($needle), "{:?} was not found in the report:\n{out}", $needle);
        )+
    }};
}

pub(crate) use assert_miette_contains;
