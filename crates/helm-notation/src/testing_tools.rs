/// Renders the error of a failed parse or check, then asserts that each needle appears somewhere in the report
macro_rules! assert_miette_contains {
    ($result:expr, [$($needle:expr),+ $(,)?]) => {{
        use miette::{GraphicalReportHandler, GraphicalTheme};

        let error = $result.unwrap_err();
        let mut report = String::new();
        GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor())
            .with_width(120)
            .render_report(&mut report, &*error)
            .unwrap();
        $(
            assert!(report.contains($needle), "{:?} is missing from the report:\n{report}", $needle);
        )+
    }};
}

pub(crate) use assert_miette_contains;
