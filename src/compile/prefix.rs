//! Vendor prefixing using lightningcss.

use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

use crate::error::CompileError;

/// Adds vendor prefixes to a stylesheet for a set of browserslist queries
pub trait Prefixer: Send + Sync {
    fn prefix(&self, css: &str, browsers: &[String]) -> Result<String, CompileError>;
}

/// [`Prefixer`] backed by lightningcss and its browserslist resolver.
///
/// Prefixes are produced by lightningcss's minify pass, which also folds the
/// stylesheet: overridden fallback declarations and empty rules are removed,
/// and adjacent rules with the same selector are merged. Output is printed
/// unminified.
#[derive(Debug, Default, Clone, Copy)]
pub struct LightningPrefixer;

impl Prefixer for LightningPrefixer {
    fn prefix(&self, css: &str, browsers: &[String]) -> Result<String, CompileError> {
        let browsers = resolve_browsers(browsers)?;
        let targets = || Targets {
            browsers,
            ..Targets::default()
        };

        let mut stylesheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| CompileError::Css(e.to_string()))?;

        // Only the transforms run here; output stays unminified.
        stylesheet
            .minify(MinifyOptions {
                targets: targets(),
                ..Default::default()
            })
            .map_err(|e| CompileError::Css(e.to_string()))?;

        let output = stylesheet
            .to_css(PrinterOptions {
                minify: false,
                targets: targets(),
                ..Default::default()
            })
            .map_err(|e| CompileError::Css(e.to_string()))?;

        Ok(output.code)
    }
}

fn resolve_browsers(queries: &[String]) -> Result<Option<Browsers>, CompileError> {
    Browsers::from_browserslist(queries.iter().map(String::as_str))
        .map_err(|e| CompileError::Browsers(e.to_string()))
}
