use std::path::Path;

use super::{Compiler, LightningPrefixer, Prefixer};
use crate::error::CompileError;

/// Compiles `.scss` sources to CSS with grass, then vendor-prefixes the result
/// when browser targets are configured.
#[derive(Debug, Default, Clone)]
pub struct SassCompiler {
    browsers: Option<Vec<String>>,
}

impl SassCompiler {
    pub fn new(browsers: Option<Vec<String>>) -> Self {
        Self { browsers }
    }
}

impl Compiler for SassCompiler {
    fn name(&self) -> &'static str {
        "sass"
    }

    fn output_extension(&self) -> &'static str {
        "css"
    }

    fn source_extensions(&self) -> &'static [&'static str] {
        &["scss"]
    }

    fn content_type(&self) -> &'static str {
        "text/css; charset=utf-8"
    }

    fn compile(&self, source: &str, path: &Path) -> Result<String, CompileError> {
        let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
        if let Some(parent) = path.parent() {
            options = options.load_path(parent);
        }

        let css = grass::from_string(source.to_string(), &options).map_err(|e| {
            CompileError::Sass {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;

        match &self.browsers {
            Some(browsers) => LightningPrefixer.prefix(&css, browsers),
            None => Ok(css),
        }
    }
}
