//! On-request compilers used by the site middleware and the exporter.

mod markdown;
mod prefix;
mod sass;

pub use markdown::MarkdownCompiler;
pub use prefix::{LightningPrefixer, Prefixer};
pub use sass::SassCompiler;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::CompileError;
use crate::paths::has_extension;

/// Turns one kind of source file into a servable file
pub trait Compiler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Extension of the produced file, e.g. `html`
    fn output_extension(&self) -> &'static str;

    /// Source extensions, in lookup order
    fn source_extensions(&self) -> &'static [&'static str];

    fn content_type(&self) -> &'static str;

    fn compile(&self, source: &str, path: &Path) -> Result<String, CompileError>;
}

/// The compilers a site gets unless told otherwise
pub fn default_compilers(browsers: Option<Vec<String>>) -> Vec<Arc<dyn Compiler>> {
    vec![
        Arc::new(MarkdownCompiler),
        Arc::new(SassCompiler::new(browsers)),
    ]
}

/// Finds the compiler that reads `path`, if any
pub fn compiler_for_source<'a>(
    compilers: &'a [Arc<dyn Compiler>],
    path: &Path,
) -> Option<&'a Arc<dyn Compiler>> {
    compilers.iter().find(|c| {
        c.source_extensions()
            .iter()
            .any(|ext| has_extension(path, ext))
    })
}

/// Reads and compiles one source file
pub fn compile_file(compiler: &dyn Compiler, path: &Path) -> Result<String, CompileError> {
    let source = std::fs::read_to_string(path).map_err(|source| CompileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let output = compiler.compile(&source, path)?;
    tracing::debug!(compiler = compiler.name(), path = %path.display(), "compiled");
    Ok(output)
}

/// Every source extension handled by `compilers`
pub fn source_extensions(compilers: &[Arc<dyn Compiler>]) -> Vec<&'static str> {
    compilers
        .iter()
        .flat_map(|c| c.source_extensions().iter().copied())
        .collect()
}

/// Output path of a compiled source, e.g. `docs/intro.md` -> `docs/intro.html`
pub fn output_path(compiler: &dyn Compiler, source: &Path) -> PathBuf {
    source.with_extension(compiler.output_extension())
}
