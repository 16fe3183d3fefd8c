//! Site export: writes a built copy of a site directory.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use walkdir::{DirEntry, WalkDir};

use crate::{
    compile::{
        compile_file, compiler_for_source, default_compilers, output_path, Compiler,
        LightningPrefixer, Prefixer,
    },
    config::{Autoprefix, CONFIG_FILE},
    error::{CompileError, ExportError},
    paths::has_extension,
};

/// Options for an export run
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub autoprefix: Autoprefix,
}

/// Files written by an export, relative to the output directory
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub compiled: Vec<PathBuf>,
    pub copied: Vec<PathBuf>,
}

/// Builds a site from `input` into `output`
pub trait Exporter {
    fn export(&self, input: &Path, output: &Path, options: &ExportOptions) -> Result<ExportReport, ExportError>;
}

/// Exports a site with the default [`SiteExporter`], returning its result unchanged
pub fn export_site(input: &Path, output: &Path, options: &ExportOptions) -> Result<ExportReport, ExportError> {
    SiteExporter.export(input, output, options)
}

/// Compiles every source the dev server would compile and copies everything else.
///
/// Dot-files, `pingy.json` and the output directory (when nested in the input)
/// are skipped. Plain CSS is prefixed when `autoprefix` is enabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct SiteExporter;

impl Exporter for SiteExporter {
    fn export(&self, input: &Path, output: &Path, options: &ExportOptions) -> Result<ExportReport, ExportError> {
        if !input.is_dir() {
            return Err(ExportError::MissingInput(input.to_path_buf()));
        }
        create_dir(output)?;

        // Canonical paths so a nested output directory can be recognised and skipped
        let input = canonical(input)?;
        let output = canonical(output)?;
        let browsers = options.autoprefix.browsers();
        let compilers = default_compilers(browsers.clone());

        let mut report = ExportReport::default();
        // Sorted walk keeps the report deterministic
        let walker = WalkDir::new(&input)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !skip_entry(entry, &output));

        for entry in walker {
            let entry = entry.map_err(|source| ExportError::Walk {
                path: input.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&input)
                .unwrap_or(entry.path())
                .to_path_buf();

            // Sources are compiled; everything else is copied
            match compiler_for_source(&compilers, &relative) {
                Some(compiler) => {
                    let target = export_compiled(compiler, entry.path(), &output, &relative)?;
                    report.compiled.push(target);
                }
                None => {
                    export_copied(entry.path(), &output, &relative, browsers.as_deref())?;
                    report.copied.push(relative);
                }
            }
        }

        tracing::info!(
            input = %input.display(),
            output = %output.display(),
            compiled = report.compiled.len(),
            copied = report.copied.len(),
            "export finished"
        );
        Ok(report)
    }
}

fn skip_entry(entry: &DirEntry, output: &Path) -> bool {
    let hidden = entry.file_name().to_str().is_some_and(|name| name.starts_with('.'));
    hidden || entry.file_name() == CONFIG_FILE || entry.path() == output
}

fn export_compiled(
    compiler: &Arc<dyn Compiler>,
    source: &Path,
    output: &Path,
    relative: &Path,
) -> Result<PathBuf, ExportError> {
    let compiled = compile_file(compiler.as_ref(), source)?;
    let target = output_path(compiler.as_ref(), relative);
    write_file(&output.join(&target), compiled.as_bytes())?;
    Ok(target)
}

fn export_copied(
    source: &Path,
    output: &Path,
    relative: &Path,
    browsers: Option<&[String]>,
) -> Result<(), ExportError> {
    let target = output.join(relative);
    match browsers {
        Some(browsers) if has_extension(source, "css") => {
            let css = fs::read_to_string(source).map_err(|e| CompileError::Read {
                path: source.to_path_buf(),
                source: e,
            })?;
            let prefixed = LightningPrefixer.prefix(&css, browsers)?;
            write_file(&target, prefixed.as_bytes())
        }
        _ => {
            if let Some(parent) = target.parent() {
                create_dir(parent)?;
            }
            fs::copy(source, &target).map_err(|e| write_error(&target, e))?;
            Ok(())
        }
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, contents).map_err(|e| write_error(path, e))
}

fn create_dir(path: &Path) -> Result<(), ExportError> {
    fs::create_dir_all(path).map_err(|e| write_error(path, e))
}

fn canonical(path: &Path) -> Result<PathBuf, ExportError> {
    path.canonicalize().map_err(|e| write_error(path, e))
}

fn write_error(path: &Path, source: std::io::Error) -> ExportError {
    ExportError::Write {
        path: path.to_path_buf(),
        source,
    }
}
