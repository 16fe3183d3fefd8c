use pulldown_cmark::{html, Options, Parser};
use std::path::Path;

use super::Compiler;
use crate::error::CompileError;

/// Compiles `.md` sources into standalone HTML pages
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownCompiler;

impl Compiler for MarkdownCompiler {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn output_extension(&self) -> &'static str {
        "html"
    }

    fn source_extensions(&self) -> &'static [&'static str] {
        &["md", "markdown"]
    }

    fn content_type(&self) -> &'static str {
        "text/html; charset=utf-8"
    }

    fn compile(&self, source: &str, path: &Path) -> Result<String, CompileError> {
        Ok(wrap_with_template(&markdown_to_html(source), path))
    }
}

/// Converts markdown text to HTML
fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);

    let parser = Parser::new_ext(markdown, options);

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

/// Wraps HTML content in a complete HTML document titled after the source file
fn wrap_with_template(content: &str, source_path: &Path) -> String {
    let title = source_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled")
        .replace(['_', '-'], " ");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
</head>
<body>
{content}</body>
</html>
"#
    )
}
