//! Conversion between notebook text dialects, file formats and [`Notebook`].
//!
//! Text dialects are what the book pages contain: GitHub-flavoured Markdown,
//! where a fence tagged with a code language is a code cell, and R-markdown,
//! where only a curly-brace fence (`{python}`) is. File formats are what gets
//! written to disk: nbformat 4 JSON or an R-markdown notebook.

use std::collections::HashMap;
use std::path::Path;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::notebook::{Cell, CellType, Notebook};

const DEFAULT_LANGUAGE: &str = "python";

#[derive(Debug)]
pub enum CodecError {
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
    UnknownFormat(String),
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::Json(err)
    }
}

impl From<serde_yaml::Error> for CodecError {
    fn from(err: serde_yaml::Error) -> Self {
        CodecError::Yaml(err)
    }
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::Json(e) => write!(f, "Notebook JSON error: {}", e),
            CodecError::Yaml(e) => write!(f, "Notebook header error: {}", e),
            CodecError::UnknownFormat(name) => write!(f, "Unknown notebook format: {}", name),
        }
    }
}

impl std::error::Error for CodecError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Markdown,
    RMarkdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ipynb,
    RMarkdown,
}

impl Format {
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Ipynb => "ipynb",
            Format::RMarkdown => "Rmd",
        }
    }

    /// Format for a file suffix, with or without the leading dot.
    pub fn from_suffix(suffix: &str) -> Option<Format> {
        match suffix.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "ipynb" => Some(Format::Ipynb),
            "rmd" => Some(Format::RMarkdown),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Format> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_suffix)
    }
}

/// Maps short format names ("python", "r", "Rmd", ...) to file formats, so
/// callers can ask for "the R edition's format" without naming it.
#[derive(Debug, Clone)]
pub struct FormatTable {
    names: HashMap<String, Format>,
}

impl Default for FormatTable {
    fn default() -> Self {
        Self::empty()
            .with("python", Format::Ipynb)
            .with("ipynb", Format::Ipynb)
            .with("jupyter", Format::Ipynb)
            .with("r", Format::RMarkdown)
            .with("rmd", Format::RMarkdown)
            .with("rmarkdown", Format::RMarkdown)
    }
}

impl FormatTable {
    pub fn empty() -> Self {
        Self {
            names: HashMap::new(),
        }
    }

    pub fn with<S: AsRef<str>>(mut self, name: S, format: Format) -> Self {
        self.names.insert(Self::key(name.as_ref()), format);
        self
    }

    pub fn resolve(&self, name: &str) -> Result<Format, CodecError> {
        self.names
            .get(&Self::key(name))
            .copied()
            .ok_or_else(|| CodecError::UnknownFormat(name.to_string()))
    }

    fn key(name: &str) -> String {
        name.trim().trim_start_matches('.').to_ascii_lowercase()
    }
}

#[derive(Debug, Clone)]
pub struct CodecOptions {
    /// Fence languages that make a code cell in the plain Markdown dialect.
    pub code_languages: Vec<String>,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            code_languages: vec!["python".to_string(), "r".to_string()],
        }
    }
}

impl CodecOptions {
    fn is_code_language(&self, lang: &str) -> bool {
        self.code_languages
            .iter()
            .any(|known| known.eq_ignore_ascii_case(lang))
    }
}

/// Splits dialect text into cells.
///
/// Each top-level executable fenced block becomes a code cell. The text
/// between them becomes markdown cells, split wherever two or more blank
/// lines occur outside a fence.
pub fn parse_text(text: &str, dialect: Dialect, options: &CodecOptions) -> Notebook {
    let mut cells = Vec::new();
    let mut prose_start = 0;
    let mut depth = 0usize;
    let mut code: Option<String> = None;

    for (event, range) in Parser::new_ext(text, Options::empty()).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))
                if depth == 0 && is_executable(&info, dialect, options) =>
            {
                push_prose(&mut cells, &text[prose_start..range.start]);
                prose_start = range.end;
                code = Some(String::new());
                depth += 1;
            }
            Event::Start(_) => depth += 1,
            Event::End(TagEnd::CodeBlock) if depth == 1 && code.is_some() => {
                depth -= 1;
                let mut source = code.take().unwrap_or_default();
                if source.ends_with('\n') {
                    source.pop();
                }
                cells.push(Cell::code(source));
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Text(chunk) => {
                if let Some(buf) = code.as_mut() {
                    buf.push_str(&chunk);
                }
            }
            _ => {}
        }
    }
    push_prose(&mut cells, &text[prose_start.min(text.len())..]);

    Notebook::new(cells)
}

fn is_executable(info: &str, dialect: Dialect, options: &CodecOptions) -> bool {
    let info = info.trim();
    match dialect {
        Dialect::Markdown => info
            .split_whitespace()
            .next()
            .is_some_and(|lang| !lang.starts_with('{') && options.is_code_language(lang)),
        Dialect::RMarkdown => chunk_language(info).is_some(),
    }
}

/// Language of an R-markdown chunk header such as `{python}` or `{r setup, echo=FALSE}`.
fn chunk_language(info: &str) -> Option<&str> {
    let inner = info.strip_prefix('{')?;
    let end = inner.find('}')?;
    inner[..end]
        .split(|c: char| c == ',' || c.is_whitespace())
        .next()
        .filter(|lang| !lang.is_empty())
}

fn push_prose(cells: &mut Vec<Cell>, chunk: &str) {
    let mut current: Vec<&str> = Vec::new();
    let mut blanks = 0;
    let mut in_fence = false;

    for line in chunk.lines() {
        if line.trim().is_empty() {
            blanks += 1;
            if in_fence {
                current.push("");
            }
            continue;
        }
        if !in_fence {
            if blanks >= 2 {
                flush_markdown(cells, &mut current);
            } else if blanks == 1 && !current.is_empty() {
                current.push("");
            }
        }
        blanks = 0;
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        current.push(line);
    }
    flush_markdown(cells, &mut current);
}

fn flush_markdown(cells: &mut Vec<Cell>, lines: &mut Vec<&str>) {
    if !lines.is_empty() {
        cells.push(Cell::markdown(lines.join("\n")));
        lines.clear();
    }
}

pub fn read(text: &str, format: Format) -> Result<Notebook, CodecError> {
    match format {
        Format::Ipynb => read_ipynb(text),
        Format::RMarkdown => read_rmarkdown(text),
    }
}

pub fn write(notebook: &Notebook, format: Format) -> Result<String, CodecError> {
    match format {
        Format::Ipynb => write_ipynb(notebook),
        Format::RMarkdown => write_rmarkdown(notebook),
    }
}

// nbformat 4 on-disk structures.

#[derive(Debug, Serialize, Deserialize)]
struct IpynbNotebook {
    cells: Vec<IpynbCell>,
    #[serde(default)]
    metadata: Map<String, Value>,
    nbformat: u32,
    nbformat_minor: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
enum IpynbCell {
    Markdown {
        #[serde(default)]
        metadata: Map<String, Value>,
        source: MultilineString,
    },
    Code {
        #[serde(default)]
        execution_count: Option<u32>,
        #[serde(default)]
        metadata: Map<String, Value>,
        #[serde(default)]
        outputs: Vec<Value>,
        source: MultilineString,
    },
    Raw {
        #[serde(default)]
        metadata: Map<String, Value>,
        source: MultilineString,
    },
}

/// nbformat allows text fields as a single string or a list of lines.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum MultilineString {
    Single(String),
    Multi(Vec<String>),
}

impl MultilineString {
    fn from_text(text: &str) -> Self {
        MultilineString::Multi(text.split_inclusive('\n').map(str::to_string).collect())
    }

    fn into_string(self) -> String {
        match self {
            MultilineString::Single(s) => s,
            MultilineString::Multi(v) => v.join(""),
        }
    }
}

fn read_ipynb(text: &str) -> Result<Notebook, CodecError> {
    let raw: IpynbNotebook = serde_json::from_str(text)?;
    let cells = raw
        .cells
        .into_iter()
        .map(|cell| match cell {
            IpynbCell::Markdown { metadata, source } => Cell {
                cell_type: CellType::Markdown,
                source: source.into_string(),
                metadata,
            },
            IpynbCell::Code {
                metadata, source, ..
            } => Cell {
                cell_type: CellType::Code,
                source: source.into_string(),
                metadata,
            },
            IpynbCell::Raw { metadata, source } => {
                log::warn!("Reading raw notebook cell as markdown");
                Cell {
                    cell_type: CellType::Markdown,
                    source: source.into_string(),
                    metadata,
                }
            }
        })
        .collect();

    Ok(Notebook {
        cells,
        metadata: raw.metadata,
    })
}

fn write_ipynb(notebook: &Notebook) -> Result<String, CodecError> {
    let raw = IpynbNotebook {
        cells: notebook
            .cells
            .iter()
            .map(|cell| match cell.cell_type {
                CellType::Markdown => IpynbCell::Markdown {
                    metadata: cell.metadata.clone(),
                    source: MultilineString::from_text(&cell.source),
                },
                CellType::Code => IpynbCell::Code {
                    execution_count: None,
                    metadata: cell.metadata.clone(),
                    outputs: Vec::new(),
                    source: MultilineString::from_text(&cell.source),
                },
            })
            .collect(),
        metadata: notebook.metadata.clone(),
        nbformat: 4,
        nbformat_minor: 4,
    };

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    raw.serialize(&mut ser)?;
    buf.push(b'\n');

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Notebook metadata key holding R-markdown front matter that sits outside
/// the `jupyter` block, such as `title` or `output`.
pub const RMARKDOWN_METADATA_KEY: &str = "rmarkdown";

/// YAML front matter of an R-markdown notebook.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RmdHeader {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    jupyter: Map<String, Value>,
    #[serde(flatten)]
    document: Map<String, Value>,
}

impl RmdHeader {
    fn from_metadata(metadata: &Map<String, Value>) -> Self {
        let mut jupyter = metadata.clone();
        let document = match jupyter.remove(RMARKDOWN_METADATA_KEY) {
            Some(Value::Object(document)) => document,
            Some(other) => {
                jupyter.insert(RMARKDOWN_METADATA_KEY.to_string(), other);
                Map::new()
            }
            None => Map::new(),
        };
        Self { jupyter, document }
    }

    fn into_metadata(self) -> Map<String, Value> {
        let mut metadata = self.jupyter;
        if !self.document.is_empty() {
            metadata.insert(
                RMARKDOWN_METADATA_KEY.to_string(),
                Value::Object(self.document),
            );
        }
        metadata
    }
}

enum Segment<'a> {
    Text(&'a str),
    Region(&'a str),
}

fn read_rmarkdown(text: &str) -> Result<Notebook, CodecError> {
    let (metadata, body) = split_header(text)?;
    let mut cells = Vec::new();
    for segment in split_regions(body) {
        match segment {
            Segment::Text(text) => {
                cells.extend(parse_text(text, Dialect::RMarkdown, &CodecOptions::default()).cells)
            }
            Segment::Region(source) => cells.push(Cell::markdown(source)),
        }
    }

    Ok(Notebook { cells, metadata })
}

fn write_rmarkdown(notebook: &Notebook) -> Result<String, CodecError> {
    let mut out = String::new();
    if !notebook.metadata.is_empty() {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(&RmdHeader::from_metadata(
            &notebook.metadata,
        ))?);
        out.push_str("---\n\n");
    }

    let language = notebook
        .language()
        .filter(|lang| !lang.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
    let mut previous: Option<CellType> = None;
    for cell in &notebook.cells {
        match previous {
            Some(CellType::Markdown) if cell.is_markdown() => out.push_str("\n\n\n"),
            Some(_) => out.push_str("\n\n"),
            None => {}
        }
        match cell.cell_type {
            CellType::Markdown => {
                let at_top = out.is_empty();
                out.push_str(&markdown_block(&cell.source, &language, at_top));
            }
            CellType::Code => out.push_str(&code_chunk(&cell.source, &language)),
        }
        previous = Some(cell.cell_type);
    }
    out.push('\n');

    Ok(out)
}

/// A markdown cell as written to R-markdown. Cells that would not read back
/// as themselves are wrapped in region markers and kept verbatim. The marker
/// label is the first one whose end line does not occur in the source.
fn markdown_block(source: &str, language: &str, at_top: bool) -> String {
    let plain = !(at_top && source.starts_with("---"))
        && !source.lines().any(|line| region_label(line).is_some())
        && reads_back_as_markdown(source, language);
    if plain {
        return source.to_string();
    }

    let mut n = 0;
    let label = loop {
        let label = if n == 0 { String::new() } else { n.to_string() };
        let end = region_end(&label);
        if !source.lines().any(|line| line.trim() == end) {
            break label;
        }
        n += 1;
    };
    format!("{}\n{}\n{}", region_start(&label), source, region_end(&label))
}

/// Label of a region start line: empty for `<!-- #region -->`, `n` for
/// `<!-- #region n -->`.
fn region_label(line: &str) -> Option<&str> {
    let inner = line
        .trim()
        .strip_prefix("<!-- #region")?
        .strip_suffix("-->")?;
    if inner.trim().is_empty() {
        return Some("");
    }
    let label = inner.strip_prefix(' ')?.trim_end();
    label
        .chars()
        .all(|c| c.is_ascii_alphanumeric())
        .then_some(label)
}

fn region_start(label: &str) -> String {
    if label.is_empty() {
        "<!-- #region -->".to_string()
    } else {
        format!("<!-- #region {label} -->")
    }
}

fn region_end(label: &str) -> String {
    if label.is_empty() {
        "<!-- #endregion -->".to_string()
    } else {
        format!("<!-- #endregion {label} -->")
    }
}

/// Whether `source`, followed by a chunk, parses back to the same markdown
/// cell and that chunk.
fn reads_back_as_markdown(source: &str, language: &str) -> bool {
    let text = format!("{source}\n\n```{{{language}}}\nx\n```\n");
    let cells = parse_text(&text, Dialect::RMarkdown, &CodecOptions::default()).cells;
    matches!(
        cells.as_slice(),
        [prose, chunk] if prose.is_markdown()
            && prose.source == source
            && chunk.is_code()
            && chunk.source == "x"
    )
}

/// The chunk fence is longer than any backtick run inside the source.
fn code_chunk(source: &str, language: &str) -> String {
    let longest = source
        .lines()
        .map(|line| line.trim_start().chars().take_while(|&c| c == '`').count())
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest.max(2) + 1);
    format!("{fence}{{{language}}}\n{source}\n{fence}")
}

/// Splits a leading `---` YAML block off an R-markdown notebook. The
/// `jupyter` mapping becomes the notebook metadata.
fn split_header(text: &str) -> Result<(Map<String, Value>, &str), CodecError> {
    let Some(rest) = text.strip_prefix("---\n") else {
        return Ok((Map::new(), text));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            let header: RmdHeader = if yaml.trim().is_empty() {
                RmdHeader::default()
            } else {
                serde_yaml::from_str(yaml)?
            };
            return Ok((header.into_metadata(), body));
        }
        offset += line.len();
    }

    Ok((Map::new(), text))
}

/// Cuts the body at region markers found outside code fences. An unclosed
/// region is ordinary text.
fn split_regions(body: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut fence: Option<(char, usize)> = None;
    // Open marker line offset, content offset and the closing line.
    let mut region: Option<(usize, usize, String)> = None;
    let mut offset = 0;

    for line in body.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let content = line.trim_end_matches(['\n', '\r']);

        if let Some((marker_start, content_start, end)) = &region {
            if content.trim() == end.as_str() {
                let content_end = line_start.saturating_sub(1).max(*content_start);
                segments.push(Segment::Text(&body[text_start..*marker_start]));
                segments.push(Segment::Region(&body[*content_start..content_end]));
                region = None;
                text_start = offset;
            }
            continue;
        }
        match fence {
            Some(open) => {
                if closes_fence(content, open) {
                    fence = None;
                }
            }
            None => match region_label(content) {
                Some(label) => region = Some((line_start, offset, region_end(label))),
                None => fence = fence_marker(content),
            },
        }
    }
    segments.push(Segment::Text(&body[text_start..]));

    segments
}

/// Fence character and run length of a line that opens a fenced block.
fn fence_marker(line: &str) -> Option<(char, usize)> {
    let rest = line.trim_start_matches(' ');
    if line.len() - rest.len() > 3 {
        return None;
    }
    let marker = rest.chars().next().filter(|&c| matches!(c, '`' | '~'))?;
    let run = rest.chars().take_while(|&c| c == marker).count();
    (run >= 3).then_some((marker, run))
}

fn closes_fence(line: &str, (marker, run): (char, usize)) -> bool {
    let rest = line.trim_start_matches(' ');
    let closing = rest.chars().take_while(|&c| c == marker).count();
    line.len() - rest.len() <= 3 && closing >= run && rest[closing..].trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::KernelSpec;

    const FIRST: &str = "\
This is some explanation about the notebook.

It can use macros: Python.

```{python}
import matplotlib.pyplot as plt
plt.plot([0, 2, 1, 4])
plt.show()
```

A normal paragraph.";

    const SECOND: &str = "\
This is some explanation about the second notebook.

```{python}
import matplotlib.pyplot as plt
plt.plot(range(10))
plt.show()
```

Some unrelated text.



Again, text.

```{python}
a = 1
a
```";

    fn rmd(text: &str) -> Notebook {
        parse_text(text, Dialect::RMarkdown, &CodecOptions::default())
    }

    #[test]
    fn splits_rmarkdown_into_cells() {
        let nb = rmd(FIRST);
        assert_eq!(
            nb.cell_types(),
            vec![CellType::Markdown, CellType::Code, CellType::Markdown]
        );
        assert_eq!(
            nb.cells[0].source,
            "This is some explanation about the notebook.\n\nIt can use macros: Python."
        );
        assert_eq!(
            nb.cells[1].source,
            "import matplotlib.pyplot as plt\nplt.plot([0, 2, 1, 4])\nplt.show()"
        );
        assert_eq!(nb.cells[2].source, "A normal paragraph.");
    }

    #[test]
    fn blank_line_runs_split_markdown_cells() {
        let nb = rmd(SECOND);
        assert_eq!(
            nb.cell_types(),
            vec![
                CellType::Markdown,
                CellType::Code,
                CellType::Markdown,
                CellType::Markdown,
                CellType::Code
            ]
        );
        assert_eq!(nb.cells[2].source, "Some unrelated text.");
        assert_eq!(nb.cells[3].source, "Again, text.");
        assert_eq!(nb.cells[4].source, "a = 1\na");
    }

    #[test]
    fn bare_fences_are_prose_in_rmarkdown() {
        let nb = rmd("Text\n\n```python\nnot run\n```\n");
        assert_eq!(nb.cell_types(), vec![CellType::Markdown]);
        assert!(nb.cells[0].source.contains("```python"));
    }

    #[test]
    fn markdown_dialect_uses_known_languages() {
        let text = "Intro\n\n```python\nx = 1\n```\n\n```text\noutput\n```\n";
        let nb = parse_text(text, Dialect::Markdown, &CodecOptions::default());
        assert_eq!(nb.cell_types(), vec![CellType::Markdown, CellType::Code, CellType::Markdown]);
        assert_eq!(nb.cells[1].source, "x = 1");
        assert_eq!(nb.cells[2].source, "```text\noutput\n```");
    }

    #[test]
    fn fences_inside_lists_stay_in_markdown() {
        let text = "- item\n\n  ```{python}\n  x = 1\n  ```\n";
        let nb = rmd(text);
        assert_eq!(nb.cell_types(), vec![CellType::Markdown]);
    }

    #[test]
    fn chunk_options_are_accepted() {
        let nb = rmd("```{r setup, echo=FALSE}\nlibrary(x)\n```");
        assert_eq!(nb.cell_types(), vec![CellType::Code]);
        assert_eq!(nb.cells[0].source, "library(x)");
    }

    #[test]
    fn writes_rmarkdown() {
        let out = write_rmarkdown(&rmd(SECOND)).unwrap();
        assert_eq!(
            out,
            "\
This is some explanation about the second notebook.

```{python}
import matplotlib.pyplot as plt
plt.plot(range(10))
plt.show()
```

Some unrelated text.


Again, text.

```{python}
a = 1
a
```
"
        );
    }

    #[test]
    fn ipynb_has_nbformat_shape() {
        let kernel = KernelSpec::new("python3", "Python 3", "python");
        let nb = rmd(FIRST).with_kernelspec(&kernel);
        let json: Value = serde_json::from_str(&write(&nb, Format::Ipynb).unwrap()).unwrap();

        assert_eq!(json["nbformat"], 4);
        assert_eq!(json["metadata"]["kernelspec"]["name"], "python3");
        let cells = json["cells"].as_array().unwrap();
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[1]["cell_type"], "code");
        assert_eq!(cells[1]["execution_count"], Value::Null);
        assert_eq!(cells[1]["outputs"], Value::Array(Vec::new()));
        assert_eq!(cells[1]["source"][0], "import matplotlib.pyplot as plt\n");
        assert_eq!(cells[1]["source"][2], "plt.show()");
    }

    #[test]
    fn reads_ipynb_with_string_sources_and_raw_cells() {
        let text = r#"{
            "cells": [
                {"cell_type": "markdown", "metadata": {}, "source": "Hello"},
                {"cell_type": "raw", "metadata": {}, "source": ["raw ", "text"]},
                {"cell_type": "code", "id": "abc", "execution_count": 3, "metadata": {},
                 "outputs": [{"output_type": "stream", "name": "stdout", "text": "1"}],
                 "source": ["a = 1\n", "a"]}
            ],
            "metadata": {"kernelspec": {"name": "ir", "display_name": "R", "language": "R"}},
            "nbformat": 4,
            "nbformat_minor": 5
        }"#;
        let nb = read(text, Format::Ipynb).unwrap();
        assert_eq!(
            nb.cell_types(),
            vec![CellType::Markdown, CellType::Markdown, CellType::Code]
        );
        assert_eq!(nb.cells[1].source, "raw text");
        assert_eq!(nb.cells[2].source, "a = 1\na");
        assert_eq!(nb.language().as_deref(), Some("R"));
    }

    #[test]
    fn roundtrips_through_both_formats() {
        let kernel = KernelSpec::new("python", "Python (Pyodide)", "python");
        for text in [FIRST, SECOND] {
            let nb = rmd(text).with_kernelspec(&kernel);
            for format in [Format::Ipynb, Format::RMarkdown] {
                let again = read(&write(&nb, format).unwrap(), format).unwrap();
                assert_eq!(again.cell_types(), nb.cell_types(), "{format:?}");
                for (a, b) in again.cells.iter().zip(&nb.cells) {
                    assert_eq!(a.source, b.source, "{format:?}");
                }
                assert_eq!(again.kernelspec(), Some(kernel.clone()));
            }
        }
    }

    #[test]
    fn rmarkdown_header_quotes_awkward_values() {
        let kernel = KernelSpec::new("xr", "R: \"xeus\" #1", "R");
        let nb = rmd("```{r}\nx <- 1\n```").with_kernelspec(&kernel);
        let text = write(&nb, Format::RMarkdown).unwrap();
        assert!(text.starts_with("---\njupyter:\n  kernelspec:\n"));
        assert!(text.contains("```{R}\nx <- 1\n```"));
        assert_eq!(read(&text, Format::RMarkdown).unwrap().kernelspec(), Some(kernel));
    }

    #[test]
    fn rmarkdown_header_is_read_as_yaml() {
        let text = "\
---
title: Fruit lies
jupyter:
    kernelspec:
        display_name: R
        language: r
        name: ir
    language_info:
        name: webr
---

```{r}
x <- 1
```
";
        let nb = read(text, Format::RMarkdown).unwrap();
        assert_eq!(nb.kernelspec(), Some(KernelSpec::new("ir", "R", "r")));
        assert_eq!(nb.metadata["language_info"]["name"], "webr");
        assert_eq!(nb.metadata[RMARKDOWN_METADATA_KEY]["title"], "Fruit lies");
        assert_eq!(nb.cells[0].source, "x <- 1");

        let again = read(&write(&nb, Format::RMarkdown).unwrap(), Format::RMarkdown).unwrap();
        assert_eq!(again, nb);
    }

    #[test]
    fn broken_rmarkdown_header_is_an_error() {
        let err = read("---\njupyter: [unclosed\n---\n\ntext\n", Format::RMarkdown).unwrap_err();
        assert!(matches!(err, CodecError::Yaml(_)));
    }

    #[test]
    fn any_markdown_cell_survives_rmarkdown() {
        let notebooks = [
            Notebook::new(vec![Cell::markdown("a\n\n\nb"), Cell::code("x = 1")]),
            Notebook::new(vec![Cell::markdown("Example:\n\n```{python}\nshown\n```")]),
            Notebook::new(vec![Cell::markdown("---\ntitle: not a header\n---")]),
            Notebook::new(vec![
                Cell::markdown(""),
                Cell::markdown("trailing\n"),
                Cell::markdown("```\nunclosed"),
                Cell::code("y = 2"),
            ]),
            Notebook::new(vec![Cell::code("s = \"\"\"\n```\n\"\"\""), Cell::code("")]),
        ];
        for nb in notebooks {
            let text = write(&nb, Format::RMarkdown).unwrap();
            let again = read(&text, Format::RMarkdown).unwrap();
            assert_eq!(again.cell_types(), nb.cell_types(), "{text}");
            for (a, b) in again.cells.iter().zip(&nb.cells) {
                assert_eq!(a.source, b.source, "{text}");
            }
        }
    }

    #[test]
    fn plain_markdown_cells_are_not_wrapped() {
        let nb = Notebook::new(vec![Cell::markdown("One.\n\nTwo."), Cell::markdown("a\n\n\nb")]);
        let text = write(&nb, Format::RMarkdown).unwrap();
        assert_eq!(
            text,
            "One.\n\nTwo.\n\n\n<!-- #region -->\na\n\n\nb\n<!-- #endregion -->\n"
        );
    }

    #[test]
    fn region_markers_inside_markdown_get_a_fresh_label() {
        let nb = Notebook::new(vec![
            Cell::markdown("<!-- #region -->\nbefore\n<!-- #endregion -->"),
            Cell::markdown("<!-- #region 1 -->\n<!-- #endregion -->\n<!-- #endregion 1 -->\nafter"),
            Cell::code("x = 1"),
        ]);
        let text = write(&nb, Format::RMarkdown).unwrap();
        assert!(text.starts_with(
            "<!-- #region 1 -->\n<!-- #region -->\nbefore\n<!-- #endregion -->\n<!-- #endregion 1 -->\n"
        ));
        assert!(text.contains("<!-- #region 2 -->\n<!-- #region 1 -->\n"));

        let again = read(&text, Format::RMarkdown).unwrap();
        assert_eq!(again, nb);
    }

    #[test]
    fn format_table_resolves_short_names() {
        let table = FormatTable::default();
        assert_eq!(table.resolve("python").unwrap(), Format::Ipynb);
        assert_eq!(table.resolve("R").unwrap(), Format::RMarkdown);
        assert_eq!(table.resolve(".Rmd").unwrap(), Format::RMarkdown);
        assert!(matches!(
            table.resolve("julia"),
            Err(CodecError::UnknownFormat(name)) if name == "julia"
        ));

        let custom = FormatTable::empty().with("julia", Format::Ipynb);
        assert_eq!(custom.resolve("julia").unwrap(), Format::Ipynb);
    }

    #[test]
    fn format_from_path() {
        assert_eq!(Format::from_path(Path::new("nb/a.ipynb")), Some(Format::Ipynb));
        assert_eq!(Format::from_path(Path::new("a.Rmd")), Some(Format::RMarkdown));
        assert_eq!(Format::from_path(Path::new("data.csv")), None);
    }
}
