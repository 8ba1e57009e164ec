use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use nbforge_core::codec::{self, Dialect, Format};
use nbforge_core::datasource::ReadCallFamily;
use nbforge_core::{KernelSpec, NotebookBuilder, Publisher, XrefScanner};
use serde_json::Value;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const PYTHON_PAGE: &str = r##"---
title: "Resampling two"
---

Text that stays in the book.

<!--- nb:resampling_two -->
As shown in <a href="#sec-resampling-two" class="quarto-xref">?@sec-resampling-two</a>.

<!-- editorial note, never published -->

```python
scores = pd.read_csv('data/scores.csv')
```

See also <a href="#sec-missing" class="quarto-xref">?@sec-missing</a>.
<!--- nb:end -->
"##;

const SIX_HTML: &str = r#"<!DOCTYPE html>
<html><body>
<h1 class="title"><span id="sec-resampling-two" class="quarto-section-identifier"><span class="chapter-number">6</span>&nbsp; <span class="chapter-title">Resampling two</span></span></h1>
<p>Body.</p>
</body></html>"#;

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn zip_entry(path: &Path, name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).unwrap();
    bytes
}

fn markdown_text(notebook: &nbforge_core::Notebook) -> String {
    notebook
        .cells
        .iter()
        .filter(|c| c.is_markdown())
        .map(|c| c.source.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn code_text(notebook: &nbforge_core::Notebook) -> String {
    notebook
        .cells
        .iter()
        .filter(|c| c.is_code())
        .map(|c| c.source.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Lays out a project as the book build leaves it: page Markdown, the
/// rendered site and the notebook directory with a data file and archive.
fn python_site(dir: &Path) {
    write(&dir.join("pages/six.md"), PYTHON_PAGE);
    write(&dir.join("_book/chapters/six.html"), SIX_HTML);
    write(&dir.join("_book/index.html"), "<h1 id=\"sec-home\">Home</h1>");

    let notebooks = dir.join("_book/notebooks");
    write(&notebooks.join("data/scores.csv"), "score\n1\n2\n");

    let mut zip = ZipWriter::new(File::create(notebooks.join("resampling_two.zip")).unwrap());
    let options = SimpleFileOptions::default();
    zip.start_file("resampling_two.ipynb", options).unwrap();
    zip.write_all(b"{}").unwrap();
    zip.start_file("data/scores.csv", options).unwrap();
    zip.write_all(b"score\n1\n2\n").unwrap();
    zip.finish().unwrap();
}

fn python_publisher(dir: &Path) -> Publisher {
    Publisher::builder()
        .input_dir(dir.join("_book/notebooks"))
        .output_dir(dir.join("_book/interact"))
        .download_prefix("https://example.org/latest-python")
        .interact_prefix("/latest-python")
        .kernel(KernelSpec::new("python", "Python (Pyodide)", "python"))
        .data_root_url("https://example.org/data")
        .read_family(ReadCallFamily::Pandas)
        .storage_name("rss-python")
        .build()
        .unwrap()
}

#[test]
fn python_edition_end_to_end() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    python_site(root);

    let built = NotebookBuilder::new()
        .pages_dir(root.join("pages"))
        .notebook_dir(root.join("_book/notebooks"))
        .dialect(Dialect::Markdown)
        .format(Format::Ipynb)
        .kernel(KernelSpec::new("python3", "Python 3", "python"))
        .build()
        .unwrap();
    assert_eq!(
        built.notebooks,
        vec![root.join("_book/notebooks/resampling_two.ipynb")]
    );

    let table = XrefScanner::new(root.join("_book")).scan().unwrap();
    assert_eq!(
        table.get("#sec-resampling-two").unwrap().href,
        "chapters/six.html#sec-resampling-two"
    );

    let summary = python_publisher(root).publish(&table).unwrap();
    assert_eq!(summary.resolved_links, 1);
    assert_eq!(summary.data_rewrites, 1);
    assert_eq!(summary.report.len(), 1);
    assert!(summary.report.warnings()[0].message.contains("#sec-missing"));

    // Download notebook: absolute link, original kernel, local data path.
    let download_path = root.join("_book/notebooks/resampling_two.ipynb");
    let download_text = fs::read_to_string(&download_path).unwrap();
    let download = codec::read(&download_text, Format::Ipynb).unwrap();
    let prose = markdown_text(&download);
    assert!(prose.contains(
        "<a href=\"https://example.org/latest-python/chapters/six.html#sec-resampling-two\" \
         class=\"quarto-xref\">6 Resampling two</a>"
    ));
    // Unresolved placeholders keep their text; only the prefix is applied.
    assert!(prose.contains(
        "<a href=\"https://example.org/latest-python/#sec-missing\" class=\"quarto-xref\">?@sec-missing</a>"
    ));
    assert!(!prose.contains("editorial note"));
    assert_eq!(download.kernelspec().unwrap().name, "python3");
    assert_eq!(code_text(&download), "scores = pd.read_csv('data/scores.csv')");

    // The archive carries exactly the rewritten notebook.
    let archive = root.join("_book/notebooks/resampling_two.zip");
    assert_eq!(summary.archives, vec![archive.clone()]);
    assert_eq!(zip_entry(&archive, "resampling_two.ipynb"), download_text.as_bytes());
    assert_eq!(zip_entry(&archive, "data/scores.csv"), b"score\n1\n2\n");

    // Interactive notebook: relative link, in-browser kernel, web data.
    let interact = root.join("_book/interact");
    let interactive =
        codec::read(&fs::read_to_string(interact.join("resampling_two.ipynb")).unwrap(), Format::Ipynb)
            .unwrap();
    assert!(markdown_text(&interactive)
        .contains("href=\"/latest-python/chapters/six.html#sec-resampling-two\""));
    assert_eq!(
        interactive.kernelspec().unwrap(),
        KernelSpec::new("python", "Python (Pyodide)", "python")
    );
    assert_eq!(
        code_text(&interactive),
        "# Read data from web URL instead of local data directory\n\
         # (so the notebook also works in the browser).\n\
         scores = pd.read_csv('https://example.org/data/scores.csv')"
    );
    assert_eq!(interactive.cell_types(), download.cell_types());

    // Assets are copied, notebooks are not copied verbatim.
    assert_eq!(
        fs::read_to_string(interact.join("data/scores.csv")).unwrap(),
        "score\n1\n2\n"
    );
    assert!(interact.join("resampling_two.zip").is_file());

    let runtime: Value =
        serde_json::from_str(&fs::read_to_string(interact.join("jupyter-lite.json")).unwrap())
            .unwrap();
    assert_eq!(
        runtime,
        serde_json::json!({
            "jupyter-lite-schema-version": 0,
            "jupyter-config-data": {"contentsStorageName": "rss-python"}
        })
    );
}

#[test]
fn extraction_is_repeatable() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    python_site(root);

    let build = || {
        NotebookBuilder::new()
            .pages_dir(root.join("pages"))
            .notebook_dir(root.join("_book/notebooks"))
            .kernel(KernelSpec::new("python3", "Python 3", "python"))
            .build()
            .unwrap();
        fs::read_to_string(root.join("_book/notebooks/resampling_two.ipynb")).unwrap()
    };
    assert_eq!(build(), build());
}

#[test]
fn r_edition_reads_rmarkdown_and_publishes_ipynb() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        &root.join("pages/fruit.md"),
        "<!--- nb:fruit_lies -->\nSee <a href=\"#sec-fruit\" class=\"quarto-xref\">?@sec-fruit</a>.\n\n\
         ```r\nfruit <- read.csv('data/fruit.csv')\nhead(fruit)\n```\n<!--- nb:end -->\n",
    );
    write(
        &root.join("_book/fruit.html"),
        "<h1 id=\"sec-fruit\">Fruit lies</h1>",
    );

    let notebooks = root.join("_book/notebooks");
    let built = NotebookBuilder::new()
        .pages_dir(root.join("pages"))
        .notebook_dir(&notebooks)
        .dialect(Dialect::RMarkdown)
        .format(Format::RMarkdown)
        .kernel(KernelSpec::new("ir", "R", "r"))
        .build()
        .unwrap();
    assert_eq!(built.notebooks, vec![notebooks.join("fruit_lies.Rmd")]);

    let table = XrefScanner::new(root.join("_book")).scan().unwrap();
    let summary = Publisher::builder()
        .input_dir(&notebooks)
        .output_dir(root.join("_book/interact"))
        .input_suffix(".Rmd")
        .interact_suffix(".ipynb")
        .download_prefix("https://example.org/latest-r/")
        .interact_prefix("/latest-r")
        .kernel(KernelSpec::new("webR", "R (webR)", "r"))
        .data_root_url("https://example.org/data")
        .read_family(ReadCallFamily::R)
        .build()
        .unwrap()
        .publish(&table)
        .unwrap();
    assert!(summary.report.is_empty());
    assert!(summary.archives.is_empty());

    let download = fs::read_to_string(notebooks.join("fruit_lies.Rmd")).unwrap();
    assert!(download.contains("href=\"https://example.org/latest-r/fruit.html#sec-fruit\""));
    assert!(download.contains("```{r}\nfruit <- read.csv('data/fruit.csv')"));

    let interactive = codec::read(
        &fs::read_to_string(root.join("_book/interact/fruit_lies.ipynb")).unwrap(),
        Format::Ipynb,
    )
    .unwrap();
    assert_eq!(interactive.language().as_deref(), Some("r"));
    assert!(markdown_text(&interactive).contains("href=\"/latest-r/fruit.html#sec-fruit\""));
    assert!(code_text(&interactive)
        .contains("fruit <- read.csv('https://example.org/data/fruit.csv')\nhead(fruit)"));
    assert!(!root.join("_book/interact/fruit_lies.Rmd").exists());
}

#[test]
fn unreadable_notebook_stops_the_run() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(&root.join("_book/notebooks/broken.ipynb"), "{ not json");
    write(&root.join("_book/index.html"), "<h1 id=\"x\">X</h1>");

    let table = XrefScanner::new(root.join("_book")).scan().unwrap();
    let err = python_publisher(root).publish(&table).unwrap_err();
    assert!(err.to_string().contains("broken.ipynb"));
    assert!(!root.join("_book/interact/jupyter-lite.json").exists());
}

#[test]
fn anchor_collisions_are_reported() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(&root.join("_book/a.html"), "<h1 id=\"sec-dup\">A</h1>");
    write(&root.join("_book/b.html"), "<h1 id=\"sec-dup\">B</h1>");
    fs::create_dir_all(root.join("_book/notebooks")).unwrap();

    let table = XrefScanner::new(root.join("_book")).scan().unwrap();
    let summary = python_publisher(root).publish(&table).unwrap();
    assert_eq!(summary.report.len(), 1);
    let warning = &summary.report.warnings()[0];
    assert!(warning.message.contains("#sec-dup"));
    assert!(warning.message.contains("b.html#sec-dup"));
}
