//! Extraction of `<!--- nb:name -->` ... `<!--- nb:end -->` regions from page text.

use std::sync::LazyLock;

use regex::Regex;

static START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<!---\s+nb:(?P<name>\S+)\s+-->\s*$").expect("start marker pattern is valid")
});

const END_NAME: &str = "end";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionError {
    /// A start marker appeared while another region was still open.
    Nested { open: String, line: usize },
    /// An end marker with no region open.
    StrayEnd { line: usize },
    /// Input ended before the region was closed.
    Unterminated { name: String, line: usize },
}

impl std::fmt::Display for RegionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionError::Nested { open, line } => write!(
                f,
                "line {line}: notebook start marker while region \"{open}\" is still open"
            ),
            RegionError::StrayEnd { line } => {
                write!(f, "line {line}: notebook end marker without a start marker")
            }
            RegionError::Unterminated { name, line } => write!(
                f,
                "line {line}: notebook region \"{name}\" has no end marker"
            ),
        }
    }
}

impl std::error::Error for RegionError {}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Fail on the first malformed marker instead of skipping the region.
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookRegion {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub regions: Vec<NotebookRegion>,
    /// Malformed markers and duplicate names, in document order.
    pub warnings: Vec<String>,
}

impl Extraction {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.regions
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.text.as_str())
    }

    pub fn names(&self) -> Vec<&str> {
        self.regions.iter().map(|r| r.name.as_str()).collect()
    }

    fn insert(&mut self, name: String, text: String, line: usize) {
        if let Some(existing) = self.regions.iter_mut().find(|r| r.name == name) {
            self.warnings.push(format!(
                "line {line}: duplicate notebook name \"{name}\", later region wins"
            ));
            existing.text = text;
        } else {
            self.regions.push(NotebookRegion { name, text });
        }
    }

    fn malformed(&mut self, err: RegionError, options: &ExtractOptions) -> Result<(), RegionError> {
        if options.strict {
            return Err(err);
        }
        self.warnings.push(err.to_string());
        Ok(())
    }
}

struct OpenRegion {
    name: String,
    line: usize,
    lines: Vec<String>,
}

/// Scans `text` for notebook regions in document order.
///
/// Line numbers in errors and warnings are 1-based.
pub fn extract_regions(text: &str, options: &ExtractOptions) -> Result<Extraction, RegionError> {
    let mut extraction = Extraction::default();
    let mut open: Option<OpenRegion> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let Some(caps) = START_RE.captures(line) else {
            if let Some(region) = open.as_mut() {
                region.lines.push(line.to_string());
            }
            continue;
        };

        let name = &caps["name"];
        if name == END_NAME {
            match open.take() {
                Some(region) => {
                    let body = region.lines.join("\n").trim().to_string();
                    extraction.insert(region.name, body, region.line);
                }
                None => extraction.malformed(RegionError::StrayEnd { line: line_no }, options)?,
            }
            continue;
        }

        if let Some(region) = open.take() {
            extraction.malformed(
                RegionError::Nested {
                    open: region.name,
                    line: line_no,
                },
                options,
            )?;
        }
        open = Some(OpenRegion {
            name: name.to_string(),
            line: line_no,
            lines: Vec::new(),
        });
    }

    if let Some(region) = open {
        extraction.malformed(
            RegionError::Unterminated {
                name: region.name,
                line: region.line,
            },
            options,
        )?;
    }

    Ok(extraction)
}
