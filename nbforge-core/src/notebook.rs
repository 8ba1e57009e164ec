//! In-memory notebook model shared by every stage of the pipeline.
//!
//! Transformations never mutate a notebook in place: they borrow one and
//! return a new [`Notebook`], so the same patched notebook can feed both
//! output branches.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    Markdown,
    Code,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub cell_type: CellType,
    pub source: String,
    pub metadata: Map<String, Value>,
}

impl Cell {
    pub fn markdown<S: Into<String>>(source: S) -> Self {
        Self {
            cell_type: CellType::Markdown,
            source: source.into(),
            metadata: Map::new(),
        }
    }

    pub fn code<S: Into<String>>(source: S) -> Self {
        Self {
            cell_type: CellType::Code,
            source: source.into(),
            metadata: Map::new(),
        }
    }

    pub fn is_markdown(&self) -> bool {
        self.cell_type == CellType::Markdown
    }

    pub fn is_code(&self) -> bool {
        self.cell_type == CellType::Code
    }

    /// Same cell with a different payload.
    pub fn with_source<S: Into<String>>(&self, source: S) -> Self {
        Self {
            cell_type: self.cell_type,
            source: source.into(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Kernel descriptor stored under `metadata.kernelspec`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSpec {
    pub name: String,
    pub display_name: String,
    pub language: String,
}

impl KernelSpec {
    pub fn new<N, D, L>(name: N, display_name: D, language: L) -> Self
    where
        N: Into<String>,
        D: Into<String>,
        L: Into<String>,
    {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            language: language.into(),
        }
    }

    fn to_value(&self) -> Value {
        let mut spec = Map::new();
        spec.insert("display_name".into(), Value::String(self.display_name.clone()));
        spec.insert("language".into(), Value::String(self.language.clone()));
        spec.insert("name".into(), Value::String(self.name.clone()));
        Value::Object(spec)
    }

    fn from_value(value: &Value) -> Option<Self> {
        let spec = value.as_object()?;
        let field = |key: &str| spec.get(key).and_then(Value::as_str).unwrap_or_default();
        let name = field("name");
        if name.is_empty() {
            return None;
        }
        Some(Self::new(name, field("display_name"), field("language")))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Notebook {
    pub cells: Vec<Cell>,
    pub metadata: Map<String, Value>,
}

impl Notebook {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            metadata: Map::new(),
        }
    }

    pub fn kernelspec(&self) -> Option<KernelSpec> {
        self.metadata.get("kernelspec").and_then(KernelSpec::from_value)
    }

    /// Language declared by the kernel spec, if any.
    pub fn language(&self) -> Option<String> {
        self.kernelspec()
            .map(|k| k.language)
            .filter(|lang| !lang.is_empty())
    }

    pub fn with_kernelspec(&self, kernel: &KernelSpec) -> Self {
        let mut out = self.clone();
        out.metadata.insert("kernelspec".into(), kernel.to_value());
        out
    }

    /// Returns a new notebook where every markdown cell's source has been
    /// passed through `f`. Code cells are copied as they are.
    pub fn map_markdown<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&str) -> String,
    {
        self.map_cells(|cell| {
            if cell.is_markdown() {
                cell.with_source(f(&cell.source))
            } else {
                cell.clone()
            }
        })
    }

    pub fn map_code<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&str) -> String,
    {
        self.map_cells(|cell| {
            if cell.is_code() {
                cell.with_source(f(&cell.source))
            } else {
                cell.clone()
            }
        })
    }

    fn map_cells<F>(&self, f: F) -> Self
    where
        F: FnMut(&Cell) -> Cell,
    {
        Self {
            cells: self.cells.iter().map(f).collect(),
            metadata: self.metadata.clone(),
        }
    }

    pub fn cell_types(&self) -> Vec<CellType> {
        self.cells.iter().map(|c| c.cell_type).collect()
    }
}
