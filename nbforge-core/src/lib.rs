pub mod archive;
pub mod builder;
pub mod codec;
pub mod config;
pub mod datasource;
pub mod dialect;
pub mod notebook;
pub mod publisher;
pub mod region;
pub mod report;
pub mod scanner;
pub mod site;
pub mod xref;

// Re-export main types
pub use builder::{BuildError, BuildSummary, NotebookBuilder};
pub use codec::{Dialect, Format, FormatTable};
pub use config::{Config, ConfigError, Language};
pub use notebook::{Cell, CellType, KernelSpec, Notebook};
pub use publisher::{PublishError, PublishSummary, Publisher, PublisherBuilder};
pub use report::Report;
pub use xref::{XrefScanner, XrefTable};
