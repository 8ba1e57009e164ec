//! Rewrites local data-file reads in code cells to read from a web URL, so
//! notebooks keep working inside an in-browser runtime.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::notebook::Notebook;

// e.g. `df = pd.read_csv('data/x.csv')`
static PANDAS_READ_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^(?P<indent>[ \t]*)(?P<assign>\w+[ \t]*=[ \t]*)(?P<call>(?:\w+\.)*read_\w+\()(?P<open>['"])(?P<path>[^'"\n]*)(?P<close>['"]\))"#,
    )
    .expect("pandas read pattern is valid")
});

// e.g. `df <- read.csv('data/x.csv')`
static R_READ_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^(?P<indent>[ \t]*)(?P<assign>[\w.]+[ \t]*(?:<-|=)[ \t]*)(?P<call>read\.\w+\()(?P<open>['"])(?P<path>[^'"\n]*)(?P<close>['"]\))"#,
    )
    .expect("R read pattern is valid")
});

/// Which read-call statements are recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCallFamily {
    /// `read_csv`-style calls, as written in the Python edition.
    Pandas,
    /// `read.csv`-style calls, as written in the R edition.
    R,
}

impl ReadCallFamily {
    fn pattern(&self) -> &'static Regex {
        match self {
            ReadCallFamily::Pandas => &PANDAS_READ_RE,
            ReadCallFamily::R => &R_READ_RE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataSourceRewriter {
    root_url: String,
    family: ReadCallFamily,
    comment: String,
}

impl DataSourceRewriter {
    pub fn new<S: Into<String>>(root_url: S, family: ReadCallFamily) -> Self {
        let root_url: String = root_url.into();
        Self {
            root_url: root_url.trim_end_matches('/').to_string(),
            family,
            comment: "#".to_string(),
        }
    }

    /// Comment token put in front of the two explanatory lines.
    pub fn comment_token<S: Into<String>>(mut self, token: S) -> Self {
        self.comment = token.into();
        self
    }

    /// Rewrites one code cell's source. Returns the new source and the
    /// number of statements rewritten.
    pub fn rewrite_source(&self, source: &str) -> (String, usize) {
        let mut count = 0;
        let out = self.family.pattern().replace_all(source, |caps: &Captures| {
            let path = &caps["path"];
            if is_remote_or_absolute(path) {
                return caps[0].to_string();
            }
            count += 1;
            let indent = &caps["indent"];
            let basename = path.rsplit(['/', '\\']).next().unwrap_or(path);
            format!(
                "{indent}{c} Read data from web URL instead of local data directory\n\
                 {indent}{c} (so the notebook also works in the browser).\n\
                 {indent}{assign}{call}{open}{root}/{basename}{close}",
                c = self.comment,
                assign = &caps["assign"],
                call = &caps["call"],
                open = &caps["open"],
                root = self.root_url,
                close = &caps["close"],
            )
        });
        (out.into_owned(), count)
    }

    /// Returns a rewritten copy of `notebook` and the total number of
    /// rewritten statements. Markdown cells are left alone.
    pub fn rewrite(&self, notebook: &Notebook) -> (Notebook, usize) {
        let mut total = 0;
        let out = notebook.map_code(|source| {
            let (rewritten, count) = self.rewrite_source(source);
            total += count;
            rewritten
        });
        (out, total)
    }
}

fn is_remote_or_absolute(path: &str) -> bool {
    path.contains("://") || path.starts_with('/') || path.starts_with('~') || path.is_empty()
}
