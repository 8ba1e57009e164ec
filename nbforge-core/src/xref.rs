//! Cross-reference resolution against the built HTML site.
//!
//! Notebooks are written before the whole book has been rendered, so a
//! reference such as `<a href="#sec-intro" class="quarto-xref">?</a>` in a
//! notebook cannot know which page `sec-intro` lives on. Once the site is
//! built, [`XrefScanner::scan`] mines every HTML page for section titles and
//! cross-reference links and produces an immutable [`XrefTable`], which then
//! patches notebook markdown cells.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use kuchikikiki::traits::TendrilSink;
use regex::{Captures, Regex};

use crate::notebook::Notebook;
use crate::scanner::{ScanError, SiteScanner};
use crate::site::Page;

pub const DEFAULT_XREF_CLASS: &str = "quarto-xref";

static ANCHOR_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<a\b[^>]*>.*?</a\s*>").expect("anchor tag pattern is valid")
});

static HREF_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bhref\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')"#)
        .expect("href attribute pattern is valid")
});

#[derive(Debug)]
pub enum XrefError {
    Scan(ScanError),
}

impl From<ScanError> for XrefError {
    fn from(err: ScanError) -> Self {
        XrefError::Scan(err)
    }
}

impl std::fmt::Display for XrefError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            XrefError::Scan(e) => write!(f, "Failed to scan built site: {}", e),
        }
    }
}

impl std::error::Error for XrefError {}

/// Where an anchor points once the site is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    /// Site-relative page path plus fragment, e.g. `chapters/six.html#sec-x`.
    pub href: String,
    /// Human-readable text, e.g. `Section 6.3.3`.
    pub label: String,
}

impl ResolvedLink {
    pub fn to_tag(&self, class: &str) -> String {
        format!(
            "<a href=\"{}\" class=\"{}\">{}</a>",
            html_escape::encode_double_quoted_attribute(&self.href),
            html_escape::encode_double_quoted_attribute(class),
            html_escape::encode_text(&self.label)
        )
    }
}

/// The unbuilt state: knows where the site is, has read nothing yet.
#[derive(Debug, Clone)]
pub struct XrefScanner {
    site_root: PathBuf,
    class: String,
}

impl XrefScanner {
    pub fn new<P: AsRef<Path>>(site_root: P) -> Self {
        Self {
            site_root: site_root.as_ref().to_path_buf(),
            class: DEFAULT_XREF_CLASS.to_string(),
        }
    }

    /// Class attribute that marks cross-reference links.
    pub fn class<S: Into<String>>(mut self, class: S) -> Self {
        self.class = class.into();
        self
    }

    /// Reads every HTML page under the site root. This is the only way to
    /// obtain an [`XrefTable`], so no reader ever sees a partial table.
    pub fn scan(self) -> Result<XrefTable, XrefError> {
        let pages = SiteScanner::new(&self.site_root).extension("html").scan()?;
        log::info!(
            "Indexing cross-references in {} pages under {}",
            pages.len(),
            self.site_root.display()
        );
        Ok(self.index(&pages))
    }

    /// Builds the table from pages already in memory.
    pub fn index(self, pages: &[Page]) -> XrefTable {
        let mut table = XrefTable {
            class: self.class,
            entries: HashMap::new(),
            collisions: Vec::new(),
        };
        for page in pages {
            table.index_page(page);
        }
        log::debug!("Cross-reference table has {} anchors", table.entries.len());

        table
    }
}

/// Counts from one patch pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PatchReport {
    pub resolved: usize,
    /// Fragment hrefs with no table entry, in order of appearance. Bare
    /// fragments are listed in their `#fragment` form.
    pub unresolved: Vec<String>,
}

/// The ready state: anchor → resolved link, immutable once built.
#[derive(Debug, Clone)]
pub struct XrefTable {
    class: String,
    entries: HashMap<String, ResolvedLink>,
    collisions: Vec<String>,
}

impl XrefTable {
    pub fn get(&self, anchor: &str) -> Option<&ResolvedLink> {
        self.entries.get(anchor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Anchors that were defined by more than one page with different
    /// targets. The last page scanned won.
    pub fn collisions(&self) -> &[String] {
        &self.collisions
    }

    fn insert(&mut self, anchor: String, link: ResolvedLink) {
        if let Some(previous) = self.entries.get(&anchor) {
            if previous.href != link.href {
                log::debug!(
                    "Anchor {} moves from {} to {}",
                    anchor,
                    previous.href,
                    link.href
                );
                self.collisions.push(anchor.clone());
            }
        }
        self.entries.insert(anchor, link);
    }

    fn index_page(&mut self, page: &Page) {
        let document = kuchikikiki::parse_html().one(page.content.as_str());
        let page_url = page.url();
        let page_dir = page.dir_prefix();

        if let Ok(headings) = document.select("h1") {
            for heading in headings {
                let node = heading.as_node();
                let Ok(with_id) = node.select_first("[id]") else {
                    continue;
                };
                let Some(id) = with_id
                    .attributes
                    .borrow()
                    .get("id")
                    .map(str::to_string)
                    .filter(|id| !id.is_empty())
                else {
                    continue;
                };
                self.insert(
                    format!("#{id}"),
                    ResolvedLink {
                        href: format!("{page_url}#{id}"),
                        label: collapse_whitespace(&node.text_contents()),
                    },
                );
            }
        }

        if let Ok(anchors) = document.select("a") {
            for anchor in anchors {
                let attrs = anchor.attributes.borrow();
                if !has_class(attrs.get("class"), &self.class) {
                    continue;
                }
                let Some(href) = attrs.get("href") else {
                    continue;
                };
                let Some((key, target)) = qualify_href(href, &page_url, &page_dir) else {
                    continue;
                };
                let label = collapse_whitespace(&anchor.as_node().text_contents());
                self.insert(key, ResolvedLink { href: target, label });
            }
        }
    }

    /// Replaces every cross-reference tag in the notebook's markdown cells
    /// whose href is a known anchor. Returns a new notebook.
    pub fn patch(&self, notebook: &Notebook) -> (Notebook, PatchReport) {
        let mut report = PatchReport::default();
        let patched = notebook.map_markdown(|source| self.patch_text(source, &mut report));
        (patched, report)
    }

    pub fn patch_text(&self, text: &str, report: &mut PatchReport) -> String {
        ANCHOR_TAG_RE
            .replace_all(text, |caps: &Captures| {
                let tag = &caps[0];
                let Some(anchor) = AnchorTag::parse(tag) else {
                    return tag.to_string();
                };
                if !anchor.has_class(&self.class) {
                    return tag.to_string();
                }
                let Some(href) = anchor.href else {
                    return tag.to_string();
                };
                let key = match bare_fragment(&href) {
                    Some(fragment) => format!("#{fragment}"),
                    None => href,
                };
                match self.entries.get(&key) {
                    Some(link) => {
                        report.resolved += 1;
                        link.to_tag(&self.class)
                    }
                    None => {
                        if key.starts_with('#') {
                            report.unresolved.push(key);
                        }
                        tag.to_string()
                    }
                }
            })
            .into_owned()
    }
}

/// Prepends `prefix` to the href of every cross-reference tag in markdown
/// cells. Run after [`XrefTable::patch`], which expects bare fragments.
pub fn prefix_links(notebook: &Notebook, prefix: &str, class: &str) -> Notebook {
    notebook.map_markdown(|source| prefix_text(source, prefix, class))
}

pub fn prefix_text(text: &str, prefix: &str, class: &str) -> String {
    ANCHOR_TAG_RE
        .replace_all(text, |caps: &Captures| {
            let tag = &caps[0];
            let is_xref = AnchorTag::parse(tag).is_some_and(|a| a.has_class(class));
            if !is_xref {
                return tag.to_string();
            }
            let open_end = tag.find('>').unwrap_or(tag.len());
            let (open, rest) = tag.split_at(open_end);
            let open = HREF_ATTR_RE.replace(open, |attr: &Captures| {
                let href = attr
                    .name("dq")
                    .or_else(|| attr.name("sq"))
                    .map_or("", |m| m.as_str());
                format!("href=\"{}\"", join_prefix(prefix, href))
            });
            format!("{open}{rest}")
        })
        .into_owned()
}

fn join_prefix(prefix: &str, href: &str) -> String {
    if prefix.is_empty() || is_absolute(href) {
        return href.to_string();
    }
    if let Some(fragment) = bare_fragment(href) {
        return format!("{}/#{}", prefix.trim_end_matches('/'), fragment);
    }
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        href.trim_start_matches("./")
    )
}

fn is_absolute(href: &str) -> bool {
    href.starts_with('/') || href.contains("://") || href.starts_with("mailto:")
}

struct AnchorTag {
    href: Option<String>,
    classes: Vec<String>,
}

impl AnchorTag {
    fn parse(tag: &str) -> Option<Self> {
        let document = kuchikikiki::parse_html().one(tag);
        let anchor = document.select_first("a").ok()?;
        let attrs = anchor.attributes.borrow();
        let parsed = AnchorTag {
            href: attrs.get("href").map(str::to_string),
            classes: attrs
                .get("class")
                .map(|c| c.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        };
        Some(parsed)
    }

    fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

fn has_class(attr: Option<&str>, class: &str) -> bool {
    attr.is_some_and(|value| value.split_whitespace().any(|c| c == class))
}

/// An href written as a bare fragment such as `sec-intro`: one segment
/// with no path, extension, query or fragment marker.
fn bare_fragment(href: &str) -> Option<&str> {
    let href = href.trim();
    let is_bare = !href.is_empty()
        && !href
            .chars()
            .any(|c| matches!(c, '#' | '/' | '.' | ':' | '?') || c.is_whitespace());
    is_bare.then_some(href)
}

/// Qualifies an href found on a page into `(#fragment, page-path#fragment)`.
/// A bare fragment points into the page itself.
fn qualify_href(href: &str, page_url: &str, page_dir: &str) -> Option<(String, String)> {
    let href = href.trim();
    if href.contains("://") || href.starts_with("mailto:") {
        return None;
    }
    if let Some(fragment) = bare_fragment(href) {
        return Some((format!("#{fragment}"), format!("{page_url}#{fragment}")));
    }
    let (path, fragment) = href.split_once('#')?;
    if fragment.is_empty() {
        return None;
    }
    let target = if path.is_empty() {
        page_url.to_string()
    } else if let Some(rooted) = path.strip_prefix('/') {
        normalize_path(rooted)
    } else {
        normalize_path(&format!("{page_dir}{path}"))
    };

    Some((format!("#{fragment}"), format!("{target}#{fragment}")))
}

/// Resolves `.` and `..` segments of a `/`-separated relative path.
fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
