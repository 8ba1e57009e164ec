//! Text clean-up applied to a notebook region before it is parsed into cells.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment pattern is valid"));

// A fence opener followed by nothing but a bare word, e.g. "```python".
static BARE_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?P<indent>[ \t]*)(?P<fence>`{3,})[ \t]*(?P<lang>\w+)[ \t]*$")
        .expect("fence pattern is valid")
});

/// Removes every `<!-- ... -->` span, including multi-line ones. Runs until
/// nothing matches, as removing one span can splice a new one together.
pub fn strip_comments(text: &str) -> String {
    let mut text = text.to_string();
    loop {
        match COMMENT_RE.replace_all(&text, "") {
            Cow::Borrowed(_) => return text,
            Cow::Owned(stripped) => text = stripped,
        }
    }
}

/// Rewrites "```python" fence openers to the R-markdown "```{python}" form.
pub fn curly_fences(text: &str) -> String {
    BARE_FENCE_RE
        .replace_all(text, "${indent}${fence}{${lang}}")
        .into_owned()
}

/// Comments go first: a comment may straddle a fence line.
pub fn normalize(text: &str) -> String {
    curly_fences(&strip_comments(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_comments() {
        assert_eq!(strip_comments(""), "");
        assert_eq!(strip_comments("Foo bar"), "Foo bar");
        assert_eq!(strip_comments("Foo <!--bar-->\nbaz"), "Foo \nbaz");
        assert_eq!(strip_comments("Foo <!-- bar-->\nbaz"), "Foo \nbaz");
        assert_eq!(strip_comments("Foo <!--bar --->\nbaz"), "Foo \nbaz");
        assert_eq!(strip_comments("Foo <!--\n\n  bar \n\n--->\nbaz"), "Foo \nbaz");
    }

    #[test]
    fn spliced_comments_are_stripped_too() {
        assert_eq!(strip_comments("<!<!-- x -->-- y -->kept"), "kept");
    }

    #[test]
    fn comment_matching_is_not_greedy() {
        assert_eq!(strip_comments("a <!-- x --> b <!-- y --> c"), "a  b  c");
    }

    #[test]
    fn rewrites_bare_word_fences() {
        assert_eq!(curly_fences("Foo\n``` python\nbaz"), "Foo\n```{python}\nbaz");
        assert_eq!(curly_fences("```r\nx <- 1\n```"), "```{r}\nx <- 1\n```");
        assert_eq!(curly_fences("  ````python  "), "  ````{python}");
    }

    #[test]
    fn leaves_other_fences_alone() {
        let text = "```{python}\na = 1\n```\n```\nplain\n```\n```python extra\n";
        assert_eq!(curly_fences(text), text);
    }

    #[test]
    fn normalizes_in_one_pass() {
        let text = "<!-- note -->\n```python\nprint(1)\n```";
        assert_eq!(normalize(text), "\n```{python}\nprint(1)\n```");
    }

    #[test]
    fn comment_straddling_a_fence_is_removed_first() {
        let text = "<!-- hidden\n```python\n-->\nkept";
        assert_eq!(normalize(text), "\nkept");
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "Foo <!-- x -->\n```python\na\n```\n",
            "<!--\n```r\n-->\n``` r\nb\n```",
            "no markup at all",
            "<!-- a --><!-- b -->```python",
            "<!<!-- x -->-- y -->kept",
        ];
        for text in samples {
            let once = normalize(text);
            assert_eq!(normalize(&once), once, "not idempotent for {text:?}");
        }
    }
}
