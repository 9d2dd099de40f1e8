use std::sync::LazyLock;

use regex::Regex;

pub const LABEL_CLASS: &str = "pm-integration-feature__label";

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*?>.*?</script>").unwrap());
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style[^>]*?>.*?</style>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static LABEL_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?s)<span[^>]*class="[^"]*{}[^"]*"[^>]*>(.*?)</span>"#,
        regex::escape(LABEL_CLASS)
    ))
    .unwrap()
});
static NON_ALNUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Remove script/style elements with their contents, then every remaining tag, then trim.
pub fn strip_tags(html: &str) -> String {
    let without_scripts = SCRIPT_RE.replace_all(html, "");
    let without_styles = STYLE_RE.replace_all(&without_scripts, "");
    TAG_RE.replace_all(&without_styles, "").trim().to_string()
}

/// Inner markup of the first label span in `html`.
pub fn find_label_span(html: &str) -> Option<&str> {
    LABEL_SPAN_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

pub fn slugify(text: &str) -> String {
    let lower = text.to_lowercase();
    NON_ALNUM_RE
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}
