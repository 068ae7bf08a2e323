//! HTML Sanitizer & Embedder.
//!
//! String-level rewriting of a fetched page so it can be shown inside the
//! app's frame: scripts and frame-blocking meta tags go, a `<base>` pointing
//! at the source is added, and an attribution banner is placed at the top of
//! `<body>`. Malformed or partial markup is tolerated; missing `<head>` or
//! `<body>` elements are synthesized.

use regex::Regex;
use std::sync::OnceLock;

struct Patterns {
    script_block: Regex,
    script_open: Regex,
    frame_meta: Regex,
    base_tag: Regex,
    base_open: Regex,
    html_open: Regex,
    head_open: Regex,
    head_close: Regex,
    body_open: Regex,
}

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

fn patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| Patterns {
        script_block: Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid regex"),
        script_open: Regex::new(r"(?i)<script").expect("valid regex"),
        frame_meta: Regex::new(
            r#"(?i)<meta\b[^>]*http-equiv\s*=\s*["']?\s*(?:content-security-policy|x-frame-options)[^>]*>"#,
        )
        .expect("valid regex"),
        base_tag: Regex::new(r"(?i)<base\b[^>]*>").expect("valid regex"),
        base_open: Regex::new(r"(?i)<base\b").expect("valid regex"),
        html_open: Regex::new(r"(?i)<html(?:\s[^>]*)?>").expect("valid regex"),
        head_open: Regex::new(r"(?i)<head(?:\s[^>]*)?>").expect("valid regex"),
        head_close: Regex::new(r"(?i)</head\s*>").expect("valid regex"),
        body_open: Regex::new(r"(?i)<body(?:\s[^>]*)?>").expect("valid regex"),
    })
}

/// Page markup that is safe to serve for in-frame display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SanitizedDocument(String);

impl SanitizedDocument {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for SanitizedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Remove every match, again and again, until nothing matches.
/// Removing one tag can splice a new one together from its neighbours.
fn remove_all(re: &Regex, input: String) -> String {
    let mut current = input;
    loop {
        let next = re.replace_all(&current, "");
        if next.len() == current.len() {
            return current;
        }
        current = next.into_owned();
    }
}

/// Insert `insertion` right after the first match of `re`. `None` if no match.
fn insert_after_first(re: &Regex, haystack: &str, insertion: &str) -> Option<String> {
    let m = re.find(haystack)?;
    let mut out = String::with_capacity(haystack.len() + insertion.len());
    out.push_str(&haystack[..m.end()]);
    out.push_str(insertion);
    out.push_str(&haystack[m.end()..]);
    Some(out)
}

fn banner_html(source_url: &str) -> String {
    let url = escape_html(source_url);
    format!(
        r#"<div style="position:sticky;top:0;z-index:2147483647;background:#111;color:#eee;padding:10px 12px;font:13px/1.35 system-ui,sans-serif;border-bottom:1px solid #333">Loaded from search result: <a href="{url}" rel="noreferrer" target="_blank" style="color:#55d48c;text-decoration:none">{url}</a></div>"#
    )
}

fn strip_unsafe(html: &str) -> String {
    let p = patterns();
    let mut out = remove_all(&p.script_block, html.to_string());
    out = remove_all(&p.frame_meta, out);
    out = remove_all(&p.base_tag, out);
    // Leftover fragments (unterminated tags) become inert text.
    out = p.base_open.replace_all(&out, "&lt;base").into_owned();
    out
}

/// Prepare `html` fetched from `source_url` for embedding.
///
/// The output contains no `<script` and exactly one `<base href>` (the
/// source URL), with the banner as the first thing inside `<body>`.
pub fn embed(html: &str, source_url: &str) -> SanitizedDocument {
    let p = patterns();
    let clean = strip_unsafe(html);
    let base = format!(r#"<base href="{}">"#, escape_html(source_url));
    let banner = banner_html(source_url);

    let has_head = p.head_open.is_match(&clean);
    let has_body = p.body_open.is_match(&clean);

    let out = match (has_head, has_body) {
        (true, true) => {
            let with_base = insert_after_first(&p.head_open, &clean, &base).unwrap_or(clean);
            insert_after_first(&p.body_open, &with_base, &banner).unwrap_or(with_base)
        }
        (true, false) => {
            let with_base =
                insert_after_first(&p.head_open, &clean, &base).unwrap_or_else(|| clean.clone());
            let body = format!("<body>{}", banner);
            match insert_after_first(&p.head_close, &with_base, &body) {
                Some(out) => out,
                // Unclosed head: the parser moves the banner into the implied body.
                None => insert_after_first(&p.head_open, &clean, &format!("{}{}", base, banner))
                    .unwrap_or(with_base),
            }
        }
        (false, true) => {
            let head = format!("<head>{}</head>", base);
            let with_head = match insert_after_first(&p.html_open, &clean, &head) {
                Some(out) => out,
                None => {
                    let at = p.body_open.find(&clean).map(|m| m.start()).unwrap_or(0);
                    format!("{}{}{}", &clean[..at], head, &clean[at..])
                }
            };
            insert_after_first(&p.body_open, &with_head, &banner).unwrap_or(with_head)
        }
        (false, false) => format!(
            "<!doctype html><html><head>{}</head><body>{}{}</body></html>",
            base, banner, clean
        ),
    };

    // Final pass: anything that still spells a script tag becomes text.
    SanitizedDocument(p.script_open.replace_all(&out, "&lt;script").into_owned())
}

/// Wrap mirror text output as a minimal readable page.
pub fn mirror_snapshot_html(text: &str, source_url: &str) -> String {
    let body = escape_html(text).replace("\r\n", "\n").replace('\n', "<br>");
    let url = escape_html(source_url);
    format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Chords Snapshot</title>
<style>
body{{font-family:system-ui,sans-serif;background:#111;color:#eee;margin:0;padding:16px;line-height:1.45}}
a{{color:#55d48c}}
.note{{background:#161616;border-bottom:1px solid #333;padding:10px 12px;margin:-16px -16px 16px}}
</style>
</head>
<body>
<div class="note">Text snapshot of <a href="{url}" rel="noreferrer" target="_blank">{url}</a></div>
<div>{body}</div>
</body>
</html>"#
    )
}

/// Minimal page for a failed embed request.
pub fn error_page(message: &str) -> String {
    format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Chords Load Error</title></head>
<body style="font-family:system-ui,sans-serif;background:#111;color:#eee;padding:20px">
<h2>Could not load the page inside the app</h2>
<p>{}</p>
</body>
</html>"#,
        escape_html(message)
    )
}
