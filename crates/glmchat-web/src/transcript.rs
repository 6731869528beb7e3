//! HTML for stored user turns.
//!
//! User text is kept the way the escaper left it: fenced code is
//! entity-encoded, everything else is raw. Only the markup the escaper emits
//! (`<br>` and the fence wrappers) survives here; any other text outside a
//! fence is HTML-escaped.

use minijinja::{HtmlEscape, Value};

const BREAK: &str = "<br>";
const OPEN_FENCE: &str = "<pre><code class=\"language-";
const CLOSE_FENCE: &str = "</code></pre>";

pub fn transcript_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut inside_fence = false;
    let mut rest = text;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix(BREAK) {
            out.push_str(BREAK);
            rest = after;
        } else if let Some(after) = rest.strip_prefix(CLOSE_FENCE) {
            out.push_str(CLOSE_FENCE);
            inside_fence = false;
            rest = after;
        } else if let Some((lang, after)) = open_fence(rest) {
            out.push_str(OPEN_FENCE);
            out.push_str(&lang);
            out.push_str("\">");
            inside_fence = true;
            rest = after;
        } else {
            // Plain run up to the next tag candidate
            let end = rest
                .char_indices()
                .skip(1)
                .find(|&(_, c)| c == '<')
                .map_or(rest.len(), |(i, _)| i);
            let (run, after) = rest.split_at(end);
            if inside_fence {
                out.push_str(&run.replace('<', "&lt;").replace('>', "&gt;"));
            } else {
                out.push_str(&HtmlEscape(run).to_string());
            }
            rest = after;
        }
    }

    out
}

/// An opening fence tag, with the language reduced to a plain name.
fn open_fence(text: &str) -> Option<(String, &str)> {
    let after = text.strip_prefix(OPEN_FENCE)?;
    let end = after.find("\">")?;
    let lang = after[..end]
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '#' | '.'))
        .collect();
    Some((lang, &after[end + 2..]))
}

/// Template filter: `{{ turn.user_text|transcript }}`.
pub fn transcript_filter(text: &str) -> Value {
    Value::from_safe_string(transcript_html(text))
}
