//! Escaping of user text for the pre-rendered transcript
//!
//! Text inside triple-backtick fences is turned into HTML entities so the
//! Markdown renderer shows it verbatim. Everything else passes through, with
//! `<br>` joining the lines.

const FENCE: &str = "```";

/// Replacements applied to every line inside a fence. `&` is left alone, so
/// text that is already escaped keeps its entities.
const FENCE_ESCAPES: &[(char, &str)] = &[
    ('`', "\\`"),
    ('<', "&lt;"),
    ('>', "&gt;"),
    (' ', "&nbsp;"),
    ('*', "&ast;"),
    ('_', "&lowbar;"),
    ('-', "&#45;"),
    ('.', "&#46;"),
    ('!', "&#33;"),
    ('(', "&#40;"),
    (')', "&#41;"),
    ('$', "&#36;"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FenceState {
    Outside,
    Inside,
}

impl FenceState {
    fn toggle(self) -> Self {
        match self {
            FenceState::Outside => FenceState::Inside,
            FenceState::Inside => FenceState::Outside,
        }
    }
}

fn escape_fenced(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for c in line.chars() {
        match FENCE_ESCAPES.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None => out.push(c),
        }
    }
    out
}

/// Escape free-form user text for embedding in the transcript.
///
/// Empty lines are dropped. An unbalanced fence leaves every later line
/// escaped.
pub fn escape_text(text: &str) -> String {
    let mut state = FenceState::Outside;
    let mut out = String::with_capacity(text.len());

    for (i, line) in text.split('\n').filter(|l| !l.is_empty()).enumerate() {
        if line.contains(FENCE) {
            state = state.toggle();
            match state {
                FenceState::Inside => {
                    let lang = line.rsplit('`').next().unwrap_or_default();
                    out.push_str(&format!("<pre><code class=\"language-{lang}\">"));
                }
                FenceState::Outside => out.push_str("<br></code></pre>"),
            }
            continue;
        }

        if i > 0 {
            out.push_str("<br>");
            match state {
                FenceState::Inside => out.push_str(&escape_fenced(line)),
                FenceState::Outside => out.push_str(line),
            }
        } else {
            out.push_str(line);
        }
    }

    out
}

const OPEN_FENCE: &str = "<pre><code class=\"language-";
const CLOSE_FENCE: &str = "<br></code></pre>";

/// Best-effort reversal of [`escape_text`] for plain-text front ends.
///
/// Dropped empty lines do not come back, and entities the user typed
/// outside a fence are decoded as well.
pub fn unescape_text(escaped: &str) -> String {
    let mut text = escaped.replace(CLOSE_FENCE, "\n```");

    while let Some(start) = text.find(OPEN_FENCE) {
        let lang_start = start + OPEN_FENCE.len();
        let Some(len) = text[lang_start..].find("\">") else {
            break;
        };
        let lang = text[lang_start..lang_start + len].to_string();
        let sep = if start > 0 { "\n" } else { "" };
        text.replace_range(start..lang_start + len + 2, &format!("{sep}```{lang}"));
    }

    let mut text = text.replace("<br>", "\n");
    for (c, entity) in FENCE_ESCAPES.iter().rev() {
        text = text.replace(entity, c.encode_utf8(&mut [0; 4]));
    }
    text
}
