//! Fenced code highlighting via syntect's class-based HTML generator.
//!
//! Tokens become `<span class="hl-…">` elements named after their scope
//! atoms; colours come from the stylesheet (see [`super::style`]), not from a
//! syntect theme, so one colour table drives both the document and the
//! Paginator's reapply step.
//!
//! Grammar selection, in order:
//! 1. the fence's language tag, if syntect knows it by name or extension;
//! 2. the code's first line (shebangs, `<?php`, `<?xml`, modelines …);
//! 3. plain text.
//!
//! A highlighter failure never fails the render: the block falls back to
//! escaped, unhighlighted code.

use super::style::{escape_html, CLASS_PREFIX, HIGHLIGHTED_CLASS};
use once_cell::sync::Lazy;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use tracing::{debug, warn};

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed {
    prefix: CLASS_PREFIX,
};

/// Extract the language token from a fence info string (`"rust,ignore"` → `"rust"`).
pub fn language_token(info: &str) -> Option<&str> {
    info.split(|c: char| c.is_whitespace() || c == ',' || c == '{')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Pick a grammar for a code block, or `None` for plain text.
fn select_syntax(lang: Option<&str>, code: &str) -> Option<&'static SyntaxReference> {
    let set: &'static SyntaxSet = &SYNTAX_SET;
    if let Some(lang) = lang {
        if let Some(syntax) = set.find_syntax_by_token(lang) {
            return Some(syntax);
        }
        debug!("Unknown fence language '{}', guessing from content", lang);
    }
    let first_line = code.lines().next().unwrap_or("");
    set.find_syntax_by_first_line(first_line)
        .filter(|s| s.name != set.find_syntax_plain_text().name)
}

/// Class name for the `<code>` element: the fence tag if given, else the grammar's.
fn language_class(lang: Option<&str>, syntax: Option<&SyntaxReference>) -> String {
    let name = match (lang, syntax) {
        (Some(l), _) => l.to_ascii_lowercase(),
        (None, Some(s)) => s
            .file_extensions
            .first()
            .cloned()
            .unwrap_or_else(|| s.name.to_ascii_lowercase()),
        (None, None) => "plaintext".to_string(),
    };
    let safe: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '+' || c == '#' || c == '-' { c } else { '-' })
        .collect();
    escape_html(&safe)
}

/// Run syntect over `code`; `Err` carries the highlighter's message.
fn highlight_with(syntax: &SyntaxReference, code: &str) -> Result<String, String> {
    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAX_SET, CLASS_STYLE);
    for line in LinesWithEndings::from(code) {
        generator
            .parse_html_for_line_which_includes_newline(line)
            .map_err(|e| e.to_string())?;
    }
    Ok(generator.finalize())
}

/// Render one code block to a complete `<pre><code>…</code></pre>` element.
///
/// `lang` is the raw fence info string, if any.
pub fn highlight_block(lang: Option<&str>, code: &str) -> String {
    block_with(lang, code, highlight_with)
}

fn block_with<F>(lang: Option<&str>, code: &str, highlighter: F) -> String
where
    F: FnOnce(&SyntaxReference, &str) -> Result<String, String>,
{
    let lang = lang.and_then(language_token);
    let syntax = select_syntax(lang, code);
    let class = language_class(lang, syntax);

    if let Some(syntax) = syntax {
        match highlighter(syntax, code) {
            Ok(body) => {
                debug!("Highlighted {} block ({} bytes)", syntax.name, code.len());
                return format!(
                    "<pre><code class=\"{HIGHLIGHTED_CLASS} language-{class}\">{body}</code></pre>\n"
                );
            }
            Err(e) => warn!("Highlighting {} block failed, emitting plain code: {}", syntax.name, e),
        }
    }

    format!(
        "<pre><code class=\"language-{class}\">{}</code></pre>\n",
        escape_html(code)
    )
}
