//! Print stylesheet and syntax colour table.
//!
//! The colour table is defined once, in [`TOKEN_COLORS`], and emitted twice:
//!
//! 1. inside the document's own `<style>` block ([`highlight_css`]), and
//! 2. as the post-load injection the Paginator adds after switching the page
//!    to print media ([`reapply_css`]), scoped under `html body pre code.hl`
//!    so it outranks anything the print cascade brings in.
//!
//! Colours are dark and saturated enough to stay distinguishable on a
//! grayscale e-ink panel, with bold/italic carrying the distinction where
//! hue alone would not.

use std::fmt::Write as _;

/// Class prefix syntect puts on every scope atom.
pub const CLASS_PREFIX: &str = "hl-";

/// Class on `<code>` elements that went through the highlighter.
pub const HIGHLIGHTED_CLASS: &str = "hl";

/// One token → colour rule.
#[derive(Debug, Clone, Copy)]
pub struct TokenColor {
    /// Scope atoms that must all be present, e.g. `["entity", "name", "function"]`.
    pub scopes: &'static [&'static [&'static str]],
    pub color: &'static str,
    pub bold: bool,
    pub italic: bool,
}

/// Token colour table, lowest precedence first.
pub const TOKEN_COLORS: &[TokenColor] = &[
    // keywords, tags, section titles
    TokenColor {
        scopes: &[
            &["keyword"],
            &["storage"],
            &["entity", "name", "tag"],
            &["markup", "heading"],
            &["markup", "bold"],
        ],
        color: "#0033cc",
        bold: true,
        italic: false,
    },
    // strings, attributes, links
    TokenColor {
        scopes: &[
            &["string"],
            &["entity", "other", "attribute-name"],
            &["markup", "underline", "link"],
            &["constant", "other", "symbol"],
        ],
        color: "#008800",
        bold: false,
        italic: false,
    },
    // numbers, literals, built-ins, regexps
    TokenColor {
        scopes: &[
            &["constant", "numeric"],
            &["constant", "language"],
            &["constant", "character"],
            &["support", "function"],
            &["string", "regexp"],
            &["markup", "italic"],
        ],
        color: "#cc5200",
        bold: false,
        italic: false,
    },
    // variables and parameters
    TokenColor {
        scopes: &[
            &["variable"],
            &["variable", "parameter"],
            &["punctuation", "definition", "variable"],
        ],
        color: "#006666",
        bold: false,
        italic: false,
    },
    // function names
    TokenColor {
        scopes: &[
            &["entity", "name", "function"],
            &["variable", "function"],
            &["meta", "function-call", "identifier"],
        ],
        color: "#6600cc",
        bold: true,
        italic: false,
    },
    // types and classes
    TokenColor {
        scopes: &[
            &["entity", "name", "type"],
            &["entity", "name", "class"],
            &["entity", "name", "struct"],
            &["entity", "other", "inherited-class"],
            &["support", "type"],
            &["support", "class"],
            &["storage", "type"],
        ],
        color: "#990099",
        bold: true,
        italic: false,
    },
    // comments
    TokenColor {
        scopes: &[&["comment"], &["punctuation", "definition", "comment"]],
        color: "#666666",
        bold: false,
        italic: true,
    },
    // diffs
    TokenColor {
        scopes: &[&["markup", "deleted"]],
        color: "#990000",
        bold: false,
        italic: false,
    },
    TokenColor {
        scopes: &[&["markup", "inserted"]],
        color: "#006600",
        bold: false,
        italic: false,
    },
];

/// Base typography for print. Highlight rules are appended after it.
const BASE_CSS: &str = r#"html, body {
  -webkit-print-color-adjust: exact !important;
  print-color-adjust: exact !important;
  font-family: Georgia, 'Times New Roman', serif;
  font-size: 11pt;
  line-height: 1.6;
  color: #000;
  background: #fff;
  margin: 0;
  padding: 0;
}
body { padding: 20px; }
h1 { font-size: 16pt; margin: 20px 0 12px 0; border-bottom: 2px solid #333; padding-bottom: 5px; }
h2 { font-size: 14pt; margin: 16px 0 10px 0; }
h3 { font-size: 12pt; margin: 14px 0 8px 0; }
h4, h5, h6 { font-size: 11pt; margin: 12px 0 6px 0; }
p { margin: 8px 0; }
pre {
  background: transparent;
  border: 2px solid #000;
  padding: 12px;
  margin: 12px 0;
  border-radius: 4px;
  font-family: 'DejaVu Sans Mono', Monaco, 'Courier New', monospace;
  font-size: 9pt;
  line-height: 1.4;
  overflow-wrap: break-word;
  white-space: pre-wrap;
  page-break-inside: avoid;
}
code {
  background: transparent;
  padding: 3px 6px;
  border: 1px solid #333;
  border-radius: 3px;
  font-family: 'DejaVu Sans Mono', Monaco, 'Courier New', monospace;
  font-size: 9pt;
}
pre code { background: none; padding: 0; border: none; display: block; overflow-x: auto; }
blockquote { border-left: 4px solid #000; margin: 12px 0; padding-left: 12px; font-style: italic; color: #333; }
ul, ol { margin: 10px 0; padding-left: 25px; }
li { margin: 4px 0; }
table { border-collapse: collapse; width: 100%; margin: 10px 0; }
th, td { border: 1px solid #333; padding: 8px; text-align: left; }
th { background-color: #f2f2f2; font-weight: bold; }
img { max-width: 100%; }
hr { border: none; border-top: 1px solid #333; margin: 16px 0; }
code.hl { color: #000 !important; background: transparent !important; }
"#;

/// Forces exact colour printing; shared by the stylesheet and the reapply block.
const PRINT_EXACT_CSS: &str = "@media print {\n  * {\n    -webkit-print-color-adjust: exact !important;\n    print-color-adjust: exact !important;\n  }\n}\n";

/// CSS selector for one scope combination, e.g. `.hl-entity.hl-name.hl-function`.
fn scope_selector(atoms: &[&str]) -> String {
    atoms.iter().fold(String::new(), |mut s, atom| {
        let _ = write!(s, ".{CLASS_PREFIX}{atom}");
        s
    })
}

/// Emit the colour table, each selector prefixed with `scope` (may be empty).
fn token_rules(scope: &str) -> String {
    let mut css = String::new();
    for rule in TOKEN_COLORS {
        let selectors: Vec<String> = rule
            .scopes
            .iter()
            .map(|atoms| {
                if scope.is_empty() {
                    scope_selector(atoms)
                } else {
                    format!("{scope} {}", scope_selector(atoms))
                }
            })
            .collect();
        let _ = write!(css, "{} {{ color: {} !important;", selectors.join(", "), rule.color);
        if rule.bold {
            css.push_str(" font-weight: bold !important;");
        }
        if rule.italic {
            css.push_str(" font-style: italic !important;");
        }
        css.push_str(" }\n");
    }
    css
}

/// Highlight colour rules as they appear in the document stylesheet.
pub fn highlight_css() -> String {
    token_rules("")
}

/// The full stylesheet embedded in every rendered document.
pub fn stylesheet() -> String {
    let mut css = String::with_capacity(BASE_CSS.len() + 4096);
    css.push_str(BASE_CSS);
    css.push_str(&highlight_css());
    css.push_str(PRINT_EXACT_CSS);
    css
}

/// Style block injected after print-media emulation.
///
/// Repeats the colour table under `html body pre code.hl` so these rules win
/// over anything else on specificity as well as on `!important`.
pub fn reapply_css() -> String {
    let mut css = String::from(
        "* {\n  -webkit-print-color-adjust: exact !important;\n  print-color-adjust: exact !important;\n}\n",
    );
    css.push_str(&token_rules(&format!("html body pre code.{HIGHLIGHTED_CLASS}")));
    css
}

/// Escape text for HTML element content and double-quoted attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 8);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap a rendered body in a complete HTML document.
pub fn assemble_document(title: &str, style_sheet: &str, html_body: &str) -> Result<String, std::fmt::Error> {
    let mut doc = String::with_capacity(style_sheet.len() + html_body.len() + 512);
    write!(
        doc,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
<title>{}</title>\n<style>\n{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(title),
        style_sheet,
        html_body
    )?;
    Ok(doc)
}
