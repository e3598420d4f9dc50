//! Renderer: markdown → complete, print-styled HTML document.
//!
//! Parsing is CommonMark plus the GFM extensions people paste from chat
//! tools (tables, strikethrough, task lists). The event stream is rewritten
//! before it reaches pulldown-cmark's HTML writer:
//!
//! - fenced and indented code blocks are swapped for highlighted HTML;
//! - soft line breaks become `<br>`;
//! - raw HTML is demoted to text, so it is escaped instead of passed through.
//!
//! The output is a pure function of the input: no timestamps, no randomness.

use super::highlight::highlight_block;
use super::style::{assemble_document, stylesheet};
use crate::error::RemarkdownError;
use crate::output::RenderedDocument;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use tracing::debug;

fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Normalise pasted input: CRLF → LF, drop BOM and zero-width characters.
fn prepare_markdown(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|c| !matches!(c, '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}'))
        .collect()
}

/// Code block being collected between its start and end events.
struct PendingBlock {
    lang: Option<String>,
    code: String,
}

/// Convert markdown to body HTML.
fn render_body(markdown: &str) -> String {
    let mut events: Vec<Event<'_>> = Vec::new();
    let mut pending: Option<PendingBlock> = None;
    let mut code_blocks = 0usize;

    for event in Parser::new_ext(markdown, parser_options()) {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) if !info.trim().is_empty() => Some(info.to_string()),
                    _ => None,
                };
                pending = Some(PendingBlock {
                    lang,
                    code: String::new(),
                });
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(block) = pending.take() {
                    code_blocks += 1;
                    let html = highlight_block(block.lang.as_deref(), &block.code);
                    events.push(Event::Html(CowStr::from(html)));
                }
            }
            Event::Text(text) if pending.is_some() => {
                if let Some(block) = pending.as_mut() {
                    block.code.push_str(&text);
                }
            }
            Event::Html(raw) | Event::InlineHtml(raw) => events.push(Event::Text(raw)),
            Event::SoftBreak => events.push(Event::HardBreak),
            other => events.push(other),
        }
    }

    debug!("Rendered markdown with {} code blocks", code_blocks);
    let mut body = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut body, events.into_iter());
    body
}

/// Render markdown into a [`RenderedDocument`].
pub fn render(markdown: &str, title: &str) -> RenderedDocument {
    let markdown = prepare_markdown(markdown);
    RenderedDocument {
        title: title.to_string(),
        html_body: render_body(&markdown),
        style_sheet: stylesheet(),
    }
}

impl RenderedDocument {
    /// The complete HTML document (doctype, head, embedded styles, body).
    pub fn to_html(&self) -> Result<String, RemarkdownError> {
        assemble_document(&self.title, &self.style_sheet, &self.html_body).map_err(|e| {
            RemarkdownError::RenderFailed {
                detail: e.to_string(),
            }
        })
    }
}

/// `render(markdown, title) -> html`.
pub fn render_html(markdown: &str, title: &str) -> Result<String, RemarkdownError> {
    render(markdown, title).to_html()
}
