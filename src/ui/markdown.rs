//! Markdown rendering and the table-copy helper.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd, html};

fn options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
}

/// Render Markdown to HTML.
///
/// Raw HTML in the source is escaped and shown as text.
#[must_use]
pub fn render_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 3 / 2);
    let events = Parser::new_ext(text, options()).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    html::push_html(&mut out, events);
    out
}

/// Escape text for inclusion in HTML.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

/// Every Markdown table in `text`, each as tab-separated rows.
///
/// Cell text is flattened (inline code and emphasis keep their text, line
/// breaks become spaces). The header row comes first.
#[must_use]
pub fn tables_as_tsv(text: &str) -> Vec<String> {
    let mut tables = Vec::new();
    let mut rows: Vec<String> = Vec::new();
    let mut cells: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut in_table = false;

    for event in Parser::new_ext(text, options()) {
        match event {
            Event::Start(Tag::Table(_)) => {
                in_table = true;
                rows.clear();
            }
            Event::Start(Tag::TableCell) => cell.clear(),
            Event::Text(t) | Event::Code(t) if in_table => cell.push_str(&t),
            Event::SoftBreak | Event::HardBreak if in_table => cell.push(' '),
            Event::End(TagEnd::TableCell) => cells.push(cell.trim().replace('\t', " ")),
            Event::End(TagEnd::TableHead | TagEnd::TableRow) if !cells.is_empty() => {
                rows.push(cells.join("\t"));
                cells.clear();
            }
            Event::End(TagEnd::Table) => {
                in_table = false;
                tables.push(rows.join("\n"));
            }
            _ => {}
        }
    }
    tables
}
