use super::Section;
use anyhow::{Result, anyhow};
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use scraper::{Html, Node, Selector};

/// Render Markdown to plain text, keeping block structure as line breaks
pub(super) fn load_markdown(source: &str) -> Vec<Section> {
    let mut text = String::with_capacity(source.len());
    let mut title: Option<String> = None;
    let mut heading: Option<String> = None;

    for event in Parser::new(source) {
        match event {
            Event::Start(Tag::Heading { .. }) => {
                if title.is_none() {
                    heading = Some(String::new());
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(h) = heading.take() {
                    let h = h.trim().to_string();
                    if !h.is_empty() {
                        title = Some(h);
                    }
                }
                text.push_str("\n\n");
            }
            Event::Start(Tag::Item) => text.push_str("- "),
            Event::End(TagEnd::Item) | Event::End(TagEnd::TableRow) | Event::End(TagEnd::TableHead) => {
                text.push('\n')
            }
            Event::End(TagEnd::TableCell) => text.push_str(" | "),
            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::CodeBlock)
            | Event::End(TagEnd::List(_))
            | Event::End(TagEnd::Table) => text.push_str("\n\n"),
            Event::Text(t) | Event::Code(t) => {
                if let Some(h) = heading.as_mut() {
                    h.push_str(&t);
                }
                text.push_str(&t);
            }
            Event::SoftBreak | Event::HardBreak => text.push('\n'),
            Event::Rule => text.push_str("\n\n"),
            _ => {}
        }
    }

    let mut section = Section::new(text);
    if let Some(title) = title {
        section = section.with_metadata("title", title);
    }
    vec![section]
}

const SKIPPED_TAGS: [&str; 5] = ["script", "style", "noscript", "template", "head"];

const BLOCK_TAGS: [&str; 24] = [
    "p", "div", "section", "article", "header", "footer", "main", "aside", "nav", "h1", "h2",
    "h3", "h4", "h5", "h6", "li", "ul", "ol", "pre", "blockquote", "table", "tr", "figure",
    "form",
];

/// Extract visible text from an HTML document
pub(super) fn load_html(source: &str) -> Result<Vec<Section>> {
    let document = Html::parse_document(source);

    let body_selector = Selector::parse("body").map_err(|e| anyhow!("{:?}", e))?;
    let title_selector = Selector::parse("title").map_err(|e| anyhow!("{:?}", e))?;

    let title = document
        .select(&title_selector)
        .next()
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let mut text = String::new();
    let root = document
        .select(&body_selector)
        .next()
        .unwrap_or_else(|| document.root_element());

    for node in root.descendants() {
        match node.value() {
            Node::Element(element) => {
                let name = element.name();
                if BLOCK_TAGS.contains(&name) {
                    text.push_str("\n\n");
                } else if name == "br" || name == "td" || name == "th" {
                    text.push(if name == "br" { '\n' } else { ' ' });
                }
            }
            Node::Text(t) => {
                let hidden = node.ancestors().any(|a| {
                    a.value()
                        .as_element()
                        .is_some_and(|e| SKIPPED_TAGS.contains(&e.name()))
                });
                let collapsed = collapse_whitespace(t);
                if !hidden && !collapsed.is_empty() {
                    if t.starts_with(char::is_whitespace)
                        && !text.is_empty()
                        && !text.ends_with(char::is_whitespace)
                    {
                        text.push(' ');
                    }
                    text.push_str(&collapsed);
                    if t.ends_with(char::is_whitespace) {
                        text.push(' ');
                    }
                }
            }
            _ => {}
        }
    }

    let mut section = Section::new(text);
    if let Some(title) = title {
        section = section.with_metadata("title", title);
    }
    Ok(vec![section])
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
