use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html};
use url::Url;

use crate::{Anchor, Page};

const DEFAULT_MAX_ANCHORS: usize = 5_000;

/// Parses an HTML document into the anchor list and visible text the crawler works on.
pub fn parse_page(url: &str, html: &str) -> Page {
    PageParser::new().parse(url, html)
}

pub struct PageParser {
    max_anchors: usize,
}

impl PageParser {
    pub fn new() -> Self {
        Self::with_max_anchors(DEFAULT_MAX_ANCHORS)
    }

    pub fn with_max_anchors(max_anchors: usize) -> Self {
        Self { max_anchors }
    }

    pub fn parse(&self, url: &str, html: &str) -> Page {
        let document = Html::parse_document(html);
        let mut ctx = ParseContext::new(self.max_anchors);

        for child in document.root_element().children() {
            self.visit_node(child, &mut ctx);
        }

        Page {
            url: url.to_string(),
            anchors: ctx.anchors,
            text: ctx.text.trim().to_string(),
        }
    }

    fn visit_node(&self, node: NodeRef<'_, Node>, ctx: &mut ParseContext) {
        match node.value() {
            Node::Text(text) => ctx.append_text(text),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(node) {
                    self.visit_element(element, ctx);
                }
            }
            _ => {
                for child in node.children() {
                    self.visit_node(child, ctx);
                }
            }
        }
    }

    fn visit_element(&self, element: ElementRef<'_>, ctx: &mut ParseContext) {
        let tag = element.value().name().to_ascii_lowercase();
        match tag.as_str() {
            "script" | "style" | "noscript" | "template" | "head" => {}
            "a" => {
                ctx.add_anchor(element);
                self.visit_children(element, ctx);
            }
            "br" | "p" | "div" | "li" | "tr" | "td" | "section" | "h1" | "h2" | "h3" => {
                ctx.append_text(" ");
                self.visit_children(element, ctx);
                ctx.append_text(" ");
            }
            _ => self.visit_children(element, ctx),
        }
    }

    fn visit_children(&self, element: ElementRef<'_>, ctx: &mut ParseContext) {
        for child in element.children() {
            self.visit_node(child, ctx);
        }
    }
}

impl Default for PageParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves `reference` (absolute, root-relative or protocol-relative) against `base`.
pub fn resolve_url(reference: &str, base: &str) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with("javascript:") || lower.starts_with("mailto:") {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url);
    }
    Url::parse(base).ok()?.join(trimmed).ok()
}

struct ParseContext {
    anchors: Vec<Anchor>,
    text: String,
    max_anchors: usize,
}

impl ParseContext {
    fn new(max_anchors: usize) -> Self {
        Self {
            anchors: Vec::new(),
            text: String::new(),
            max_anchors,
        }
    }

    fn append_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                if self.text.is_empty() || self.text.ends_with(' ') {
                    continue;
                }
                self.text.push(' ');
            } else {
                self.text.push(ch);
            }
        }
    }

    fn add_anchor(&mut self, element: ElementRef<'_>) {
        if self.anchors.len() >= self.max_anchors {
            return;
        }
        let attr = |name: &str| element.value().attr(name).unwrap_or_default().trim().to_string();
        self.anchors.push(Anchor {
            href: attr("href"),
            class: attr("class"),
            text: collapse_whitespace(&element.text().collect::<String>()),
        });
    }
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
