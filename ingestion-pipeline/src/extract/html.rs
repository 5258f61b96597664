use std::sync::LazyLock;

use regex::Regex;
use ego_tree::NodeRef;
use scraper::{Html, Node};

/// Block-level elements that introduce a line break around their content.
const BLOCK_ELEMENTS: &[&str] = &[
    "div", "p", "h1", "h2", "h3", "h4", "h5", "h6", "br", "hr", "blockquote", "pre", "ul", "ol",
    "li", "table", "tr", "td", "th", "section", "article", "header", "footer", "main", "aside",
    "nav",
];

static SPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("static regex"));
static SPACE_AROUND_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" ?\n ?").expect("static regex"));
static BLANK_LINE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("static regex"));

fn is_block_element(name: &str) -> bool {
    BLOCK_ELEMENTS.contains(&name)
}

/// Emits text nodes in document order, skipping `<script>` and `<style>`
/// content, with a newline at every block-element boundary. Whitespace
/// runs collapse to a single space and blank-line runs to at most one
/// blank line.
pub fn extract(bytes: &[u8]) -> String {
    let source = String::from_utf8_lossy(bytes);
    let document = Html::parse_document(&source);

    let mut out = String::new();
    walk(document.tree.root(), &mut out);

    collapse_whitespace(&out)
}

fn walk(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Element(element) => {
            let name = element.name();
            if name.eq_ignore_ascii_case("script") || name.eq_ignore_ascii_case("style") {
                return;
            }

            let block = is_block_element(name);
            if block {
                out.push('\n');
            }
            for child in node.children() {
                walk(child, out);
            }
            if block {
                out.push('\n');
            }
        }
        Node::Text(text) => {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                out.push_str(trimmed);
                out.push(' ');
            }
        }
        _ => {
            for child in node.children() {
                walk(child, out);
            }
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    let spaced = SPACE_RUNS.replace_all(text, " ");
    let newlined = SPACE_AROUND_NEWLINES.replace_all(&spaced, "\n");
    let collapsed = BLANK_LINE_RUNS.replace_all(&newlined, "\n\n");
    collapsed.trim().to_string()
}
