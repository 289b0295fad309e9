//! Notes markup: a small, fixed subset of markdown.
//!
//! Notes are parsed into a block/inline tree ([`Note`]) and rendered to HTML
//! by [`html::render`]. Checklist items get identifiers derived from their
//! text so a toggle keeps hitting the same item after unrelated lines are
//! added or removed.

mod html;
mod parse;

use std::collections::BTreeSet;

pub use html::render;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Strong(Vec<Inline>),
    Emphasis(Vec<Inline>),
    Strike(Vec<Inline>),
    Code(String),
    Link { text: Vec<Inline>, href: String },
    Image { alt: String, src: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkbox {
    pub id: String,
    pub checked: bool,
    /// Zero-based source line of the item.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub checkbox: Option<Checkbox>,
    pub content: Vec<Inline>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, content: Vec<Inline> },
    /// One entry per source line; rendered with line breaks between them.
    Paragraph(Vec<Vec<Inline>>),
    Code { lang: Option<String>, text: String },
    List(Vec<ListItem>),
    Rule,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Note {
    pub blocks: Vec<Block>,
}

impl Note {
    pub fn parse(source: &str) -> Self {
        Self {
            blocks: parse::blocks(source),
        }
    }

    pub fn checklist(&self) -> Vec<&Checkbox> {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                Block::List(items) => Some(items),
                _ => None,
            })
            .flatten()
            .filter_map(|item| item.checkbox.as_ref())
            .collect()
    }

    /// Tokens of every `img:<token>` image reference.
    pub fn image_tokens(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for block in &self.blocks {
            match block {
                Block::Heading { content, .. } => collect_tokens(content, &mut out),
                Block::Paragraph(lines) => {
                    for line in lines {
                        collect_tokens(line, &mut out);
                    }
                }
                Block::List(items) => {
                    for item in items {
                        collect_tokens(&item.content, &mut out);
                    }
                }
                Block::Code { .. } | Block::Rule => {}
            }
        }
        out
    }
}

pub const IMAGE_SCHEME: &str = "img:";

fn collect_tokens(inlines: &[Inline], out: &mut BTreeSet<String>) {
    for inline in inlines {
        match inline {
            Inline::Image { src, .. } => {
                if let Some(token) = src.strip_prefix(IMAGE_SCHEME) {
                    out.insert(token.to_string());
                }
            }
            Inline::Strong(children) | Inline::Emphasis(children) | Inline::Strike(children) => {
                collect_tokens(children, out)
            }
            Inline::Link { text, .. } => collect_tokens(text, out),
            Inline::Text(_) | Inline::Code(_) => {}
        }
    }
}

/// True when the source ends inside a fenced code block that was never
/// closed, so anything appended would land in the code.
pub fn ends_in_open_fence(source: &str) -> bool {
    source
        .lines()
        .filter(|line| line.trim_start().starts_with("```"))
        .count()
        % 2
        == 1
}

/// Flips the checklist item `id` and returns the rewritten source, or `None`
/// when no item has that id. Every other byte of the source is preserved.
pub fn toggle_checklist_item(source: &str, id: &str) -> Option<String> {
    let note = Note::parse(source);
    let target = note.checklist().into_iter().find(|item| item.id == id)?;
    let line_no = target.line;
    let mark = if target.checked { ' ' } else { 'x' };

    let mut out = String::with_capacity(source.len());
    for (idx, segment) in source.split_inclusive('\n').enumerate() {
        if idx != line_no {
            out.push_str(segment);
            continue;
        }
        let indent = segment.len() - segment.trim_start().len();
        // "- [" is three bytes; the state mark follows it.
        let mark_at = indent + 3;
        out.push_str(&segment[..mark_at]);
        out.push(mark);
        out.push_str(&segment[mark_at + 1..]);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Block, Inline, Note, ends_in_open_fence, toggle_checklist_item};

    #[test]
    fn open_fence_detection() {
        assert!(ends_in_open_fence("text\n```rust\nlet x = 1;\n"));
        assert!(!ends_in_open_fence("```\ncode\n```\nafter"));
        assert!(!ends_in_open_fence("no code here"));
    }

    #[test]
    fn checklist_ids_are_slugs_with_repeat_suffixes() {
        let note = Note::parse("- [ ] Buy milk\n- [x] Call Bob!\n- [ ] buy milk\n- plain item\n");
        let ids: Vec<&str> = note.checklist().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["buy-milk", "call-bob", "buy-milk-2"]);
        assert!(note.checklist()[1].checked);
    }

    #[test]
    fn toggle_flips_only_the_target_marker() {
        let source = "## Todo\n- [ ] first\n  - [ ] second\ntrailing text";
        let toggled = toggle_checklist_item(source, "second").expect("item exists");
        assert_eq!(toggled, "## Todo\n- [ ] first\n  - [x] second\ntrailing text");

        let back = toggle_checklist_item(&toggled, "second").expect("item exists");
        assert_eq!(back, source);
    }

    #[test]
    fn toggle_survives_lines_inserted_above() {
        let before = "- [ ] ship it\n";
        let edited = format!("# Plan\n\nSome context.\n{before}");
        let toggled = toggle_checklist_item(&edited, "ship-it").expect("item exists");
        assert!(toggled.ends_with("- [x] ship it\n"));
    }

    #[test]
    fn toggle_unknown_item_is_none() {
        assert_eq!(toggle_checklist_item("- [ ] a", "b"), None);
    }

    #[test]
    fn image_tokens_found_inside_links_and_lists() {
        let note = Note::parse(
            "![a](img:one)\n- [![b](img:two)](https://x.test)\n```\n![c](img:three)\n```",
        );
        let tokens: Vec<String> = note.image_tokens().into_iter().collect();
        assert_eq!(tokens, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn paragraph_keeps_one_entry_per_line() {
        let note = Note::parse("one\ntwo");
        assert_eq!(
            note.blocks,
            vec![Block::Paragraph(vec![
                vec![Inline::Text("one".to_string())],
                vec![Inline::Text("two".to_string())],
            ])]
        );
    }
}
