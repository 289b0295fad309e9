use std::collections::HashMap;

use super::{Block, Checkbox, Inline, ListItem};

const MAX_HEADING: usize = 3;

pub(super) fn blocks(source: &str) -> Vec<Block> {
    let lines: Vec<&str> = source.lines().collect();
    let mut slugs = SlugCounter::default();
    let mut blocks = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        let line = lines[idx];
        let trimmed = line.trim();

        if trimmed.is_empty() {
            idx += 1;
            continue;
        }

        if let Some(info) = trimmed.strip_prefix("```") {
            let lang = Some(info.trim().to_string()).filter(|l| !l.is_empty());
            idx += 1;
            let mut body = Vec::new();
            while idx < lines.len() && !lines[idx].trim_start().starts_with("```") {
                body.push(lines[idx]);
                idx += 1;
            }
            // Skip the closing fence; an unterminated fence runs to the end.
            idx += 1;
            blocks.push(Block::Code {
                lang,
                text: body.join("\n"),
            });
            continue;
        }

        if is_rule(trimmed) {
            blocks.push(Block::Rule);
            idx += 1;
            continue;
        }

        if let Some((level, text)) = heading(trimmed) {
            blocks.push(Block::Heading {
                level,
                content: inlines(text),
            });
            idx += 1;
            continue;
        }

        if list_body(line).is_some() {
            let mut items = Vec::new();
            while idx < lines.len() {
                let Some(body) = list_body(lines[idx]) else {
                    break;
                };
                items.push(list_item(body, idx, &mut slugs));
                idx += 1;
            }
            blocks.push(Block::List(items));
            continue;
        }

        let mut para = Vec::new();
        while idx < lines.len() && !lines[idx].trim().is_empty() && !starts_block(lines[idx]) {
            para.push(inlines(lines[idx].trim()));
            idx += 1;
        }
        blocks.push(Block::Paragraph(para));
    }

    blocks
}

fn starts_block(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("```")
        || is_rule(trimmed)
        || heading(trimmed).is_some()
        || list_body(line).is_some()
}

/// `---`, `***`, `___`, spaces allowed between the marks.
fn is_rule(trimmed: &str) -> bool {
    let marks: Vec<char> = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    marks.len() >= 3
        && matches!(marks[0], '-' | '*' | '_')
        && marks.iter().all(|c| *c == marks[0])
}

fn heading(trimmed: &str) -> Option<(u8, &str)> {
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > MAX_HEADING {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some((level as u8, rest.trim()))
}

fn list_body(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    ["- ", "* ", "+ "]
        .iter()
        .find_map(|marker| trimmed.strip_prefix(marker))
}

fn list_item(body: &str, line: usize, slugs: &mut SlugCounter) -> ListItem {
    let checkbox = if let Some(rest) = body.strip_prefix("[ ]") {
        Some((false, rest))
    } else if let Some(rest) = body.strip_prefix("[x]").or_else(|| body.strip_prefix("[X]")) {
        Some((true, rest))
    } else {
        None
    };

    match checkbox {
        Some((checked, rest)) if rest.is_empty() || rest.starts_with(' ') => {
            let text = rest.trim();
            ListItem {
                checkbox: Some(Checkbox {
                    id: slugs.next(text),
                    checked,
                    line,
                }),
                content: inlines(text),
            }
        }
        _ => ListItem {
            checkbox: None,
            content: inlines(body.trim()),
        },
    }
}

#[derive(Debug, Default)]
struct SlugCounter {
    seen: HashMap<String, usize>,
}

impl SlugCounter {
    fn next(&mut self, text: &str) -> String {
        let base = slugify(text);
        let count = self.seen.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{base}-{count}")
        }
    }
}

fn slugify(text: &str) -> String {
    let mut out = String::new();
    let mut pending_dash = false;
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch);
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() {
        "item".to_string()
    } else {
        out
    }
}

pub(super) fn inlines(text: &str) -> Vec<Inline> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut rest = text;

    while let Some(ch) = rest.chars().next() {
        if let Some((node, remaining)) = special(rest) {
            if !buf.is_empty() {
                out.push(Inline::Text(std::mem::take(&mut buf)));
            }
            out.push(node);
            rest = remaining;
            continue;
        }
        buf.push(ch);
        rest = &rest[ch.len_utf8()..];
    }

    if !buf.is_empty() {
        out.push(Inline::Text(buf));
    }
    out
}

/// Tries each construct at the head of `s`. Unterminated markers fall
/// through and are kept as text.
fn special(s: &str) -> Option<(Inline, &str)> {
    if let Some(body) = s.strip_prefix('`') {
        let end = body.find('`')?;
        return Some((Inline::Code(body[..end].to_string()), &body[end + 1..]));
    }

    if let Some(body) = s.strip_prefix("![") {
        let (alt, href, rest) = bracket_target(body)?;
        return Some((
            Inline::Image {
                alt: alt.to_string(),
                src: href.to_string(),
            },
            rest,
        ));
    }

    if let Some(body) = s.strip_prefix('[') {
        let (text, href, rest) = bracket_target(body)?;
        return Some((
            Inline::Link {
                text: inlines(text),
                href: href.to_string(),
            },
            rest,
        ));
    }

    if let Some((inner, rest)) = delimited(s, "**") {
        return Some((Inline::Strong(inlines(inner)), rest));
    }
    if let Some((inner, rest)) = delimited(s, "~~") {
        return Some((Inline::Strike(inlines(inner)), rest));
    }
    if let Some((inner, rest)) = delimited(s, "*") {
        return Some((Inline::Emphasis(inlines(inner)), rest));
    }

    None
}

fn delimited<'a>(s: &'a str, marker: &str) -> Option<(&'a str, &'a str)> {
    let body = s.strip_prefix(marker)?;
    let end = body.find(marker)?;
    let inner = &body[..end];
    if inner.is_empty()
        || inner.starts_with(char::is_whitespace)
        || inner.ends_with(char::is_whitespace)
    {
        return None;
    }
    Some((inner, &body[end + marker.len()..]))
}

/// Splits `text](target)rest` for links and images. A link label may itself
/// hold an image, so the label ends at the last `](` before the first `)`
/// that follows it.
fn bracket_target(body: &str) -> Option<(&str, &str, &str)> {
    let mut search_from = 0;
    let mut split = None;
    while let Some(pos) = body[search_from..].find("](") {
        let at = search_from + pos;
        let after = &body[at + 2..];
        let close = after.find(')')?;
        split = Some((at, close));
        // A nested `![..](..)` label keeps going to the outer `](`.
        if body[..at].matches('[').count() <= body[..at].matches(']').count() {
            break;
        }
        search_from = at + 2 + close + 1;
    }
    let (at, close) = split?;
    let after = &body[at + 2..];
    Some((&body[..at], after[..close].trim(), &after[close + 1..]))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{blocks, inlines, slugify};
    use crate::markdown::{Block, Inline};

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_string())
    }

    #[test]
    fn inline_constructs() {
        assert_eq!(
            inlines("a **b** *c* ~~d~~ `e*f`"),
            vec![
                text("a "),
                Inline::Strong(vec![text("b")]),
                text(" "),
                Inline::Emphasis(vec![text("c")]),
                text(" "),
                Inline::Strike(vec![text("d")]),
                text(" "),
                Inline::Code("e*f".to_string()),
            ]
        );
    }

    #[test]
    fn unterminated_markers_stay_literal() {
        assert_eq!(inlines("2 * 3 and **open"), vec![text("2 * 3 and **open")]);
        assert_eq!(inlines("[label](nowhere"), vec![text("[label](nowhere")]);
    }

    #[test]
    fn links_and_images() {
        assert_eq!(
            inlines("see [the **docs**](https://d.test) ![pic](img:abc)"),
            vec![
                text("see "),
                Inline::Link {
                    text: vec![text("the "), Inline::Strong(vec![text("docs")])],
                    href: "https://d.test".to_string(),
                },
                text(" "),
                Inline::Image {
                    alt: "pic".to_string(),
                    src: "img:abc".to_string(),
                },
            ]
        );
    }

    #[test]
    fn image_inside_link_label() {
        assert_eq!(
            inlines("[![logo](img:l)](https://x.test)"),
            vec![Inline::Link {
                text: vec![Inline::Image {
                    alt: "logo".to_string(),
                    src: "img:l".to_string(),
                }],
                href: "https://x.test".to_string(),
            }]
        );
    }

    #[test]
    fn block_kinds() {
        let parsed = blocks("# Title\n\nbody line\n---\n```rust\nlet x = 1;\n```\n- [x] done\n- open\n#### not a heading");
        assert_eq!(
            parsed,
            vec![
                Block::Heading {
                    level: 1,
                    content: vec![text("Title")],
                },
                Block::Paragraph(vec![vec![text("body line")]]),
                Block::Rule,
                Block::Code {
                    lang: Some("rust".to_string()),
                    text: "let x = 1;".to_string(),
                },
                Block::List(vec![
                    crate::markdown::ListItem {
                        checkbox: Some(crate::markdown::Checkbox {
                            id: "done".to_string(),
                            checked: true,
                            line: 7,
                        }),
                        content: vec![text("done")],
                    },
                    crate::markdown::ListItem {
                        checkbox: None,
                        content: vec![text("open")],
                    },
                ]),
                Block::Paragraph(vec![vec![text("#### not a heading")]]),
            ]
        );
    }

    #[test]
    fn unterminated_fence_runs_to_end() {
        assert_eq!(
            blocks("```\nraw *text*"),
            vec![Block::Code {
                lang: None,
                text: "raw *text*".to_string(),
            }]
        );
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("Call Bob!"), "call-bob");
        assert_eq!(slugify("  --  "), "item");
        assert_eq!(slugify("Ünïcode ok"), "ünïcode-ok");
    }
}
