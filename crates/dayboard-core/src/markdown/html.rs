use std::collections::BTreeMap;

use super::{Block, IMAGE_SCHEME, Inline, ListItem, Note};

/// Renders notes to an HTML fragment. `images` resolves `img:<token>`
/// sources to the stored data URLs.
pub fn render(source: &str, images: &BTreeMap<String, String>) -> String {
    let note = Note::parse(source);
    let mut out = String::new();
    for block in &note.blocks {
        render_block(block, images, &mut out);
    }
    out
}

fn render_block(block: &Block, images: &BTreeMap<String, String>, out: &mut String) {
    match block {
        Block::Heading { level, content } => {
            out.push_str(&format!("<h{level}>"));
            render_inlines(content, images, out);
            out.push_str(&format!("</h{level}>\n"));
        }
        Block::Paragraph(lines) => {
            out.push_str("<p>");
            for (idx, line) in lines.iter().enumerate() {
                if idx > 0 {
                    out.push_str("<br>\n");
                }
                render_inlines(line, images, out);
            }
            out.push_str("</p>\n");
        }
        Block::Code { lang, text } => {
            match lang {
                Some(lang) => {
                    out.push_str(&format!("<pre><code class=\"language-{}\">", escape(lang)))
                }
                None => out.push_str("<pre><code>"),
            }
            out.push_str(&escape(text));
            out.push_str("</code></pre>\n");
        }
        Block::List(items) => {
            out.push_str("<ul>\n");
            for item in items {
                render_item(item, images, out);
            }
            out.push_str("</ul>\n");
        }
        Block::Rule => out.push_str("<hr>\n"),
    }
}

fn render_item(item: &ListItem, images: &BTreeMap<String, String>, out: &mut String) {
    match &item.checkbox {
        Some(checkbox) => {
            out.push_str(&format!(
                "<li class=\"task-item\"><input type=\"checkbox\" data-item=\"{}\" disabled{}> ",
                escape(&checkbox.id),
                if checkbox.checked { " checked" } else { "" }
            ));
        }
        None => out.push_str("<li>"),
    }
    render_inlines(&item.content, images, out);
    out.push_str("</li>\n");
}

fn render_inlines(inlines: &[Inline], images: &BTreeMap<String, String>, out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(text) => out.push_str(&escape(text)),
            Inline::Strong(children) => wrap("strong", children, images, out),
            Inline::Emphasis(children) => wrap("em", children, images, out),
            Inline::Strike(children) => wrap("del", children, images, out),
            Inline::Code(code) => {
                out.push_str("<code>");
                out.push_str(&escape(code));
                out.push_str("</code>");
            }
            Inline::Link { text, href } => {
                out.push_str(&format!("<a href=\"{}\">", escape(&safe_href(href))));
                render_inlines(text, images, out);
                out.push_str("</a>");
            }
            Inline::Image { alt, src } => {
                let resolved = match src.strip_prefix(IMAGE_SCHEME) {
                    Some(token) => images.get(token).cloned(),
                    None => Some(safe_href(src)),
                };
                match resolved {
                    Some(url) => out.push_str(&format!(
                        "<img src=\"{}\" alt=\"{}\">",
                        escape(&url),
                        escape(alt)
                    )),
                    None => out.push_str(&format!(
                        "<span class=\"missing-image\">[{}]</span>",
                        escape(alt)
                    )),
                }
            }
        }
    }
}

fn wrap(tag: &str, children: &[Inline], images: &BTreeMap<String, String>, out: &mut String) {
    out.push_str(&format!("<{tag}>"));
    render_inlines(children, images, out);
    out.push_str(&format!("</{tag}>"));
}

fn safe_href(href: &str) -> String {
    let lower = href.trim().to_ascii_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("vbscript:") {
        "#".to_string()
    } else {
        href.trim().to_string()
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
