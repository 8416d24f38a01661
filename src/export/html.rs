// src/export/html.rs
//! Converts the markdown line model into a standalone HTML page.
//!
//! Only the constructs the page renderer emits are understood: `#`/`##`
//! headings, `- ` list items (optionally a single `[label](href)` link) and
//! plain paragraphs.

pub fn markdown_to_html(lines: &[String]) -> Vec<String> {
    let mut html = vec![
        "<!DOCTYPE html>".to_string(),
        "<html>".to_string(),
        "<head><meta charset=\"utf-8\"></head>".to_string(),
        "<body>".to_string(),
    ];

    let mut in_list = false;
    for line in lines {
        let item = line.strip_prefix("- ");
        if item.is_none() && in_list {
            html.push("</ul>".to_string());
            in_list = false;
        }

        if let Some(item) = item {
            if !in_list {
                html.push("<ul>".to_string());
                in_list = true;
            }
            html.push(format!("<li>{}</li>", list_item(item)));
        } else if let Some(heading) = line.strip_prefix("## ") {
            html.push(format!("<h2>{}</h2>", escape(heading)));
        } else if let Some(heading) = line.strip_prefix("# ") {
            html.push(format!("<h1>{}</h1>", escape(heading)));
        } else if !line.trim().is_empty() {
            html.push(format!("<p>{}</p>", escape(line)));
        }
    }
    if in_list {
        html.push("</ul>".to_string());
    }

    html.extend(["</body>".to_string(), "</html>".to_string()]);
    html
}

fn list_item(item: &str) -> String {
    match parse_link(item) {
        Some((label, href)) => format!("<a href=\"{}\">{}</a>", escape(href), escape(label)),
        None => escape(item),
    }
}

/// `[label](href)` spanning the whole item.
fn parse_link(item: &str) -> Option<(&str, &str)> {
    let rest = item.strip_prefix('[')?.strip_suffix(')')?;
    let (label, href) = rest.split_once("](")?;
    Some((label, href))
}

fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
