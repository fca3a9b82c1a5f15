//! Just enough HTML walking for the ranking and projection pages: find elements
//! by tag, class or id, and pull their text. Tag and attribute names are
//! matched case-insensitively; nesting of the same tag is honoured.

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    /// The opening tag, `<` through `>`.
    pub open: &'a str,
    /// Whole element including its closing tag.
    pub outer: &'a str,
    /// Content between the opening and closing tag.
    pub inner: &'a str,
}

impl<'a> Element<'a> {
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        attr_value(self.open, name)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|v| v.split_whitespace().any(|c| c.eq_ignore_ascii_case(class)))
    }

    pub fn text(&self) -> String {
        text_content(self.inner)
    }

    pub fn text_compact(&self) -> String {
        text_compact(self.inner)
    }
}

/// Every element (outermost first, non-overlapping) for which `keep` holds.
pub fn find_all<'a>(html: &'a str, keep: impl Fn(&str, &Element<'a>) -> bool) -> Vec<Element<'a>> {
    let lower = html.to_ascii_lowercase();
    let mut out = Vec::new();
    let mut pos = 0usize;
    while let Some(rel) = lower[pos..].find('<') {
        let start = pos + rel;
        let Some((name, open_end)) = open_tag_at(html, &lower, start) else {
            pos = start + 1;
            continue;
        };
        let open = &html[start..open_end];
        let (inner_end, outer_end) = if VOID_TAGS.contains(&name.as_str()) || open.ends_with("/>") {
            (open_end, open_end)
        } else {
            close_of(&lower, &name, open_end).unwrap_or((html.len(), html.len()))
        };
        let element = Element {
            open,
            outer: &html[start..outer_end],
            inner: &html[open_end..inner_end],
        };
        if keep(&name, &element) {
            out.push(element);
            pos = outer_end.max(open_end);
        } else {
            pos = open_end;
        }
    }
    out
}

pub fn find_by_tag<'a>(html: &'a str, tag: &str) -> Vec<Element<'a>> {
    find_all(html, |name, _| name.eq_ignore_ascii_case(tag))
}

/// Elements whose class list contains every one of `classes`.
pub fn find_by_classes<'a>(html: &'a str, classes: &[&str]) -> Vec<Element<'a>> {
    find_all(html, |_, el| classes.iter().all(|c| el.has_class(c)))
}

pub fn first_by_classes<'a>(html: &'a str, classes: &[&str]) -> Option<Element<'a>> {
    find_by_classes(html, classes).into_iter().next()
}

pub fn first_by_id<'a>(html: &'a str, tag: &str, id: &str) -> Option<Element<'a>> {
    find_all(html, |name, el| {
        name.eq_ignore_ascii_case(tag) && el.attr("id").is_some_and(|v| v == id)
    })
    .into_iter()
    .next()
}

/// Text with tags dropped, entities decoded and whitespace collapsed to single
/// spaces.
pub fn text_content(fragment: &str) -> String {
    let mut raw = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for ch in fragment.chars() {
        match ch {
            '<' => {
                in_tag = true;
                raw.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => raw.push(ch),
            _ => {}
        }
    }
    decode_entities(&raw)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Each text node trimmed and concatenated without separators.
pub fn text_compact(fragment: &str) -> String {
    let mut out = String::new();
    let mut node = String::new();
    let mut in_tag = false;
    for ch in fragment.chars() {
        match ch {
            '<' => {
                out.push_str(decode_entities(&node).trim());
                node.clear();
                in_tag = true;
            }
            '>' => in_tag = false,
            _ if !in_tag => node.push(ch),
            _ => {}
        }
    }
    out.push_str(decode_entities(&node).trim());
    out
}

pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&nbsp;", " ")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn open_tag_at(html: &str, lower: &str, start: usize) -> Option<(String, usize)> {
    let rest = &lower[start + 1..];
    let name_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(rest.len());
    if name_len == 0 {
        return None;
    }
    let name = rest[..name_len].to_string();
    let open_end = start + 1 + tag_end(&html[start + 1..])? + 1;
    Some((name, open_end))
}

// Index of the `>` closing a tag, skipping over quoted attribute values.
fn tag_end(tag_body: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, ch) in tag_body.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '>') => return Some(idx),
            _ => {}
        }
    }
    None
}

// (start of closing tag, end of closing tag) for the element opened before `from`.
fn close_of(lower: &str, name: &str, from: usize) -> Option<(usize, usize)> {
    let open_pat = format!("<{name}");
    let close_pat = format!("</{name}");
    let mut depth = 1usize;
    let mut pos = from;
    loop {
        let next_open = find_tag(lower, &open_pat, pos);
        let next_close = find_tag(lower, &close_pat, pos)?;
        match next_open {
            Some(o) if o < next_close => {
                depth += 1;
                pos = o + open_pat.len();
            }
            _ => {
                depth -= 1;
                let end = lower[next_close..].find('>').map(|i| next_close + i + 1)?;
                if depth == 0 {
                    return Some((next_close, end));
                }
                pos = end;
            }
        }
    }
}

// Like `find`, but `<tr` must not match `<track`.
fn find_tag(lower: &str, pat: &str, from: usize) -> Option<usize> {
    let mut pos = from;
    while let Some(rel) = lower.get(pos..)?.find(pat) {
        let at = pos + rel;
        let after = lower[at + pat.len()..].chars().next();
        if after.is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '-')) {
            return Some(at);
        }
        pos = at + pat.len();
    }
    None
}

fn attr_value<'a>(open: &'a str, name: &str) -> Option<&'a str> {
    let lower = open.to_ascii_lowercase();
    let mut pos = 0usize;
    while let Some(rel) = lower[pos..].find(name) {
        let at = pos + rel;
        pos = at + name.len();
        let boundary_ok = lower[..at]
            .chars()
            .last()
            .is_some_and(|c| c.is_ascii_whitespace());
        if !boundary_ok {
            continue;
        }
        let rest = lower[pos..].trim_start();
        if !rest.starts_with('=') {
            continue;
        }
        let value_start = open.len() - rest.len() + 1;
        let tail = open[value_start..].trim_start();
        let tail_start = open.len() - tail.len();
        return match tail.chars().next() {
            Some(q @ ('"' | '\'')) => {
                let end = tail[1..].find(q)?;
                Some(&open[tail_start + 1..tail_start + 1 + end])
            }
            Some(_) => {
                let end = tail
                    .find(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')
                    .unwrap_or(tail.len());
                Some(&open[tail_start..tail_start + end])
            }
            None => None,
        };
    }
    None
}
