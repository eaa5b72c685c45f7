//! Main-content extraction and HTML to markdown conversion
//!
//! Extraction narrows the document to its content region (`<article>`,
//! `<main>`, then `<body>`), drops boilerplate subtrees such as navigation and
//! footers, and renders what is left as markdown.

use std::iter::Peekable;
use std::str::Chars;

/// Subtrees that never carry page content
const DROPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "iframe", "svg", "template", "head", "nav", "aside", "form",
    "footer", "button", "select",
];

/// Elements rendered as separate paragraphs
const BLOCK_ELEMENTS: &[&str] = &[
    "p",
    "div",
    "section",
    "article",
    "main",
    "header",
    "figure",
    "figcaption",
    "table",
    "tr",
    "dl",
    "dt",
    "dd",
];

/// Content regions, most specific first
const CONTENT_REGIONS: &[&str] = &["article", "main", "body"];

/// Extract the main content of an HTML page as markdown
///
/// Returns `None` when nothing readable is left after boilerplate removal.
pub fn extract_markdown(html: &str) -> Option<String> {
    let markdown = html_to_markdown(main_region(html));
    if markdown.chars().any(char::is_alphanumeric) {
        Some(markdown)
    } else {
        None
    }
}

/// Narrow a document to its content region
///
/// Spans from the first opening tag to the last closing tag of the first
/// region element present, so pages listing several articles keep them all.
pub fn main_region(html: &str) -> &str {
    // ASCII lowercasing keeps byte offsets aligned with `html`
    let lower = html.to_ascii_lowercase();

    for region in CONTENT_REGIONS {
        let Some(open) = find_open_tag(&lower, region) else {
            continue;
        };
        let Some(open_end) = lower[open..].find('>').map(|i| open + i + 1) else {
            continue;
        };
        let close = lower
            .rfind(&format!("</{}", region))
            .filter(|&close| close >= open_end)
            .unwrap_or(html.len());
        return &html[open_end..close];
    }

    html
}

/// Find `<name` followed by `>`, whitespace or `/`
fn find_open_tag(lower: &str, name: &str) -> Option<usize> {
    let needle = format!("<{}", name);
    let mut from = 0;
    while let Some(i) = lower[from..].find(&needle) {
        let start = from + i;
        let after = start + needle.len();
        match lower[after..].chars().next() {
            Some(c) if c == '>' || c == '/' || c.is_whitespace() => return Some(start),
            None => return None,
            _ => from = after,
        }
    }
    None
}

/// Convert an HTML fragment to markdown
pub fn html_to_markdown(html: &str) -> String {
    let mut writer = MarkdownWriter::default();
    let mut chars = html.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '<' => {
                let tag = read_tag(&mut chars);
                match raw_text_element(&tag) {
                    Some(name) => skip_raw_text(&mut chars, name),
                    None => writer.tag(&tag),
                }
            }
            '&' if !writer.skipping() => {
                let text = decode_entity(&mut chars);
                for c in text.chars() {
                    writer.text(c);
                }
            }
            _ if !writer.skipping() => writer.text(c),
            _ => {}
        }
    }

    writer.finish()
}

/// One output line and how it is rendered
#[derive(Default)]
struct Line {
    /// Blockquote nesting when the line was started
    quote: usize,
    /// Inside `pre`: emitted exactly as written
    verbatim: bool,
    text: String,
}

/// Markdown output state while walking the tag stream
#[derive(Default)]
struct MarkdownWriter {
    lines: Vec<Line>,
    current: Line,
    /// Open dropped elements
    dropped: Vec<String>,
    /// One entry per open list; `Some(n)` for ordered lists
    lists: Vec<Option<usize>>,
    /// Href of every open anchor, `None` when it is not rendered as a link
    links: Vec<Option<String>>,
    in_pre: bool,
    /// Nothing written since `<pre>`; a newline here is dropped
    pre_start: bool,
    quote_depth: usize,
}

impl MarkdownWriter {
    fn skipping(&self) -> bool {
        !self.dropped.is_empty()
    }

    fn push_str(&mut self, s: &str) {
        self.current.text.push_str(s);
    }

    fn tag(&mut self, tag: &str) {
        let lower = tag.to_ascii_lowercase();
        let is_closing = lower.starts_with('/');
        let self_closing = lower.ends_with('/');
        let name = lower
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or("");

        if DROPPED_ELEMENTS.contains(&name) {
            if is_closing {
                if let Some(pos) = self.dropped.iter().rposition(|t| t == name) {
                    self.dropped.truncate(pos);
                }
            } else if !self_closing {
                self.dropped.push(name.to_string());
            }
            return;
        }

        if self.skipping() {
            return;
        }

        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.block_break();
                if !is_closing {
                    let level = usize::from(name.as_bytes()[1] - b'0');
                    self.push_str(&"#".repeat(level));
                    self.push_str(" ");
                }
            }
            "br" => self.newline(),
            "hr" => {
                self.block_break();
                self.push_str("---");
                self.block_break();
            }
            "ul" | "ol" => {
                if is_closing {
                    self.lists.pop();
                    if self.lists.is_empty() {
                        self.block_break();
                    }
                } else {
                    if self.lists.is_empty() {
                        self.block_break();
                    }
                    self.lists.push((name == "ol").then_some(0));
                }
            }
            "li" if !is_closing => self.list_item(),
            "strong" | "b" => self.push_str("**"),
            "em" | "i" => self.push_str("*"),
            "code" if !self.in_pre => self.push_str("`"),
            "pre" => {
                if is_closing {
                    if !self.in_pre {
                        return;
                    }
                    self.in_pre = false;
                    if self.current.verbatim && self.current.text.is_empty() {
                        self.current.verbatim = false;
                    } else {
                        self.newline();
                    }
                    self.push_str("```");
                    self.block_break();
                } else {
                    self.block_break();
                    self.push_str("```");
                    self.in_pre = true;
                    self.pre_start = true;
                    self.newline();
                }
            }
            "blockquote" => {
                self.block_break();
                if is_closing {
                    self.quote_depth = self.quote_depth.saturating_sub(1);
                } else {
                    self.quote_depth += 1;
                }
                // The fresh line belongs to the new nesting level
                self.current.quote = self.quote_depth;
                if is_closing {
                    self.block_break();
                }
            }
            "a" if !self_closing => {
                if is_closing {
                    if let Some(Some(href)) = self.links.pop() {
                        self.push_str(&format!("]({})", href));
                    }
                } else {
                    let href = extract_attribute(tag, "href")
                        .filter(|h| !h.is_empty() && !h.starts_with('#'))
                        .filter(|h| !h.to_ascii_lowercase().starts_with("javascript:"));
                    if href.is_some() {
                        self.push_str("[");
                    }
                    self.links.push(href);
                }
            }
            "td" | "th" => self.space(),
            _ if BLOCK_ELEMENTS.contains(&name) => self.block_break(),
            _ => {}
        }
    }

    fn text(&mut self, c: char) {
        if self.in_pre {
            match c {
                '\r' => {}
                '\n' if self.pre_start => self.pre_start = false,
                '\n' => self.newline(),
                _ => {
                    self.pre_start = false;
                    self.current.text.push(c);
                }
            }
        } else if c.is_whitespace() {
            self.space();
        } else {
            self.current.text.push(c);
        }
    }

    fn space(&mut self) {
        let text = &self.current.text;
        if !text.is_empty() && !text.ends_with(' ') {
            self.current.text.push(' ');
        }
    }

    fn newline(&mut self) {
        let next = Line {
            quote: self.quote_depth,
            verbatim: self.in_pre,
            text: String::new(),
        };
        let done = std::mem::replace(&mut self.current, next);
        self.lines.push(done);
    }

    fn block_break(&mut self) {
        self.newline();
        self.newline();
    }

    fn list_item(&mut self) {
        self.newline();
        let depth = self.lists.len().saturating_sub(1);
        for _ in 0..depth {
            self.push_str("  ");
        }
        match self.lists.last_mut() {
            Some(Some(n)) => {
                *n += 1;
                self.current.text.push_str(&format!("{}. ", n));
            }
            _ => self.current.text.push_str("- "),
        }
    }

    /// Render the lines: quote prefixes applied, trailing spaces stripped,
    /// blank runs collapsed to one line, ends trimmed
    ///
    /// A blank run inside a blockquote stays a bare `>` line so the quote
    /// continues; a blank at a shallower depth ends it. Verbatim lines are
    /// never touched.
    fn finish(mut self) -> String {
        self.newline();
        let mut result = String::new();
        // Shallowest quote depth seen in the current blank run
        let mut pending_blank: Option<usize> = None;

        for line in &self.lines {
            let text = if line.verbatim {
                line.text.as_str()
            } else {
                line.text.trim_end()
            };
            if !line.verbatim && text.trim_start().is_empty() {
                pending_blank = Some(pending_blank.map_or(line.quote, |q| q.min(line.quote)));
                continue;
            }
            if let Some(depth) = pending_blank.take() {
                if !result.is_empty() {
                    result.push_str(quote_prefix(depth).trim_end());
                    result.push('\n');
                }
            }
            let prefix = quote_prefix(line.quote);
            if text.is_empty() {
                result.push_str(prefix.trim_end());
            } else {
                result.push_str(&prefix);
                result.push_str(text);
            }
            result.push('\n');
        }

        result.trim_end().to_string()
    }
}

fn quote_prefix(depth: usize) -> String {
    "> ".repeat(depth)
}

/// Read a tag body after `<`, up to the matching `>`
///
/// Quoted attribute values may contain `>`. Comments are consumed whole and
/// come back as `!--`.
fn read_tag(chars: &mut Peekable<Chars>) -> String {
    let mut tag = String::new();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        match (quote, c) {
            (None, '>') => break,
            (None, '"' | '\'') if !tag.starts_with('!') => {
                quote = Some(c);
                tag.push(c);
            }
            (Some(q), c) if c == q => {
                quote = None;
                tag.push(c);
            }
            _ => tag.push(c),
        }

        if tag == "!--" {
            skip_comment(chars);
            break;
        }
    }

    tag
}

/// Elements whose body is raw text that may contain `<`
fn raw_text_element(tag: &str) -> Option<&'static str> {
    let lower = tag.to_ascii_lowercase();
    if lower.ends_with('/') {
        return None;
    }
    let name = lower.split(|c: char| c.is_whitespace()).next().unwrap_or("");
    ["script", "style"].into_iter().find(|&raw| raw == name)
}

/// Consume everything up to and including `</name ...>`
fn skip_raw_text(chars: &mut Peekable<Chars>, name: &str) {
    let end: Vec<char> = format!("</{}", name).chars().collect();
    let mut window: Vec<char> = Vec::with_capacity(end.len());

    for c in chars.by_ref() {
        if window.len() == end.len() {
            window.remove(0);
        }
        window.push(c.to_ascii_lowercase());
        if window == end {
            break;
        }
    }
    for c in chars.by_ref() {
        if c == '>' {
            break;
        }
    }
}

fn skip_comment(chars: &mut Peekable<Chars>) {
    let mut dashes = 0;
    for c in chars.by_ref() {
        match c {
            '-' => dashes += 1,
            '>' if dashes >= 2 => return,
            _ => dashes = 0,
        }
    }
}

/// Extract attribute value from tag
fn extract_attribute(tag: &str, attr: &str) -> Option<String> {
    let pattern = format!("{}=", attr);
    let tag_lower = tag.to_ascii_lowercase();

    let start = tag_lower
        .match_indices(&pattern)
        .map(|(i, _)| i)
        .find(|&i| i > 0 && tag_lower[..i].ends_with(char::is_whitespace))?;

    let rest = tag[start + pattern.len()..].trim_start();
    let value = if let Some(rest) = rest.strip_prefix('"') {
        &rest[..rest.find('"')?]
    } else if let Some(rest) = rest.strip_prefix('\'') {
        &rest[..rest.find('\'')?]
    } else {
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '>')
            .unwrap_or(rest.len());
        &rest[..end]
    };
    Some(value.to_string())
}

/// Decode an HTML entity whose `&` was already consumed
///
/// Unknown or unterminated entities are returned literally.
fn decode_entity(chars: &mut Peekable<Chars>) -> String {
    let mut entity = String::new();
    let mut terminated = false;
    while let Some(&next) = chars.peek() {
        if next == ';' {
            chars.next();
            terminated = true;
            break;
        }
        if (!next.is_ascii_alphanumeric() && next != '#') || entity.len() > 10 {
            break;
        }
        entity.push(next);
        chars.next();
    }

    let decoded = if terminated { named_or_numeric(&entity) } else { None };
    match decoded {
        Some(c) => c.to_string(),
        None if terminated => format!("&{};", entity),
        None => format!("&{}", entity),
    }
}

fn named_or_numeric(entity: &str) -> Option<char> {
    let named = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "mdash" => '—',
        "ndash" => '–',
        "hellip" => '…',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        _ => {
            let num = entity.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            return char::from_u32(code);
        }
    };
    Some(named)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings() {
        let md = html_to_markdown("<h1>Title</h1><h2>Subtitle</h2><h6>Small</h6>");
        assert_eq!(md, "# Title\n\n## Subtitle\n\n###### Small");
    }

    #[test]
    fn test_paragraphs_are_separated() {
        let md = html_to_markdown("<p>First paragraph</p><p>Second paragraph</p>");
        assert_eq!(md, "First paragraph\n\nSecond paragraph");
    }

    #[test]
    fn test_whitespace_collapsed_outside_pre() {
        let md = html_to_markdown("<p>  lots   of\n   space </p>");
        assert_eq!(md, "lots of space");
    }

    #[test]
    fn test_unordered_and_nested_lists() {
        let md = html_to_markdown("<ul><li>Item 1</li><li>Item 2<ul><li>Child</li></ul></li></ul>");
        assert!(md.contains("- Item 1"));
        assert!(md.contains("- Item 2"));
        assert!(md.contains("\n  - Child"));
    }

    #[test]
    fn test_ordered_list_numbering() {
        let md = html_to_markdown("<ol><li>One</li><li>Two</li><li>Three</li></ol>");
        assert_eq!(md, "1. One\n2. Two\n3. Three");
    }

    #[test]
    fn test_emphasis_and_inline_code() {
        let md = html_to_markdown("<p><strong>bold</strong> and <em>italic</em> and <code>x</code></p>");
        assert_eq!(md, "**bold** and *italic* and `x`");
    }

    #[test]
    fn test_pre_keeps_whitespace() {
        let md = html_to_markdown("<pre><code>fn main() {\n    run();\n}</code></pre>");
        assert_eq!(md, "```\nfn main() {\n    run();\n}\n```");
    }

    #[test]
    fn test_links() {
        let md = html_to_markdown(r#"<p>See <a href="https://example.com/docs">the docs</a>.</p>"#);
        assert_eq!(md, "See [the docs](https://example.com/docs).");
    }

    #[test]
    fn test_fragment_and_script_links_keep_text_only() {
        let md = html_to_markdown(r##"<a href="#top">Top</a> <a href="javascript:void(0)">Menu</a>"##);
        assert_eq!(md, "Top Menu");
    }

    #[test]
    fn test_blockquote() {
        let md = html_to_markdown("<blockquote><p>Quoted</p></blockquote><p>After</p>");
        assert_eq!(md, "> Quoted\n\nAfter");
    }

    #[test]
    fn test_dropped_elements() {
        let html = "<p>Before</p><script>alert('bad');</script><nav><a href=\"/\">Home</a></nav><p>After</p><footer>Copyright</footer>";
        let md = html_to_markdown(html);
        assert_eq!(md, "Before\n\nAfter");
    }

    #[test]
    fn test_script_body_with_angle_brackets() {
        let md = html_to_markdown("<p>A</p><script>if (a<b && c>d) { x(\"</p>\"); }</SCRIPT ><p>B</p>");
        assert_eq!(md, "A\n\nB");
    }

    #[test]
    fn test_blockquote_paragraphs() {
        let md = html_to_markdown("<blockquote><p>One</p><p>Two</p></blockquote><p>After</p>");
        assert_eq!(md, "> One\n>\n> Two\n\nAfter");
    }

    #[test]
    fn test_comments_are_dropped() {
        let md = html_to_markdown("<p>Kept<!-- <p>hidden</p> --> text</p>");
        assert_eq!(md, "Kept text");
    }

    #[test]
    fn test_quoted_gt_in_attribute() {
        let md = html_to_markdown(r#"<p title="a > b">Value</p>"#);
        assert_eq!(md, "Value");
    }

    #[test]
    fn test_entity_decoding() {
        let md = html_to_markdown("<p>Tom &amp; Jerry &lt;3 &gt; &quot;q&quot; &#39;s&#x27; &mdash; &copy;</p>");
        assert_eq!(md, "Tom & Jerry <3 > \"q\" 's' — ©");
    }

    #[test]
    fn test_unknown_entities_kept() {
        let md = html_to_markdown("<p>R&D &bogus; ok</p>");
        assert_eq!(md, "R&D &bogus; ok");
    }

    #[test]
    fn test_main_region_prefers_article() {
        let html = "<html><body><nav>Menu</nav><div>Sidebar</div><article><h1>Post</h1><p>Body</p></article></body></html>";
        assert_eq!(main_region(html), "<h1>Post</h1><p>Body</p>");
    }

    #[test]
    fn test_main_region_spans_multiple_articles() {
        let html = "<body><article>One</article><hr><article>Two</article></body>";
        assert_eq!(main_region(html), "One</article><hr><article>Two");
    }

    #[test]
    fn test_main_region_falls_back_to_main_then_body() {
        assert_eq!(main_region("<header>X</header><main id=\"m\">Content</main>"), "Content");
        assert_eq!(main_region("<HTML><BODY class=x>Hello</BODY></HTML>"), "Hello");
        assert_eq!(main_region("plain text"), "plain text");
    }

    #[test]
    fn test_main_region_ignores_lookalike_tags() {
        let html = "<body><articles>no</articles><mainframe>no</mainframe><p>yes</p></body>";
        assert_eq!(
            main_region(html),
            "<articles>no</articles><mainframe>no</mainframe><p>yes</p>"
        );
    }

    #[test]
    fn test_extract_markdown_full_page() {
        let html = r#"<!DOCTYPE html>
<html>
<head><title>Test</title><style>body { color: red }</style></head>
<body>
    <nav><a href="/">Home</a></nav>
    <main>
        <h1>Hello World</h1>
        <p>This is a <strong>test</strong> paragraph.</p>
        <ul>
            <li>Item 1</li>
            <li>Item 2</li>
        </ul>
    </main>
    <footer>Footer text</footer>
</body>
</html>"#;
        let md = extract_markdown(html).unwrap();
        assert!(md.starts_with("# Hello World"));
        assert!(md.contains("This is a **test** paragraph."));
        assert!(md.contains("- Item 1\n- Item 2"));
        assert!(!md.contains("Home"));
        assert!(!md.contains("Footer"));
        assert!(!md.contains("color"));
    }

    #[test]
    fn test_extract_markdown_none_without_content() {
        assert_eq!(extract_markdown(""), None);
        assert_eq!(extract_markdown("<html><body><script>x()</script></body></html>"), None);
        assert_eq!(extract_markdown("<body><nav>Menu</nav><hr></body>"), None);
    }

    #[test]
    fn test_extract_markdown_keeps_unicode() {
        let md = extract_markdown("<p>Grüße aus Zürich — 東京 🚀</p>").unwrap();
        assert_eq!(md, "Grüße aus Zürich — 東京 🚀");
    }

    #[test]
    fn test_extract_attribute() {
        assert_eq!(
            extract_attribute("a href=\"https://example.com\" class=\"link\"", "href"),
            Some("https://example.com".to_string())
        );
        assert_eq!(
            extract_attribute("a data-href='x' href='y.html'", "href"),
            Some("y.html".to_string())
        );
        assert_eq!(
            extract_attribute("a href=plain class=x", "href"),
            Some("plain".to_string())
        );
        assert_eq!(extract_attribute("a class=x", "href"), None);
    }

    #[test]
    fn test_blank_runs_collapse() {
        let md = html_to_markdown("<p>  \n</p>\n\n<p>hello  </p><br><br><br><p>world</p>");
        assert_eq!(md, "hello\n\nworld");
    }

    #[test]
    fn test_pre_keeps_blank_lines() {
        let md = html_to_markdown("<pre>def a():\n    pass\n\n\ndef b():\n    pass</pre>");
        assert_eq!(md, "```\ndef a():\n    pass\n\n\ndef b():\n    pass\n```");
    }

    #[test]
    fn test_pre_keeps_prompt_lines() {
        let md = html_to_markdown("<pre>x = 1\n\n&gt;&gt;&gt;\nprint(x)</pre>");
        assert_eq!(md, "```\nx = 1\n\n>>>\nprint(x)\n```");

        let md = html_to_markdown("<pre>x = 1\n\n>>>\nprint(x)</pre>");
        assert_eq!(md, "```\nx = 1\n\n>>>\nprint(x)\n```");
    }

    #[test]
    fn test_pre_drops_leading_newline() {
        assert_eq!(html_to_markdown("<pre>\nfirst\n</pre>"), "```\nfirst\n```");
    }

    #[test]
    fn test_text_of_only_gt_is_kept() {
        let md = html_to_markdown("<p>a</p><p>&gt;</p><p>b</p>");
        assert_eq!(md, "a\n\n>\n\nb");
    }

    #[test]
    fn test_nested_blockquotes() {
        let md = html_to_markdown(
            "<blockquote><p>Outer</p><blockquote><p>Inner</p></blockquote></blockquote><p>After</p>",
        );
        assert_eq!(md, "> Outer\n>\n> > Inner\n\nAfter");
    }

    #[test]
    fn test_pre_inside_blockquote() {
        let md = html_to_markdown("<blockquote><pre>a\n\nb</pre></blockquote>");
        assert_eq!(md, "> ```\n> a\n>\n> b\n> ```");
    }
}
