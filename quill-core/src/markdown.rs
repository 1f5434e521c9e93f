use std::collections::HashMap;
use std::sync::LazyLock;

use pulldown_cmark::{
    CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, TextMergeStream, html,
};
use regex::Regex;
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

// Initialize syntax highlighting resources once
static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const THEME: &str = "base16-ocean.dark";

static BARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"]*[^\s<>".,:;!?)\]'’”]"#).expect("bare URL pattern is valid")
});

/// Extensions enabled for every Markdown page.
pub fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_SMART_PUNCTUATION
        | Options::ENABLE_HEADING_ATTRIBUTES
}

/// Converts a Markdown document to HTML.
///
/// On top of the parser's extensions, headings get generated ids, bare
/// `http(s)://` URLs become links and fenced code blocks in a known
/// language are highlighted.
pub fn render_markdown(source: &str) -> String {
    let events: Vec<Event> = TextMergeStream::new(Parser::new_ext(source, options())).collect();
    let events = highlight_code_blocks(events);
    let events = add_heading_ids(events);
    let events = autolink_urls(events);

    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    out
}

fn highlight_code_blocks(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut processed = Vec::with_capacity(events.len());
    let mut iter = events.into_iter();

    while let Some(event) = iter.next() {
        let lang = match &event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                info.split([' ', ',']).next().unwrap_or_default().to_string()
            }
            _ => {
                processed.push(event);
                continue;
            }
        };

        // Collect all text events until the end of the code block
        let mut inner = Vec::new();
        let mut code = String::new();
        for e in iter.by_ref() {
            if matches!(e, Event::End(TagEnd::CodeBlock)) {
                inner.push(e);
                break;
            }
            if let Event::Text(text) = &e {
                code.push_str(text);
            }
            inner.push(e);
        }

        let highlighted = find_syntax(&lang).and_then(|syntax| {
            highlighted_html_for_string(&code, &SYNTAX_SET, syntax, &THEME_SET.themes[THEME]).ok()
        });

        match highlighted {
            Some(html) => processed.push(Event::Html(html.into())),
            None => {
                // Let the HTML writer emit the plain block with its language class.
                processed.push(event);
                processed.extend(inner);
            }
        }
    }

    processed
}

fn find_syntax(lang: &str) -> Option<&'static syntect::parsing::SyntaxReference> {
    if lang.is_empty() {
        return None;
    }
    SYNTAX_SET.find_syntax_by_token(lang)
}

fn add_heading_ids(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut processed = Vec::with_capacity(events.len());
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut iter = events.into_iter();

    while let Some(event) = iter.next() {
        let (level, id, classes, attrs) = match event {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => (level, id, classes, attrs),
            other => {
                processed.push(other);
                continue;
            }
        };

        let mut inner = Vec::new();
        let mut text = String::new();
        for e in iter.by_ref() {
            match &e {
                Event::Text(t) | Event::Code(t) => text.push_str(t),
                _ => {}
            }
            let done = matches!(e, Event::End(TagEnd::Heading(_)));
            inner.push(e);
            if done {
                break;
            }
        }

        let id = match id {
            Some(id) => id,
            None => CowStr::from(unique_slug(&text, &mut seen)),
        };

        processed.push(Event::Start(Tag::Heading {
            level,
            id: Some(id),
            classes,
            attrs,
        }));
        processed.extend(inner);
    }

    processed
}

fn unique_slug(text: &str, seen: &mut HashMap<String, usize>) -> String {
    let slug = slugify(text);
    let count = seen.entry(slug.clone()).or_insert(0);
    let id = if *count == 0 {
        slug
    } else {
        format!("{slug}-{count}")
    };
    *count += 1;
    id
}

/// Turns heading text into an anchor id: lowercase alphanumerics separated by
/// single dashes.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "section".to_string()
    } else {
        slug
    }
}

fn autolink_urls(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut processed = Vec::with_capacity(events.len());
    let mut in_link = 0usize;
    let mut in_image = 0usize;
    let mut in_code = false;

    for event in events {
        match &event {
            Event::Start(Tag::Link { .. }) => in_link += 1,
            Event::End(TagEnd::Link) => in_link = in_link.saturating_sub(1),
            // Image alt text is written as an escaped attribute.
            Event::Start(Tag::Image { .. }) => in_image += 1,
            Event::End(TagEnd::Image) => in_image = in_image.saturating_sub(1),
            Event::Start(Tag::CodeBlock(_)) => in_code = true,
            Event::End(TagEnd::CodeBlock) => in_code = false,
            Event::Text(text)
                if in_link == 0 && in_image == 0 && !in_code && BARE_URL.is_match(text) => {
                let mut last = 0;
                for m in BARE_URL.find_iter(text) {
                    if m.start() > last {
                        processed.push(Event::Text(text[last..m.start()].to_string().into()));
                    }
                    processed.push(Event::InlineHtml(
                        format!(
                            r#"<a href="{}">{}</a>"#,
                            html_escape::encode_double_quoted_attribute(m.as_str()),
                            html_escape::encode_text(m.as_str())
                        )
                        .into(),
                    ));
                    last = m.end();
                }
                if last < text.len() {
                    processed.push(Event::Text(text[last..].to_string().into()));
                }
                continue;
            }
            _ => {}
        }
        processed.push(event);
    }

    processed
}
