//! Formatted-text renderer for text blocks and text units.
//!
//! Markdown goes through pulldown-cmark. Raw HTML in the source is shown as
//! text, script URLs are neutralised and fenced code is highlighted with
//! syntect using prefixed CSS classes.

use crate::mount::escape_html;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag};
use syntect::highlighting::ThemeSet;
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

/// Rendered markdown, ready to insert into a bubble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedText {
    pub html: String,
}

pub trait CodeHighlighter {
    /// Highlighted HTML for `source`, or `None` when the language is unknown.
    fn highlight(&self, lang: &str, source: &str) -> Option<String>;

    /// Stylesheet matching the classes `highlight` emits.
    fn css(&self) -> &str;
}

const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "hl-" };

pub struct SyntectHighlighter {
    syntaxes: SyntaxSet,
    css: String,
}

impl SyntectHighlighter {
    pub fn new(theme: &str) -> Self {
        let themes = ThemeSet::load_defaults();
        let css = themes
            .themes
            .get(theme)
            .or_else(|| themes.themes.get("base16-ocean.dark"))
            .or_else(|| themes.themes.values().next())
            .and_then(|t| css_for_theme_with_class_style(t, CLASS_STYLE).ok())
            .unwrap_or_default();
        if !themes.themes.contains_key(theme) {
            tracing::warn!(theme = %theme, "unknown syntax theme, using fallback");
        }
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            css,
        }
    }
}

fn syntax_token(lang: &str) -> String {
    match lang.to_lowercase().as_str() {
        "luau" => "lua".to_string(),
        "jsx" | "tsx" | "typescript" | "ts" => "js".to_string(),
        "yml" => "yaml".to_string(),
        other => other.to_string(),
    }
}

impl CodeHighlighter for SyntectHighlighter {
    fn highlight(&self, lang: &str, source: &str) -> Option<String> {
        let syntax = self.syntaxes.find_syntax_by_token(&syntax_token(lang))?;
        let mut gen = ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntaxes, CLASS_STYLE);
        for line in LinesWithEndings::from(source) {
            if gen.parse_html_for_line_which_includes_newline(line).is_err() {
                return None;
            }
        }
        Some(gen.finalize())
    }

    fn css(&self) -> &str {
        &self.css
    }
}

pub struct MarkdownRenderer {
    highlighter: Box<dyn CodeHighlighter>,
}

fn options() -> Options {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);
    opts.insert(Options::ENABLE_FOOTNOTES);
    opts
}

fn is_script_url(url: &str) -> bool {
    let lowered: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_lowercase();
    lowered.starts_with("javascript:") || lowered.starts_with("vbscript:")
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    if is_script_url(&url) {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

fn safe_tag(tag: Tag<'_>) -> Tag<'_> {
    match tag {
        Tag::Link(kind, dest, title) => Tag::Link(kind, safe_url(dest), title),
        Tag::Image(kind, dest, title) => Tag::Image(kind, safe_url(dest), title),
        other => other,
    }
}

impl MarkdownRenderer {
    pub fn new(highlighter: Box<dyn CodeHighlighter>) -> Self {
        Self { highlighter }
    }

    pub fn with_theme(theme: &str) -> Self {
        Self::new(Box::new(SyntectHighlighter::new(theme)))
    }

    pub fn highlight_css(&self) -> &str {
        self.highlighter.css()
    }

    pub fn render(&self, md: &str) -> FormattedText {
        let mut events = Vec::new();
        // (language, source) of the fenced block being collected.
        let mut code: Option<(String, String)> = None;

        for event in Parser::new_ext(md, options()) {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => {
                            info.split_whitespace().next().unwrap_or("").to_string()
                        }
                        CodeBlockKind::Indented => String::new(),
                    };
                    code = Some((lang, String::new()));
                }
                Event::End(Tag::CodeBlock(_)) => {
                    if let Some((lang, source)) = code.take() {
                        events.push(Event::Html(self.code_block(&lang, &source).into()));
                    }
                }
                Event::Text(text) if code.is_some() => {
                    if let Some((_, source)) = code.as_mut() {
                        source.push_str(&text);
                    }
                }
                Event::Html(raw) => events.push(Event::Text(raw)),
                Event::Start(tag) => events.push(Event::Start(safe_tag(tag))),
                Event::End(tag) => events.push(Event::End(safe_tag(tag))),
                other => events.push(other),
            }
        }

        let mut out = String::new();
        html::push_html(&mut out, events.into_iter());
        FormattedText {
            html: format!("<div class=\"jv-markdown\">{}</div>", out),
        }
    }

    fn code_block(&self, lang: &str, source: &str) -> String {
        if lang.is_empty() {
            return format!("<pre><code>{}</code></pre>\n", escape_html(source));
        }
        let body = self
            .highlighter
            .highlight(lang, source)
            .unwrap_or_else(|| escape_html(source));
        format!(
            "<pre><code class=\"language-{}\">{}</code></pre>\n",
            escape_html(lang),
            body
        )
    }
}
