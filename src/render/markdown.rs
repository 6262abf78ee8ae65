use std::fmt::Write;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde::Deserialize;

use super::{Rendered, Renderer, TocEntry, toc};
use crate::error::{Error, Result};

/// Markdown 扩展开关
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MarkdownOptions {
    /// 表格、脚注、定义列表、标题属性
    pub tables: bool,
    /// 代码块输出 `codehilite` 高亮标注
    pub highlight: bool,
    /// 标题自动生成 id，并将目录标记替换为目录
    pub toc: bool,
    /// 目录标记，需单独成段
    pub toc_marker: String,
    /// 允许渲染的最大字节数
    pub max_source_len: usize,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            tables: true,
            highlight: true,
            toc: true,
            toc_marker: "[TOC]".to_string(),
            max_source_len: 1024 * 1024,
        }
    }
}

/// 基于 pulldown-cmark 的本地渲染器
#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer {
    options: MarkdownOptions,
}

impl MarkdownRenderer {
    pub fn new(options: MarkdownOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MarkdownOptions {
        &self.options
    }

    fn parser_options(&self) -> Options {
        let mut options = Options::empty();
        if self.options.tables {
            options.insert(Options::ENABLE_TABLES);
            options.insert(Options::ENABLE_FOOTNOTES);
            options.insert(Options::ENABLE_DEFINITION_LIST);
            options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        }
        options
    }

    fn check(&self, source: &str) -> Result<()> {
        if source.len() > self.options.max_source_len {
            return Err(Error::Render(format!(
                "source is {} bytes, limit is {}",
                source.len(),
                self.options.max_source_len
            )));
        }
        if source.contains('\0') {
            return Err(Error::Render("source contains a NUL byte".to_string()));
        }
        Ok(())
    }

    /// 收集所有标题并分配 id
    fn headings(&self, events: &[Event<'_>]) -> Vec<TocEntry> {
        let mut ids = toc::HeadingIds::default();
        let mut entries = Vec::new();
        let mut current: Option<(HeadingLevel, Option<&str>, String)> = None;

        for event in events {
            match event {
                Event::Start(Tag::Heading { level, id, .. }) => {
                    current = Some((*level, id.as_deref(), String::new()));
                }
                Event::Text(text) | Event::Code(text) => {
                    if let Some((_, _, title)) = current.as_mut() {
                        title.push_str(text);
                    }
                }
                Event::End(TagEnd::Heading(_)) => {
                    if let Some((level, explicit, title)) = current.take() {
                        let id = match explicit {
                            Some(id) => ids.explicit(id),
                            None => ids.derive(&title),
                        };
                        entries.push(TocEntry {
                            level: level as u8,
                            id,
                            title: title.trim().to_string(),
                        });
                    }
                }
                _ => {}
            }
        }

        entries
    }

    /// 目录标记段落的结束位置
    ///
    /// 段落只包含文本且拼接后等于标记时返回 `Some`。
    fn toc_marker_end(&self, events: &[Event<'_>], start: usize) -> Option<usize> {
        let mut text = String::new();
        for (i, event) in events.iter().enumerate().skip(start + 1) {
            match event {
                Event::Text(t) => text.push_str(t),
                Event::End(TagEnd::Paragraph) => {
                    return (text.trim() == self.options.toc_marker).then_some(i);
                }
                _ => return None,
            }
        }
        None
    }
}

impl Renderer for MarkdownRenderer {
    fn render(&self, source: &str) -> Result<Rendered> {
        if source.is_empty() {
            return Ok(Rendered::default());
        }
        self.check(source)?;

        let events: Vec<Event<'_>> = Parser::new_ext(source, self.parser_options()).collect();
        let entries = if self.options.toc {
            self.headings(&events)
        } else {
            Vec::new()
        };

        let mut out: Vec<Event<'_>> = Vec::with_capacity(events.len());
        let mut headings = entries.iter();
        let mut i = 0;

        while i < events.len() {
            match &events[i] {
                Event::Start(Tag::Paragraph) if self.options.toc => {
                    if let Some(end) = self.toc_marker_end(&events, i) {
                        out.push(Event::Html(toc::to_html(&entries).into()));
                        i = end + 1;
                        continue;
                    }
                    out.push(events[i].clone());
                }
                Event::Start(Tag::Heading {
                    level,
                    classes,
                    attrs,
                    ..
                }) if self.options.toc => {
                    let id = headings.next().map(|entry| entry.id.as_str());
                    out.push(Event::Html(open_heading(*level, id, classes, attrs).into()));
                }
                Event::End(TagEnd::Heading(level)) if self.options.toc => {
                    out.push(Event::Html(format!("</h{}>\n", *level as u8).into()));
                }
                Event::Start(Tag::CodeBlock(kind)) if self.options.highlight => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => info.split_whitespace().next(),
                        CodeBlockKind::Indented => None,
                    };

                    let mut code = String::new();
                    let mut j = i + 1;
                    while j < events.len() {
                        match &events[j] {
                            Event::End(TagEnd::CodeBlock) => break,
                            Event::Text(text) => code.push_str(text),
                            _ => {}
                        }
                        j += 1;
                    }

                    out.push(Event::Html(highlight_block(lang, &code).into()));
                    i = j + 1;
                    continue;
                }
                event => out.push(event.clone()),
            }
            i += 1;
        }

        let mut html = String::with_capacity(source.len() * 3 / 2);
        pulldown_cmark::html::push_html(&mut html, out.into_iter());

        Ok(Rendered { html, toc: entries })
    }
}

fn open_heading(
    level: HeadingLevel,
    id: Option<&str>,
    classes: &[CowStr<'_>],
    attrs: &[(CowStr<'_>, Option<CowStr<'_>>)],
) -> String {
    let mut tag = format!("<h{}", level as u8);
    if let Some(id) = id {
        let _ = write!(tag, " id=\"{}\"", escape_html(id));
    }
    if !classes.is_empty() {
        let classes: Vec<&str> = classes.iter().map(|c| c.as_ref()).collect();
        let _ = write!(tag, " class=\"{}\"", escape_html(&classes.join(" ")));
    }
    for (key, value) in attrs {
        match value {
            Some(value) => {
                let _ = write!(tag, " {}=\"{}\"", escape_html(key), escape_html(value));
            }
            None => {
                let _ = write!(tag, " {}", escape_html(key));
            }
        }
    }
    tag.push('>');
    tag
}

/// 输出带语言标注的代码块，样式由前端的 `codehilite` 主题负责
fn highlight_block(lang: Option<&str>, code: &str) -> String {
    match lang {
        Some(lang) => {
            let lang = escape_html(lang);
            format!(
                "<div class=\"codehilite\"><pre><code class=\"language-{lang}\" data-lang=\"{lang}\">{}</code></pre></div>\n",
                escape_html(code)
            )
        }
        None => format!(
            "<div class=\"codehilite\"><pre><code>{}</code></pre></div>\n",
            escape_html(code)
        ),
    }
}

pub(crate) fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(source: &str) -> Rendered {
        MarkdownRenderer::default()
            .render(source)
            .expect("render failed")
    }

    #[test]
    fn test_empty_source_renders_empty() {
        let rendered = render("");
        assert!(rendered.html.is_empty());
        assert!(rendered.toc.is_empty());
    }

    #[test]
    fn test_heading_and_highlighted_code() {
        let rendered = render("# Hi\n\n```python\nprint(1)\n```");

        assert!(rendered.html.contains("<h1 id=\"hi\">Hi</h1>"), "{}", rendered.html);
        assert!(rendered.html.contains(
            "<div class=\"codehilite\"><pre><code class=\"language-python\" data-lang=\"python\">print(1)\n</code></pre></div>"
        ));
        assert_eq!(
            rendered.toc,
            vec![TocEntry {
                level: 1,
                id: "hi".to_string(),
                title: "Hi".to_string()
            }]
        );
    }

    #[test]
    fn test_code_is_escaped() {
        let rendered = render("```\n<script>alert(\"x\")</script>\n```\n\n    a && b\n");
        assert!(rendered.html.contains("&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;"));
        assert!(rendered.html.contains("<pre><code>a &amp;&amp; b\n</code></pre>"));
        assert!(!rendered.html.contains("<script>"));
    }

    #[test]
    fn test_tables() {
        let rendered = render("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(rendered.html.contains("<table>"));
        assert!(rendered.html.contains("<td>1</td>"));
    }

    #[test]
    fn test_toc_marker_replaced() {
        let rendered = render("[TOC]\n\n# One\n\n## Two `code`\n\n# One\n");
        assert!(rendered.html.starts_with("<div class=\"toc\">"), "{}", rendered.html);
        assert!(rendered.html.contains("<a href=\"#one\">One</a>"));
        assert!(rendered.html.contains("<a href=\"#two-code\">Two code</a>"));
        assert!(rendered.html.contains("<h1 id=\"one-1\">One</h1>"));
        assert!(!rendered.html.contains("[TOC]"));
    }

    #[test]
    fn test_explicit_heading_id() {
        let rendered = render("## Setup {#install .wide}\n");
        assert!(
            rendered.html.contains("<h2 id=\"install\" class=\"wide\">Setup</h2>"),
            "{}",
            rendered.html
        );
    }

    #[test]
    fn test_extensions_can_be_disabled() {
        let renderer = MarkdownRenderer::new(MarkdownOptions {
            tables: false,
            highlight: false,
            toc: false,
            ..Default::default()
        });
        let rendered = renderer
            .render("[TOC]\n\n# Hi\n\n```rust\nfn main() {}\n```\n")
            .unwrap();

        assert!(rendered.html.contains("<p>[TOC]</p>"));
        assert!(rendered.html.contains("<h1>Hi</h1>"));
        assert!(!rendered.html.contains("codehilite"));
        assert!(rendered.toc.is_empty());
    }

    #[test]
    fn test_render_is_deterministic() {
        let source = "# A\n\n| x |\n|---|\n| y |\n\n```rust\nlet a = 1;\n```\n";
        assert_eq!(render(source), render(source));
    }

    #[test]
    fn test_oversized_source_rejected() {
        let renderer = MarkdownRenderer::new(MarkdownOptions {
            max_source_len: 8,
            ..Default::default()
        });
        assert!(matches!(
            renderer.render("0123456789"),
            Err(Error::Render(_))
        ));
        assert!(matches!(
            MarkdownRenderer::default().render("a\0b"),
            Err(Error::Render(_))
        ));
    }
}
