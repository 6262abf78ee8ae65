use std::collections::HashSet;
use std::fmt::Write;

use serde::Serialize;

use super::markdown::escape_html;
use crate::slug::slugify;

/// 目录项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    /// 标题级别，1 到 6
    pub level: u8,
    /// 标题元素的 id
    pub id: String,
    /// 标题纯文本
    pub title: String,
}

/// 为同一文档内的标题分配不重复的 id
#[derive(Default)]
pub(crate) struct HeadingIds {
    seen: HashSet<String>,
}

impl HeadingIds {
    /// 显式指定的 id 原样保留
    pub fn explicit(&mut self, id: &str) -> String {
        self.seen.insert(id.to_string());
        id.to_string()
    }

    /// 由标题文本生成 id，重复时追加 `-1`、`-2` ……
    pub fn derive(&mut self, title: &str) -> String {
        let mut base = slugify(title);
        if base.is_empty() {
            base.push_str("section");
        }

        let mut id = base.clone();
        let mut n = 0;
        while self.seen.contains(&id) {
            n += 1;
            id = format!("{base}-{n}");
        }
        self.seen.insert(id.clone());
        id
    }
}

/// 生成嵌套列表形式的目录
///
/// 级别更深的标题嵌套在上一个标题的 `<li>` 中。
pub(crate) fn to_html(entries: &[TocEntry]) -> String {
    let mut html = String::from("<div class=\"toc\">\n");
    let mut open: Vec<u8> = Vec::new();

    for entry in entries {
        while open.last().is_some_and(|&level| level > entry.level) {
            html.push_str("</li>\n</ul>\n");
            open.pop();
        }
        match open.last() {
            Some(&level) if level == entry.level => html.push_str("</li>\n"),
            _ => {
                html.push_str("<ul>\n");
                open.push(entry.level);
            }
        }
        let _ = write!(
            html,
            "<li><a href=\"#{}\">{}</a>",
            escape_html(&entry.id),
            escape_html(&entry.title)
        );
    }
    for _ in open {
        html.push_str("</li>\n</ul>\n");
    }

    html.push_str("</div>\n");
    html
}
