mod markdown;
mod toc;

pub use self::{
    markdown::{MarkdownOptions, MarkdownRenderer},
    toc::TocEntry,
};

use crate::error::Result;

/// 渲染结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    /// 文档中的标题，未启用目录时为空
    pub toc: Vec<TocEntry>,
}

/// Markdown 渲染器
///
/// 保存文章前同步调用，相同输入必须得到相同输出；返回错误时本次保存失败。
pub trait Renderer: Send + Sync {
    fn render(&self, source: &str) -> Result<Rendered>;
}

impl<R: Renderer + ?Sized> Renderer for &R {
    fn render(&self, source: &str) -> Result<Rendered> {
        (**self).render(source)
    }
}
