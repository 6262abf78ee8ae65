use std::{collections::BTreeSet, fmt, str::FromStr};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::{CategoryId, PostId, TagId, UserId, check_len, check_not_blank};
use crate::error::{Error, Result};

/// 文章状态
///
/// 草稿与已发布之间可以随时互相切换，不存在自动迁移。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Draft,
    Published,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Draft => "draft",
            Status::Published => "published",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(Status::Draft),
            "published" => Ok(Status::Published),
            _ => Err(Error::Validation("unknown post status")),
        }
    }
}

/// 文章
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub slug: String,
    pub author: UserId,
    /// Markdown 原文
    pub markdown_source: String,
    /// 由 `markdown_source` 渲染出的 HTML
    ///
    /// 每次保存都会重新渲染并覆盖，手动修改不会被持久化。
    pub rendered_html: String,
    pub category: Option<CategoryId>,
    pub tags: BTreeSet<TagId>,
    pub status: Status,
    pub published_at: DateTime<Local>,
    /// 创建时间，存储层不会更新该字段
    pub created_at: DateTime<Local>,
    /// 每次保存时刷新
    pub updated_at: DateTime<Local>,
}

impl Post {
    pub const TITLE_MAX_LEN: usize = 200;

    pub(crate) fn validate(&self) -> Result<()> {
        check_not_blank(&self.title, "post title must not be empty")?;
        check_len(
            &self.title,
            Self::TITLE_MAX_LEN,
            "post title is longer than 200 characters",
        )
    }

    pub fn is_published(&self) -> bool {
        self.status == Status::Published
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// 新建文章的输入
///
/// ```ignore
/// let input = NewPost::new(UserId(1), "Hello World", "# Hi")
///     .category(category.id)
///     .tags([rust.id]);
/// let post = blog.create_post(input).await?;
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub slug: Option<String>,
    pub author: UserId,
    pub markdown_source: String,
    #[serde(default)]
    pub category: Option<CategoryId>,
    #[serde(default)]
    pub tags: BTreeSet<TagId>,
    #[serde(default)]
    pub status: Status,
    /// 未指定时取创建时间
    #[serde(default)]
    pub published_at: Option<DateTime<Local>>,
}

impl NewPost {
    pub fn new(
        author: UserId,
        title: impl Into<String>,
        markdown_source: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            slug: None,
            author,
            markdown_source: markdown_source.into(),
            category: None,
            tags: BTreeSet::new(),
            status: Status::Draft,
            published_at: None,
        }
    }

    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }

    pub fn tags(mut self, tags: impl IntoIterator<Item = TagId>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn published_at(mut self, at: DateTime<Local>) -> Self {
        self.published_at = Some(at);
        self
    }
}

/// 文章列表查询条件
///
/// 结果按 `published_at` 倒序排列。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostFilter {
    pub status: Option<Status>,
    pub category: Option<CategoryId>,
    pub tag: Option<TagId>,
    pub author: Option<UserId>,
    pub page: i64,
    pub size: i64,
}

impl Default for PostFilter {
    fn default() -> Self {
        Self {
            status: None,
            category: None,
            tag: None,
            author: None,
            page: 1,
            size: 20,
        }
    }
}

impl PostFilter {
    /// 只查询已发布文章
    pub fn published() -> Self {
        Self {
            status: Some(Status::Published),
            ..Default::default()
        }
    }

    /// 页码过大时取 `i64::MAX`，结果为空页
    pub(crate) fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.limit())
    }

    pub(crate) fn limit(&self) -> i64 {
        self.size.max(0)
    }

    pub(crate) fn matches(&self, post: &Post) -> bool {
        self.status.is_none_or(|s| post.status == s)
            && self.category.is_none_or(|c| post.category == Some(c))
            && self.tag.is_none_or(|t| post.tags.contains(&t))
            && self.author.is_none_or(|a| post.author == a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_defaults_to_draft_and_round_trips_text() {
        assert_eq!(Status::default(), Status::Draft);
        assert_eq!("published".parse::<Status>().unwrap(), Status::Published);
        assert_eq!(Status::Draft.to_string(), "draft");
        assert!("archived".parse::<Status>().is_err());
        assert_eq!(
            serde_json::to_string(&Status::Published).unwrap(),
            "\"published\""
        );
    }

    #[test]
    fn test_new_post_builder() {
        let input = NewPost::new(UserId(7), "Hello World", "# Hi")
            .category(CategoryId(3))
            .tags([TagId(2), TagId(1), TagId(2)]);

        assert_eq!(input.status, Status::Draft);
        assert_eq!(input.category, Some(CategoryId(3)));
        assert_eq!(input.tags.len(), 2, "tags 是集合，重复项应去重");
        assert!(input.slug.is_none());
        assert!(input.published_at.is_none());
    }

    #[test]
    fn test_filter_paging() {
        let filter = PostFilter {
            page: 3,
            size: 10,
            ..Default::default()
        };
        assert_eq!(filter.offset(), 20);

        let filter = PostFilter {
            page: 0,
            ..Default::default()
        };
        assert_eq!(filter.offset(), 0, "page 小于 1 时按第一页处理");

        let filter = PostFilter {
            page: i64::MAX,
            size: 20,
            ..Default::default()
        };
        assert_eq!(filter.offset(), i64::MAX);
    }
}
