use std::collections::BTreeSet;

use chrono::{DateTime, Local};

use crate::{
    content::{CategoryId, Post, PostId, TagId, UserId},
    error::Error,
};

/// `posts` 表的一行，标签由子查询聚合为数组
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PostRow {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub author_id: i64,
    pub markdown_source: String,
    pub rendered_html: String,
    pub category_id: Option<i64>,
    pub tags: Vec<i64>,
    pub status: String,
    pub published_at: DateTime<Local>,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

impl TryFrom<PostRow> for Post {
    type Error = Error;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        Ok(Post {
            id: PostId(row.id),
            title: row.title,
            slug: row.slug,
            author: UserId(row.author_id),
            markdown_source: row.markdown_source,
            rendered_html: row.rendered_html,
            category: row.category_id.map(CategoryId),
            tags: row.tags.into_iter().map(TagId).collect::<BTreeSet<_>>(),
            status: row.status.parse()?,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// 查询文章时使用的列，`p` 为 `posts` 表别名
pub(crate) const POST_COLUMNS: &str = r#"
    p.id, p.title, p.slug, p.author_id, p.markdown_source, p.rendered_html, p.category_id,
    ARRAY(SELECT pt.tag_id FROM post_tags pt WHERE pt.post_id = p.id ORDER BY pt.tag_id) AS tags,
    p.status, p.published_at, p.created_at, p.updated_at
"#;
