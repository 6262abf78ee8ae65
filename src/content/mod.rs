mod category;
mod comment;
mod post;
mod tag;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use self::{
    category::{Category, NewCategory},
    comment::{Comment, NewComment},
    post::{NewPost, Post, PostFilter, Status},
    tag::{NewTag, Tag},
};

/// 实体类型，用于区分 slug 命名空间以及错误信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Category,
    Tag,
    Post,
    Comment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Category => "category",
            EntityKind::Tag => "tag",
            EntityKind::Post => "post",
            EntityKind::Comment => "comment",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(pub i64);

        impl From<$name> for i64 {
            fn from(id: $name) -> i64 {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type!(
    /// 分类 id，由存储层分配
    CategoryId
);
id_type!(
    /// 标签 id，由存储层分配
    TagId
);
id_type!(
    /// 文章 id，由存储层分配
    PostId
);
id_type!(
    /// 评论 id，由存储层分配
    CommentId
);
id_type!(
    /// 外部用户系统中的用户 id，这里只保存引用
    UserId
);

/// 校验字段长度（按字符计）
pub(crate) fn check_len(value: &str, max: usize, msg: &'static str) -> crate::error::Result<()> {
    if value.chars().count() > max {
        return Err(crate::error::Error::Validation(msg));
    }
    Ok(())
}

/// 校验非空字段
pub(crate) fn check_not_blank(value: &str, msg: &'static str) -> crate::error::Result<()> {
    if value.trim().is_empty() {
        return Err(crate::error::Error::Validation(msg));
    }
    Ok(())
}
