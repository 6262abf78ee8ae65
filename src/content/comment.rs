use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::{CommentId, Post, PostId, check_len, check_not_blank};
use crate::error::{Error, Result};

/// 评论
///
/// 文章删除时其评论随之删除。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: CommentId,
    #[sqlx(rename = "post_id")]
    pub post: PostId,
    pub author_name: String,
    pub author_email: String,
    pub body: String,
    pub created_at: DateTime<Local>,
    /// 默认未审核
    pub is_approved: bool,
}

/// 新建评论的输入
#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub post: PostId,
    pub author_name: String,
    pub author_email: String,
    pub body: String,
}

impl NewComment {
    pub fn new(
        post: PostId,
        author_name: impl Into<String>,
        author_email: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            post,
            author_name: author_name.into(),
            author_email: author_email.into(),
            body: body.into(),
        }
    }
}

impl Comment {
    pub const AUTHOR_MAX_LEN: usize = 100;

    pub(crate) fn validate(&self) -> Result<()> {
        check_not_blank(&self.author_name, "comment author must not be empty")?;
        check_len(
            &self.author_name,
            Self::AUTHOR_MAX_LEN,
            "comment author is longer than 100 characters",
        )?;
        check_not_blank(&self.body, "comment body must not be empty")?;
        if !is_email(&self.author_email) {
            return Err(Error::Validation("comment email is not a valid address"));
        }
        Ok(())
    }

    /// 带文章标题的描述，如 `Comment by Alice on Hello World`
    pub fn describe(&self, post: &Post) -> String {
        format!("Comment by {} on {}", self.author_name, post.title)
    }
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Comment by {}", self.author_name)
    }
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.rsplit_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !s.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(email: &str) -> Comment {
        Comment {
            id: CommentId(1),
            post: PostId(1),
            author_name: "Alice".to_string(),
            author_email: email.to_string(),
            body: "nice".to_string(),
            created_at: Local::now(),
            is_approved: false,
        }
    }

    #[test]
    fn test_email_validation() {
        assert!(comment("alice@example.com").validate().is_ok());
        assert!(comment("alice@localhost").validate().is_err());
        assert!(comment("alice example.com").validate().is_err());
        assert!(comment("@example.com").validate().is_err());
        assert!(comment("alice@example.").validate().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(comment("a@b.c").to_string(), "Comment by Alice");
    }
}
