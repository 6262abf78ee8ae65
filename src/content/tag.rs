use std::fmt;

use serde::{Deserialize, Serialize};

use super::{TagId, check_len, check_not_blank};
use crate::error::Result;

/// 标签
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub slug: String,
}

/// 新建标签的输入
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTag {
    pub name: String,
    pub slug: Option<String>,
}

impl NewTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: None,
        }
    }
}

impl Tag {
    pub const NAME_MAX_LEN: usize = 100;

    pub(crate) fn validate(&self) -> Result<()> {
        check_not_blank(&self.name, "tag name must not be empty")?;
        check_len(
            &self.name,
            Self::NAME_MAX_LEN,
            "tag name is longer than 100 characters",
        )
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
