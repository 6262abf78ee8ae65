use std::fmt;

use serde::{Deserialize, Serialize};

use super::{CategoryId, check_len, check_not_blank};
use crate::error::Result;

/// 分类
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// 首次保存时由 `name` 生成，之后保持不变；置空后下次保存会重新生成
    pub slug: String,
    pub description: String,
}

/// 新建分类的输入
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCategory {
    pub name: String,
    /// 显式指定 slug，为空时自动生成
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl NewCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }
}

impl Category {
    pub const NAME_MAX_LEN: usize = 100;

    pub(crate) fn validate(&self) -> Result<()> {
        check_not_blank(&self.name, "category name must not be empty")?;
        check_len(
            &self.name,
            Self::NAME_MAX_LEN,
            "category name is longer than 100 characters",
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
