use std::io;

use crate::content::EntityKind;

pub type Result<T> = core::result::Result<T, Error>;

/// 统一错误类型
///
/// 所有写操作失败都会直接返回给调用方，本层不做任何重试：
///
/// - [`Error::SlugConflict`]：slug 已被同类记录占用，写入被拒绝
/// - [`Error::Render`]：Markdown 渲染失败，写入被拒绝，不会持久化任何中间状态
/// - [`Error::ForeignKey`]：引用了不存在的记录
/// - [`Error::NotFound`]：按 id 更新、删除或读取的记录不存在
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{kind} slug `{slug}` already exists")]
    SlugConflict { kind: EntityKind, slug: String },

    #[error("markdown render failed: {0}")]
    Render(String),

    #[error("referenced {kind} {id} does not exist")]
    ForeignKey { kind: EntityKind, id: i64 },

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: i64 },

    #[error("{0}")]
    Validation(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error(transparent)]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn not_found(kind: EntityKind, id: impl Into<i64>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn foreign_key(kind: EntityKind, id: impl Into<i64>) -> Self {
        Error::ForeignKey {
            kind,
            id: id.into(),
        }
    }
}
