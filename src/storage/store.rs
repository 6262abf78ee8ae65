use std::collections::HashSet;
use std::future::Future;

use crate::{
    content::{
        Category, CategoryId, Comment, CommentId, EntityKind, Post, PostFilter, PostId, Tag, TagId,
    },
    error::Result,
};

/// 存储接口
///
/// 插入时忽略传入记录的 `id`，由存储层分配并返回。实现需要保证：
///
/// - 同类实体的 slug 唯一，冲突时返回 [`Error::SlugConflict`](crate::error::Error::SlugConflict)
/// - 引用不存在的分类、标签或文章时返回 [`Error::ForeignKey`](crate::error::Error::ForeignKey)
/// - 更新时不修改 `created_at`
/// - 删除文章时级联删除其评论
/// - 删除分类时将引用它的文章的分类置空
/// - 删除标签时将其从所有文章的标签集合中移除
pub trait Store: Send + Sync {
    /// 查询以 `prefix` 开头的已有 slug，`except` 指定的记录不计入
    fn slugs_with_prefix(
        &self,
        kind: EntityKind,
        prefix: &str,
        except: Option<i64>,
    ) -> impl Future<Output = Result<HashSet<String>>> + Send;

    fn insert_category(&self, category: &Category)
    -> impl Future<Output = Result<CategoryId>> + Send;

    fn update_category(&self, category: &Category) -> impl Future<Output = Result<()>> + Send;

    fn category(&self, id: CategoryId) -> impl Future<Output = Result<Option<Category>>> + Send;

    fn category_by_slug(&self, slug: &str)
    -> impl Future<Output = Result<Option<Category>>> + Send;

    /// 按名称排序
    fn categories(&self) -> impl Future<Output = Result<Vec<Category>>> + Send;

    fn delete_category(&self, id: CategoryId) -> impl Future<Output = Result<()>> + Send;

    fn insert_tag(&self, tag: &Tag) -> impl Future<Output = Result<TagId>> + Send;

    fn update_tag(&self, tag: &Tag) -> impl Future<Output = Result<()>> + Send;

    fn tag(&self, id: TagId) -> impl Future<Output = Result<Option<Tag>>> + Send;

    fn tag_by_slug(&self, slug: &str) -> impl Future<Output = Result<Option<Tag>>> + Send;

    /// 按名称排序
    fn tags(&self) -> impl Future<Output = Result<Vec<Tag>>> + Send;

    fn delete_tag(&self, id: TagId) -> impl Future<Output = Result<()>> + Send;

    /// 文章及其标签在同一次写入中保存
    fn insert_post(&self, post: &Post) -> impl Future<Output = Result<PostId>> + Send;

    fn update_post(&self, post: &Post) -> impl Future<Output = Result<()>> + Send;

    fn post(&self, id: PostId) -> impl Future<Output = Result<Option<Post>>> + Send;

    fn post_by_slug(&self, slug: &str) -> impl Future<Output = Result<Option<Post>>> + Send;

    /// 按 `published_at` 倒序分页查询
    fn posts(&self, filter: &PostFilter) -> impl Future<Output = Result<Vec<Post>>> + Send;

    fn delete_post(&self, id: PostId) -> impl Future<Output = Result<()>> + Send;

    fn insert_comment(&self, comment: &Comment) -> impl Future<Output = Result<CommentId>> + Send;

    /// 只更新评论内容与审核状态
    fn update_comment(&self, comment: &Comment) -> impl Future<Output = Result<()>> + Send;

    fn comment(&self, id: CommentId) -> impl Future<Output = Result<Option<Comment>>> + Send;

    /// 按创建时间正序
    fn comments(
        &self,
        post: PostId,
        approved_only: bool,
    ) -> impl Future<Output = Result<Vec<Comment>>> + Send;

    fn delete_comment(&self, id: CommentId) -> impl Future<Output = Result<()>> + Send;
}
