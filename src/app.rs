use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::instrument;

use crate::{
    content::{
        Category, CategoryId, Comment, CommentId, EntityKind, NewCategory, NewComment, NewPost,
        NewTag, Post, PostFilter, PostId, Status, Tag, TagId,
    },
    error::{Error, Result},
    render::Renderer,
    slug::{SlugGenerator, SlugOptions},
    storage::Store,
};

/// 博客服务
///
/// [`Blog`] 封装了存储和 Markdown 渲染器，所有写操作在调用存储之前
/// 显式完成 slug 生成与渲染：
///
/// - 分类、标签、文章首次保存且没有 slug 时由名称或标题生成，之后不再变化
/// - 文章每次保存都会同步重新渲染 HTML，渲染失败则不写入
///
/// ```ignore
/// let blog = Blog::new(MemoryStore::new(), MarkdownRenderer::default());
/// let post = blog
///     .create_post(NewPost::new(UserId(1), "Hello World", "# Hi"))
///     .await?;
/// assert_eq!(post.slug, "hello-world");
/// ```
pub struct Blog<S, R> {
    store: Arc<S>,
    renderer: Arc<R>,
    slugs: SlugGenerator,
}

impl<S, R> Clone for Blog<S, R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            renderer: Arc::clone(&self.renderer),
            slugs: self.slugs.clone(),
        }
    }
}

impl<S: Store, R: Renderer> Blog<S, R> {
    /// 创建一个新的 [`Blog`] 实例
    pub fn new(store: S, renderer: R) -> Self {
        Self {
            store: Arc::new(store),
            renderer: Arc::new(renderer),
            slugs: SlugGenerator::default(),
        }
    }

    pub fn with_slug_options(mut self, options: &SlugOptions) -> Self {
        self.slugs = SlugGenerator::new(options);
        self
    }

    /// 共享同一存储，替换渲染器
    pub fn with_renderer<R2: Renderer>(&self, renderer: R2) -> Blog<S, R2> {
        Blog {
            store: Arc::clone(&self.store),
            renderer: Arc::new(renderer),
            slugs: self.slugs.clone(),
        }
    }

    /// 获取存储
    pub fn store(&self) -> &S {
        &self.store
    }

    /// 获取 Markdown 渲染器
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// 生成同类实体中唯一的 slug，`except` 为正在保存的记录自身
    async fn derive_slug(
        &self,
        kind: EntityKind,
        source: &str,
        except: Option<i64>,
    ) -> Result<String> {
        let base = self.slugs.base(kind, source);
        let existing = self
            .store
            .slugs_with_prefix(kind, self.slugs.prefix(&base), except)
            .await?;
        let slug = self.slugs.unique(&base, &existing);

        tracing::debug!(%kind, %slug, taken = existing.len(), "slug derived");
        Ok(slug)
    }

    /// 新建记录时：显式指定则规范化，否则生成
    async fn initial_slug(
        &self,
        kind: EntityKind,
        explicit: Option<&str>,
        source: &str,
    ) -> Result<String> {
        match explicit.filter(|s| !s.trim().is_empty()) {
            Some(slug) => self.slugs.normalize(slug),
            None => self.derive_slug(kind, source, None).await,
        }
    }

    /// 保存已有记录时：已有 slug 保持不变，被清空时重新生成
    async fn stable_slug(
        &self,
        kind: EntityKind,
        id: i64,
        current: &str,
        source: &str,
    ) -> Result<String> {
        if current.trim().is_empty() {
            return self.derive_slug(kind, source, Some(id)).await;
        }
        if !SlugGenerator::is_valid(current) {
            return Err(Error::Validation(
                "slug may only contain lowercase letters, digits and inner hyphens",
            ));
        }
        Ok(current.to_string())
    }

    fn render(&self, source: &str) -> Result<String> {
        self.renderer
            .render(source)
            .map(|rendered| rendered.html)
            .inspect_err(|e| tracing::warn!(%e, "markdown render failed, write rejected"))
    }

    #[instrument(skip_all, fields(name = %input.name))]
    pub async fn create_category(&self, input: NewCategory) -> Result<Category> {
        let mut category = Category {
            id: CategoryId(0),
            name: input.name,
            slug: String::new(),
            description: input.description,
        };
        category.validate()?;
        category.slug = self
            .initial_slug(EntityKind::Category, input.slug.as_deref(), &category.name)
            .await?;

        category.id = self.store.insert_category(&category).await?;
        tracing::info!(id = %category.id, slug = %category.slug, "category created");
        Ok(category)
    }

    /// 保存分类，成功后才会更新传入的值
    #[instrument(skip_all, fields(id = %category.id))]
    pub async fn save_category(&self, category: &mut Category) -> Result<()> {
        let mut staged = category.clone();
        staged.validate()?;
        staged.slug = self
            .stable_slug(EntityKind::Category, staged.id.0, &staged.slug, &staged.name)
            .await?;

        self.store.update_category(&staged).await?;
        *category = staged;
        Ok(())
    }

    /// 删除分类，引用它的文章分类置空
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: CategoryId) -> Result<()> {
        self.store.delete_category(id).await?;
        tracing::info!("category deleted");
        Ok(())
    }

    pub async fn category(&self, id: CategoryId) -> Result<Option<Category>> {
        self.store.category(id).await
    }

    pub async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        self.store.category_by_slug(slug).await
    }

    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.store.categories().await
    }

    #[instrument(skip_all, fields(name = %input.name))]
    pub async fn create_tag(&self, input: NewTag) -> Result<Tag> {
        let mut tag = Tag {
            id: TagId(0),
            name: input.name,
            slug: String::new(),
        };
        tag.validate()?;
        tag.slug = self
            .initial_slug(EntityKind::Tag, input.slug.as_deref(), &tag.name)
            .await?;

        tag.id = self.store.insert_tag(&tag).await?;
        tracing::info!(id = %tag.id, slug = %tag.slug, "tag created");
        Ok(tag)
    }

    #[instrument(skip_all, fields(id = %tag.id))]
    pub async fn save_tag(&self, tag: &mut Tag) -> Result<()> {
        let mut staged = tag.clone();
        staged.validate()?;
        staged.slug = self
            .stable_slug(EntityKind::Tag, staged.id.0, &staged.slug, &staged.name)
            .await?;

        self.store.update_tag(&staged).await?;
        *tag = staged;
        Ok(())
    }

    /// 删除标签，并从所有文章中移除
    #[instrument(skip(self))]
    pub async fn delete_tag(&self, id: TagId) -> Result<()> {
        self.store.delete_tag(id).await?;
        tracing::info!("tag deleted");
        Ok(())
    }

    pub async fn tag(&self, id: TagId) -> Result<Option<Tag>> {
        self.store.tag(id).await
    }

    pub async fn tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        self.store.tag_by_slug(slug).await
    }

    pub async fn tags(&self) -> Result<Vec<Tag>> {
        self.store.tags().await
    }

    /// 创建文章
    ///
    /// 依次完成校验、渲染、slug 生成，最后写入存储。状态默认为草稿，
    /// `published_at` 未指定时取创建时间。
    #[instrument(skip_all, fields(title = %input.title))]
    pub async fn create_post(&self, input: NewPost) -> Result<Post> {
        let now = Local::now();
        let mut post = Post {
            id: PostId(0),
            title: input.title,
            slug: String::new(),
            author: input.author,
            markdown_source: input.markdown_source,
            rendered_html: String::new(),
            category: input.category,
            tags: input.tags,
            status: input.status,
            published_at: input.published_at.unwrap_or(now),
            created_at: now,
            updated_at: now,
        };
        post.validate()?;
        post.rendered_html = self.render(&post.markdown_source)?;
        post.slug = self
            .initial_slug(EntityKind::Post, input.slug.as_deref(), &post.title)
            .await?;

        post.id = self.store.insert_post(&post).await?;
        tracing::info!(id = %post.id, slug = %post.slug, "post created");
        Ok(post)
    }

    /// 保存文章
    ///
    /// 无论原文是否变化都会重新渲染，并刷新 `updated_at`。
    /// 任何一步失败时存储和传入的值都保持不变。
    #[instrument(skip_all, fields(id = %post.id))]
    pub async fn save_post(&self, post: &mut Post) -> Result<()> {
        let mut staged = post.clone();
        staged.validate()?;
        staged.rendered_html = self.render(&staged.markdown_source)?;
        staged.slug = self
            .stable_slug(EntityKind::Post, staged.id.0, &staged.slug, &staged.title)
            .await?;
        staged.updated_at = Local::now();

        self.store.update_post(&staged).await?;
        tracing::debug!(slug = %staged.slug, "post saved");
        *post = staged;
        Ok(())
    }

    /// 切换文章状态并保存
    ///
    /// `published_at` 为 `Some` 时一并更新；保存失败时状态回滚。
    #[instrument(skip_all, fields(id = %post.id, %status))]
    pub async fn set_status(
        &self,
        post: &mut Post,
        status: Status,
        published_at: Option<DateTime<Local>>,
    ) -> Result<()> {
        let mut staged = post.clone();
        staged.status = status;
        if let Some(at) = published_at {
            staged.published_at = at;
        }

        self.save_post(&mut staged).await?;
        *post = staged;
        Ok(())
    }

    /// 删除文章及其全部评论
    #[instrument(skip(self))]
    pub async fn delete_post(&self, id: PostId) -> Result<()> {
        self.store.delete_post(id).await?;
        tracing::info!("post deleted");
        Ok(())
    }

    pub async fn post(&self, id: PostId) -> Result<Option<Post>> {
        self.store.post(id).await
    }

    pub async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        self.store.post_by_slug(slug).await
    }

    pub async fn posts(&self, filter: &PostFilter) -> Result<Vec<Post>> {
        self.store.posts(filter).await
    }

    /// 添加评论，默认未审核
    #[instrument(skip_all, fields(post = %input.post))]
    pub async fn add_comment(&self, input: NewComment) -> Result<Comment> {
        let mut comment = Comment {
            id: CommentId(0),
            post: input.post,
            author_name: input.author_name,
            author_email: input.author_email,
            body: input.body,
            created_at: Local::now(),
            is_approved: false,
        };
        comment.validate()?;

        comment.id = self.store.insert_comment(&comment).await?;
        tracing::info!(id = %comment.id, "comment added");
        Ok(comment)
    }

    /// 审核通过评论
    #[instrument(skip(self))]
    pub async fn approve_comment(&self, id: CommentId) -> Result<Comment> {
        let mut comment = self
            .store
            .comment(id)
            .await?
            .ok_or_else(|| Error::not_found(EntityKind::Comment, id))?;

        comment.is_approved = true;
        self.store.update_comment(&comment).await?;
        Ok(comment)
    }

    #[instrument(skip(self))]
    pub async fn delete_comment(&self, id: CommentId) -> Result<()> {
        self.store.delete_comment(id).await?;
        tracing::info!("comment deleted");
        Ok(())
    }

    /// 文章的评论，按创建时间排序
    pub async fn comments(&self, post: PostId, approved_only: bool) -> Result<Vec<Comment>> {
        self.store.comments(post, approved_only).await
    }
}
