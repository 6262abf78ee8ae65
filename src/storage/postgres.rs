use std::{
    collections::{BTreeSet, HashSet},
    path::Path,
};

use sqlx::postgres::PgPoolOptions;

use super::{
    Store,
    models::{POST_COLUMNS, PostRow},
};
use crate::{
    config::DatabaseConfig,
    content::{
        Category, CategoryId, Comment, CommentId, EntityKind, Post, PostFilter, PostId, Tag, TagId,
    },
    error::{Error, Result},
};

/// 数据库连接池类型
pub type Db = sqlx::PgPool;

/// 根据配置创建数据库连接池
///
/// 获取前测试连接，其余参数见 [`DatabaseConfig`]。
pub async fn connect(config: &DatabaseConfig) -> Result<Db> {
    let url = config
        .url
        .as_deref()
        .ok_or(Error::MissingConfig("database.url or DATABASE_URL"))?;

    let pool = PgPoolOptions::new()
        .idle_timeout(config.idle_timeout())
        .max_lifetime(config.max_lifetime())
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .test_before_acquire(true)
        .min_connections(config.min_connections)
        .connect(url)
        .await?;
    Ok(pool)
}

/// 执行 SQL 文件中的建表语句
///
/// 将文件内容按 `;` 分割，每条 SQL 单独执行
pub async fn migrate(db: &Db, file: impl AsRef<Path>) -> Result<()> {
    let content = std::fs::read_to_string(file)?;

    for sql in content.split(';') {
        if sql.trim().is_empty() {
            continue;
        }
        sqlx::query(sql).execute(db).await?;
    }
    Ok(())
}

/// Postgres 的 [`Store`] 实现
///
/// 唯一约束与级联规则由表结构保证，见 `sql/01-CREATE_TABLE.sql`。
#[derive(Clone)]
pub struct PgStore {
    pool: Db,
}

impl PgStore {
    pub fn new(pool: Db) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Db {
        &self.pool
    }
}

fn table(kind: EntityKind) -> Option<&'static str> {
    match kind {
        EntityKind::Category => Some("categories"),
        EntityKind::Tag => Some("tags"),
        EntityKind::Post => Some("posts"),
        EntityKind::Comment => None,
    }
}

/// 唯一约束冲突转换为 [`Error::SlugConflict`]
fn unique_violation(e: sqlx::Error, kind: EntityKind, slug: &str) -> Error {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return Error::SlugConflict {
                kind,
                slug: slug.to_string(),
            };
        }
    }
    e.into()
}

/// 外键约束冲突转换为 [`Error::ForeignKey`]
fn foreign_key_violation(e: sqlx::Error, kind: EntityKind, id: i64) -> Error {
    if let sqlx::Error::Database(db) = &e {
        if db.is_foreign_key_violation() {
            return Error::foreign_key(kind, id);
        }
    }
    e.into()
}

fn post_violation(e: sqlx::Error, post: &Post) -> Error {
    if let sqlx::Error::Database(db) = &e {
        if db.is_foreign_key_violation() {
            if let Some(category) = post.category {
                return Error::foreign_key(EntityKind::Category, category);
            }
        }
    }
    unique_violation(e, EntityKind::Post, &post.slug)
}

/// 检查标签是否全部存在，并加共享锁防止并发删除
async fn check_tags(tx: &mut sqlx::PgTransaction<'_>, tags: &BTreeSet<TagId>) -> Result<()> {
    if tags.is_empty() {
        return Ok(());
    }

    let ids: Vec<i64> = tags.iter().map(|t| t.0).collect();
    let found: Vec<i64> = sqlx::query_scalar("SELECT id FROM tags WHERE id = ANY($1) FOR SHARE")
        .bind(&ids)
        .fetch_all(tx.as_mut())
        .await?;

    if let Some(missing) = ids.iter().find(|id| !found.contains(id)) {
        return Err(Error::foreign_key(EntityKind::Tag, *missing));
    }
    Ok(())
}

async fn insert_tags(
    tx: &mut sqlx::PgTransaction<'_>,
    post: PostId,
    tags: &BTreeSet<TagId>,
) -> Result<()> {
    if tags.is_empty() {
        return Ok(());
    }

    let ids: Vec<i64> = tags.iter().map(|t| t.0).collect();
    sqlx::query("INSERT INTO post_tags (post_id, tag_id) SELECT $1, UNNEST($2::BIGINT[])")
        .bind(post)
        .bind(&ids)
        .execute(tx.as_mut())
        .await?;
    Ok(())
}

fn affected(rows: u64, kind: EntityKind, id: i64) -> Result<()> {
    if rows == 0 {
        return Err(Error::not_found(kind, id));
    }
    Ok(())
}

impl Store for PgStore {
    async fn slugs_with_prefix(
        &self,
        kind: EntityKind,
        prefix: &str,
        except: Option<i64>,
    ) -> Result<HashSet<String>> {
        let Some(table) = table(kind) else {
            return Ok(HashSet::new());
        };

        // slug 只含字母、数字和 `-`，无需转义 LIKE 通配符
        let sql = format!(
            "SELECT slug FROM {table} WHERE slug LIKE $1 AND ($2::BIGINT IS NULL OR id <> $2)"
        );
        let slugs: Vec<String> = sqlx::query_scalar(&sql)
            .bind(format!("{prefix}%"))
            .bind(except)
            .fetch_all(&self.pool)
            .await?;
        Ok(slugs.into_iter().collect())
    }

    async fn insert_category(&self, category: &Category) -> Result<CategoryId> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO categories (name, slug, description) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .fetch_one(&self.pool)
        .await
        .map(CategoryId)
        .map_err(|e| unique_violation(e, EntityKind::Category, &category.slug))
    }

    async fn update_category(&self, category: &Category) -> Result<()> {
        let result = sqlx::query(
            "UPDATE categories SET name = $2, slug = $3, description = $4 WHERE id = $1",
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, EntityKind::Category, &category.slug))?;

        affected(result.rows_affected(), EntityKind::Category, category.id.0)
    }

    async fn category(&self, id: CategoryId) -> Result<Option<Category>> {
        Ok(sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, description FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        Ok(sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, description FROM categories WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        Ok(sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, description FROM categories ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<()> {
        // posts.category_id 为 ON DELETE SET NULL
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        affected(result.rows_affected(), EntityKind::Category, id.0)
    }

    async fn insert_tag(&self, tag: &Tag) -> Result<TagId> {
        sqlx::query_scalar::<_, i64>("INSERT INTO tags (name, slug) VALUES ($1, $2) RETURNING id")
            .bind(&tag.name)
            .bind(&tag.slug)
            .fetch_one(&self.pool)
            .await
            .map(TagId)
            .map_err(|e| unique_violation(e, EntityKind::Tag, &tag.slug))
    }

    async fn update_tag(&self, tag: &Tag) -> Result<()> {
        let result = sqlx::query("UPDATE tags SET name = $2, slug = $3 WHERE id = $1")
            .bind(tag.id)
            .bind(&tag.name)
            .bind(&tag.slug)
            .execute(&self.pool)
            .await
            .map_err(|e| unique_violation(e, EntityKind::Tag, &tag.slug))?;

        affected(result.rows_affected(), EntityKind::Tag, tag.id.0)
    }

    async fn tag(&self, id: TagId) -> Result<Option<Tag>> {
        Ok(
            sqlx::query_as::<_, Tag>("SELECT id, name, slug FROM tags WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        Ok(
            sqlx::query_as::<_, Tag>("SELECT id, name, slug FROM tags WHERE slug = $1")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn tags(&self) -> Result<Vec<Tag>> {
        Ok(
            sqlx::query_as::<_, Tag>("SELECT id, name, slug FROM tags ORDER BY name, id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn delete_tag(&self, id: TagId) -> Result<()> {
        // post_tags.tag_id 为 ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        affected(result.rows_affected(), EntityKind::Tag, id.0)
    }

    async fn insert_post(&self, post: &Post) -> Result<PostId> {
        let mut tx = self.pool.begin().await?;
        check_tags(&mut tx, &post.tags).await?;

        let id = sqlx::query_scalar::<_, i64>(
            "
            INSERT INTO posts
                (title, slug, author_id, markdown_source, rendered_html, category_id,
                 status, published_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            ",
        )
        .bind(&post.title)
        .bind(&post.slug)
        .bind(post.author)
        .bind(&post.markdown_source)
        .bind(&post.rendered_html)
        .bind(post.category)
        .bind(post.status.as_str())
        .bind(post.published_at)
        .bind(post.created_at)
        .bind(post.updated_at)
        .fetch_one(tx.as_mut())
        .await
        .map(PostId)
        .map_err(|e| post_violation(e, post))?;

        insert_tags(&mut tx, id, &post.tags).await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn update_post(&self, post: &Post) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        check_tags(&mut tx, &post.tags).await?;

        // created_at 不在更新列中
        let result = sqlx::query(
            "
            UPDATE posts SET
                title = $2,
                slug = $3,
                author_id = $4,
                markdown_source = $5,
                rendered_html = $6,
                category_id = $7,
                status = $8,
                published_at = $9,
                updated_at = $10
            WHERE id = $1
            ",
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(post.author)
        .bind(&post.markdown_source)
        .bind(&post.rendered_html)
        .bind(post.category)
        .bind(post.status.as_str())
        .bind(post.published_at)
        .bind(post.updated_at)
        .execute(tx.as_mut())
        .await
        .map_err(|e| post_violation(e, post))?;
        affected(result.rows_affected(), EntityKind::Post, post.id.0)?;

        sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
            .bind(post.id)
            .execute(tx.as_mut())
            .await?;
        insert_tags(&mut tx, post.id, &post.tags).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn post(&self, id: PostId) -> Result<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1");
        sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Post::try_from)
            .transpose()
    }

    async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.slug = $1");
        sqlx::query_as::<_, PostRow>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .map(Post::try_from)
            .transpose()
    }

    async fn posts(&self, filter: &PostFilter) -> Result<Vec<Post>> {
        let mut builder =
            sqlx::QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts p WHERE TRUE"));

        if let Some(status) = filter.status {
            builder.push(" AND p.status = ").push_bind(status.as_str());
        }
        if let Some(category) = filter.category {
            builder.push(" AND p.category_id = ").push_bind(category);
        }
        if let Some(tag) = filter.tag {
            builder
                .push(" AND EXISTS (SELECT 1 FROM post_tags pt WHERE pt.post_id = p.id AND pt.tag_id = ")
                .push_bind(tag)
                .push(")");
        }
        if let Some(author) = filter.author {
            builder.push(" AND p.author_id = ").push_bind(author);
        }

        builder.push(" ORDER BY p.published_at DESC, p.id DESC");
        builder.push(" LIMIT ").push_bind(filter.limit());
        builder.push(" OFFSET ").push_bind(filter.offset());

        builder
            .build_query_as::<PostRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Post::try_from)
            .collect()
    }

    async fn delete_post(&self, id: PostId) -> Result<()> {
        // comments.post_id 与 post_tags.post_id 均为 ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        affected(result.rows_affected(), EntityKind::Post, id.0)
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<CommentId> {
        sqlx::query_scalar::<_, i64>(
            "
            INSERT INTO comments (post_id, author_name, author_email, body, created_at, is_approved)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(comment.post)
        .bind(&comment.author_name)
        .bind(&comment.author_email)
        .bind(&comment.body)
        .bind(comment.created_at)
        .bind(comment.is_approved)
        .fetch_one(&self.pool)
        .await
        .map(CommentId)
        .map_err(|e| foreign_key_violation(e, EntityKind::Post, comment.post.0))
    }

    async fn update_comment(&self, comment: &Comment) -> Result<()> {
        let result = sqlx::query("UPDATE comments SET body = $2, is_approved = $3 WHERE id = $1")
            .bind(comment.id)
            .bind(&comment.body)
            .bind(comment.is_approved)
            .execute(&self.pool)
            .await?;
        affected(result.rows_affected(), EntityKind::Comment, comment.id.0)
    }

    async fn comment(&self, id: CommentId) -> Result<Option<Comment>> {
        Ok(sqlx::query_as::<_, Comment>(
            "
            SELECT id, post_id, author_name, author_email, body, created_at, is_approved
            FROM comments
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn comments(&self, post: PostId, approved_only: bool) -> Result<Vec<Comment>> {
        Ok(sqlx::query_as::<_, Comment>(
            "
            SELECT id, post_id, author_name, author_email, body, created_at, is_approved
            FROM comments
            WHERE post_id = $1 AND (NOT $2 OR is_approved)
            ORDER BY created_at, id
            ",
        )
        .bind(post)
        .bind(approved_only)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_comment(&self, id: CommentId) -> Result<()> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        affected(result.rows_affected(), EntityKind::Comment, id.0)
    }
}
