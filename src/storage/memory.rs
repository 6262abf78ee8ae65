use std::collections::{BTreeMap, HashSet};

use tokio::sync::RwLock;

use super::Store;
use crate::{
    content::{
        Category, CategoryId, Comment, CommentId, EntityKind, Post, PostFilter, PostId, Tag, TagId,
    },
    error::{Error, Result},
};

/// 内存存储
///
/// 每次操作持有一把写锁，唯一约束与外键规则与 [`PgStore`](super::PgStore) 一致，
/// 用于测试以及不需要持久化的场景。
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    categories: BTreeMap<CategoryId, Category>,
    tags: BTreeMap<TagId, Tag>,
    posts: BTreeMap<PostId, Post>,
    comments: BTreeMap<CommentId, Comment>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn slug_taken(&self, kind: EntityKind, slug: &str, except: i64) -> bool {
        match kind {
            EntityKind::Category => self
                .categories
                .values()
                .any(|c| c.slug == slug && c.id.0 != except),
            EntityKind::Tag => self.tags.values().any(|t| t.slug == slug && t.id.0 != except),
            EntityKind::Post => self
                .posts
                .values()
                .any(|p| p.slug == slug && p.id.0 != except),
            EntityKind::Comment => false,
        }
    }

    fn check_slug(&self, kind: EntityKind, slug: &str, except: i64) -> Result<()> {
        if self.slug_taken(kind, slug, except) {
            return Err(Error::SlugConflict {
                kind,
                slug: slug.to_string(),
            });
        }
        Ok(())
    }

    fn check_post_refs(&self, post: &Post) -> Result<()> {
        if let Some(category) = post.category {
            if !self.categories.contains_key(&category) {
                return Err(Error::foreign_key(EntityKind::Category, category));
            }
        }
        if let Some(tag) = post.tags.iter().find(|t| !self.tags.contains_key(*t)) {
            return Err(Error::foreign_key(EntityKind::Tag, *tag));
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    async fn slugs_with_prefix(
        &self,
        kind: EntityKind,
        prefix: &str,
        except: Option<i64>,
    ) -> Result<HashSet<String>> {
        let tables = self.tables.read().await;
        let slugs: Vec<(i64, &String)> = match kind {
            EntityKind::Category => tables
                .categories
                .values()
                .map(|c| (c.id.0, &c.slug))
                .collect(),
            EntityKind::Tag => tables.tags.values().map(|t| (t.id.0, &t.slug)).collect(),
            EntityKind::Post => tables.posts.values().map(|p| (p.id.0, &p.slug)).collect(),
            EntityKind::Comment => Vec::new(),
        };
        Ok(slugs
            .into_iter()
            .filter(|(id, s)| Some(*id) != except && s.starts_with(prefix))
            .map(|(_, s)| s)
            .cloned()
            .collect())
    }

    async fn insert_category(&self, category: &Category) -> Result<CategoryId> {
        let mut tables = self.tables.write().await;
        tables.check_slug(EntityKind::Category, &category.slug, 0)?;

        let id = CategoryId(tables.next_id());
        tables.categories.insert(
            id,
            Category {
                id,
                ..category.clone()
            },
        );
        Ok(id)
    }

    async fn update_category(&self, category: &Category) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.categories.contains_key(&category.id) {
            return Err(Error::not_found(EntityKind::Category, category.id));
        }
        tables.check_slug(EntityKind::Category, &category.slug, category.id.0)?;
        tables.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn category(&self, id: CategoryId) -> Result<Option<Category>> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let tables = self.tables.read().await;
        Ok(tables.categories.values().find(|c| c.slug == slug).cloned())
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        let mut categories: Vec<_> = self.tables.read().await.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.categories.remove(&id).is_none() {
            return Err(Error::not_found(EntityKind::Category, id));
        }
        tables
            .posts
            .values_mut()
            .filter(|p| p.category == Some(id))
            .for_each(|p| p.category = None);
        Ok(())
    }

    async fn insert_tag(&self, tag: &Tag) -> Result<TagId> {
        let mut tables = self.tables.write().await;
        tables.check_slug(EntityKind::Tag, &tag.slug, 0)?;

        let id = TagId(tables.next_id());
        tables.tags.insert(id, Tag { id, ..tag.clone() });
        Ok(id)
    }

    async fn update_tag(&self, tag: &Tag) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.tags.contains_key(&tag.id) {
            return Err(Error::not_found(EntityKind::Tag, tag.id));
        }
        tables.check_slug(EntityKind::Tag, &tag.slug, tag.id.0)?;
        tables.tags.insert(tag.id, tag.clone());
        Ok(())
    }

    async fn tag(&self, id: TagId) -> Result<Option<Tag>> {
        Ok(self.tables.read().await.tags.get(&id).cloned())
    }

    async fn tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        let tables = self.tables.read().await;
        Ok(tables.tags.values().find(|t| t.slug == slug).cloned())
    }

    async fn tags(&self) -> Result<Vec<Tag>> {
        let mut tags: Vec<_> = self.tables.read().await.tags.values().cloned().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn delete_tag(&self, id: TagId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.tags.remove(&id).is_none() {
            return Err(Error::not_found(EntityKind::Tag, id));
        }
        tables.posts.values_mut().for_each(|p| {
            p.tags.remove(&id);
        });
        Ok(())
    }

    async fn insert_post(&self, post: &Post) -> Result<PostId> {
        let mut tables = self.tables.write().await;
        tables.check_post_refs(post)?;
        tables.check_slug(EntityKind::Post, &post.slug, 0)?;

        let id = PostId(tables.next_id());
        tables.posts.insert(id, Post { id, ..post.clone() });
        Ok(id)
    }

    async fn update_post(&self, post: &Post) -> Result<()> {
        let mut tables = self.tables.write().await;
        let Some(created_at) = tables.posts.get(&post.id).map(|p| p.created_at) else {
            return Err(Error::not_found(EntityKind::Post, post.id));
        };
        tables.check_post_refs(post)?;
        tables.check_slug(EntityKind::Post, &post.slug, post.id.0)?;

        tables.posts.insert(
            post.id,
            Post {
                created_at,
                ..post.clone()
            },
        );
        Ok(())
    }

    async fn post(&self, id: PostId) -> Result<Option<Post>> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let tables = self.tables.read().await;
        Ok(tables.posts.values().find(|p| p.slug == slug).cloned())
    }

    async fn posts(&self, filter: &PostFilter) -> Result<Vec<Post>> {
        let tables = self.tables.read().await;
        let mut posts: Vec<_> = tables
            .posts
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        posts.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(posts
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit() as usize)
            .collect())
    }

    async fn delete_post(&self, id: PostId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.posts.remove(&id).is_none() {
            return Err(Error::not_found(EntityKind::Post, id));
        }
        tables.comments.retain(|_, c| c.post != id);
        Ok(())
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<CommentId> {
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&comment.post) {
            return Err(Error::foreign_key(EntityKind::Post, comment.post));
        }

        let id = CommentId(tables.next_id());
        tables.comments.insert(
            id,
            Comment {
                id,
                ..comment.clone()
            },
        );
        Ok(id)
    }

    async fn update_comment(&self, comment: &Comment) -> Result<()> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables.comments.get_mut(&comment.id) else {
            return Err(Error::not_found(EntityKind::Comment, comment.id));
        };
        stored.body.clone_from(&comment.body);
        stored.is_approved = comment.is_approved;
        Ok(())
    }

    async fn comment(&self, id: CommentId) -> Result<Option<Comment>> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn comments(&self, post: PostId, approved_only: bool) -> Result<Vec<Comment>> {
        let tables = self.tables.read().await;
        let mut comments: Vec<_> = tables
            .comments
            .values()
            .filter(|c| c.post == post && (!approved_only || c.is_approved))
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn delete_comment(&self, id: CommentId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.comments.remove(&id).is_none() {
            return Err(Error::not_found(EntityKind::Comment, id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Local;

    use super::*;
    use crate::content::{Status, UserId};

    fn post(slug: &str) -> Post {
        let now = Local::now();
        Post {
            id: PostId(0),
            title: slug.to_string(),
            slug: slug.to_string(),
            author: UserId(1),
            markdown_source: String::new(),
            rendered_html: String::new(),
            category: None,
            tags: Default::default(),
            status: Status::Draft,
            published_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_post_slug_unique() {
        let store = MemoryStore::new();
        store.insert_post(&post("a")).await.unwrap();

        let err = store.insert_post(&post("a")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::SlugConflict {
                kind: EntityKind::Post,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_foreign_keys_checked() {
        let store = MemoryStore::new();

        let mut p = post("a");
        p.category = Some(CategoryId(42));
        assert!(matches!(
            store.insert_post(&p).await,
            Err(Error::ForeignKey {
                kind: EntityKind::Category,
                id: 42
            })
        ));

        let mut p = post("a");
        p.tags.insert(TagId(7));
        assert!(matches!(
            store.insert_post(&p).await,
            Err(Error::ForeignKey {
                kind: EntityKind::Tag,
                id: 7
            })
        ));
    }

    #[tokio::test]
    async fn test_update_keeps_created_at() {
        let store = MemoryStore::new();
        let id = store.insert_post(&post("a")).await.unwrap();
        let original = store.post(id).await.unwrap().unwrap();

        let mut changed = original.clone();
        changed.created_at = original.created_at + chrono::Duration::days(1);
        changed.title = "b".to_string();
        store.update_post(&changed).await.unwrap();

        let stored = store.post(id).await.unwrap().unwrap();
        assert_eq!(stored.title, "b");
        assert_eq!(stored.created_at, original.created_at);
    }

    #[tokio::test]
    async fn test_prefix_lookup() {
        let store = MemoryStore::new();
        for slug in ["hello", "hello-1", "help", "world"] {
            store.insert_post(&post(slug)).await.unwrap();
        }

        let slugs = store
            .slugs_with_prefix(EntityKind::Post, "hel", None)
            .await
            .unwrap();
        assert_eq!(slugs.len(), 3);
        assert!(!slugs.contains("world"));
        assert!(
            store
                .slugs_with_prefix(EntityKind::Tag, "hel", None)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_prefix_lookup_skips_excepted_record() {
        let store = MemoryStore::new();
        let id = store.insert_post(&post("rust")).await.unwrap();
        store.insert_post(&post("rust-1")).await.unwrap();

        let slugs = store
            .slugs_with_prefix(EntityKind::Post, "rust", Some(id.0))
            .await
            .unwrap();
        assert_eq!(slugs.into_iter().collect::<Vec<_>>(), ["rust-1"]);
    }
}
