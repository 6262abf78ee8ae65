#![cfg(feature = "db_tests")]

use blog::{
    Blog, Config, Error,
    content::{EntityKind, NewCategory, NewComment, NewPost, NewTag, PostFilter, Status, UserId},
    render::MarkdownRenderer,
    storage::{PgStore, migrate},
};
use chrono::Local;

struct TestApp {
    blog: Blog<PgStore, MarkdownRenderer>,
    /// 每次运行使用不同的名称，避免与上次遗留的数据冲突
    run: i64,
}

impl TestApp {
    async fn new() -> Self {
        blog::init_tracing();
        let config = Config::from_env().expect("读取配置失败");
        let blog = blog::connect(&config).await.expect("连接数据库失败");

        migrate(blog.store().pool(), "sql/01-CREATE_TABLE.sql")
            .await
            .expect("初始化sql失败");

        Self {
            blog,
            run: Local::now().timestamp_micros(),
        }
    }

    fn name(&self, name: &str) -> String {
        format!("{name} {}", self.run)
    }
}

#[tokio::test]
#[ignore = "依赖真实数据库"]
async fn test_postgres_store() {
    let app = TestApp::new().await;
    let blog = &app.blog;

    let category = blog
        .create_category(NewCategory::new(app.name("Rust")))
        .await
        .unwrap();
    let tag = blog.create_tag(NewTag::new(app.name("async"))).await.unwrap();

    let title = app.name("Hello World");
    let post = blog
        .create_post(
            NewPost::new(UserId(1), &title, "# Hi\n\n```python\nprint(1)\n```")
                .category(category.id)
                .tags([tag.id]),
        )
        .await
        .unwrap();
    assert!(post.rendered_html.contains(r#"<h1 id="hi">Hi</h1>"#));

    let stored = blog.post_by_slug(&post.slug).await.unwrap().unwrap();
    assert_eq!(stored.title, title);
    assert_eq!(stored.category, Some(category.id));
    assert!(stored.tags.contains(&tag.id));
    assert_eq!(stored.rendered_html, post.rendered_html);

    // 同名文章追加后缀
    let second = blog
        .create_post(NewPost::new(UserId(1), &title, "x"))
        .await
        .unwrap();
    assert_eq!(second.slug, format!("{}-1", post.slug));

    // 显式 slug 冲突
    let err = blog
        .create_post(NewPost::new(UserId(1), "Other", "x").slug(&post.slug))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::SlugConflict {
            kind: EntityKind::Post,
            ..
        }
    ));

    let mut post = stored;
    blog.set_status(&mut post, Status::Published, None)
        .await
        .unwrap();
    let published = blog
        .posts(&PostFilter {
            tag: Some(tag.id),
            ..PostFilter::published()
        })
        .await
        .unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].id, post.id);

    let comment = blog
        .add_comment(NewComment::new(post.id, "Alice", "alice@example.com", "nice"))
        .await
        .unwrap();
    blog.approve_comment(comment.id).await.unwrap();
    assert_eq!(blog.comments(post.id, true).await.unwrap().len(), 1);

    blog.delete_category(category.id).await.unwrap();
    blog.delete_tag(tag.id).await.unwrap();
    let stored = blog.post(post.id).await.unwrap().unwrap();
    assert_eq!(stored.category, None);
    assert!(stored.tags.is_empty());

    blog.delete_post(post.id).await.unwrap();
    blog.delete_post(second.id).await.unwrap();
    assert!(blog.comments(post.id, false).await.unwrap().is_empty());
    assert!(matches!(
        blog.delete_post(post.id).await,
        Err(Error::NotFound { .. })
    ));
}
