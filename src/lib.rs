pub mod app;
pub mod config;
pub mod content;
pub mod error;
pub mod render;
pub mod slug;
pub mod storage;

use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

pub use app::Blog;
pub use config::Config;
pub use error::{Error, Result};

use render::MarkdownRenderer;
use storage::PgStore;

/// 初始化日志，日志级别由环境变量 `BLOG_LOG` 控制
///
/// 重复调用时保留第一次安装的订阅者。
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .with_env_filter(EnvFilter::from_env("BLOG_LOG"))
        .try_init();
}

/// 根据配置连接数据库，创建使用 Postgres 存储和本地渲染器的 [`Blog`]
pub async fn connect(config: &Config) -> Result<Blog<PgStore, MarkdownRenderer>> {
    let pool = storage::connect(&config.database).await?;
    tracing::info!("database connected");

    Ok(Blog::new(
        PgStore::new(pool),
        MarkdownRenderer::new(config.markdown.clone()),
    )
    .with_slug_options(&config.slug))
}
