//! slug 生成
//!
//! slug 只包含小写 ASCII 字母、数字和连字符，在同类实体中唯一。
//! 冲突时依次追加 `-1`、`-2` ……直到不与已有 slug 重复。

use std::collections::HashSet;

use serde::Deserialize;

use crate::content::EntityKind;
use crate::error::{Error, Result};

/// 数字后缀预留的最大长度，`-` 加上 u32 的十位数字
const MAX_SUFFIX_LEN: usize = 11;

/// slug 的最小长度限制，保证追加后缀后仍能保留部分原文
const MIN_MAX_LENGTH: usize = 16;

/// slug 的最大长度上限，与表结构中的 `VARCHAR(255)` 一致
const MAX_MAX_LENGTH: usize = 255;

/// 将任意文本转换为 slug
///
/// - 英文字母转小写，常见拉丁重音字母折叠为基础字母
/// - 其余字符（空白、标点、下划线、非 ASCII 字符）连续出现时合并为一个 `-`
/// - 去除首尾的 `-`
///
/// ```ignore
/// assert_eq!(slugify("Hello, World!"), "hello-world");
/// assert_eq!(slugify("Crème Brûlée"), "creme-brulee");
/// ```
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            push(&mut slug, c, &mut pending_dash);
        } else if let Some(folded) = fold_latin(c) {
            for c in folded.chars() {
                push(&mut slug, c, &mut pending_dash);
            }
        } else {
            pending_dash = true;
        }
    }

    slug
}

fn push(slug: &mut String, c: char, pending_dash: &mut bool) {
    if *pending_dash && !slug.is_empty() {
        slug.push('-');
    }
    *pending_dash = false;
    slug.push(c.to_ascii_lowercase());
}

/// 常见拉丁重音字母到 ASCII 的映射
fn fold_latin(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' => "a",
        'æ' | 'Æ' => "ae",
        'ç' | 'ć' | 'č' | 'Ç' | 'Ć' | 'Č' => "c",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' | 'ě' | 'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ę' | 'Ě' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'Ì' | 'Í' | 'Î' | 'Ï' | 'Ī' => "i",
        'ł' | 'Ł' => "l",
        'ñ' | 'ń' | 'ň' | 'Ñ' | 'Ń' | 'Ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ō' => "o",
        'œ' | 'Œ' => "oe",
        'ß' => "ss",
        'ś' | 'š' | 'Ś' | 'Š' => "s",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ū' | 'Ů' => "u",
        'ý' | 'ÿ' | 'Ý' | 'Ÿ' => "y",
        'ź' | 'ż' | 'ž' | 'Ź' | 'Ż' | 'Ž' => "z",
        _ => return None,
    };
    Some(folded)
}

/// slug 配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlugOptions {
    /// slug 最大长度，限制在 16 到 255 之间
    pub max_length: usize,
}

impl Default for SlugOptions {
    fn default() -> Self {
        Self { max_length: 50 }
    }
}

/// 带长度限制的 slug 生成器
#[derive(Debug, Clone)]
pub struct SlugGenerator {
    max_length: usize,
}

impl Default for SlugGenerator {
    fn default() -> Self {
        Self::new(&SlugOptions::default())
    }
}

impl SlugGenerator {
    pub fn new(options: &SlugOptions) -> Self {
        Self {
            max_length: options.max_length.clamp(MIN_MAX_LENGTH, MAX_MAX_LENGTH),
        }
    }

    /// 由源文本生成基础 slug
    ///
    /// 源文本无法产生任何字符时（例如纯中文标题），使用实体类型名。
    pub fn base(&self, kind: EntityKind, source: &str) -> String {
        let slug = slugify(source);
        let slug = if slug.is_empty() {
            kind.as_str().to_string()
        } else {
            slug
        };
        truncate(&slug, self.max_length).to_string()
    }

    /// 规范化调用方显式指定的 slug
    pub fn normalize(&self, explicit: &str) -> Result<String> {
        let slug = slugify(explicit);
        if slug.is_empty() {
            return Err(Error::Validation("slug must contain letters or digits"));
        }
        Ok(truncate(&slug, self.max_length).to_string())
    }

    /// 是否为合法 slug：非空，只含小写字母、数字和不在首尾的 `-`
    pub fn is_valid(slug: &str) -> bool {
        !slug.is_empty()
            && !slug.starts_with('-')
            && !slug.ends_with('-')
            && slug
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    }

    /// 查询已有 slug 时使用的前缀
    ///
    /// 所有候选 slug（含截短后追加后缀的）都以该前缀开头。
    pub fn prefix<'a>(&self, base: &'a str) -> &'a str {
        truncate(base, self.max_length.saturating_sub(MAX_SUFFIX_LEN))
    }

    /// 在已有 slug 中挑选第一个不冲突的候选
    pub fn unique(&self, base: &str, existing: &HashSet<String>) -> String {
        if !existing.contains(base) {
            return base.to_string();
        }

        (1u32..)
            .map(|n| {
                let suffix = format!("-{n}");
                let head = truncate(base, self.max_length - suffix.len());
                format!("{head}{suffix}")
            })
            .find(|candidate| !existing.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}

/// 截断到 `max` 个字节并去掉末尾的 `-`，slug 仅含 ASCII，不会截断到字符中间
fn truncate(slug: &str, max: usize) -> &str {
    let end = slug.len().min(max);
    slug[..end].trim_end_matches('-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing(slugs: &[&str]) -> HashSet<String> {
        slugs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Hello,   World!  "), "hello-world");
        assert_eq!(slugify("snake_case and-dash"), "snake-case-and-dash");
        assert_eq!(slugify("Crème Brûlée"), "creme-brulee");
        assert_eq!(slugify("Straße"), "strasse");
        assert_eq!(slugify("Rust 语言 2024"), "rust-2024");
        assert_eq!(slugify("中文标题"), "");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_base_falls_back_to_kind() {
        let slugs = SlugGenerator::default();
        assert_eq!(slugs.base(EntityKind::Post, "中文标题"), "post");
        assert_eq!(slugs.base(EntityKind::Tag, "!!!"), "tag");
        assert_eq!(slugs.base(EntityKind::Category, "Rust"), "rust");
    }

    #[test]
    fn test_unique_appends_counter() {
        let slugs = SlugGenerator::default();
        assert_eq!(slugs.unique("hello-world", &existing(&[])), "hello-world");
        assert_eq!(
            slugs.unique("hello-world", &existing(&["hello-world"])),
            "hello-world-1"
        );
        assert_eq!(
            slugs.unique(
                "hello-world",
                &existing(&["hello-world", "hello-world-1", "hello-world-2"])
            ),
            "hello-world-3"
        );
    }

    #[test]
    fn test_length_limit_respected_with_suffix() {
        let slugs = SlugGenerator::new(&SlugOptions { max_length: 20 });
        let base = slugs.base(EntityKind::Post, "a very long title that keeps going");
        assert_eq!(base, "a-very-long-title-th");
        assert!(base.len() <= 20);

        let next = slugs.unique(&base, &existing(&[base.as_str()]));
        assert_eq!(next, "a-very-long-title-1");
        assert!(next.len() <= 20);
        assert!(next.starts_with(slugs.prefix(&base)));
    }

    #[test]
    fn test_truncate_drops_trailing_dash() {
        let slugs = SlugGenerator::new(&SlugOptions { max_length: 16 });
        assert_eq!(slugs.base(EntityKind::Tag, "abcdefghijklmno pq"), "abcdefghijklmno");
    }

    #[test]
    fn test_max_length_is_clamped() {
        let slugs = SlugGenerator::new(&SlugOptions { max_length: 300 });
        let base = slugs.base(EntityKind::Post, &"a".repeat(400));
        assert_eq!(base.len(), MAX_MAX_LENGTH);

        let next = slugs.unique(&base, &existing(&[base.as_str()]));
        assert!(next.len() <= MAX_MAX_LENGTH);
        assert!(next.ends_with("-1"));

        let slugs = SlugGenerator::new(&SlugOptions { max_length: 1 });
        assert_eq!(slugs.base(EntityKind::Tag, &"b".repeat(40)).len(), 16);
    }

    #[test]
    fn test_is_valid() {
        assert!(SlugGenerator::is_valid("hello-world-1"));
        assert!(!SlugGenerator::is_valid("Hello"));
        assert!(!SlugGenerator::is_valid("-hello"));
        assert!(!SlugGenerator::is_valid("hello world"));
        assert!(!SlugGenerator::is_valid(""));
    }

    #[test]
    fn test_normalize_explicit_slug() {
        let slugs = SlugGenerator::default();
        assert_eq!(slugs.normalize("My Custom Slug").unwrap(), "my-custom-slug");
        assert!(slugs.normalize("   ").is_err());
    }
}
