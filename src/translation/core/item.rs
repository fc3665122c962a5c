//! 条目模型与宿主适配接口
//!
//! 条目归宿主所有；流水线在一次处理期间借用它，并返回可能被修改的副本。
//! 宿主通过 [`ItemStore`] 提供上一轮已存储的条目，流水线只依赖该接口。

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::translation::storage::signature::sha256_hex;

/// 标题原文属性
pub const ATTR_ORIGINAL_TITLE: &str = "ttcn_original_title";
/// 标题译文属性
pub const ATTR_TRANSLATED_TITLE: &str = "ttcn_translated_title";

/// 一个订阅条目
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Item {
    /// 宿主分配的稳定 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub title: String,
    /// HTML 正文
    #[serde(default)]
    pub body: String,
    /// 宿主保存的附加属性
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Item {
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            title: title.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_feed(mut self, feed_id: impl Into<String>) -> Self {
        self.feed_id = Some(feed_id.into());
        self
    }

    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = Some(guid.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// 稳定条目键：id，其次 guid，再次链接的摘要，最后标题的摘要
    ///
    /// 标题已被组合时取属性中保存的原始标题，保证处理前后键不变。
    pub fn key(&self) -> String {
        fn non_empty(value: &Option<String>) -> Option<&str> {
            value.as_deref().map(str::trim).filter(|v| !v.is_empty())
        }

        if let Some(id) = non_empty(&self.id) {
            return id.to_string();
        }
        if let Some(guid) = non_empty(&self.guid) {
            return guid.to_string();
        }
        if let Some(link) = non_empty(&self.link) {
            return sha256_hex(link);
        }
        match self.attribute(ATTR_ORIGINAL_TITLE).filter(|t| !t.trim().is_empty()) {
            Some(original) => sha256_hex(original),
            None => sha256_hex(&self.title),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        self.attributes.insert(name.to_string(), value.into());
    }

    /// 已存储的标题原文/译文
    pub fn stored_title_pair(&self) -> Option<(&str, &str)> {
        let original = self.attribute(ATTR_ORIGINAL_TITLE)?;
        let translated = self.attribute(ATTR_TRANSLATED_TITLE)?;
        if original.trim().is_empty() || translated.trim().is_empty() {
            return None;
        }
        Some((original, translated))
    }
}

/// 宿主适配接口：查找同一逻辑条目的上一轮存储副本
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn load_previous(&self, item: &Item) -> Option<Item>;
}

/// 内存实现，按条目键索引
#[derive(Debug, Default)]
pub struct MemoryItemStore {
    items: RwLock<HashMap<String, Item>>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Self {
        let store = Self::new();
        for item in items {
            store.insert(item);
        }
        store
    }

    pub fn insert(&self, item: Item) {
        let mut items = match self.items.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        items.insert(item.key(), item);
    }

    pub fn len(&self) -> usize {
        match self.items.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn load_previous(&self, item: &Item) -> Option<Item> {
        let items = match self.items.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        items.get(&item.key()).cloned()
    }
}

/// 不提供任何历史条目
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyItemStore;

#[async_trait]
impl ItemStore for EmptyItemStore {
    async fn load_previous(&self, _item: &Item) -> Option<Item> {
        None
    }
}
