//! 注册表：令牌到提供者列表的有序多重映射
//!
//! 列表只会被整体替换，从不原地修改。先前取出的列表与当前列表可以
//! 用 `Arc::ptr_eq` 比较，判断槽位是否发生过变化。

use dashmap::DashMap;
use std::sync::Arc;

use super::token::Token;

/// 有序多重映射
pub struct Registry<V> {
    /// 使用 DashMap 保证并发注册与解析互不阻塞
    entries: DashMap<Token, Arc<[Arc<V>]>>,
}

impl<V> Registry<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// 追加到令牌列表的末尾
    pub fn set(&self, token: Token, value: V) {
        let value = Arc::new(value);
        self.entries
            .entry(token)
            .and_modify(|list| {
                let mut next = Vec::with_capacity(list.len() + 1);
                next.extend(list.iter().cloned());
                next.push(value.clone());
                *list = next.into();
            })
            .or_insert_with(|| Arc::from(vec![value.clone()]));
    }

    /// 列表为空时追加 `make` 的结果，否则返回最近一次注册的提供者
    ///
    /// 检查与追加在同一个分片锁内完成。
    pub fn get_or_set(&self, token: Token, make: impl FnOnce() -> V) -> Arc<V> {
        let mut list = self
            .entries
            .entry(token)
            .or_insert_with(|| Arc::from(Vec::new()));
        if let Some(last) = list.last() {
            return last.clone();
        }
        let value = Arc::new(make());
        *list = Arc::from(vec![value.clone()]);
        value
    }

    /// 整体替换令牌列表
    pub fn set_all(&self, token: Token, values: Vec<Arc<V>>) {
        self.entries.insert(token, values.into());
    }

    /// 最近一次注册的提供者（后注册者遮蔽先注册者）
    pub fn get(&self, token: &Token) -> Option<Arc<V>> {
        self.entries
            .get(token)
            .and_then(|list| list.last().cloned())
    }

    /// 全部提供者，按注册顺序
    pub fn get_all(&self, token: &Token) -> Arc<[Arc<V>]> {
        self.entries
            .get(token)
            .map(|list| list.value().clone())
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// 至少有一个提供者
    pub fn has(&self, token: &Token) -> bool {
        self.entries
            .get(token)
            .map(|list| !list.is_empty())
            .unwrap_or(false)
    }

    /// 清空令牌列表，但保留槽位
    pub fn delete(&self, token: &Token) {
        self.set_all(token.clone(), Vec::new());
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// 拥有非空列表的令牌
    pub fn tokens(&self) -> Vec<Token> {
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> Default for Registry<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// 复制全部列表；提供者本身通过 `Arc` 共享
impl<V> Clone for Registry<V> {
    fn clone(&self) -> Self {
        let entries = DashMap::with_capacity(self.entries.len());
        for entry in self.entries.iter() {
            entries.insert(entry.key().clone(), entry.value().clone());
        }
        Self { entries }
    }
}
