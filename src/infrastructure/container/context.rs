//! 解析上下文与解析路径

use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::args::Instance;
use super::token::Token;
use crate::errors::KernelError;

/// 进行中或已完成的构造，所有等待者共享同一个结果
pub(crate) type Pending = Shared<BoxFuture<'static, Result<Instance, KernelError>>>;

/// 缓存键：令牌加上提供者的身份
///
/// 同一令牌下的多个提供者各自缓存，互不覆盖。键持有提供者本身，
/// 条目存在期间提供者的地址不会被复用。
#[derive(Clone)]
pub(crate) struct CacheKey {
    pub(crate) token: Token,
    provider: Arc<dyn Any + Send + Sync>,
}

impl CacheKey {
    pub(crate) fn new<V: Any + Send + Sync>(token: &Token, provider: &Arc<V>) -> Self {
        Self {
            token: token.clone(),
            provider: provider.clone(),
        }
    }

    fn provider_addr(&self) -> usize {
        Arc::as_ptr(&self.provider) as *const () as usize
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token && self.provider_addr() == other.provider_addr()
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.token.hash(state);
        self.provider_addr().hash(state);
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheKey")
            .field("token", &self.token)
            .field("provider", &format_args!("{:#x}", self.provider_addr()))
            .finish()
    }
}

/// 单次顶层解析调用的作用域缓存
///
/// 每次顶层 `resolve`/`resolve_all` 都会新建一个上下文，并沿递归调用树
/// 向下传递；`Scoped` 生命周期的实例只在同一个上下文内共享。
#[derive(Clone, Default)]
pub struct ResolutionContext {
    scoped: Arc<Mutex<HashMap<CacheKey, Pending>>>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取出已有的构造，或者登记 `start` 产生的新构造
    ///
    /// 返回值的第二项表示是否命中缓存。锁只在登记期间持有。
    pub(crate) fn get_or_start(
        &self,
        key: &CacheKey,
        start: impl FnOnce() -> Pending,
    ) -> (Pending, bool) {
        let mut scoped = self.scoped.lock();
        if let Some(pending) = scoped.get(key) {
            return (pending.clone(), true);
        }
        let pending = start();
        scoped.insert(key.clone(), pending.clone());
        (pending, false)
    }

    /// 仅当条目仍是 `pending` 时移除，失败的构造不留在上下文里
    pub(crate) fn remove_if(&self, key: &CacheKey, pending: &Pending) {
        let mut scoped = self.scoped.lock();
        if scoped
            .get(key)
            .is_some_and(|current| current.ptr_eq(pending))
        {
            scoped.remove(key);
        }
    }

    /// 是否已经登记了该令牌的作用域实例
    pub fn contains(&self, token: &Token) -> bool {
        self.scoped.lock().keys().any(|key| &key.token == token)
    }

    pub fn len(&self) -> usize {
        self.scoped.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.scoped.lock().is_empty()
    }
}

impl std::fmt::Debug for ResolutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("scoped", &self.len())
            .finish()
    }
}

struct PathNode {
    token: Token,
    parent: Option<Arc<PathNode>>,
}

/// 当前调用路径上正在构造的令牌
///
/// 持久化链表：压栈只分配一个节点，兄弟分支共享公共前缀。
#[derive(Clone, Default)]
pub(crate) struct ResolutionPath {
    head: Option<Arc<PathNode>>,
    depth: usize,
}

impl ResolutionPath {
    pub(crate) fn push(&self, token: &Token) -> Self {
        Self {
            head: Some(Arc::new(PathNode {
                token: token.clone(),
                parent: self.head.clone(),
            })),
            depth: self.depth + 1,
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn contains(&self, token: &Token) -> bool {
        self.iter().any(|node| node == token)
    }

    /// 从根到 `next` 的令牌名称链
    pub(crate) fn chain_to(&self, next: &Token) -> Vec<String> {
        let mut chain: Vec<String> = self.iter().map(Token::display_name).collect();
        chain.reverse();
        chain.push(next.display_name());
        chain
    }

    fn iter(&self) -> impl Iterator<Item = &Token> {
        let mut node = self.head.as_deref();
        std::iter::from_fn(move || {
            let current = node?;
            node = current.parent.as_deref();
            Some(&current.token)
        })
    }
}
