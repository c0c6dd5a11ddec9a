//! 构造参数
//!
//! 每个依赖需求解析完成后得到一个 [`Resolved`]，构造函数通过 [`Args`]
//! 按位置取出强类型的值。

use std::any::Any;
use std::sync::Arc;

use super::auto_factory::AutoFactory;
use super::token::Token;
use crate::errors::KernelError;

/// 类型擦除的实例
pub type Instance = Arc<dyn Any + Send + Sync>;

/// 把任意值包装成 [`Instance`]
pub fn instance<T: Any + Send + Sync>(value: T) -> Instance {
    Arc::new(value)
}

/// 构造 `Vec<Instance>` 的便捷宏，常用于 `AutoFactory::create`
#[macro_export]
macro_rules! instances {
    ($($value:expr),* $(,)?) => {
        vec![$($crate::infrastructure::container::args::instance($value)),*]
    };
}

/// 调用方提供的位置参数覆盖
#[derive(Clone)]
pub struct Override {
    pub index: usize,
    pub value: Instance,
}

impl Override {
    pub fn new<T: Any + Send + Sync>(index: usize, value: T) -> Self {
        Self {
            index,
            value: Arc::new(value),
        }
    }
}

impl std::fmt::Debug for Override {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Override").field("index", &self.index).finish()
    }
}

/// 单个依赖需求的解析结果
#[derive(Clone)]
pub enum Resolved {
    /// 普通解析
    One(Instance),
    /// `multi` 需求：本地（或父内核）全部提供者的结果
    Many(Vec<Instance>),
    /// `auto_factory` 需求：延迟构造句柄
    Factory(AutoFactory),
    /// `optional` 需求且令牌未注册
    Absent,
}

impl Resolved {
    /// 取出单个强类型实例
    pub fn one<T: Any + Send + Sync>(&self, token: &Token) -> Result<Arc<T>, KernelError> {
        match self {
            Resolved::One(value) => downcast(token, value.clone()),
            Resolved::Absent => Err(KernelError::TokenNotFound(token.clone())),
            _ => Err(mismatch::<T>(token)),
        }
    }

    /// 取出可选实例，未注册时为 `None`
    pub fn optional<T: Any + Send + Sync>(
        &self,
        token: &Token,
    ) -> Result<Option<Arc<T>>, KernelError> {
        match self {
            Resolved::Absent => Ok(None),
            _ => self.one(token).map(Some),
        }
    }

    /// 取出多绑定的全部实例
    pub fn many<T: Any + Send + Sync>(&self, token: &Token) -> Result<Vec<Arc<T>>, KernelError> {
        match self {
            Resolved::Many(values) => values
                .iter()
                .map(|value| downcast(token, value.clone()))
                .collect(),
            Resolved::Absent => Ok(Vec::new()),
            _ => Err(mismatch::<Vec<T>>(token)),
        }
    }

    /// 取出自动工厂句柄
    pub fn factory(&self, token: &Token) -> Result<AutoFactory, KernelError> {
        match self {
            Resolved::Factory(factory) => Ok(factory.clone()),
            Resolved::Absent => Err(KernelError::TokenNotFound(token.clone())),
            _ => Err(mismatch::<AutoFactory>(token)),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Resolved::Absent)
    }
}

/// 按类型取出实例
pub(crate) fn downcast<T: Any + Send + Sync>(
    token: &Token,
    value: Instance,
) -> Result<Arc<T>, KernelError> {
    value.downcast::<T>().map_err(|_| mismatch::<T>(token))
}

fn mismatch<T: ?Sized>(token: &Token) -> KernelError {
    KernelError::TypeMismatch {
        token: token.clone(),
        expected: std::any::type_name::<T>(),
    }
}

/// 一个已解析的注入点：令牌及其解析结果
///
/// 属性设置器直接收到它；构造函数通过 [`Args`] 按位置取出。
#[derive(Clone)]
pub struct Injected {
    token: Token,
    value: Resolved,
}

impl Injected {
    pub fn new(token: Token, value: Resolved) -> Self {
        Self { token, value }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn value(&self) -> &Resolved {
        &self.value
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Result<Arc<T>, KernelError> {
        self.value.one(&self.token)
    }

    pub fn optional<T: Any + Send + Sync>(&self) -> Result<Option<Arc<T>>, KernelError> {
        self.value.optional(&self.token)
    }

    pub fn all<T: Any + Send + Sync>(&self) -> Result<Vec<Arc<T>>, KernelError> {
        self.value.many(&self.token)
    }

    pub fn factory(&self) -> Result<AutoFactory, KernelError> {
        self.value.factory(&self.token)
    }
}

/// 传给构造函数的位置参数
pub struct Args {
    class: Token,
    values: Vec<Injected>,
}

impl Args {
    pub(crate) fn new(class: Token, values: Vec<Injected>) -> Self {
        Self { class, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 正在构造的类的令牌
    pub fn class(&self) -> &Token {
        &self.class
    }

    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>, KernelError> {
        self.slot(index)?.get()
    }

    pub fn optional<T: Any + Send + Sync>(
        &self,
        index: usize,
    ) -> Result<Option<Arc<T>>, KernelError> {
        self.slot(index)?.optional()
    }

    pub fn all<T: Any + Send + Sync>(&self, index: usize) -> Result<Vec<Arc<T>>, KernelError> {
        self.slot(index)?.all()
    }

    pub fn factory(&self, index: usize) -> Result<AutoFactory, KernelError> {
        self.slot(index)?.factory()
    }

    /// 原始解析结果
    pub fn raw(&self, index: usize) -> Option<&Resolved> {
        self.values.get(index).map(Injected::value)
    }

    fn slot(&self, index: usize) -> Result<&Injected, KernelError> {
        self.values.get(index).ok_or_else(|| {
            KernelError::custom(format!(
                "{} has no constructor parameter at index {}",
                self.class, index
            ))
        })
    }
}
