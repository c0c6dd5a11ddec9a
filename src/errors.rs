use std::sync::Arc;

use thiserror::Error;

use crate::infrastructure::container::Token;

/// 用户代码（工厂、初始化钩子、释放钩子）返回的错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 可在多个等待者之间共享的错误源
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// 内核错误
///
/// 必须实现 `Clone`：同一个进行中的单例/作用域构造会被多个等待者共享，
/// 失败结果需要原样交给每一个等待者。
#[derive(Debug, Clone, Error)]
pub enum KernelError {
    /// 内核及其父链上都没有该令牌的提供者
    #[error("{0} token not found")]
    TokenNotFound(Token),

    /// 注册时某个构造参数的类型无法确定（通常是两个类互相引用）
    #[error("circular dependency around {0}: a constructor parameter type could not be determined")]
    CircularTypeReference(Token),

    /// 既没有显式给出可构造类型，令牌本身也不可构造
    #[error("no ctor provided for {0}")]
    InvalidRegistration(Token),

    /// 参数令牌是语言内置的基础类型，通常意味着忘记了显式令牌
    #[error("can not inject primitive type at param {index} in {class}({signature})")]
    PrimitiveInjectionRejected {
        class: String,
        index: usize,
        signature: String,
    },

    /// 构造后的初始化钩子失败
    #[error("failed to initialize {token}: {source}")]
    InitializeFailure {
        token: Token,
        #[source]
        source: SharedError,
    },

    /// 无法识别的生命周期名称
    #[error("unknown lifecycle '{0}'")]
    UnknownLifecycle(String),

    /// 工厂函数返回了错误
    #[error("factory for {token} failed: {source}")]
    FactoryFailure {
        token: Token,
        #[source]
        source: SharedError,
    },

    /// 实例的实际类型与请求的类型不一致
    #[error("type mismatch for {token}: expected {expected}")]
    TypeMismatch { token: Token, expected: &'static str },

    /// 覆盖参数的位置超出了构造函数的参数个数
    #[error("override index {index} is out of range for {token} with {arity} parameters")]
    InvalidOverride {
        token: Token,
        index: usize,
        arity: usize,
    },

    /// 解析路径上再次遇到了同一个令牌
    #[error("circular dependency detected: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    /// 解析路径超过了配置的最大深度
    #[error("resolution of {token} exceeded the maximum depth of {max_depth}")]
    ResolutionTooDeep { token: Token, max_depth: usize },

    /// 释放钩子失败
    #[error("failed to dispose {token}: {source}")]
    DisposeFailure {
        token: Token,
        #[source]
        source: SharedError,
    },

    /// 构造函数或属性设置器中的其他错误
    #[error("{0}")]
    Custom(String),
}

impl KernelError {
    /// 构造一个自定义错误，供构造函数和属性设置器使用
    pub fn custom(message: impl Into<String>) -> Self {
        KernelError::Custom(message.into())
    }

    /// 是否是针对给定令牌的 `TokenNotFound`
    pub fn is_not_found_for(&self, token: &Token) -> bool {
        matches!(self, KernelError::TokenNotFound(missing) if missing == token)
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}
