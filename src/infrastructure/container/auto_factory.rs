//! 自动工厂
//!
//! 持有 {内核, 令牌} 的延迟构造句柄。持有工厂本身从不触发构造，
//! 只有调用 `create`/`create_with_args` 时才会解析。

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::args::{downcast, Instance, Override};
use super::context::ResolutionContext;
use super::kernel::Kernel;
use super::token::Token;
use crate::errors::KernelError;

#[derive(Clone)]
pub struct AutoFactory {
    kernel: Kernel,
    token: Token,
}

impl AutoFactory {
    pub fn new(kernel: Kernel, token: impl Into<Token>) -> Self {
        Self {
            kernel,
            token: token.into(),
        }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    /// 按位置提供前若干个构造参数，其余参数照常从注册表解析
    ///
    /// 没有参数时等同于一次普通解析，生命周期缓存照常生效。
    pub async fn create(&self, args: Vec<Instance>) -> Result<Instance, KernelError> {
        let overrides = args
            .into_iter()
            .enumerate()
            .map(|(index, value)| Override { index, value })
            .collect();
        self.kernel
            .resolve_with(self.token.clone(), overrides, ResolutionContext::new())
            .await
    }

    pub async fn create_as<T: Any + Send + Sync>(
        &self,
        args: Vec<Instance>,
    ) -> Result<Arc<T>, KernelError> {
        let value = self.create(args).await?;
        downcast(&self.token, value)
    }

    /// 只覆盖给定序号的参数，例如 `[(0, a), (2, b)]`
    pub async fn create_with_args<I>(&self, args: I) -> Result<Instance, KernelError>
    where
        I: IntoIterator<Item = (usize, Instance)>,
    {
        let overrides = args
            .into_iter()
            .map(|(index, value)| Override { index, value })
            .collect();
        self.kernel
            .resolve_with(self.token.clone(), overrides, ResolutionContext::new())
            .await
    }

    pub async fn create_with_args_as<T, I>(&self, args: I) -> Result<Arc<T>, KernelError>
    where
        T: Any + Send + Sync,
        I: IntoIterator<Item = (usize, Instance)>,
    {
        let value = self.create_with_args(args).await?;
        downcast(&self.token, value)
    }
}

impl fmt::Debug for AutoFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoFactory")
            .field("token", &self.token)
            .finish()
    }
}
