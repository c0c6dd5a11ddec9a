//! 提供者：注册到内核中的实例配方

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::errors::BoxError;
use crate::infrastructure::container::{
    ClassDescriptor, Instance, Kernel, Lifecycle, ParamRequirement, Token,
};

/// 构造并注入属性之后执行的异步钩子
pub type Initializer = Arc<dyn Fn(Instance) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// 内核释放时执行的异步钩子
pub type Disposer = Arc<dyn Fn(Instance) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// 工厂函数，接收内核句柄以便拉取更多依赖
pub type Factory = Arc<dyn Fn(Kernel) -> BoxFuture<'static, Result<Instance, BoxError>> + Send + Sync>;

/// 可释放的实例
#[async_trait]
pub trait Disposable: Send + Sync {
    async fn dispose(&self) -> Result<(), BoxError>;
}

/// 把强类型的初始化钩子擦除成 [`Initializer`]
pub fn initializer_for<T, F, Fut, E>(hook: F) -> Initializer
where
    T: Any + Send + Sync,
    F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError>,
{
    Arc::new(move |instance: Instance| match instance.downcast::<T>() {
        Ok(typed) => hook(typed)
            .map(|result| result.map_err(Into::<BoxError>::into))
            .boxed(),
        Err(_) => {
            let error: BoxError = format!(
                "initializer expects {}",
                std::any::type_name::<T>()
            )
            .into();
            futures_util::future::ready(Err(error)).boxed()
        }
    })
}

/// 为实现了 [`Disposable`] 的类型生成 [`Disposer`]
pub fn disposer_for<T: Disposable + Any>() -> Disposer {
    Arc::new(|instance: Instance| {
        async move {
            let typed = instance.downcast::<T>().map_err(|_| -> BoxError {
                format!("disposer expects {}", std::any::type_name::<T>()).into()
            })?;
            typed.dispose().await
        }
        .boxed()
    })
}

/// 类提供者：描述符加上已定型的需求列表
#[derive(Clone)]
pub struct ClassProvider {
    pub descriptor: Arc<ClassDescriptor>,
    pub params: Arc<[ParamRequirement]>,
    pub properties: Arc<[ParamRequirement]>,
    pub lifecycle: Lifecycle,
    pub initializer: Option<Initializer>,
    pub disposer: Option<Disposer>,
}

impl ClassProvider {
    /// 按注册选项定型类提供者
    ///
    /// 显式选项整体替换描述符自带的生命周期与初始化钩子；
    /// 选项没有给出释放钩子时沿用描述符的。
    pub fn new(
        descriptor: Arc<ClassDescriptor>,
        options: Option<RegistrationOptions>,
    ) -> Result<Self, crate::errors::KernelError> {
        let params = descriptor.requirements()?;
        let properties = descriptor.property_requirements()?;
        let (lifecycle, initializer, disposer) = match options {
            Some(options) => (
                options.lifecycle.unwrap_or_default(),
                options.initializer,
                options.disposer.or_else(|| descriptor.disposer().cloned()),
            ),
            None => (
                descriptor.lifecycle(),
                descriptor.initializer().cloned(),
                descriptor.disposer().cloned(),
            ),
        };
        Ok(Self {
            descriptor,
            params: params.into(),
            properties: properties.into(),
            lifecycle,
            initializer,
            disposer,
        })
    }
}

/// 工厂提供者
#[derive(Clone)]
pub struct FactoryProvider {
    pub factory: Factory,
    pub lifecycle: Lifecycle,
    pub disposer: Option<Disposer>,
}

/// 注册表中的提供者
#[derive(Clone)]
pub enum Provider {
    Class(ClassProvider),
    Value(Instance),
    Factory(FactoryProvider),
    /// 别名：解析时转而解析目标令牌
    Alias(Token),
}

impl Provider {
    /// 生效的生命周期，值与别名总是 `Transient`
    pub fn lifecycle(&self) -> Lifecycle {
        match self {
            Provider::Class(class) => class.lifecycle,
            Provider::Factory(factory) => factory.lifecycle,
            Provider::Value(_) | Provider::Alias(_) => Lifecycle::Transient,
        }
    }

    pub fn disposer(&self) -> Option<&Disposer> {
        match self {
            Provider::Class(class) => class.disposer.as_ref(),
            Provider::Factory(factory) => factory.disposer.as_ref(),
            Provider::Value(_) | Provider::Alias(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Provider::Class(_) => "class",
            Provider::Value(_) => "value",
            Provider::Factory(_) => "factory",
            Provider::Alias(_) => "alias",
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Class(class) => f
                .debug_struct("Class")
                .field("class", &class.descriptor.name())
                .field("lifecycle", &class.lifecycle)
                .finish(),
            Provider::Value(_) => f.write_str("Value"),
            Provider::Factory(factory) => f
                .debug_struct("Factory")
                .field("lifecycle", &factory.lifecycle)
                .finish(),
            Provider::Alias(target) => f.debug_tuple("Alias").field(target).finish(),
        }
    }
}

/// 类注册选项
#[derive(Clone, Default)]
pub struct RegistrationOptions {
    pub lifecycle: Option<Lifecycle>,
    pub initializer: Option<Initializer>,
    pub disposer: Option<Disposer>,
}

impl RegistrationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn on_initialize<T, F, Fut, E>(mut self, hook: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.initializer = Some(initializer_for(hook));
        self
    }

    pub fn disposable<T: Disposable + Any>(mut self) -> Self {
        self.disposer = Some(disposer_for::<T>());
        self
    }
}

impl From<Lifecycle> for RegistrationOptions {
    fn from(lifecycle: Lifecycle) -> Self {
        Self::new().lifecycle(lifecycle)
    }
}

/// 工厂注册选项，没有初始化钩子
#[derive(Clone, Default)]
pub struct FactoryOptions {
    pub lifecycle: Lifecycle,
    pub disposer: Option<Disposer>,
}

impl FactoryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn disposable<T: Disposable + Any>(mut self) -> Self {
        self.disposer = Some(disposer_for::<T>());
        self
    }
}

impl From<Lifecycle> for FactoryOptions {
    fn from(lifecycle: Lifecycle) -> Self {
        Self::new().lifecycle(lifecycle)
    }
}

impl From<()> for FactoryOptions {
    fn from(_: ()) -> Self {
        Self::default()
    }
}
