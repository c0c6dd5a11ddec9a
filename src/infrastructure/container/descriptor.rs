//! 类描述符
//!
//! 描述符在任何内核看到类之前由构建步骤一次性生成，之后不可修改：
//!
//! - 有序的构造参数需求
//! - 具名属性需求
//! - 默认生命周期、初始化钩子与释放钩子
//!
//! 内核只消费描述符，不负责推断类的依赖。

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use super::args::{Args, Injected};
use super::token::Token;
use super::Lifecycle;
use crate::errors::{BoxError, KernelError};
use crate::infrastructure::provider::{disposer_for, initializer_for, Disposable, Disposer, Initializer};

type Constructor =
    Arc<dyn Fn(&Args) -> Result<Box<dyn Any + Send + Sync>, KernelError> + Send + Sync>;

type PropertySetter =
    Arc<dyn Fn(&mut (dyn Any + Send + Sync), Injected) -> Result<(), KernelError> + Send + Sync>;

/// 单个依赖需求的构建器
#[derive(Debug, Clone)]
pub struct Dependency {
    token: Option<Token>,
    multi: bool,
    optional: bool,
    auto_factory: bool,
}

impl Dependency {
    /// 以类型 `T` 作为令牌
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::token(Token::of::<T>())
    }

    /// 显式令牌
    pub fn token(token: impl Into<Token>) -> Self {
        Self {
            token: Some(token.into()),
            multi: false,
            optional: false,
            auto_factory: false,
        }
    }

    /// 声明的参数类型无法确定，注册时会被拒绝
    pub fn undetermined() -> Self {
        Self {
            token: None,
            multi: false,
            optional: false,
            auto_factory: false,
        }
    }

    /// 注入该令牌下的全部提供者
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    /// 令牌未注册时注入“缺省”而不是报错
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// 注入一个 `AutoFactory`，不立即构造
    pub fn auto_factory(mut self) -> Self {
        self.auto_factory = true;
        self
    }

    fn finalize(&self, site: InjectionSite, owner: &Token) -> Result<ParamRequirement, KernelError> {
        let token = self
            .token
            .clone()
            .ok_or_else(|| KernelError::CircularTypeReference(owner.clone()))?;
        Ok(ParamRequirement {
            site,
            token,
            multi: self.multi,
            optional: self.optional,
            auto_factory: self.auto_factory,
        })
    }
}

/// 注入位置：构造参数序号或属性名
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InjectionSite {
    Position(usize),
    Property(Arc<str>),
}

/// 已定型的依赖需求
#[derive(Debug, Clone)]
pub struct ParamRequirement {
    pub site: InjectionSite,
    pub token: Token,
    pub multi: bool,
    pub optional: bool,
    pub auto_factory: bool,
}

struct PropertyBinding {
    key: Arc<str>,
    dependency: Dependency,
    setter: PropertySetter,
}

/// 不可变的类描述符
pub struct ClassDescriptor {
    token: Token,
    params: Vec<Dependency>,
    properties: Vec<PropertyBinding>,
    lifecycle: Lifecycle,
    initializer: Option<Initializer>,
    disposer: Option<Disposer>,
    constructor: Constructor,
}

impl ClassDescriptor {
    pub fn builder<T: Any + Send + Sync>() -> ClassDescriptorBuilder<T> {
        ClassDescriptorBuilder {
            params: Vec::new(),
            properties: Vec::new(),
            lifecycle: Lifecycle::Transient,
            initializer: None,
            disposer: None,
            _marker: PhantomData,
        }
    }

    /// 类自身的类型令牌
    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn name(&self) -> String {
        self.token.display_name()
    }

    /// 声明的构造参数个数
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn initializer(&self) -> Option<&Initializer> {
        self.initializer.as_ref()
    }

    pub fn disposer(&self) -> Option<&Disposer> {
        self.disposer.as_ref()
    }

    /// 按声明顺序定型构造参数需求
    ///
    /// 任一参数类型无法确定时返回 `CircularTypeReference`。
    pub fn requirements(&self) -> Result<Vec<ParamRequirement>, KernelError> {
        self.params
            .iter()
            .enumerate()
            .map(|(index, dep)| dep.finalize(InjectionSite::Position(index), &self.token))
            .collect()
    }

    /// 定型属性需求，顺序与声明顺序一致
    pub fn property_requirements(&self) -> Result<Vec<ParamRequirement>, KernelError> {
        self.properties
            .iter()
            .map(|prop| {
                prop.dependency
                    .finalize(InjectionSite::Property(prop.key.clone()), &self.token)
            })
            .collect()
    }

    pub(crate) fn instantiate(
        &self,
        args: &Args,
    ) -> Result<Box<dyn Any + Send + Sync>, KernelError> {
        (self.constructor)(args)
    }

    pub(crate) fn assign_property(
        &self,
        key: &str,
        target: &mut (dyn Any + Send + Sync),
        value: Injected,
    ) -> Result<(), KernelError> {
        let binding = self
            .properties
            .iter()
            .find(|prop| &*prop.key == key)
            .ok_or_else(|| {
                KernelError::custom(format!("{} has no property '{}'", self.name(), key))
            })?;
        (binding.setter)(target, value)
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("token", &self.token)
            .field("params", &self.params)
            .field(
                "properties",
                &self.properties.iter().map(|p| &*p.key).collect::<Vec<_>>(),
            )
            .field("lifecycle", &self.lifecycle)
            .field("initializer", &self.initializer.is_some())
            .field("disposer", &self.disposer.is_some())
            .finish()
    }
}

/// 类描述符构建器
pub struct ClassDescriptorBuilder<T> {
    params: Vec<Dependency>,
    properties: Vec<PropertyBinding>,
    lifecycle: Lifecycle,
    initializer: Option<Initializer>,
    disposer: Option<Disposer>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> ClassDescriptorBuilder<T> {
    /// 追加下一个构造参数
    pub fn param(mut self, dependency: Dependency) -> Self {
        self.params.push(dependency);
        self
    }

    /// 声明一个属性注入，实例构造完成后通过 `setter` 赋值
    pub fn property<F>(mut self, key: &str, dependency: Dependency, setter: F) -> Self
    where
        F: Fn(&mut T, Injected) -> Result<(), KernelError> + Send + Sync + 'static,
    {
        let key: Arc<str> = Arc::from(key);
        let owner = key.clone();
        let setter: PropertySetter = Arc::new(move |target, value| {
            let target = target.downcast_mut::<T>().ok_or_else(|| {
                KernelError::custom(format!(
                    "property '{}' target is not a {}",
                    owner,
                    std::any::type_name::<T>()
                ))
            })?;
            setter(target, value)
        });
        self.properties.push(PropertyBinding {
            key,
            dependency,
            setter,
        });
        self
    }

    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn singleton(self) -> Self {
        self.lifecycle(Lifecycle::Singleton)
    }

    pub fn scoped(self) -> Self {
        self.lifecycle(Lifecycle::Scoped)
    }

    /// 构造并注入属性之后执行的异步钩子
    pub fn on_initialize<F, Fut, E>(mut self, hook: F) -> Self
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.initializer = Some(initializer_for(hook));
        self
    }

    /// 内核释放时调用实例的 [`Disposable::dispose`]
    pub fn disposable(mut self) -> Self
    where
        T: Disposable,
    {
        self.disposer = Some(disposer_for::<T>());
        self
    }

    /// 给出构造函数并定型描述符
    pub fn construct<F>(self, constructor: F) -> Arc<ClassDescriptor>
    where
        F: Fn(&Args) -> Result<T, KernelError> + Send + Sync + 'static,
    {
        let constructor: Constructor = Arc::new(move |args| {
            constructor(args).map(|value| Box::new(value) as Box<dyn Any + Send + Sync>)
        });
        Arc::new(ClassDescriptor {
            token: Token::of::<T>(),
            params: self.params,
            properties: self.properties,
            lifecycle: self.lifecycle,
            initializer: self.initializer,
            disposer: self.disposer,
            constructor,
        })
    }
}

/// 描述符仓库
///
/// 由构建步骤持有并填充，随后以 `Arc` 交给内核；共享之后不再可变。
#[derive(Default, Debug)]
pub struct DescriptorStore {
    classes: HashMap<Token, Arc<ClassDescriptor>>,
}

impl DescriptorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记描述符，同一个类再次登记会替换旧的描述符
    pub fn insert(&mut self, descriptor: Arc<ClassDescriptor>) {
        self.classes.insert(descriptor.token().clone(), descriptor);
    }

    /// 构建器风格的登记
    pub fn with(mut self, descriptor: Arc<ClassDescriptor>) -> Self {
        self.insert(descriptor);
        self
    }

    pub fn get(&self, token: &Token) -> Option<Arc<ClassDescriptor>> {
        self.classes.get(token).cloned()
    }

    /// 令牌是否可构造
    pub fn contains(&self, token: &Token) -> bool {
        self.classes.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
