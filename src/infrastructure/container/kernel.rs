//! 解析内核
//!
//! 内核持有注册表、单例缓存以及可选的父内核：
//! - 子内核遮蔽父内核的注册，但从不修改父内核
//! - 同一构造内的兄弟依赖并发解析，任一失败则整个构造失败
//! - 单例的首个请求者负责构造，并发的跟随者共享同一个进行中的结果

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{self, try_join_all, BoxFuture};
use futures_util::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::args::{downcast, instance, Args, Injected, Instance, Override, Resolved};
use super::auto_factory::AutoFactory;
use super::context::{CacheKey, Pending, ResolutionContext, ResolutionPath};
use super::descriptor::{ClassDescriptor, DescriptorStore, InjectionSite, ParamRequirement};
use super::registry::Registry;
use super::token::Token;
use super::Lifecycle;
use crate::config::KernelConfig;
use crate::errors::{BoxError, KernelError};
use crate::infrastructure::module::KernelModule;
use crate::infrastructure::provider::{
    ClassProvider, Disposer, Factory, FactoryOptions, FactoryProvider, Provider,
    RegistrationOptions,
};
use crate::logging::OperationTimer;

/// 单例缓存条目
#[derive(Clone)]
pub(super) struct SingletonEntry {
    /// 创建顺序，释放时倒序处理；失败淘汰时用于确认条目未被替换
    generation: u64,
    pending: Pending,
    disposer: Option<Disposer>,
}

/// 内部统计信息（原子计数器）
#[derive(Default)]
struct InnerStats {
    total_resolutions: AtomicUsize,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    constructions: AtomicUsize,
}

pub(super) struct KernelInner {
    pub(super) registry: Registry<Provider>,
    singletons: DashMap<CacheKey, SingletonEntry>,
    pub(super) parent: Option<Kernel>,
    pub(super) descriptors: Arc<DescriptorStore>,
    pub(super) config: KernelConfig,
    stats: InnerStats,
    generation: AtomicU64,
}

/// 依赖注入内核
///
/// 克隆只复制句柄，所有克隆共享同一个注册表与单例缓存。
///
/// 交给工厂的句柄还带着工厂所在的解析路径，工厂内部的解析因此
/// 仍然受循环检测与深度上限约束。
#[derive(Clone)]
pub struct Kernel {
    pub(super) inner: Arc<KernelInner>,
    path: ResolutionPath,
}

enum Lookup {
    Local(Arc<Provider>),
    /// 请求的是内核自身
    Kernel,
    Parent(Kernel),
}

impl Kernel {
    /// 创建一个没有描述符仓库的根内核
    pub fn new() -> Self {
        Self::with_descriptors(Arc::new(DescriptorStore::new()))
    }

    /// 创建根内核，`descriptors` 中的类可以被隐式注册
    pub fn with_descriptors(descriptors: Arc<DescriptorStore>) -> Self {
        Self::with_config(KernelConfig::default(), descriptors)
    }

    pub fn with_config(config: KernelConfig, descriptors: Arc<DescriptorStore>) -> Self {
        Self::build(config, descriptors, None)
    }

    fn build(
        config: KernelConfig,
        descriptors: Arc<DescriptorStore>,
        parent: Option<Kernel>,
    ) -> Self {
        Self {
            inner: Arc::new(KernelInner {
                registry: Registry::new(),
                singletons: DashMap::new(),
                parent,
                descriptors,
                config,
                stats: InnerStats::default(),
                generation: AtomicU64::new(0),
            }),
            path: ResolutionPath::default(),
        }
    }

    /// 同一个内核，解析从 `path` 继续
    fn within(&self, path: ResolutionPath) -> Kernel {
        Kernel {
            inner: self.inner.clone(),
            path,
        }
    }

    /// 同一个内核，解析从空路径开始
    fn detached(&self) -> Kernel {
        self.within(ResolutionPath::default())
    }

    /// 创建子内核，共享描述符仓库与配置
    pub fn get_child_kernel(&self) -> Kernel {
        Self::build(
            self.inner.config.clone(),
            self.inner.descriptors.clone(),
            Some(self.detached()),
        )
    }

    pub fn parent(&self) -> Option<&Kernel> {
        self.inner.parent.as_ref()
    }

    pub fn config(&self) -> &KernelConfig {
        &self.inner.config
    }

    pub fn descriptors(&self) -> &Arc<DescriptorStore> {
        &self.inner.descriptors
    }

    /// 两个句柄是否指向同一个内核
    pub fn ptr_eq(&self, other: &Kernel) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ---------------------------------------------------------------------
    // 注册
    // ---------------------------------------------------------------------

    /// 注册类提供者
    ///
    /// 没有给出描述符时使用令牌自身在描述符仓库中的描述符；两者都没有则返回
    /// `InvalidRegistration`。显式选项整体替换描述符自带的生命周期与初始化钩子。
    pub fn register_class(
        &self,
        token: impl Into<Token>,
        descriptor: Option<Arc<ClassDescriptor>>,
        options: Option<RegistrationOptions>,
    ) -> Result<(), KernelError> {
        let token = token.into();
        let descriptor = match descriptor {
            Some(descriptor) => descriptor,
            None => self
                .inner
                .descriptors
                .get(&token)
                .ok_or_else(|| KernelError::InvalidRegistration(token.clone()))?,
        };
        let provider = ClassProvider::new(descriptor, options)?;
        debug!(
            token = %token,
            class = %provider.descriptor.name(),
            lifecycle = %provider.lifecycle,
            "registered class"
        );
        self.inner.registry.set(token, Provider::Class(provider));
        Ok(())
    }

    /// 以类型自身为令牌注册
    pub fn register_type<T: Any>(&self) -> Result<(), KernelError> {
        self.register_class(Token::of::<T>(), None, None)
    }

    /// 以 `token` 注册给定描述符的类
    pub fn register_class_as(
        &self,
        token: impl Into<Token>,
        descriptor: Arc<ClassDescriptor>,
    ) -> Result<(), KernelError> {
        self.register_class(token, Some(descriptor), None)
    }

    /// 注册一个现成的值
    pub fn register_value<T: Any + Send + Sync>(&self, token: impl Into<Token>, value: T) {
        self.register_instance(token, Arc::new(value));
    }

    /// 注册一个已经擦除类型的实例
    pub fn register_instance(&self, token: impl Into<Token>, value: Instance) {
        let token = token.into();
        debug!(token = %token, "registered value");
        self.inner.registry.set(token, Provider::Value(value));
    }

    /// 注册工厂；工厂收到内核句柄，可以继续拉取其他依赖
    pub fn register_factory<T, F, Fut, E>(
        &self,
        token: impl Into<Token>,
        factory: F,
        options: impl Into<FactoryOptions>,
    ) where
        T: Any + Send + Sync,
        F: Fn(Kernel) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let token = token.into();
        let options = options.into();
        let factory: Factory = Arc::new(move |kernel| {
            factory(kernel)
                .map(|result| {
                    result
                        .map(|value| Arc::new(value) as Instance)
                        .map_err(Into::<BoxError>::into)
                })
                .boxed()
        });
        debug!(token = %token, lifecycle = %options.lifecycle, "registered factory");
        self.inner.registry.set(
            token,
            Provider::Factory(FactoryProvider {
                factory,
                lifecycle: options.lifecycle,
                disposer: options.disposer,
            }),
        );
    }

    /// 注册别名：解析 `token` 时转而解析 `target`
    pub fn register_token(&self, token: impl Into<Token>, target: impl Into<Token>) {
        let token = token.into();
        let target = target.into();
        debug!(token = %token, target = %target, "registered alias");
        self.inner.registry.set(token, Provider::Alias(target));
    }

    /// 清空令牌的提供者列表并清除其单例缓存，不影响父内核
    pub fn unregister(&self, token: impl Into<Token>) {
        let token = token.into();
        self.inner.registry.delete(&token);
        self.inner.singletons.retain(|key, _| key.token != token);
        debug!(token = %token, "unregistered");
    }

    /// 本地是否有提供者；`recursive` 时沿父链继续查找
    pub fn is_registered(&self, token: impl Into<Token>, recursive: bool) -> bool {
        let token = token.into();
        if self.inner.registry.has(&token) {
            return true;
        }
        match &self.inner.parent {
            Some(parent) if recursive => parent.is_registered(token, true),
            _ => false,
        }
    }

    /// 装入模块
    pub fn load(&self, module: &dyn KernelModule) -> Result<(), KernelError> {
        debug!(module = module.name(), "loading module");
        module.load(self)
    }

    /// 本地拥有提供者的令牌
    pub fn registered_tokens(&self) -> Vec<Token> {
        self.inner.registry.tokens()
    }

    // ---------------------------------------------------------------------
    // 解析
    // ---------------------------------------------------------------------

    /// 解析服务 - 主要API
    pub async fn resolve(&self, token: impl Into<Token>) -> Result<Instance, KernelError> {
        self.resolve_with(token, Vec::new(), ResolutionContext::new())
            .await
    }

    /// 解析并转换成具体类型
    pub async fn resolve_as<T: Any + Send + Sync>(
        &self,
        token: impl Into<Token>,
    ) -> Result<Arc<T>, KernelError> {
        let token = token.into();
        let value = self.resolve(token.clone()).await?;
        downcast(&token, value)
    }

    /// 以类型自身为令牌解析
    pub async fn get<T: Any + Send + Sync>(&self) -> Result<Arc<T>, KernelError> {
        self.resolve_as::<T>(Token::of::<T>()).await
    }

    /// 带位置覆盖与显式上下文的解析
    ///
    /// 覆盖只作用于类提供者，并且总是构造新实例，不写入任何缓存。
    pub fn resolve_with(
        &self,
        token: impl Into<Token>,
        overrides: Vec<Override>,
        context: ResolutionContext,
    ) -> BoxFuture<'static, Result<Instance, KernelError>> {
        let overrides = overrides
            .into_iter()
            .map(|item| (item.index, item.value))
            .collect();
        self.resolve_token(token.into(), overrides, context, self.path.clone())
    }

    /// 解析令牌下的全部提供者，按注册顺序返回
    pub async fn resolve_all(&self, token: impl Into<Token>) -> Result<Vec<Instance>, KernelError> {
        self.resolve_all_with(token, ResolutionContext::new()).await
    }

    pub async fn resolve_all_as<T: Any + Send + Sync>(
        &self,
        token: impl Into<Token>,
    ) -> Result<Vec<Arc<T>>, KernelError> {
        let token = token.into();
        self.resolve_all(token.clone())
            .await?
            .into_iter()
            .map(|value| downcast(&token, value))
            .collect()
    }

    pub fn resolve_all_with(
        &self,
        token: impl Into<Token>,
        context: ResolutionContext,
    ) -> BoxFuture<'static, Result<Vec<Instance>, KernelError>> {
        self.resolve_all_inner(token.into(), context, self.path.clone())
    }

    fn lookup(&self, token: &Token) -> Result<Lookup, KernelError> {
        if let Some(provider) = self.inner.registry.get(token) {
            return Ok(Lookup::Local(provider));
        }
        if *token == Token::of::<Kernel>() {
            return Ok(Lookup::Kernel);
        }
        if let Some(parent) = &self.inner.parent {
            return Ok(Lookup::Parent(parent.clone()));
        }
        if self.inner.config.implicit_registration {
            if let Some(descriptor) = self.inner.descriptors.get(token) {
                let provider = Provider::Class(ClassProvider::new(descriptor, None)?);
                debug!(token = %token, "implicitly registered class");
                return Ok(Lookup::Local(
                    self.inner.registry.get_or_set(token.clone(), || provider),
                ));
            }
        }
        Err(KernelError::TokenNotFound(token.clone()))
    }

    fn resolve_token(
        &self,
        token: Token,
        overrides: BTreeMap<usize, Instance>,
        context: ResolutionContext,
        path: ResolutionPath,
    ) -> BoxFuture<'static, Result<Instance, KernelError>> {
        let kernel = self.clone();
        async move {
            kernel
                .inner
                .stats
                .total_resolutions
                .fetch_add(1, Ordering::Relaxed);
            if kernel.inner.config.trace_resolutions {
                debug!(token = %token, depth = path.depth(), "resolving");
            }

            match kernel.lookup(&token)? {
                Lookup::Local(provider) => {
                    kernel
                        .resolve_provider(token, provider, overrides, context, path)
                        .await
                }
                Lookup::Kernel => Ok(instance(kernel.detached())),
                Lookup::Parent(parent) => {
                    parent
                        .resolve_token(token, overrides, context, path)
                        .await
                }
            }
        }
        .boxed()
    }

    fn resolve_all_inner(
        &self,
        token: Token,
        context: ResolutionContext,
        path: ResolutionPath,
    ) -> BoxFuture<'static, Result<Vec<Instance>, KernelError>> {
        let kernel = self.clone();
        async move {
            let providers = kernel.inner.registry.get_all(&token);
            if providers.is_empty() {
                // 多绑定从不跨越父子边界合并
                return match &kernel.inner.parent {
                    Some(parent) => parent.resolve_all_inner(token, context, path).await,
                    None => Ok(Vec::new()),
                };
            }
            kernel
                .inner
                .stats
                .total_resolutions
                .fetch_add(providers.len(), Ordering::Relaxed);

            try_join_all(providers.iter().map(|provider| {
                kernel.resolve_provider(
                    token.clone(),
                    provider.clone(),
                    BTreeMap::new(),
                    context.clone(),
                    path.clone(),
                )
            }))
            .await
        }
        .boxed()
    }

    fn resolve_provider(
        &self,
        token: Token,
        provider: Arc<Provider>,
        overrides: BTreeMap<usize, Instance>,
        context: ResolutionContext,
        path: ResolutionPath,
    ) -> BoxFuture<'static, Result<Instance, KernelError>> {
        let kernel = self.clone();
        async move {
            if path.contains(&token) {
                return Err(KernelError::CircularDependency {
                    chain: path.chain_to(&token),
                });
            }
            let max_depth = kernel.inner.config.max_resolution_depth;
            if path.depth() >= max_depth {
                return Err(KernelError::ResolutionTooDeep { token, max_depth });
            }
            let path = path.push(&token);

            if !overrides.is_empty() {
                if let Provider::Class(class) = provider.as_ref() {
                    return kernel
                        .construct_class(token, class.clone(), overrides, context, path)
                        .await;
                }
            }

            match provider.lifecycle() {
                Lifecycle::Transient => kernel.construct(token, provider, context, path).await,
                Lifecycle::Singleton => {
                    kernel
                        .resolve_singleton(token, provider, context, path)
                        .await
                }
                Lifecycle::Scoped => kernel.resolve_scoped(token, provider, context, path).await,
            }
        }
        .boxed()
    }

    async fn resolve_singleton(
        &self,
        token: Token,
        provider: Arc<Provider>,
        context: ResolutionContext,
        path: ResolutionPath,
    ) -> Result<Instance, KernelError> {
        let key = CacheKey::new(&token, &provider);
        let (pending, generation, hit) = match self.inner.singletons.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let entry = entry.get();
                (entry.pending.clone(), entry.generation, true)
            }
            Entry::Vacant(entry) => {
                let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
                let pending = self
                    .construct(token.clone(), provider.clone(), context, path)
                    .shared();
                entry.insert(SingletonEntry {
                    generation,
                    pending: pending.clone(),
                    disposer: provider.disposer().cloned(),
                });
                (pending, generation, false)
            }
        };
        self.record_cache_lookup(hit);

        let result = pending.await;
        if result.is_err() {
            // 失败的构造不能留在缓存里，下一次解析重新构造
            self.inner
                .singletons
                .remove_if(&key, |_, entry| entry.generation == generation);
        }
        result
    }

    async fn resolve_scoped(
        &self,
        token: Token,
        provider: Arc<Provider>,
        context: ResolutionContext,
        path: ResolutionPath,
    ) -> Result<Instance, KernelError> {
        let key = CacheKey::new(&token, &provider);
        let (pending, hit) = context.get_or_start(&key, || {
            self.construct(token.clone(), provider.clone(), context.clone(), path)
                .shared()
        });
        self.record_cache_lookup(hit);

        let result = pending.clone().await;
        if result.is_err() {
            // 复用上下文的下一次解析重新构造
            context.remove_if(&key, &pending);
        }
        result
    }

    fn record_cache_lookup(&self, hit: bool) {
        let counter = if hit {
            &self.inner.stats.cache_hits
        } else {
            &self.inner.stats.cache_misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    // ---------------------------------------------------------------------
    // 构造
    // ---------------------------------------------------------------------

    fn construct(
        &self,
        token: Token,
        provider: Arc<Provider>,
        context: ResolutionContext,
        path: ResolutionPath,
    ) -> BoxFuture<'static, Result<Instance, KernelError>> {
        let kernel = self.clone();
        async move {
            kernel
                .inner
                .stats
                .constructions
                .fetch_add(1, Ordering::Relaxed);
            match provider.as_ref() {
                Provider::Value(value) => Ok(value.clone()),
                Provider::Alias(target) => {
                    kernel
                        .resolve_token(target.clone(), BTreeMap::new(), context, path)
                        .await
                }
                Provider::Factory(factory) => (factory.factory)(kernel.within(path))
                    .await
                    .map_err(|source| match source.downcast::<KernelError>() {
                        // 工厂内部解析的错误原样向上传递
                        Ok(error) => *error,
                        Err(source) => KernelError::FactoryFailure {
                            token,
                            source: Arc::from(source),
                        },
                    }),
                Provider::Class(class) => {
                    kernel
                        .construct_class(token, class.clone(), BTreeMap::new(), context, path)
                        .await
                }
            }
        }
        .boxed()
    }

    async fn construct_class(
        &self,
        token: Token,
        class: ClassProvider,
        overrides: BTreeMap<usize, Instance>,
        context: ResolutionContext,
        path: ResolutionPath,
    ) -> Result<Instance, KernelError> {
        let descriptor = class.descriptor.clone();
        let arity = descriptor.arity();
        if let Some((&index, _)) = overrides.range(arity..).next() {
            return Err(KernelError::InvalidOverride {
                token,
                index,
                arity,
            });
        }
        check_primitive_params(&descriptor, &class.params, &overrides)?;

        let params = try_join_all(class.params.iter().enumerate().map(|(index, requirement)| {
            match overrides.get(&index) {
                Some(value) => future::ready(Ok::<_, KernelError>(Injected::new(
                    requirement.token.clone(),
                    self.overridden(requirement, value.clone()),
                )))
                .boxed(),
                None => self.resolve_requirement(requirement.clone(), context.clone(), path.clone()),
            }
        }))
        .await?;

        let mut object = descriptor.instantiate(&Args::new(token.clone(), params))?;

        if !class.properties.is_empty() {
            let values = try_join_all(class.properties.iter().map(|requirement| {
                self.resolve_requirement(requirement.clone(), context.clone(), path.clone())
            }))
            .await?;
            for (requirement, value) in class.properties.iter().zip(values) {
                if let InjectionSite::Property(key) = &requirement.site {
                    descriptor.assign_property(key, object.as_mut(), value)?;
                }
            }
        }

        let built: Instance = Arc::from(object);
        if let Some(initializer) = &class.initializer {
            initializer(built.clone())
                .await
                .map_err(|source| KernelError::InitializeFailure {
                    token: token.clone(),
                    source: Arc::from(source),
                })?;
        }
        Ok(built)
    }

    /// 覆盖值按需求的修饰符交付，如同它是某个令牌唯一的提供者
    fn overridden(&self, requirement: &ParamRequirement, value: Instance) -> Resolved {
        if requirement.auto_factory {
            let scratch = self.detached().get_child_kernel();
            let token = Token::symbol(requirement.token.display_name());
            scratch.register_instance(token.clone(), value);
            Resolved::Factory(AutoFactory::new(scratch, token))
        } else if requirement.multi {
            Resolved::Many(vec![value])
        } else {
            Resolved::One(value)
        }
    }

    fn resolve_requirement(
        &self,
        requirement: ParamRequirement,
        context: ResolutionContext,
        path: ResolutionPath,
    ) -> BoxFuture<'static, Result<Injected, KernelError>> {
        let kernel = self.clone();
        async move {
            let value = if requirement.auto_factory {
                Resolved::Factory(AutoFactory::new(kernel.detached(), requirement.token.clone()))
            } else if requirement.multi {
                Resolved::Many(
                    kernel
                        .resolve_all_inner(requirement.token.clone(), context, path)
                        .await?,
                )
            } else {
                match kernel
                    .resolve_token(requirement.token.clone(), BTreeMap::new(), context, path)
                    .await
                {
                    Ok(value) => Resolved::One(value),
                    Err(error) if requirement.optional && error.is_not_found_for(&requirement.token) => {
                        Resolved::Absent
                    }
                    Err(error) => return Err(error),
                }
            };
            Ok(Injected::new(requirement.token, value))
        }
        .boxed()
    }

    // ---------------------------------------------------------------------
    // 释放与统计
    // ---------------------------------------------------------------------

    /// 释放本内核的全部单例，然后级联释放父内核
    ///
    /// 单例缓存被整体取出后再逐个等待，因此重复调用不会重复释放同一个实例。
    /// 所有钩子都会执行；返回遇到的第一个错误。
    pub fn dispose(&self) -> BoxFuture<'static, Result<(), KernelError>> {
        let kernel = self.clone();
        async move {
            let timer = OperationTimer::new("kernel.dispose");
            let keys: Vec<CacheKey> = kernel
                .inner
                .singletons
                .iter()
                .map(|entry| entry.key().clone())
                .collect();
            let mut entries: Vec<(CacheKey, SingletonEntry)> = keys
                .into_iter()
                .filter_map(|key| kernel.inner.singletons.remove(&key))
                .collect();
            entries.sort_by(|a, b| b.1.generation.cmp(&a.1.generation));

            let cached = entries.len();
            let mut disposed = 0usize;
            let mut first_error = None;
            for (key, entry) in entries {
                let Ok(built) = entry.pending.await else {
                    continue;
                };
                let Some(disposer) = entry.disposer else {
                    continue;
                };
                match disposer(built).await {
                    Ok(()) => disposed += 1,
                    Err(source) => {
                        warn!(token = %key.token, error = %source, "disposer failed");
                        first_error.get_or_insert(KernelError::DisposeFailure {
                            token: key.token,
                            source: Arc::from(source),
                        });
                    }
                }
            }
            info!(cached, disposed, "kernel disposed");
            timer.with_metadata("singletons", cached).finish();

            let parent_result = match &kernel.inner.parent {
                Some(parent) => parent.dispose().await,
                None => Ok(()),
            };
            match first_error {
                Some(error) => Err(error),
                None => parent_result,
            }
        }
        .boxed()
    }

    /// 获取内核统计信息
    pub fn stats(&self) -> KernelStats {
        let stats = &self.inner.stats;
        KernelStats {
            total_resolutions: stats.total_resolutions.load(Ordering::Relaxed),
            cache_hits: stats.cache_hits.load(Ordering::Relaxed),
            cache_misses: stats.cache_misses.load(Ordering::Relaxed),
            constructions: stats.constructions.load(Ordering::Relaxed),
        }
    }

    /// 当前缓存的单例数量（包括仍在构造中的）
    pub fn singleton_count(&self) -> usize {
        self.inner.singletons.len()
    }
}

fn check_primitive_params(
    descriptor: &ClassDescriptor,
    params: &[ParamRequirement],
    overrides: &BTreeMap<usize, Instance>,
) -> Result<(), KernelError> {
    let offending = params
        .iter()
        .enumerate()
        .find(|(index, requirement)| {
            !overrides.contains_key(index) && requirement.token.is_primitive()
        });
    match offending {
        Some((index, _)) => Err(KernelError::PrimitiveInjectionRejected {
            class: descriptor.name(),
            index,
            signature: params
                .iter()
                .map(|requirement| requirement.token.display_name())
                .collect::<Vec<_>>()
                .join(","),
        }),
        None => Ok(()),
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("tokens", &self.inner.registry.len())
            .field("singletons", &self.inner.singletons.len())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}

/// 内核统计信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelStats {
    pub total_resolutions: usize,
    /// 单例与作用域缓存命中
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// 提供者被实际调用的次数
    pub constructions: usize,
}

impl KernelStats {
    pub fn total(&self) -> usize {
        self.total_resolutions
    }

    /// 获取缓存命中率
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::container::Dependency;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug)]
    struct TestService {
        id: usize,
    }

    fn counting_descriptor(counter: Arc<AtomicUsize>, lifecycle: Lifecycle) -> Arc<ClassDescriptor> {
        ClassDescriptor::builder::<TestService>()
            .lifecycle(lifecycle)
            .construct(move |_| {
                Ok(TestService {
                    id: counter.fetch_add(1, Ordering::SeqCst),
                })
            })
    }

    #[tokio::test]
    async fn test_transient_builds_every_time() {
        let kernel = Kernel::new();
        let counter = Arc::new(AtomicUsize::new(0));
        kernel
            .register_class_as("svc", counting_descriptor(counter.clone(), Lifecycle::Transient))
            .unwrap();

        let first = kernel.resolve_as::<TestService>("svc").await.unwrap();
        let second = kernel.resolve_as::<TestService>("svc").await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_singleton_builds_once() {
        let kernel = Kernel::new();
        let counter = Arc::new(AtomicUsize::new(0));
        kernel
            .register_class_as("svc", counting_descriptor(counter.clone(), Lifecycle::Singleton))
            .unwrap();

        for _ in 0..10 {
            kernel.resolve_as::<TestService>("svc").await.unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let stats = kernel.stats();
        assert_eq!(stats.total(), 10);
        assert_eq!(stats.cache_hits, 9);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.constructions, 1);
        assert!(stats.hit_rate() > 0.8);
    }

    #[tokio::test]
    async fn test_token_not_found() {
        let kernel = Kernel::new();
        let result = kernel.resolve("Foo3").await;
        assert!(matches!(result, Err(KernelError::TokenNotFound(token)) if token == Token::named("Foo3")));
    }

    #[tokio::test]
    async fn test_register_class_without_descriptor_is_invalid() {
        let kernel = Kernel::new();
        let result = kernel.register_class("Foo", None, None);
        assert!(matches!(result, Err(KernelError::InvalidRegistration(_))));
    }

    #[tokio::test]
    async fn test_resolving_kernel_yields_self() {
        let kernel = Kernel::new();
        let child = kernel.get_child_kernel();

        let resolved = child.get::<Kernel>().await.unwrap();
        assert!(resolved.ptr_eq(&child));
        assert!(!resolved.ptr_eq(&kernel));
    }

    #[tokio::test]
    async fn test_primitive_param_rejected_at_construction() {
        struct Greeter;
        let kernel = Kernel::new();
        kernel
            .register_class_as(
                "greeter",
                ClassDescriptor::builder::<Greeter>()
                    .param(Dependency::of::<TestService>())
                    .param(Dependency::of::<String>())
                    .construct(|_| Ok(Greeter)),
            )
            .unwrap();

        let err = kernel.resolve("greeter").await.err().unwrap();
        assert_eq!(
            err.to_string(),
            "can not inject primitive type at param 1 in Greeter(TestService,String)"
        );
    }

    #[tokio::test]
    async fn test_factory_failure_is_wrapped() {
        let kernel = Kernel::new();
        kernel.register_factory(
            "broken",
            |_kernel| async { Err::<u32, _>(std::io::Error::other("offline")) },
            (),
        );
        let err = kernel.resolve("broken").await.err().unwrap();
        assert!(matches!(err, KernelError::FactoryFailure { .. }));
        assert!(err.to_string().contains("offline"));
    }
}
