//! 基础设施层
//!
//! 提供依赖注入内核的全部实现：
//! - 令牌、描述符与注册表
//! - 解析内核与自动工厂
//! - 提供者与模块

pub mod container;
pub mod module;
pub mod provider;

// 重新导出API
pub use container::{
    AutoFactory, ClassDescriptor, Dependency, DependencyNode, DescriptorStore, Kernel,
    KernelStats, Lifecycle, ResolutionContext, Token,
};
pub use module::KernelModule;
pub use provider::{Disposable, FactoryOptions, Provider, RegistrationOptions};
