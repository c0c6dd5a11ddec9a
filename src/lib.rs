pub mod config;
pub mod errors;
pub mod infrastructure; // 依赖注入内核
pub mod logging;

// 重新导出常用项
pub use config::KernelConfig;
pub use errors::{BoxError, ConfigError, KernelError};
pub use infrastructure::container::{
    instance, Args, AutoFactory, ClassDescriptor, Dependency, DependencyNode, DescriptorStore,
    Injected, Instance, Kernel, KernelStats, Lifecycle, Override, Resolved, ResolutionContext,
    Token,
};
pub use infrastructure::module::KernelModule;
pub use infrastructure::provider::{Disposable, FactoryOptions, RegistrationOptions};
