//! 容器模块：注册表、解析内核与自动工厂

pub mod args;
pub mod auto_factory;
pub mod context;
pub mod descriptor;
pub mod kernel;
pub mod registry;
pub mod token;
pub mod tree;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::KernelError;

pub use args::{instance, Args, Injected, Instance, Override, Resolved};
pub use auto_factory::AutoFactory;
pub use context::ResolutionContext;
pub use descriptor::{
    ClassDescriptor, ClassDescriptorBuilder, Dependency, DescriptorStore, InjectionSite,
    ParamRequirement,
};
pub use kernel::{Kernel, KernelStats};
pub use registry::Registry;
pub use token::Token;
pub use tree::DependencyNode;

/// 实例的生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Lifecycle {
    /// 每次解析都构造新实例
    #[default]
    Transient,
    /// 在所属内核的生命期内只构造一次
    Singleton,
    /// 在一次顶层解析的调用图内共享
    Scoped,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Transient => "Transient",
            Lifecycle::Singleton => "Singleton",
            Lifecycle::Scoped => "Scoped",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lifecycle {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transient" => Ok(Lifecycle::Transient),
            "singleton" => Ok(Lifecycle::Singleton),
            "scoped" => Ok(Lifecycle::Scoped),
            _ => Err(KernelError::UnknownLifecycle(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_parse() {
        assert_eq!("singleton".parse::<Lifecycle>().unwrap(), Lifecycle::Singleton);
        assert_eq!("Scoped".parse::<Lifecycle>().unwrap(), Lifecycle::Scoped);
        assert!(matches!(
            "forever".parse::<Lifecycle>(),
            Err(KernelError::UnknownLifecycle(name)) if name == "forever"
        ));
    }

    #[test]
    fn test_lifecycle_serde_names() {
        assert_eq!(
            serde_json::to_string(&Lifecycle::Transient).unwrap(),
            "\"Transient\""
        );
        let parsed: Lifecycle = serde_json::from_str("\"Singleton\"").unwrap();
        assert_eq!(parsed, Lifecycle::Singleton);
        assert_eq!(Lifecycle::default(), Lifecycle::Transient);
    }
}
