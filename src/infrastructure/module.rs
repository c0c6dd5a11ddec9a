//! 内核模块
//!
//! 把一组相关的注册打包，通过 `Kernel::load` 一次性装入。

use crate::errors::KernelError;
use crate::infrastructure::container::Kernel;

/// 模块接口
pub trait KernelModule: Send + Sync {
    /// 模块名称，用于日志
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// 把模块内的提供者注册到 `kernel`
    fn load(&self, kernel: &Kernel) -> Result<(), KernelError>;
}

/// 闭包也可以直接作为模块
impl<F> KernelModule for F
where
    F: Fn(&Kernel) -> Result<(), KernelError> + Send + Sync,
{
    fn load(&self, kernel: &Kernel) -> Result<(), KernelError> {
        self(kernel)
    }
}
