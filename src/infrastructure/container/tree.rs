//! 依赖树
//!
//! 只遍历提供者描述，不执行任何工厂，也不构造任何实例。遍历在注册表的
//! 副本上进行，隐式注册只写入副本，活动内核保持不变。

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::context::ResolutionPath;
use super::kernel::Kernel;
use super::registry::Registry;
use super::token::Token;
use super::Lifecycle;
use crate::errors::KernelError;
use crate::infrastructure::provider::{ClassProvider, Provider};
use crate::logging::OperationTimer;

/// 依赖树节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyNode {
    pub name: String,
    pub lifecycle: Lifecycle,
    pub children: Vec<DependencyNode>,
}

impl DependencyNode {
    pub fn leaf(name: impl Into<String>, lifecycle: Lifecycle) -> Self {
        Self {
            name: name.into(),
            lifecycle,
            children: Vec::new(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// 深度优先查找第一个同名节点
    pub fn find(&self, name: &str) -> Option<&DependencyNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    /// 节点总数，包括自身
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(DependencyNode::count).sum::<usize>()
    }
}

impl Kernel {
    /// 描述 `token` 的依赖树
    ///
    /// 可选参数找不到时从树中剪除，其余缺失令牌仍然返回 `TokenNotFound`。
    pub fn dependency_tree(&self, token: impl Into<Token>) -> Result<DependencyNode, KernelError> {
        let token = token.into();
        let timer = OperationTimer::new("kernel.dependency_tree").with_metadata("token", &token);
        let node = self.tree_from(&token, &ResolutionPath::default())?;
        timer.with_metadata("nodes", node.count()).finish();
        Ok(node)
    }

    fn tree_from(&self, token: &Token, path: &ResolutionPath) -> Result<DependencyNode, KernelError> {
        let scratch = self.inner.registry.clone();
        self.tree_node(&scratch, token, path)
    }

    fn tree_node(
        &self,
        scratch: &Registry<Provider>,
        token: &Token,
        path: &ResolutionPath,
    ) -> Result<DependencyNode, KernelError> {
        if path.contains(token) {
            return Err(KernelError::CircularDependency {
                chain: path.chain_to(token),
            });
        }
        let max_depth = self.inner.config.max_resolution_depth;
        if path.depth() >= max_depth {
            return Err(KernelError::ResolutionTooDeep {
                token: token.clone(),
                max_depth,
            });
        }

        let provider = match scratch.get(token) {
            Some(provider) => provider,
            None if *token == Token::of::<Kernel>() => {
                return Ok(DependencyNode::leaf(token.display_name(), Lifecycle::Transient));
            }
            None => match &self.inner.parent {
                // 父内核的子树在父内核自己的副本上描述
                Some(parent) => return parent.tree_from(token, path),
                None => self.implicit_provider(scratch, token)?,
            },
        };

        let path = path.push(token);
        let children = match provider.as_ref() {
            Provider::Class(class) => class
                .params
                .iter()
                .filter_map(|requirement| {
                    match self.tree_node(scratch, &requirement.token, &path) {
                        Err(error)
                            if requirement.optional
                                && error.is_not_found_for(&requirement.token) =>
                        {
                            None
                        }
                        result => Some(result),
                    }
                })
                .collect::<Result<Vec<_>, _>>()?,
            Provider::Alias(target) => vec![self.tree_node(scratch, target, &path)?],
            Provider::Value(_) | Provider::Factory(_) => Vec::new(),
        };

        Ok(DependencyNode {
            name: token.display_name(),
            lifecycle: provider.lifecycle(),
            children,
        })
    }

    fn implicit_provider(
        &self,
        scratch: &Registry<Provider>,
        token: &Token,
    ) -> Result<Arc<Provider>, KernelError> {
        let descriptor = self
            .inner
            .descriptors
            .get(token)
            .filter(|_| self.inner.config.implicit_registration)
            .ok_or_else(|| KernelError::TokenNotFound(token.clone()))?;
        let provider = Provider::Class(ClassProvider::new(descriptor, None)?);
        Ok(scratch.get_or_set(token.clone(), || provider))
    }
}
