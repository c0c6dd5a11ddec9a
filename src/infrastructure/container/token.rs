//! 注入令牌
//!
//! 令牌是注册表唯一的寻址方式：类型标识、字符串或符号。
//! 两个不同的令牌永远不会落到同一个注册槽位，别名必须通过
//! `Kernel::register_token` 显式声明。

use lazy_static::lazy_static;
use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

lazy_static! {
    /// 语言内置的值类型，作为参数令牌出现时说明调用方忘了提供显式令牌
    static ref PRIMITIVE_TYPES: HashSet<TypeId> = [
        TypeId::of::<bool>(),
        TypeId::of::<char>(),
        TypeId::of::<i8>(),
        TypeId::of::<i16>(),
        TypeId::of::<i32>(),
        TypeId::of::<i64>(),
        TypeId::of::<i128>(),
        TypeId::of::<isize>(),
        TypeId::of::<u8>(),
        TypeId::of::<u16>(),
        TypeId::of::<u32>(),
        TypeId::of::<u64>(),
        TypeId::of::<u128>(),
        TypeId::of::<usize>(),
        TypeId::of::<f32>(),
        TypeId::of::<f64>(),
        TypeId::of::<String>(),
        TypeId::of::<&'static str>(),
        TypeId::of::<()>(),
    ]
    .into_iter()
    .collect();
}

/// 泛型容器族：`Vec<_>`、`HashMap<_, _>`、装箱闭包
const PRIMITIVE_TYPE_PREFIXES: &[&str] = &[
    "alloc::vec::Vec<",
    "std::collections::hash::map::HashMap<",
    "alloc::boxed::Box<dyn core::ops::function::Fn",
];

/// 注入令牌
#[derive(Clone)]
pub enum Token {
    /// 类型标识
    Type { id: TypeId, name: &'static str },
    /// 字符串令牌
    Name(Arc<str>),
    /// 符号令牌，每次创建都是唯一的
    Symbol { id: u64, description: Arc<str> },
}

impl Token {
    /// 类型 `T` 的令牌
    pub fn of<T: ?Sized + 'static>() -> Self {
        Token::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// 字符串令牌
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Token::Name(name.into())
    }

    /// 新建一个唯一符号，描述相同的两个符号依然不同
    pub fn symbol(description: impl Into<Arc<str>>) -> Self {
        Token::Symbol {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            description: description.into(),
        }
    }

    pub fn is_type(&self) -> bool {
        matches!(self, Token::Type { .. })
    }

    /// 是否是内置基础类型的标识
    pub fn is_primitive(&self) -> bool {
        match self {
            Token::Type { id, name } => {
                PRIMITIVE_TYPES.contains(id)
                    || PRIMITIVE_TYPE_PREFIXES
                        .iter()
                        .any(|prefix| name.starts_with(prefix))
            }
            _ => false,
        }
    }

    /// 简短可读的名称，用于错误信息和依赖树节点
    pub fn display_name(&self) -> String {
        match self {
            Token::Type { name, .. } => short_type_name(name),
            Token::Name(name) => name.to_string(),
            Token::Symbol { description, .. } => format!("Symbol({})", description),
        }
    }
}

/// `my_crate::services::Foo<alloc::string::String>` -> `Foo<String>`
fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for ch in full.chars() {
        match ch {
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';' => {
                out.push_str(last_path_segment(&segment));
                segment.clear();
                out.push(ch);
            }
            _ => segment.push(ch),
        }
    }
    out.push_str(last_path_segment(&segment));
    out
}

fn last_path_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Token::Type { id: a, .. }, Token::Type { id: b, .. }) => a == b,
            (Token::Name(a), Token::Name(b)) => a == b,
            (Token::Symbol { id: a, .. }, Token::Symbol { id: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Token::Type { id, .. } => id.hash(state),
            Token::Name(name) => name.hash(state),
            Token::Symbol { id, .. } => id.hash(state),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Type { name, .. } => write!(f, "Type({})", name),
            Token::Name(name) => write!(f, "Name({:?})", name),
            Token::Symbol { id, description } => write!(f, "Symbol({}#{})", description, id),
        }
    }
}

impl From<&str> for Token {
    fn from(name: &str) -> Self {
        Token::named(name)
    }
}

impl From<String> for Token {
    fn from(name: String) -> Self {
        Token::named(name)
    }
}

impl From<&Token> for Token {
    fn from(token: &Token) -> Self {
        token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Foo;
    struct Wrapper<T>(T);

    #[test]
    fn test_type_tokens_compare_by_type_id() {
        assert_eq!(Token::of::<Foo>(), Token::of::<Foo>());
        assert_ne!(Token::of::<Foo>(), Token::of::<String>());
        assert_ne!(Token::of::<Foo>(), Token::named("Foo"));
    }

    #[test]
    fn test_symbols_are_unique() {
        let a = Token::symbol("config");
        let b = Token::symbol("config");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(a.display_name(), "Symbol(config)");
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Token::of::<Foo>().display_name(), "Foo");
        assert_eq!(
            Token::of::<Wrapper<String>>().display_name(),
            "Wrapper<String>"
        );
        assert_eq!(Token::named("value").to_string(), "value");
    }

    #[test]
    fn test_primitive_detection() {
        assert!(Token::of::<String>().is_primitive());
        assert!(Token::of::<u32>().is_primitive());
        assert!(Token::of::<f64>().is_primitive());
        assert!(!Token::of::<Foo>().is_primitive());
        assert!(!Token::named("String").is_primitive());
    }
}
