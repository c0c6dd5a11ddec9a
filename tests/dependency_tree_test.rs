//! 依赖树的集成测试

#![allow(dead_code)]

use kernel_di::{
    BoxError, ClassDescriptor, Dependency, DependencyNode, DescriptorStore, Kernel, KernelError,
    Lifecycle, Token,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Engine;
struct Gearbox;
struct Car;
struct Radio;

fn garage(built: Arc<AtomicUsize>) -> DescriptorStore {
    DescriptorStore::new()
        .with(ClassDescriptor::builder::<Engine>().singleton().construct(move |_| {
            built.fetch_add(1, Ordering::SeqCst);
            Ok(Engine)
        }))
        .with(
            ClassDescriptor::builder::<Gearbox>()
                .param(Dependency::token("ratio"))
                .construct(|_| Ok(Gearbox)),
        )
        .with(
            ClassDescriptor::builder::<Car>()
                .param(Dependency::of::<Engine>())
                .param(Dependency::of::<Gearbox>())
                .param(Dependency::of::<Radio>().optional())
                .construct(|_| Ok(Car)),
        )
}

#[test]
fn test_class_with_two_dependencies() {
    let built = Arc::new(AtomicUsize::new(0));
    let kernel = Kernel::with_descriptors(Arc::new(garage(built.clone())));
    kernel.register_value("ratio", 3.5f64);
    let tokens_before = kernel.registered_tokens().len();

    let tree = kernel.dependency_tree(Token::of::<Car>()).unwrap();

    assert_eq!(tree.name, "Car");
    assert_eq!(tree.lifecycle, Lifecycle::Transient);
    let names: Vec<&str> = tree.children.iter().map(|c| c.name.as_str()).collect();
    // 找不到的可选参数被剪除
    assert_eq!(names, vec!["Engine", "Gearbox"]);
    assert_eq!(tree.children[0].lifecycle, Lifecycle::Singleton);
    assert_eq!(tree.children[1].children[0].name, "ratio");
    assert_eq!(tree.count(), 4);

    // 遍历不构造实例，也不修改活动内核
    assert_eq!(built.load(Ordering::SeqCst), 0);
    assert_eq!(kernel.registered_tokens().len(), tokens_before);
    assert!(!kernel.is_registered(Token::of::<Car>(), false));
    assert_eq!(kernel.singleton_count(), 0);
}

#[test]
fn test_missing_required_token() {
    let kernel = Kernel::with_descriptors(Arc::new(garage(Arc::new(AtomicUsize::new(0)))));
    let err = kernel.dependency_tree(Token::of::<Car>()).unwrap_err();
    assert!(err.is_not_found_for(&Token::named("ratio")));
}

#[test]
fn test_factories_are_leaves_and_never_called() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let kernel = Kernel::new();
    kernel.register_factory(
        "clock",
        move |_kernel| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, BoxError>(0u64) }
        },
        Lifecycle::Singleton,
    );

    let tree = kernel.dependency_tree("clock").unwrap();
    assert_eq!(tree, DependencyNode::leaf("clock", Lifecycle::Singleton));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_child_tree_descends_into_parent() {
    let parent = Kernel::new();
    parent.register_value("url", "postgres://".to_string());
    let child = parent.get_child_kernel();
    child.register_token("db", "url");

    let tree = child.dependency_tree("db").unwrap();
    assert_eq!(tree.find("url").map(|node| node.children.len()), Some(0));
    assert!(parent.dependency_tree("db").is_err());
}

#[test]
fn test_class_cycle_is_reported() {
    struct Ping;
    struct Pong;
    let store = DescriptorStore::new()
        .with(
            ClassDescriptor::builder::<Ping>()
                .param(Dependency::of::<Pong>())
                .construct(|_| Ok(Ping)),
        )
        .with(
            ClassDescriptor::builder::<Pong>()
                .param(Dependency::of::<Ping>())
                .construct(|_| Ok(Pong)),
        );
    let kernel = Kernel::with_descriptors(Arc::new(store));

    let err = kernel.dependency_tree(Token::of::<Ping>()).unwrap_err();
    assert!(matches!(err, KernelError::CircularDependency { ref chain } if chain.len() == 3));
    assert_eq!(
        err.to_string(),
        "circular dependency detected: Ping -> Pong -> Ping"
    );
}

#[test]
fn test_tree_serializes_to_json() {
    let kernel = Kernel::new();
    kernel.register_value("ratio", 1.0f64);
    kernel.register_token("alias", "ratio");

    let json = kernel.dependency_tree("alias").unwrap().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["name"], "alias");
    assert_eq!(value["children"][0]["name"], "ratio");
}
