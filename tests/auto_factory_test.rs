//! 自动工厂与参数覆盖的集成测试

use kernel_di::{
    instance, AutoFactory, ClassDescriptor, Dependency, DescriptorStore, Kernel, KernelError,
    Token,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Bar;

struct Foo {
    name: Arc<String>,
    bar: Arc<Bar>,
    size: Arc<u32>,
}

struct FooMaker {
    factory: AutoFactory,
}

fn store(built: Arc<AtomicUsize>) -> DescriptorStore {
    DescriptorStore::new()
        .with(ClassDescriptor::builder::<Bar>().singleton().construct(|_| Ok(Bar)))
        .with(
            ClassDescriptor::builder::<Foo>()
                .param(Dependency::of::<String>())
                .param(Dependency::of::<Bar>())
                .param(Dependency::of::<u32>())
                .construct(move |args| {
                    built.fetch_add(1, Ordering::SeqCst);
                    Ok(Foo {
                        name: args.get(0)?,
                        bar: args.get(1)?,
                        size: args.get(2)?,
                    })
                }),
        )
        .with(
            ClassDescriptor::builder::<FooMaker>()
                .param(Dependency::of::<Foo>().auto_factory())
                .construct(|args| {
                    Ok(FooMaker {
                        factory: args.factory(0)?,
                    })
                }),
        )
}

#[tokio::test]
async fn test_create_with_sparse_args_fills_gaps_from_registry() {
    let kernel = Kernel::with_descriptors(Arc::new(store(Arc::new(AtomicUsize::new(0)))));
    let factory = AutoFactory::new(kernel.clone(), Token::of::<Foo>());

    let foo = factory
        .create_with_args_as::<Foo, _>([(0, instance("x".to_string())), (2, instance(5u32))])
        .await
        .unwrap();

    assert_eq!(foo.name.as_str(), "x");
    assert_eq!(*foo.size, 5);
    let bar = kernel.get::<Bar>().await.unwrap();
    assert!(Arc::ptr_eq(&foo.bar, &bar));
}

#[tokio::test]
async fn test_plain_resolution_rejects_primitive_params() {
    let kernel = Kernel::with_descriptors(Arc::new(store(Arc::new(AtomicUsize::new(0)))));
    let err = kernel.get::<Foo>().await.err().unwrap();
    assert_eq!(
        err.to_string(),
        "can not inject primitive type at param 0 in Foo(String,Bar,u32)"
    );

    // 只覆盖一部分基础类型参数时，剩下的依然被拒绝
    let factory = AutoFactory::new(kernel, Token::of::<Foo>());
    let err = factory
        .create_with_args([(0, instance("x".to_string()))])
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        KernelError::PrimitiveInjectionRejected { index: 2, .. }
    ));
}

#[tokio::test]
async fn test_injected_factory_defers_construction() {
    let built = Arc::new(AtomicUsize::new(0));
    let kernel = Kernel::with_descriptors(Arc::new(store(built.clone())));

    let maker = kernel.get::<FooMaker>().await.unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 0);
    assert_eq!(maker.factory.token(), &Token::of::<Foo>());

    let first = maker
        .factory
        .create_as::<Foo>(vec![instance("a".to_string()), instance(Bar), instance(1u32)])
        .await
        .unwrap();
    let second = maker
        .factory
        .create_as::<Foo>(vec![instance("b".to_string()), instance(Bar), instance(2u32)])
        .await
        .unwrap();

    assert_eq!(built.load(Ordering::SeqCst), 2);
    assert_eq!(first.name.as_str(), "a");
    assert_eq!(second.name.as_str(), "b");
    assert_eq!(*second.size, 2);
}

#[tokio::test]
async fn test_overrides_bypass_singleton_cache() {
    struct Counter {
        start: Arc<u64>,
    }
    let kernel = Kernel::new();
    kernel.register_value("start", 0u64);
    kernel
        .register_class_as(
            "counter",
            ClassDescriptor::builder::<Counter>()
                .param(Dependency::token("start"))
                .singleton()
                .construct(|args| Ok(Counter { start: args.get(0)? })),
        )
        .unwrap();

    let cached = kernel.resolve_as::<Counter>("counter").await.unwrap();
    let factory = AutoFactory::new(kernel.clone(), "counter");
    let fresh = factory
        .create_with_args_as::<Counter, _>([(0, instance(10u64))])
        .await
        .unwrap();

    assert_eq!(*cached.start, 0);
    assert_eq!(*fresh.start, 10);
    assert!(!Arc::ptr_eq(&cached, &fresh));

    // 缓存没有被覆盖
    let again = kernel.resolve_as::<Counter>("counter").await.unwrap();
    assert!(Arc::ptr_eq(&cached, &again));
    assert_eq!(kernel.singleton_count(), 1);
}

#[tokio::test]
async fn test_overrides_are_ignored_by_non_class_providers() {
    let kernel = Kernel::new();
    kernel.register_value("port", 8080u16);
    let factory = AutoFactory::new(kernel, "port");

    let port = factory
        .create_with_args_as::<u16, _>([(0, instance(1u16))])
        .await
        .unwrap();
    assert_eq!(*port, 8080);
}

#[tokio::test]
async fn test_factory_for_unknown_token() {
    let factory = AutoFactory::new(Kernel::new(), "missing");
    let err = factory.create(Vec::new()).await.err().unwrap();
    assert!(err.is_not_found_for(&Token::named("missing")));
}

struct Item;

struct Holder {
    items: Vec<Arc<Item>>,
}

fn holder_kernel() -> Kernel {
    let kernel = Kernel::new();
    kernel
        .register_class_as(
            "holder",
            ClassDescriptor::builder::<Holder>()
                .param(Dependency::token("item").multi())
                .construct(|args| Ok(Holder { items: args.all(0)? })),
        )
        .unwrap();
    kernel
}

#[tokio::test]
async fn test_override_of_multi_param_is_a_single_element_list() {
    let kernel = holder_kernel();
    kernel.register_value("item", Item);
    kernel.register_value("item", Item);
    let registered = kernel.resolve_as::<Holder>("holder").await.unwrap();
    assert_eq!(registered.items.len(), 2);

    let factory = AutoFactory::new(kernel, "holder");
    let supplied = Arc::new(Item);
    let holder = factory
        .create_with_args_as::<Holder, _>([(0, supplied.clone() as kernel_di::Instance)])
        .await
        .unwrap();
    assert_eq!(holder.items.len(), 1);
    assert!(Arc::ptr_eq(&holder.items[0], &supplied));
}

#[tokio::test]
async fn test_override_of_auto_factory_param_yields_the_value() {
    let kernel = Kernel::with_descriptors(Arc::new(store(Arc::new(AtomicUsize::new(0)))));
    let supplied = Arc::new(Foo {
        name: Arc::new("given".to_string()),
        bar: Arc::new(Bar),
        size: Arc::new(9),
    });

    let factory = AutoFactory::new(kernel, Token::of::<FooMaker>());
    let maker = factory
        .create_with_args_as::<FooMaker, _>([(0, supplied.clone() as kernel_di::Instance)])
        .await
        .unwrap();

    let foo = maker.factory.create_as::<Foo>(Vec::new()).await.unwrap();
    assert!(Arc::ptr_eq(&foo, &supplied));
}
