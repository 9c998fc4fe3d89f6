//! 服务表变换与初始化序列测试

use super::{greet_spec, realm};
use crate::arena::{ArenaBuilder, LifetimeSetup};
use crate::invocation::InvocationType;
use crate::operation::{OperationSetup, OperationSpec, OperationTarget};
use crate::resolution::BindingResolution;
use crate::service::{BuildContext, InitializationPlan, ServiceBuild, ServiceMap, ServiceRegistry};
use di_abstractions::{
    decorator, value, Arguments, Key, ServiceLocator, ServiceMode, ServiceTransformer,
    ServiceView, Variable,
};
use infrastructure_common::{OperationError, RegistryError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn services() -> ServiceMap<ServiceBuild> {
    ServiceMap::new(BuildContext::new(LifetimeSetup::default(), realm()))
}

fn operation(spec: OperationSpec) -> OperationSetup {
    OperationSetup::new(spec, realm(), InvocationType::lifetime()).unwrap()
}

fn counter_spec(calls: Arc<AtomicU32>) -> OperationSpec {
    OperationSpec::from_fn("counter", OperationTarget::function::<u32>(), move |_: &Arguments| {
        value(calls.fetch_add(1, Ordering::SeqCst) + 1)
    })
}

fn finalize(map: ServiceMap<ServiceBuild>) -> ServiceRegistry {
    let plan = InitializationPlan::prepare(map).unwrap();
    let arena = Arc::new(plan.layout().allocate());
    plan.initialize(arena, Some("/test".to_string())).unwrap()
}

#[test]
fn test_map_binds_from_services_and_becomes_constant() {
    let mut map = services();
    map.provide_instance(Key::of::<String>(), value("ab".to_string()))
        .unwrap();
    map.provide_instance(Key::of::<u32>(), value(2u32)).unwrap();
    map.map(Key::named::<String>("greeting"), operation(greet_spec()))
        .unwrap();

    let greeting = map.get(&Key::named::<String>("greeting")).unwrap();
    assert_eq!(greeting.mode(), ServiceMode::Constant);
    assert!(greeting.arena_slot().is_some());

    let registry = finalize(map);
    let first = registry
        .use_key::<String>(&Key::named::<String>("greeting"))
        .unwrap();
    let second = registry
        .use_key::<String>(&Key::named::<String>("greeting"))
        .unwrap();
    assert_eq!(*first, "Hello abab");
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_map_fails_on_missing_required_dependency() {
    let mut map = services();
    map.provide_instance(Key::of::<String>(), value("x".to_string()))
        .unwrap();
    let err = map
        .map(Key::named::<String>("greeting"), operation(greet_spec()))
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::UnresolvedDependency {
            operation: "greet".to_string(),
            key: Key::of::<u32>().to_string(),
        }
    );
}

#[test]
fn test_map_rejects_foreign_shape() {
    let mut map = services();
    let op = OperationSetup::new(greet_spec(), realm(), InvocationType::empty()).unwrap();
    assert!(matches!(
        map.map(Key::of::<String>(), op),
        Err(RegistryError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_prototype_dependency_makes_service_transient() {
    let calls = Arc::new(AtomicU32::new(0));
    let mut map = services();
    map.map(Key::of::<u32>(), operation(counter_spec(Arc::clone(&calls))))
        .unwrap();
    assert_eq!(map.get(&Key::of::<u32>()).unwrap().mode(), ServiceMode::Constant);

    // 依赖原型服务的操作本身也是原型
    let mut transient = services();
    let counter = operation(counter_spec(Arc::clone(&calls))).compile().unwrap();
    transient
        .provide(Key::of::<u32>(), ServiceMode::Transient, counter)
        .unwrap();
    transient
        .provide_instance(Key::of::<String>(), value("n".to_string()))
        .unwrap();
    transient
        .map(Key::named::<String>("greeting"), operation(greet_spec()))
        .unwrap();
    let greeting = transient.get(&Key::named::<String>("greeting")).unwrap();
    assert_eq!(greeting.mode(), ServiceMode::Transient);

    let registry = finalize(transient);
    let key = Key::named::<String>("greeting");
    let before = calls.load(Ordering::SeqCst);
    let a = registry.use_key::<String>(&key).unwrap();
    let b = registry.use_key::<String>(&key).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(calls.load(Ordering::SeqCst), before + 2);
}

#[test]
fn test_optional_dependencies_bind_empty_values() {
    let spec = OperationSpec::from_fn(
        "describe",
        OperationTarget::function::<String>(),
        |args: &Arguments| {
            let name = args.optional::<String>(0);
            let port = args.copied::<Option<i32>>(1);
            let tag = args.nullable::<u8>(2);
            value(format!("{name:?}/{port:?}/{tag:?}"))
        },
    )
    .param(Variable::option_of::<String>())
    .param(Variable::option_of::<i32>())
    .param(Variable::of::<u8>().nullable());

    let mut map = services();
    map.map(Key::of::<String>(), operation(spec.clone())).unwrap();
    map.provide_instance(Key::of::<i32>(), value(42i32)).unwrap();
    map.provide_instance(Key::of::<u8>(), value(7u8)).unwrap();
    map.map(Key::named::<String>("full"), operation(spec)).unwrap();

    let registry = finalize(map);
    assert_eq!(
        *registry.use_service::<String>().unwrap(),
        "None/None/None"
    );
    assert_eq!(
        *registry
            .use_key::<String>(&Key::named::<String>("full"))
            .unwrap(),
        "Some(\"None/None/None\")/Some(42)/Some(7)"
    );
}

#[test]
fn test_decorate_constant_operation_invokes_decorator_once() {
    let calls = Arc::new(AtomicU32::new(0));
    let decorations = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&decorations);

    let mut map = services();
    map.map(Key::of::<u32>(), operation(counter_spec(Arc::clone(&calls))))
        .unwrap();
    let slot = map.get(&Key::of::<u32>()).unwrap().arena_slot();
    map.decorate(
        &Key::of::<u32>(),
        decorator(move |x: Arc<u32>| {
            seen.fetch_add(1, Ordering::SeqCst);
            *x * 2
        }),
    )
    .unwrap();
    assert_eq!(map.get(&Key::of::<u32>()).unwrap().arena_slot(), slot);

    let registry = finalize(map);
    for _ in 0..3 {
        assert_eq!(*registry.use_service::<u32>().unwrap(), 2);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(decorations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_decorate_requires_existing_key() {
    let mut map = services();
    assert_eq!(
        map.decorate(&Key::of::<u32>(), decorator(|x: Arc<u32>| *x))
            .unwrap_err(),
        RegistryError::NoSuchKey {
            key: Key::of::<u32>().to_string()
        }
    );
}

#[test]
fn test_rekey_moves_service() {
    let mut map = services();
    map.provide_instance(Key::of::<String>(), value("a".to_string()))
        .unwrap();
    map.provide_instance(Key::named::<String>("b"), value("b".to_string()))
        .unwrap();

    assert!(matches!(
        map.rekey(&Key::of::<String>(), Key::of::<String>()),
        Err(RegistryError::RekeyToSameKey { .. })
    ));
    assert!(matches!(
        map.rekey(&Key::of::<String>(), Key::named::<String>("b")),
        Err(RegistryError::RekeyCollision { .. })
    ));
    assert!(matches!(
        map.rekey(&Key::of::<u8>(), Key::named::<u8>("x")),
        Err(RegistryError::NoSuchKey { .. })
    ));

    map.rekey(&Key::of::<String>(), Key::named::<String>("a"))
        .unwrap();
    assert!(!map.contains(&Key::of::<String>()));
    assert_eq!(
        map.keys(),
        vec![Key::named::<String>("a"), Key::named::<String>("b")]
    );
}

#[test]
fn test_rekey_all_is_atomic() {
    let mut map = services();
    map.provide_instance(Key::named::<u8>("a"), value(1u8)).unwrap();
    map.provide_instance(Key::named::<u8>("b"), value(2u8)).unwrap();
    map.provide_instance(Key::named::<u8>("c"), value(3u8)).unwrap();
    let before = map.keys();

    let err = map
        .rekey_all(&mut |_: &dyn ServiceView| Some(Key::named::<u8>("same")))
        .unwrap_err();
    assert!(matches!(err, RegistryError::RekeyCollision { .. }));
    assert_eq!(map.keys(), before);

    let removed = Key::named::<u8>("b");
    map.rekey_all(&mut |s: &dyn ServiceView| {
        (s.key() != &removed).then(|| s.key().clone())
    })
    .unwrap();
    assert_eq!(
        map.keys(),
        vec![Key::named::<u8>("a"), Key::named::<u8>("c")]
    );
}

#[test]
fn test_remove_retain_and_remove_all() {
    let mut map = services();
    for name in ["a", "b", "c"] {
        map.provide_instance(Key::named::<u8>(name), value(0u8))
            .unwrap();
    }
    map.remove(&[Key::named::<u8>("a"), Key::named::<u8>("missing")]);
    assert_eq!(map.len(), 2);
    map.retain(&[Key::named::<u8>("c")]);
    assert_eq!(map.keys(), vec![Key::named::<u8>("c")]);
    map.remove_all();
    assert!(map.is_empty());
}

/// String 常量由操作产生，greeting 从常量区读取它
fn greeting_over_constant_name() -> ServiceMap<ServiceBuild> {
    let mut map = services();
    let name = OperationSpec::from_fn(
        "name",
        OperationTarget::function::<String>(),
        |_: &Arguments| value("ab".to_string()),
    );
    map.map(Key::of::<String>(), operation(name)).unwrap();
    map.provide_instance(Key::of::<u32>(), value(2u32)).unwrap();
    map.map(Key::named::<String>("greeting"), operation(greet_spec()))
        .unwrap();
    map
}

fn assert_greeting_without_name(map: ServiceMap<ServiceBuild>) {
    assert!(!map.contains(&Key::of::<String>()));
    assert_eq!(map.hidden().len(), 1);
    let registry = finalize(map);
    assert!(registry.find::<String>().is_none());
    assert_eq!(
        *registry
            .use_key::<String>(&Key::named::<String>("greeting"))
            .unwrap(),
        "Hello abab"
    );
}

#[test]
fn test_removed_constant_still_initializes_for_readers() {
    let mut map = greeting_over_constant_name();
    map.remove(&[Key::of::<String>()]);
    assert_greeting_without_name(map);

    let mut map = greeting_over_constant_name();
    map.retain(&[Key::named::<String>("greeting")]);
    assert_greeting_without_name(map);

    let mut map = greeting_over_constant_name();
    map.rekey_all(&mut |s: &dyn ServiceView| {
        (s.key() != &Key::of::<String>()).then(|| s.key().clone())
    })
    .unwrap();
    assert_greeting_without_name(map);
}

#[test]
fn test_replaced_constant_still_initializes_for_readers() {
    let mut map = greeting_over_constant_name();
    map.provide_instance(Key::of::<String>(), value("cd".to_string()))
        .unwrap();
    assert_eq!(map.hidden().len(), 1);

    let registry = finalize(map);
    assert_eq!(*registry.use_service::<String>().unwrap(), "cd");
    assert_eq!(
        *registry
            .use_key::<String>(&Key::named::<String>("greeting"))
            .unwrap(),
        "Hello abab"
    );
}

#[test]
fn test_removed_constant_without_readers_is_not_invoked() {
    let calls = Arc::new(AtomicU32::new(0));
    let mut map = services();
    map.map(Key::of::<u32>(), operation(counter_spec(Arc::clone(&calls))))
        .unwrap();
    map.remove_all();
    assert_eq!(map.hidden().len(), 1);

    let registry = finalize(map);
    assert!(registry.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_constants_are_initialized_in_dependency_order() {
    let mut source = services();
    let placeholder = OperationSpec::from_fn(
        "placeholder",
        OperationTarget::function::<String>(),
        |_: &Arguments| value("later".to_string()),
    );
    source.map(Key::of::<String>(), operation(placeholder)).unwrap();
    source.provide_instance(Key::of::<u32>(), value(1u32)).unwrap();
    source
        .map(Key::named::<String>("greeting"), operation(greet_spec()))
        .unwrap();

    // greeting 排在它依赖的 String 之前
    let mut reordered = ServiceMap::new(source.context().clone());
    for key in [
        Key::named::<String>("greeting"),
        Key::of::<u32>(),
        Key::of::<String>(),
    ] {
        reordered.insert(source.get(&key).unwrap().clone()).unwrap();
    }

    let plan = InitializationPlan::prepare(reordered).unwrap();
    let order = plan
        .initialization_order()
        .into_iter()
        .cloned()
        .collect::<Vec<_>>();
    assert_eq!(
        order,
        vec![Key::of::<String>(), Key::named::<String>("greeting")]
    );
    let arena = Arc::new(plan.layout().allocate());
    let registry = plan.initialize(arena, None).unwrap();
    assert_eq!(
        *registry
            .use_key::<String>(&Key::named::<String>("greeting"))
            .unwrap(),
        "Hello later"
    );
}

#[test]
fn test_circular_constants_are_rejected() {
    let echo = |name: &str| {
        OperationSpec::from_fn(name, OperationTarget::function::<String>(), |args: &Arguments| {
            Arc::clone(args.value(0).unwrap())
        })
        .param(Variable::of::<String>())
    };
    // 新生命周期中 a 和 b 依次得到槽位 0 和 1
    let mut scratch = ArenaBuilder::new();
    let first = scratch.reserve::<String>().unwrap();
    let second = scratch.reserve::<String>().unwrap();

    let mut map = services();
    let mut a = operation(echo("a"));
    a.bind_hook(0, BindingResolution::arena(second)).unwrap();
    map.provide(Key::named::<String>("a"), ServiceMode::Constant, a.compile().unwrap())
        .unwrap();
    let mut b = operation(echo("b"));
    b.bind_hook(0, BindingResolution::arena(first)).unwrap();
    map.provide(Key::named::<String>("b"), ServiceMode::Constant, b.compile().unwrap())
        .unwrap();
    assert_eq!(map.get(&Key::named::<String>("a")).unwrap().arena_slot(), Some(first));

    match InitializationPlan::prepare(map) {
        Err(RegistryError::CircularDependency { chain }) => {
            assert_eq!(chain.matches("->").count(), 2);
            assert!(chain.contains("\"a\"") && chain.contains("\"b\""));
        }
        other => panic!("期望循环依赖错误, 实际 {:?}", other.err()),
    }
}

#[test]
fn test_incomplete_operation_cannot_be_provided() {
    let mut map = services();
    let mut op = operation(greet_spec());
    assert!(matches!(
        op.compile(),
        Err(OperationError::IncompleteBinding { .. })
    ));
    map.provide_instance(Key::of::<String>(), value("x".to_string()))
        .unwrap();
    map.provide_instance(Key::of::<u32>(), value(1u32)).unwrap();
    map.map(Key::named::<String>("g"), op).unwrap();
    assert_eq!(map.len(), 3);
}
