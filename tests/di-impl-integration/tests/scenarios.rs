//! 端到端装配场景

use anyhow::Result;
use di_abstractions::{
    decorator, value, Arguments, Key, ServiceLocator, ServiceTransformer, ServiceView, Variable,
};
use di_impl::{OperationSpec, OperationTarget, ServiceRegistry};
use infrastructure_common::RegistryError;
use infrastructure_composition::AssemblyBuilder;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Foo(&'static str);

#[derive(Debug)]
struct Settings {
    port: Option<i32>,
}

fn settings_spec() -> OperationSpec {
    OperationSpec::from_fn(
        "Settings::new",
        OperationTarget::constructor::<Settings>(),
        |args: &Arguments| {
            value(Settings {
                port: args.copied::<Option<i32>>(0),
            })
        },
    )
    .param(Variable::option_of::<i32>())
}

#[test]
fn test_constant_string_lookup() -> Result<()> {
    let mut builder = AssemblyBuilder::new("scenario");
    builder.provide_instance(Key::of::<String>(), "World".to_string())?;
    let app = builder.build()?;

    assert_eq!(*app.use_service::<String>()?, "World");
    assert!(app.find::<i32>().is_none());
    assert!(app.use_service::<i32>().is_err());
    Ok(())
}

#[test]
fn test_prototype_counter() -> Result<()> {
    let counter = Arc::new(AtomicU32::new(0));
    let calls = Arc::clone(&counter);
    let mut builder = AssemblyBuilder::new("scenario");
    let setup = builder.operation(OperationSpec::from_fn(
        "next",
        OperationTarget::function::<u32>(),
        move |_: &Arguments| value(calls.fetch_add(1, Ordering::SeqCst) + 1),
    ))?;
    builder.provide_prototype(Key::of::<u32>(), setup)?;
    let app = builder.build()?;

    let values = (0..3)
        .map(|_| app.use_service::<u32>().map(|v| *v))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(values, vec![1, 2, 3]);
    assert_eq!(counter.load(Ordering::SeqCst), 3);
    Ok(())
}

#[test]
fn test_decorate_constant() -> Result<()> {
    let mut builder = AssemblyBuilder::new("scenario");
    builder.provide_instance(Key::of::<i32>(), 21i32)?;
    builder
        .services_mut()
        .decorate(&Key::of::<i32>(), decorator(|x: Arc<i32>| *x * 2))?;
    let app = builder.build()?;

    assert_eq!(*app.use_service::<i32>()?, 42);
    assert_eq!(*app.use_service::<i32>()?, 42);
    Ok(())
}

#[test]
fn test_decorate_after_finalize() -> Result<()> {
    let counter = Arc::new(AtomicU32::new(0));
    let calls = Arc::clone(&counter);
    let mut builder = AssemblyBuilder::new("scenario");
    let setup = builder.operation(OperationSpec::from_fn(
        "next",
        OperationTarget::function::<u32>(),
        move |_: &Arguments| value(calls.fetch_add(1, Ordering::SeqCst) + 1),
    ))?;
    builder.provide_prototype(Key::of::<u32>(), setup)?;
    let registry = builder.build()?.into_registry();

    let spawned = registry.spawn(|services| {
        services.decorate(&Key::of::<u32>(), decorator(|x: Arc<u32>| *x * 10))
    })?;
    assert_eq!(*spawned.use_service::<u32>()?, 10);
    assert_eq!(*spawned.use_service::<u32>()?, 20);
    // 原注册表不受影响
    assert_eq!(*registry.use_service::<u32>()?, 3);
    Ok(())
}

#[test]
fn test_rekey_then_export() -> Result<()> {
    let bar = Key::named::<Foo>("bar");
    let mut builder = AssemblyBuilder::new("child");
    builder.provide_instance(Key::of::<Foo>(), Foo("original"))?;
    builder.services_mut().rekey(&Key::of::<Foo>(), bar.clone())?;
    let child = builder.build()?.into_registry();

    let parent = ServiceRegistry::empty().export_from(&child, &[bar.clone()])?;
    assert!(parent.find::<Foo>().is_none());
    assert_eq!(parent.find_key::<Foo>(&bar).map(|f| f.0), Some("original"));

    let missing = ServiceRegistry::empty().export_from(&child, &[Key::of::<Foo>()]);
    assert!(matches!(missing, Err(RegistryError::NoSuchKey { .. })));
    Ok(())
}

#[test]
fn test_rekey_all_removes_one_service() -> Result<()> {
    let k1 = Key::named::<String>("k1");
    let mut builder = AssemblyBuilder::new("scenario");
    builder.provide_instance(k1.clone(), "gone".to_string())?;
    builder.provide_instance(Key::named::<String>("k2"), "kept".to_string())?;
    builder.provide_instance(Key::of::<u32>(), 1u32)?;

    let removed = k1.clone();
    builder.services_mut().rekey_all(&mut |service: &dyn ServiceView| {
        if service.key() == &removed {
            None
        } else {
            Some(service.key().clone())
        }
    })?;
    let app = builder.build()?;

    assert!(app.find_key::<String>(&k1).is_none());
    assert_eq!(
        app.keys(),
        vec![Key::named::<String>("k2"), Key::of::<u32>()]
    );
    Ok(())
}

#[test]
fn test_optional_int_field() -> Result<()> {
    let mut builder = AssemblyBuilder::new("scenario");
    let setup = builder.operation(settings_spec())?;
    builder.map(Key::of::<Settings>(), setup)?;
    let app = builder.build()?;
    assert_eq!(app.use_service::<Settings>()?.port, None);

    let mut builder = AssemblyBuilder::new("scenario");
    builder.provide_instance(Key::of::<i32>(), 42i32)?;
    let setup = builder.operation(settings_spec())?;
    builder.map(Key::of::<Settings>(), setup)?;
    let app = builder.build()?;
    assert_eq!(app.use_service::<Settings>()?.port, Some(42));
    Ok(())
}
