//! 装配构建器集成测试

use super::init_test_logger;
use crate::builder::{AssemblyBuilder, LoggingConfig};
use di_abstractions::{decorator, value, Arguments, Key, ServiceLocator, Variable};
use di_impl::{OperationSpec, OperationTarget, ServiceWirelet};
use infrastructure_common::{
    ArenaError, AssemblyError, BindingError, EngineConfig, LoggingSettings, LookupError,
    OperationError, RegistryError,
};
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// `label(prefix: String, n: u32) -> String`
fn label_spec() -> OperationSpec {
    OperationSpec::from_fn(
        "label",
        OperationTarget::function::<String>(),
        |args: &Arguments| {
            let prefix = args.get::<String>(0);
            value(format!("{}-{}", prefix, args.copied::<u32>(1)))
        },
    )
    .param(Variable::of::<String>())
    .param(Variable::of::<u32>())
}

fn counter_spec(calls: Arc<AtomicU32>) -> OperationSpec {
    OperationSpec::from_fn(
        "counter",
        OperationTarget::function::<u32>(),
        move |_: &Arguments| value(calls.fetch_add(1, Ordering::SeqCst) + 1),
    )
}

#[test]
fn test_build_resolves_services_from_contract() {
    init_test_logger();
    let mut builder = AssemblyBuilder::new("app");
    builder
        .provide_instance(Key::of::<String>(), "node".to_string())
        .unwrap();
    builder.provide_instance(Key::of::<u32>(), 7u32).unwrap();
    let setup = builder.operation(label_spec()).unwrap();
    builder
        .provide_constant(Key::named::<String>("label"), setup)
        .unwrap();

    let app = builder.build().unwrap();
    let label = app
        .use_key::<String>(&Key::named::<String>("label"))
        .unwrap();
    assert_eq!(*label, "node-7");
    assert_eq!(app.registry().len(), 3);
}

#[test]
fn test_prototype_is_invoked_per_lookup() {
    init_test_logger();
    let calls = Arc::new(AtomicU32::new(0));
    let mut builder = AssemblyBuilder::new("app");
    let setup = builder.operation(counter_spec(Arc::clone(&calls))).unwrap();
    builder.provide_prototype(Key::of::<u32>(), setup).unwrap();

    let app = builder.build().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let values = (0..3)
        .map(|_| *app.use_service::<u32>().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(values, vec![1, 2, 3]);
}

#[test]
fn test_internal_constant_and_code_generated_values() {
    init_test_logger();
    let mut builder = AssemblyBuilder::new("app");
    let mut setup = builder.operation(label_spec()).unwrap();
    let prefix = builder.internal_constant("arena".to_string()).unwrap();
    let generated = builder.code_generated("build-number", || 42u32);
    setup.bind_manual(0, prefix).unwrap();
    setup.bind_manual(1, generated).unwrap();
    builder.provide_constant(Key::of::<String>(), setup).unwrap();

    let app = builder.build().unwrap();
    assert_eq!(*app.use_service::<String>().unwrap(), "arena-42");
    // 服务自身的槽位和内部常量各占一个
    assert_eq!(app.arena().capacity(), 2);
}

#[test]
fn test_static_site_requires_permission() {
    init_test_logger();
    let spec = || {
        OperationSpec::from_fn(
            "Limits::DEFAULT",
            OperationTarget::field_get::<u64>().static_site(),
            |args: &Arguments| value(u64::from(args.copied::<u32>(0)) * 1000),
        )
        .param(Variable::of::<u32>())
    };

    let mut builder = AssemblyBuilder::new("app");
    builder.provide_instance(Key::of::<u32>(), 3u32).unwrap();
    let setup = builder.operation(spec()).unwrap();
    let err = builder
        .provide_constant(Key::of::<u64>(), setup)
        .unwrap_err();
    assert!(matches!(
        err,
        AssemblyError::Registry {
            source: RegistryError::Operation(OperationError::Binding(
                BindingError::StaticBindingNotAllowed { slot: 0, .. }
            ))
        }
    ));

    let config = EngineConfig {
        allow_static_field_binding: true,
        ..EngineConfig::default()
    };
    let mut builder = AssemblyBuilder::with_config("app", config);
    builder.provide_instance(Key::of::<u32>(), 3u32).unwrap();
    let setup = builder.operation(spec()).unwrap();
    builder.provide_constant(Key::of::<u64>(), setup).unwrap();
    assert_eq!(*builder.build().unwrap().use_service::<u64>().unwrap(), 3000);
}

#[test]
fn test_arena_capacity_follows_config() {
    let config = EngineConfig {
        max_arena_capacity: 1,
        ..EngineConfig::default()
    };
    let mut builder = AssemblyBuilder::with_config("app", config);
    builder.internal_constant(1u8).unwrap();
    let err = builder.internal_constant(2u8).unwrap_err();
    assert!(matches!(
        err,
        AssemblyError::Arena {
            source: ArenaError::CapacityExceeded {
                capacity: 2,
                limit: 1
            }
        }
    ));
}

#[test]
fn test_linked_child_is_transformed_and_merged() {
    init_test_logger();
    let mut builder = AssemblyBuilder::new("app").with_path("/app");
    builder.provide_instance(Key::of::<u32>(), 21u32).unwrap();

    let mut child = builder.child_services();
    di_abstractions::ServiceTransformer::provide_instance(
        &mut child,
        Key::named::<String>("internal"),
        value("child".to_string()),
    )
    .unwrap();
    builder
        .link(
            "child",
            child,
            vec![
                ServiceWirelet::link("expose", |services| {
                    di_abstractions::ServiceTransformer::rekey(
                        services,
                        &Key::named::<String>("internal"),
                        Key::of::<String>(),
                    )
                }),
                ServiceWirelet::complete("double", |services| {
                    di_abstractions::ServiceTransformer::decorate(
                        services,
                        &Key::of::<u32>(),
                        decorator(|x: Arc<u32>| *x * 2),
                    )
                }),
            ],
        )
        .unwrap();

    let app = builder.build().unwrap();
    assert_eq!(*app.use_service::<String>().unwrap(), "child");
    assert_eq!(*app.use_service::<u32>().unwrap(), 42);
    assert!(app
        .find_key::<String>(&Key::named::<String>("internal"))
        .is_none());

    match app.use_service::<u64>().unwrap_err() {
        LookupError::NoSuchService { path, .. } => assert_eq!(path.as_deref(), Some("/app")),
        other => panic!("期望服务不存在错误, 实际 {other}"),
    }
}

#[test]
fn test_retained_service_keeps_hidden_constant_dependency() {
    init_test_logger();
    let mut builder = AssemblyBuilder::new("app");
    let base = builder
        .operation(OperationSpec::from_fn(
            "base",
            OperationTarget::function::<String>(),
            |_: &Arguments| value("base".to_string()),
        ))
        .unwrap();
    builder.provide_constant(Key::of::<String>(), base).unwrap();
    builder.provide_instance(Key::of::<u32>(), 5u32).unwrap();
    let setup = builder.operation(label_spec()).unwrap();
    let label = Key::named::<String>("label");
    builder.provide_constant(label.clone(), setup).unwrap();
    di_abstractions::ServiceTransformer::retain(builder.services_mut(), &[label.clone()]);

    let app = builder.build().unwrap();
    assert_eq!(*app.use_key::<String>(&label).unwrap(), "base-5");
    assert!(app.find::<String>().is_none());
    assert_eq!(app.registry().len(), 1);
}

#[test]
fn test_link_keeps_initializers_of_filtered_exports() {
    use di_abstractions::ServiceTransformer;

    init_test_logger();
    let mut builder = AssemblyBuilder::new("app");
    let base = builder
        .operation(OperationSpec::from_fn(
            "base",
            OperationTarget::function::<String>(),
            |_: &Arguments| value("child".to_string()),
        ))
        .unwrap();
    let setup = builder.operation(label_spec()).unwrap();

    let mut child = builder.child_services();
    child.map(Key::of::<String>(), base).unwrap();
    child.provide_instance(Key::of::<u32>(), value(9u32)).unwrap();
    let label = Key::named::<String>("label");
    child.map(label.clone(), setup).unwrap();
    builder
        .link(
            "child",
            child,
            vec![ServiceWirelet::link("hide-base", |services| {
                services.remove(&[Key::of::<String>()]);
                Ok(())
            })],
        )
        .unwrap();

    let app = builder.build().unwrap();
    assert_eq!(*app.use_key::<String>(&label).unwrap(), "child-9");
    assert!(app.find::<String>().is_none());
}

#[test]
fn test_link_rejects_other_assembly() {
    let mut builder = AssemblyBuilder::new("app");
    let other = AssemblyBuilder::new("other");
    let err = builder
        .link("foreign", other.child_services(), Vec::new())
        .unwrap_err();
    assert!(matches!(err, AssemblyError::Composition { .. }));
}

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    writeln!(file, "allow_static_field_binding = true\nmax_arena_capacity = 8").unwrap();

    let builder = AssemblyBuilder::load("app", Some(file.path())).unwrap();
    assert!(builder.config().allow_static_field_binding);
    assert_eq!(builder.config().max_arena_capacity, 8);
    assert_eq!(builder.realm().name, "app");
}

#[test]
fn test_logging_config_from_settings() {
    let config = LoggingConfig::from_settings(&LoggingSettings {
        level: "debug".to_string(),
        json: true,
    })
    .unwrap();
    assert_eq!(config.level, tracing::Level::DEBUG);
    assert!(config.json_format);

    let err = LoggingConfig::from_settings(&LoggingSettings {
        level: "loud".to_string(),
        json: false,
    })
    .unwrap_err();
    assert!(matches!(err, AssemblyError::BootstrapFailed { .. }));
}

#[test]
fn test_logging_presets() {
    let development = LoggingConfig::development();
    assert_eq!(development.level, tracing::Level::DEBUG);
    assert!(development.show_line_number);
    assert!(!development.json_format);

    let production = LoggingConfig::production();
    assert_eq!(production.level, tracing::Level::INFO);
    assert!(production.json_format);
    assert!(!production.show_target);
}
