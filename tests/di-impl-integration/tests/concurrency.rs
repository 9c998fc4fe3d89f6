//! 运行期并发查找

use anyhow::Result;
use di_abstractions::{value, Arguments, Key, ServiceLocator, Variable};
use di_impl::{OperationSpec, OperationTarget};
use infrastructure_composition::{Application, AssemblyBuilder};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Pool {
    size: u32,
}

fn application(calls: &Arc<AtomicU32>) -> Result<Application> {
    let mut builder = AssemblyBuilder::new("concurrency");
    builder.provide_instance(Key::of::<u32>(), 8u32)?;

    let pool = builder.operation(
        OperationSpec::from_fn(
            "Pool::new",
            OperationTarget::constructor::<Pool>(),
            |args: &Arguments| {
                value(Pool {
                    size: args.copied::<u32>(0),
                })
            },
        )
        .param(Variable::of::<u32>()),
    )?;
    builder.provide_constant(Key::of::<Pool>(), pool)?;

    let counter = Arc::clone(calls);
    let request = builder.operation(
        OperationSpec::from_fn(
            "request_id",
            OperationTarget::function::<u64>(),
            move |args: &Arguments| {
                let pool = args.get::<Pool>(0);
                let n = counter.fetch_add(1, Ordering::SeqCst);
                value(u64::from(pool.size) * 1_000 + u64::from(n))
            },
        )
        .param(Variable::of::<Pool>()),
    )?;
    builder.provide_prototype(Key::of::<u64>(), request)?;
    Ok(builder.build()?)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_constant_identity_across_tasks() -> Result<()> {
    let calls = Arc::new(AtomicU32::new(0));
    let app = application(&calls)?;
    let expected = app.use_service::<Pool>()?;

    let mut handles = Vec::new();
    for _ in 0..32 {
        let app = app.clone();
        handles.push(tokio::spawn(async move { app.use_service::<Pool>() }));
    }
    for handle in handles {
        let pool = handle.await??;
        assert!(Arc::ptr_eq(&pool, &expected));
        assert_eq!(pool.size, 8);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_prototype_invoked_once_per_lookup() -> Result<()> {
    let calls = Arc::new(AtomicU32::new(0));
    let app = application(&calls)?;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            for _ in 0..16 {
                ids.push(*app.use_service::<u64>()?);
            }
            anyhow::Ok(ids)
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.extend(handle.await??);
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 128);
    assert_eq!(calls.load(Ordering::SeqCst), 128);
    assert!(ids.iter().all(|id| (8_000..8_128).contains(id)));
    Ok(())
}
