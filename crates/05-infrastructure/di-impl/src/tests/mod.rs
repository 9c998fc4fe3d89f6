//! 绑定、编译与服务层的组合测试

mod service_tests;

use crate::binding::Realm;
use crate::operation::{OperationSpec, OperationTarget};
use di_abstractions::{value, Arguments, Variable};

/// `greet(name: String, times: u32) -> String`
pub(crate) fn greet_spec() -> OperationSpec {
    OperationSpec::from_fn(
        "greet",
        OperationTarget::function::<String>(),
        |args: &Arguments| {
            let name = args.get::<String>(0);
            let times = args.copied::<u32>(1);
            value(format!("Hello {}", name.repeat(times as usize)))
        },
    )
    .param(Variable::of::<String>())
    .param(Variable::of::<u32>())
}

pub(crate) fn realm() -> Realm {
    Realm::new("test")
}
