//! Benchmarks for module invocation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use scriptbridge::bridge::LocalBridge;
use scriptbridge::context::{ContextState, ExecutionContext, Inputs, Outputs, Params};
use scriptbridge::loader::ModuleLoader;
use scriptbridge::runtime::{InvocationRequest, ModuleRunner};
use scriptbridge::specification::ScriptSpecification;
use serde_json::json;
use std::sync::Arc;

const SUM: &str = r"
local calls = 0
function execute(params, inputs, outputs)
    calls = calls + 1
    local total = 0
    for _, v in ipairs(inputs.values) do
        total = total + v * params.scale
    end
    outputs.calls = calls
    return total
end
";

fn invoke_benchmark(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("sum.lua"), SUM).unwrap();

    let state = Arc::new(ContextState::new().with_working_dir(dir.path()));
    let loader = ModuleLoader::new(Arc::clone(&state));
    let module = loader.load_from_file("sum.lua", None).unwrap();

    let params = Params::default().with("scale", json!(2)).unwrap();
    let inputs = Inputs::default()
        .with("values", json!((1..=32).collect::<Vec<i64>>()))
        .unwrap();

    c.bench_function("execute_direct", |b| {
        b.iter(|| {
            let mut ctx = ExecutionContext::new(params.clone(), inputs.clone(), Outputs::default());
            black_box(module.execute(&mut ctx).unwrap())
        });
    });

    let runner = ModuleRunner::new(Arc::clone(&state));
    let spec = Arc::new(ScriptSpecification::new("sum-1", "Sum", "sum.lua"));
    let bridge = Arc::new(LocalBridge::new(spec));
    c.bench_function("execute_via_runner", |b| {
        b.iter(|| {
            let request = InvocationRequest::new()
                .with_params(params.clone())
                .with_inputs(inputs.clone());
            black_box(runner.run(&module, bridge.clone(), request).unwrap())
        });
    });

    c.bench_function("load_from_file", |b| {
        b.iter(|| black_box(loader.load_from_file("sum.lua", None).unwrap()));
    });
}

criterion_group!(benches, invoke_benchmark);
criterion_main!(benches);
