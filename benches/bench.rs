use criterion::{black_box, criterion_group, criterion_main, Criterion};

use heaplint::ir::instruction::{Call, Cast, Instruction};
use heaplint::{
    analyze_function, AnalysisConfig, Block, Function, Opcode, Operand, Terminator, TypeKind,
};

// ------------------------------------------------------------------
// Helpers (TODO: share with tests)

fn call(result: Option<&str>, ty: TypeKind, callee: &str, args: Vec<Operand>) -> Instruction {
    Instruction::new(
        result.map(Into::into),
        ty,
        Opcode::Call(Call {
            callee: callee.into(),
            args,
        }),
    )
}

/// A single block with `n` malloc/cast/free triples; every cast aliases its
/// allocation, so the alias-propagation path is exercised on each free.
fn chain(n: usize) -> Function {
    let mut instrs = Vec::with_capacity(3 * n);
    for i in 0..n {
        let r = format!("r{}", i);
        let c = format!("c{}", i);
        instrs.push(call(
            Some(r.as_str()),
            TypeKind::Pointer,
            "malloc",
            vec![Operand::Int(8)],
        ));
        instrs.push(Instruction::new(
            Some(c.as_str().into()),
            TypeKind::Pointer,
            Opcode::Cast(Cast {
                operand: Operand::pointer(r.as_str()),
            }),
        ));
        instrs.push(call(
            None,
            TypeKind::Scalar,
            "free",
            vec![Operand::pointer(c.as_str())],
        ));
    }
    Function {
        name: "chain".into(),
        parameters: vec![],
        blocks: vec![Block {
            name: "entry".into(),
            instrs,
            terminator: Terminator::ret(None),
        }],
    }
}

pub fn criterion_benchmark(crit: &mut Criterion) {
    let config = AnalysisConfig::default();
    let small = chain(16);
    let large = chain(128);
    crit.bench_function("chain-16", |b| {
        b.iter(|| analyze_function(black_box(&small), &config).unwrap())
    });
    crit.bench_function("chain-128", |b| {
        b.iter(|| analyze_function(black_box(&large), &config).unwrap())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
