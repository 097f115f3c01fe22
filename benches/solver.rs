//! Benchmarks for the branch-and-bound MaxSAT engine.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use maat::cnf;
use maat::logic::{Constraint, LogicStructure, Proposition};
use maat::solver::{MaxSatSolver, SolverConfig};

/// A chain of implications with conflicting soft preferences on every
/// proposition: forces the solver to weigh alternatives at each level.
fn chain_structure(props: usize) -> LogicStructure {
    let propositions = (0..props)
        .map(|i| Proposition {
            id: format!("p{i}"),
            gloss: format!("proposition {i}"),
        })
        .collect();

    let hard_constraints = (0..props - 1)
        .map(|i| Constraint {
            id: format!("h{i}"),
            expr: format!("p{i} IMPLIES p{}", i + 1),
            gloss: String::new(),
            weight: None,
        })
        .collect();

    let soft_constraints = (0..props)
        .map(|i| Constraint {
            id: format!("s{i}"),
            expr: if i % 2 == 0 {
                format!("p{i}")
            } else {
                format!("NOT p{i}")
            },
            gloss: String::new(),
            weight: Some(1.0 + (i % 3) as f64),
        })
        .collect();

    LogicStructure {
        propositions,
        hard_constraints,
        soft_constraints,
    }
}

fn bench_solve_chain(c: &mut Criterion) {
    for props in [8, 12, 16] {
        let clauses = cnf::compile(&chain_structure(props)).unwrap();
        let solver = MaxSatSolver::new(SolverConfig::default());

        c.bench_function(&format!("solve_chain_{props}"), |bench| {
            bench.iter(|| black_box(solver.solve(&clauses, &[]).unwrap()))
        });
    }
}

fn bench_query_both_polarities(c: &mut Criterion) {
    let clauses = cnf::compile(&chain_structure(12)).unwrap();
    let (extended, root) = clauses.extend_with_formula("p0 AND p11").unwrap();
    let solver = MaxSatSolver::new(SolverConfig::default());

    c.bench_function("solve_pinned_both_ways_12", |bench| {
        bench.iter(|| {
            let forced = solver.solve(&extended, &[root]).unwrap();
            let refuted = solver.solve(&extended, &[root.negated()]).unwrap();
            black_box((forced.cost, refuted.cost))
        })
    });
}

criterion_group!(benches, bench_solve_chain, bench_query_both_polarities);
criterion_main!(benches);
