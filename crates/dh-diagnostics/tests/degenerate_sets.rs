//! IDS searches on a Jacobian with two independent dependencies:
//! `a` and `d` are copies, and `c = a + b`.

use dh_core::ConId;
use dh_diagnostics::{
    DegeneracyHunter, DiagnosticConfig, DiagnosticError, IdsOutcome, SingularValueThreshold,
    SolverStage, verify_irreducible,
};
use dh_model::{AlgebraicModel, ConstraintBounds, ModelBuilder};
use dh_solver::{MicroLpSolver, MilpInstance, MilpOutcome, MilpSolver, VarKind};

struct Rows {
    model: AlgebraicModel,
    a: ConId,
    b: ConId,
    c: ConId,
    d: ConId,
}

fn rows() -> Rows {
    let mut builder = ModelBuilder::new();
    let x = builder.add_variable("x", 0.0);
    let y = builder.add_variable("y", 0.0);
    let z = builder.add_variable("z", 0.0);
    let eq = ConstraintBounds::Equal(0.0);
    let a = builder.add_linear("a", &[(x, 1.0)], 0.0, eq);
    let b = builder.add_linear("b", &[(y, 1.0)], 0.0, eq);
    let c = builder.add_linear("c", &[(x, 1.0), (y, 1.0)], 0.0, eq);
    let d = builder.add_linear("d", &[(x, 1.0)], 0.0, eq);
    builder.add_linear("e", &[(z, 1.0)], 0.0, eq);
    Rows {
        model: builder.build().unwrap(),
        a,
        b,
        c,
        d,
    }
}

fn config() -> DiagnosticConfig {
    DiagnosticConfig::new(SingularValueThreshold::relative(1e-9), 1e-6, 1e2)
}

#[test]
fn every_set_contains_its_seed_and_is_minimal() {
    let rows = rows();
    let hunter = DegeneracyHunter::new(&rows.model, config()).unwrap();
    let rank = hunter.check_rank().unwrap();
    assert_eq!(rank.deficiency, 2);

    let candidates = hunter.find_candidates(&rank).unwrap();
    assert!(candidates.contains(rows.a));
    assert!(candidates.contains(rows.d));

    let results = hunter
        .find_degenerate_sets(&rank, &candidates, &MicroLpSolver::new())
        .unwrap();
    assert_eq!(results.len(), candidates.len());

    for result in &results {
        let members = result.members().expect("every candidate has a set");
        assert!(members.contains(&result.seed));
        assert!(verify_irreducible(&rank.jacobian, members, rank.threshold).unwrap());
    }

    let set_of = |seed| {
        results
            .iter()
            .find(|r| r.seed == seed)
            .and_then(|r| r.members())
            .map(|m| m.to_vec())
    };
    assert_eq!(set_of(rows.a), Some(vec![rows.a, rows.d]));
    let c_set = set_of(rows.c).expect("c = a + b is a candidate with a set");
    assert_eq!(c_set.len(), 3);
    assert!(c_set.contains(&rows.b));
}

#[test]
fn scaled_duplicate_is_found_from_either_seed() {
    let mut builder = ModelBuilder::new();
    let x = builder.add_variable("x", 0.0);
    let y = builder.add_variable("y", 0.0);
    let eq = ConstraintBounds::Equal(0.0);
    let small = builder.add_linear("small", &[(x, 1.0), (y, 1.0)], 0.0, eq);
    let big = builder.add_linear("big", &[(x, 1e4), (y, 1e4)], 0.0, eq);
    let model = builder.build().unwrap();

    let config = DiagnosticConfig::new(SingularValueThreshold::relative(1e-9), 1e-6, 1e3);
    let report = DegeneracyHunter::new(&model, config)
        .unwrap()
        .run(&MicroLpSolver::new())
        .unwrap();
    assert_eq!(report.rank.deficiency, 1);
    assert_eq!(report.candidates.constraints, vec![small, big]);

    for seed in [small, big] {
        let result = report.ids_for(seed).unwrap();
        assert_eq!(
            result.outcome,
            IdsOutcome::Found {
                members: vec![small, big],
                verified: Some(true),
            }
        );
    }
    assert_eq!(report.distinct_sets, vec![vec![small, big]]);
}

#[test]
fn parallel_search_matches_sequential() {
    let rows = rows();
    let sequential = DegeneracyHunter::new(&rows.model, config())
        .unwrap()
        .run(&MicroLpSolver::new())
        .unwrap();

    let mut parallel_config = config();
    parallel_config.ids.parallel = true;
    let parallel = DegeneracyHunter::new(&rows.model, parallel_config)
        .unwrap()
        .run(&MicroLpSolver::new())
        .unwrap();

    let sizes = |report: &dh_diagnostics::DegeneracyReport| -> Vec<(ConId, usize)> {
        report
            .degenerate_sets
            .iter()
            .map(|r| (r.seed, r.members().map_or(0, |m| m.len())))
            .collect()
    };
    assert_eq!(sizes(&sequential), sizes(&parallel));
}

/// Delegates to microlp except for the MILP seeded at row `fail_row`.
struct FailingFor {
    fail_row: usize,
    infeasible: bool,
}

impl MilpSolver for FailingFor {
    fn name(&self) -> &str {
        "failing-stub"
    }

    fn solve(&self, instance: &MilpInstance) -> MilpOutcome {
        // variables are laid out as (z, y) per row; the seed's z has lower bound 1
        let seed_row = instance
            .vars()
            .iter()
            .position(|v| v.kind == VarKind::Binary && v.lower == 1.0)
            .map(|i| i / 2);
        if seed_row == Some(self.fail_row) {
            if self.infeasible {
                return MilpOutcome::infeasible();
            }
            return MilpOutcome::error("numerical trouble");
        }
        MicroLpSolver::new().solve(instance)
    }
}

#[test]
fn one_failing_candidate_does_not_abort_the_others() {
    let rows = rows();
    let hunter = DegeneracyHunter::new(&rows.model, config()).unwrap();
    let solver = FailingFor {
        fail_row: 0,
        infeasible: false,
    };
    let report = hunter.run(&solver).unwrap();

    let a = report.ids_for(rows.a).unwrap();
    assert!(matches!(
        a.outcome,
        IdsOutcome::Failed {
            stage: SolverStage::Milp,
            ..
        }
    ));
    let d = report.ids_for(rows.d).unwrap();
    assert_eq!(d.members(), Some(&[rows.a, rows.d][..]));

    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        failures[0],
        DiagnosticError::SolverFailure {
            stage: SolverStage::Milp,
            ..
        }
    ));
}

#[test]
fn infeasible_candidate_is_a_normal_outcome() {
    let rows = rows();
    let hunter = DegeneracyHunter::new(&rows.model, config()).unwrap();
    let solver = FailingFor {
        fail_row: 3,
        infeasible: true,
    };
    let report = hunter.run(&solver).unwrap();

    let d = report.ids_for(rows.d).unwrap();
    assert_eq!(d.outcome, IdsOutcome::NoDegenerateSet);
    assert!(report.failures().is_empty());
}

#[test]
fn independent_row_yields_no_degenerate_set() {
    let rows = rows();
    let hunter = DegeneracyHunter::new(&rows.model, config()).unwrap();
    let rank = hunter.check_rank().unwrap();
    let e = rows.model.find_constraint("e").unwrap();

    let result = dh_diagnostics::solve_ids(
        &rank.jacobian,
        e,
        &config().ids,
        &MicroLpSolver::new(),
        rank.threshold,
    )
    .unwrap();
    assert_eq!(result.outcome, IdsOutcome::NoDegenerateSet);
}
