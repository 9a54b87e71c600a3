#![forbid(unsafe_code)]

//! The C and Fortran builds of each example must agree on every algorithm
//! both can run.

use crate::cross_file::{AlgorithmFilter, PairingMode, compare_examples};
use crate::{CheckConfig, CheckError, CheckReport};

pub const BASE_ALGORITHMS: [&str; 14] = [
    "petsc_nm",
    "nlopt_ln_bobyqa",
    "nlopt_ln_neldermead",
    "nlopt_ld_mma",
    "nlopt_ld_ccsaq",
    "nlopt_ld_slsqp",
    "nlopt_ld_lbfgs",
    "nlopt_ld_tnewton_precond_restart",
    "nlopt_ld_tnewton_precond",
    "nlopt_ld_tnewton_restart",
    "nlopt_ld_tnewton",
    "nlopt_ld_var1",
    "nlopt_ln_sbplx",
    "nlopt_ld_var2",
];

pub const DIRECT_ALGORITHMS: [&str; 6] = [
    "nlopt_gn_direct",
    "nlopt_gn_direct_l",
    "nlopt_gn_direct_noscal",
    "nlopt_gn_direct_l_noscal",
    "nlopt_gn_orig_direct",
    "nlopt_gn_orig_direct_l",
];

/// Placeholder names that the nondifferentiable example reports in both builds.
pub const NONDIFFERENTIABLE_EXTRAS: [&str; 3] = ["blorp", "foo", "glurb"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamplePair {
    pub first: String,
    pub second: String,
    pub algorithms: Vec<String>,
}

impl ExamplePair {
    fn new(first: &str, second: &str, groups: &[&[&str]]) -> Self {
        Self {
            first: first.to_string(),
            second: second.to_string(),
            algorithms: groups
                .iter()
                .flat_map(|group| group.iter().map(|name| (*name).to_string()))
                .collect(),
        }
    }

    #[must_use]
    pub fn filter(&self) -> AlgorithmFilter {
        AlgorithmFilter::Include(self.algorithms.clone())
    }
}

#[must_use]
pub fn language_independence_plan() -> Vec<ExamplePair> {
    vec![
        ExamplePair::new(
            "quadratic_c",
            "quadratic_f",
            &[&BASE_ALGORITHMS, &DIRECT_ALGORITHMS],
        ),
        ExamplePair::new("rosenbrock_c", "rosenbrock_f", &[&BASE_ALGORITHMS]),
        ExamplePair::new(
            "nondifferentiable_c",
            "nondifferentiable_f",
            &[&BASE_ALGORITHMS, &NONDIFFERENTIABLE_EXTRAS],
        ),
    ]
}

/// Runs every pair of the plan, stopping at the first failure.
pub fn verify_language_independence(
    config: &CheckConfig,
) -> Result<Vec<CheckReport>, CheckError> {
    run_plan(config, &language_independence_plan())
}

pub fn run_plan(
    config: &CheckConfig,
    plan: &[ExamplePair],
) -> Result<Vec<CheckReport>, CheckError> {
    plan.iter()
        .map(|pair| {
            compare_examples(
                config,
                &pair.first,
                &pair.second,
                &pair.filter(),
                PairingMode::Grouped,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        BASE_ALGORITHMS, DIRECT_ALGORITHMS, NONDIFFERENTIABLE_EXTRAS, language_independence_plan,
    };
    use crate::cross_file::AlgorithmFilter;

    #[test]
    fn plan_covers_three_examples() {
        let plan = language_independence_plan();
        let names: Vec<(&str, &str)> = plan
            .iter()
            .map(|pair| (pair.first.as_str(), pair.second.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("quadratic_c", "quadratic_f"),
                ("rosenbrock_c", "rosenbrock_f"),
                ("nondifferentiable_c", "nondifferentiable_f"),
            ]
        );
        assert_eq!(
            plan[0].algorithms.len(),
            BASE_ALGORITHMS.len() + DIRECT_ALGORITHMS.len()
        );
        assert_eq!(plan[1].algorithms.len(), BASE_ALGORITHMS.len());
        assert_eq!(
            plan[2].algorithms.len(),
            BASE_ALGORITHMS.len() + NONDIFFERENTIABLE_EXTRAS.len()
        );
    }

    #[test]
    fn plan_never_includes_random_algorithms() {
        let policy = mango_policy::AlgorithmPolicy::default();
        for pair in language_independence_plan() {
            assert!(pair.algorithms.iter().all(|name| policy.is_deterministic(name)));
            let AlgorithmFilter::Include(names) = pair.filter() else {
                panic!("plan filters are include lists");
            };
            assert_eq!(names, pair.algorithms);
        }
    }
}
