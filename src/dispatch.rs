//! Entry points for running a dispatch.
//!
//! Runs never modify the caller's resources: the optimal strategy only reads them and the
//! heuristic strategy keeps its running state in per-run [`ResourceState`]s. Independent runs can
//! therefore be evaluated concurrently on shared inputs.
//!
//! [`ResourceState`]: crate::resource::state::ResourceState
use crate::demand::DemandSeries;
use crate::formulation::formulate;
use crate::heuristic;
use crate::id::check_ids_unique;
use crate::options::{DispatchOptions, DispatchStrategy, SolverBackend, check_load_loss_cost};
use crate::resource::Resource;
use crate::solution::DispatchOutcome;
use crate::solver::{HighsSolver, LpSolver};
use crate::units::MoneyPerEnergy;
use anyhow::{Context, Result, ensure};
use log::debug;

/// A single dispatch run.
///
/// Constructed with the resources and demand, then configured with the `with_*` methods.
pub struct DispatchRun<'a> {
    resources: &'a [Resource],
    demand: &'a DemandSeries,
    options: DispatchOptions,
    solver: Option<&'a dyn LpSolver>,
}

impl<'a> DispatchRun<'a> {
    /// Create a new run with default options
    pub fn new(resources: &'a [Resource], demand: &'a DemandSeries) -> Self {
        Self {
            resources,
            demand,
            options: DispatchOptions::default(),
            solver: None,
        }
    }

    /// Use the given options
    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Use the given LP solver instead of the one named in the options
    pub fn with_solver(mut self, solver: &'a dyn LpSolver) -> Self {
        self.solver = Some(solver);
        self
    }

    /// Check the inputs and options are consistent.
    ///
    /// # Returns
    ///
    /// The cost of unmet demand to use for this run.
    pub fn validate(&self) -> Result<MoneyPerEnergy> {
        ensure!(!self.resources.is_empty(), "No resources to dispatch");
        check_ids_unique(self.resources.iter().map(|resource| &resource.id))?;
        for resource in self.resources {
            resource.validate(self.demand.len())?;
        }

        self.options
            .validate()
            .context("Invalid dispatch options")?;

        let load_loss_cost = self.options.load_loss_cost(self.resources);
        if self.options.load_loss_cost.is_some() {
            check_load_loss_cost(load_loss_cost, self.resources)
                .context("Invalid dispatch options")?;
        }

        Ok(load_loss_cost)
    }

    /// Perform the run.
    ///
    /// # Returns
    ///
    /// The outcome of the run. An infeasible run is not an error: its outcome has no solution and
    /// an objective of [`INFEASIBLE_OBJECTIVE`]. Errors are returned for invalid inputs only.
    ///
    /// [`INFEASIBLE_OBJECTIVE`]: crate::solution::INFEASIBLE_OBJECTIVE
    pub fn run(&self) -> Result<DispatchOutcome> {
        let load_loss_cost = self.validate()?;

        let outcome = match self.options.strategy {
            DispatchStrategy::Optimal => self.run_optimal(load_loss_cost),
            DispatchStrategy::Heuristic => {
                heuristic::dispatch(self.resources, self.demand, &self.options, load_loss_cost)
            }
        };
        debug!(
            "{:?} dispatch of {} resources over {} time steps: objective = {}",
            self.options.strategy,
            self.resources.len(),
            self.demand.len(),
            outcome.objective
        );

        Ok(outcome)
    }

    fn run_optimal(&self, load_loss_cost: MoneyPerEnergy) -> DispatchOutcome {
        let problem = formulate(self.resources, self.demand, &self.options, load_loss_cost);
        match self.solver {
            Some(solver) => problem.solve_outcome(solver, self.resources),
            None => match self.options.solver {
                SolverBackend::Highs => {
                    let solver = HighsSolver::from_options(&self.options);
                    problem.solve_outcome(&solver, self.resources)
                }
            },
        }
    }
}

/// Dispatch resources against demand.
///
/// This is the entry point for callers evaluating many candidate resource mixes. It never modifies
/// its inputs.
pub fn evaluate(
    resources: &[Resource],
    demand: &DemandSeries,
    options: &DispatchOptions,
) -> Result<DispatchOutcome> {
    DispatchRun::new(resources, demand)
        .with_options(options.clone())
        .run()
}
