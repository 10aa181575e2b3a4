//! The interface between the dispatch engine and linear-programming solvers.
//!
//! Solvers are hidden behind the [`LpSolver`] trait so that the engine only ever sees a typed
//! [`SolverOutcome`]. Solver console output is always disabled and progress is reported through
//! the program logger instead.
use crate::options::DispatchOptions;
use highs::{HighsModelStatus, RowProblem as Problem, Sense};
use log::{Level, log};

/// Primal and dual values of an optimal solution
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LpSolution {
    /// Value of each column, in the order the columns were added
    pub columns: Vec<f64>,
    /// Dual value of each row, in the order the rows were added
    pub dual_rows: Vec<f64>,
}

/// The result of handing a problem to a solver
#[derive(Debug, Clone, PartialEq)]
pub enum SolverOutcome {
    /// An optimal solution was found
    Optimal(LpSolution),
    /// The problem has no feasible solution
    Infeasible,
    /// The solver stopped without an optimal solution (e.g. it hit its time limit)
    Failed(String),
}

/// A linear-programming solver which minimises a problem's objective
pub trait LpSolver {
    /// Solve the problem, consuming it
    fn solve(&self, problem: Problem) -> SolverOutcome;
}

/// The HiGHS solver
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HighsSolver {
    /// Whether to report progress at info level rather than debug
    pub verbose: bool,
    /// Time limit in seconds
    pub time_limit: Option<f64>,
}

impl HighsSolver {
    /// Create a solver configured from the dispatch options
    pub fn from_options(options: &DispatchOptions) -> Self {
        Self {
            verbose: options.solver_verbose,
            time_limit: options.time_limit,
        }
    }

    fn log_level(&self) -> Level {
        if self.verbose {
            Level::Info
        } else {
            Level::Debug
        }
    }
}

impl LpSolver for HighsSolver {
    fn solve(&self, problem: Problem) -> SolverOutcome {
        let level = self.log_level();
        log!(
            level,
            "Solving dispatch problem with {} columns and {} rows",
            problem.num_cols(),
            problem.num_rows()
        );

        let mut model = problem.optimise(Sense::Minimise);
        model.set_option("output_flag", false);
        if let Some(time_limit) = self.time_limit {
            model.set_option("time_limit", time_limit);
        }

        let solved = match model.try_solve() {
            Ok(solved) => solved,
            Err(status) => {
                log!(level, "HiGHS returned an error: {status:?}");
                return SolverOutcome::Failed(format!("{status:?}"));
            }
        };

        let status = solved.status();
        log!(level, "HiGHS finished with status: {status:?}");
        match status {
            HighsModelStatus::Optimal => {
                let solution = solved.get_solution();
                SolverOutcome::Optimal(LpSolution {
                    columns: solution.columns().to_vec(),
                    dual_rows: solution.dual_rows().to_vec(),
                })
            }
            HighsModelStatus::Infeasible | HighsModelStatus::UnboundedOrInfeasible => {
                SolverOutcome::Infeasible
            }
            status => SolverOutcome::Failed(format!("{status:?}")),
        }
    }
}
