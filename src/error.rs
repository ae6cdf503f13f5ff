use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("MDP has no actions")]
    NoActions,
    #[error("{table} table has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        table: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("transition probabilities for state {state}, action {action} sum to {sum}")]
    InvalidDistribution { state: usize, action: usize, sum: f64 },
    #[error("negative transition probability {prob} for ({state}, {next_state}, {action})")]
    NegativeProbability {
        state: usize,
        next_state: usize,
        action: usize,
        prob: f64,
    },
    #[error("reward for state {state}, action {action} is not finite")]
    NonFiniteReward { state: usize, action: usize },
    #[error("discount factor must be in (0, 1], got {0}")]
    InvalidDiscount(f64),
    #[error("policy evaluation did not converge after {sweeps} sweeps (delta {delta})")]
    EvaluationDidNotConverge { sweeps: usize, delta: f64 },
    #[error("policy evaluation diverged at sweep {sweep}")]
    EvaluationDiverged { sweep: usize },
    #[error("policy did not stabilize after {iterations} improvement steps")]
    PolicyDidNotStabilize { iterations: usize },
    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid model: {0}")]
    InvalidModel(String),
}

pub type Result<T> = std::result::Result<T, SolverError>;
