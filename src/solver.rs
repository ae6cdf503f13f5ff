use approx::AbsDiffEq;
use serde::Deserialize;

use crate::error::{Result, SolverError};
use crate::mdp::{self, Mdp};
use crate::policy::Policy;

/// Tunable parameters for policy iteration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Evaluation stops once no state value changes by more than this in a sweep.
    pub epsilon: f64,
    /// Discount rate applied to successor values. 1.0 is undiscounted.
    pub gamma: f64,
    /// Maximum sweeps per evaluation. `None` for no limit.
    pub max_sweeps: Option<usize>,
    /// Maximum number of policy changes. `None` for no limit.
    pub max_iterations: Option<usize>,
    /// Lookahead rewards within this distance of the best are ties.
    pub tie_tolerance: f64,
    /// Policies whose entries all differ by at most this are equal.
    pub policy_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            epsilon: 0.0001,
            gamma: 1.0,
            max_sweeps: Some(1_000_000),
            max_iterations: Some(10_000),
            tie_tolerance: 1e-9,
            policy_tolerance: 1e-9,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(SolverError::InvalidDiscount(self.gamma));
        }
        if !(self.epsilon >= 0.0) {
            return Err(SolverError::InvalidConfig(
                format!("epsilon must be non-negative, got {}", self.epsilon)));
        }
        if !(self.tie_tolerance >= 0.0) || !(self.policy_tolerance >= 0.0) {
            return Err(SolverError::InvalidConfig(
                String::from("tolerances must be non-negative")));
        }
        Ok(())
    }
}

/// Result of a converged policy iteration run.
#[derive(Debug, Clone)]
pub struct Solution {
    pub policy: Policy,
    /// State values under `policy`.
    pub values: ndarray::Array1<f64>,
    /// Number of improvement steps that changed the policy.
    pub iterations: usize,
    /// Evaluation sweeps summed over all iterations.
    pub sweeps: usize,
}

/// One-step lookahead tables produced while improving a policy.
#[derive(Debug, Clone)]
pub struct ActionRewards {
    /// Indexes: state, action
    pub action_reward: ndarray::Array2<f64>,
    pub max_reward: ndarray::Array1<f64>,
    pub num_best_actions: ndarray::Array1<usize>,
}

impl ActionRewards {
    pub fn is_best(&self, state: usize, action: usize, tie_tolerance: f64) -> bool {
        self.max_reward[state] - self.action_reward[[state, action]] <= tie_tolerance
    }
}

/// Immediate reward plus discounted expected value of the successor state.
pub fn lookahead<M: Mdp + ?Sized>(
    mdp: &M, values: &ndarray::Array1<f64>, state: usize, action: usize, gamma: f64
) -> f64 {
    let expected_next: f64 = (0..mdp.num_states())
        .map(|next| mdp.prob(state, next, action) * values[next])
        .sum();
    mdp.reward(state, action) + gamma * expected_next
}

/// Expected value of `state` when actions are drawn from `policy`.
pub fn state_value<M: Mdp + ?Sized>(
    state: usize, mdp: &M, policy: &Policy, values: &ndarray::Array1<f64>, gamma: f64
) -> f64 {
    let mut value = 0.0;
    for action in 0..mdp.num_actions() {
        let p = policy.get(state, action);
        if p == 0.0 {
            continue;
        }
        value += p * lookahead(mdp, values, state, action, gamma);
    }
    value
}

/// Write one synchronous update of every state into `new_values`.
/// Returns the largest absolute change.
fn sweep<M: Mdp + ?Sized>(
    mdp: &M, policy: &Policy,
    values: &ndarray::Array1<f64>, new_values: &mut ndarray::Array1<f64>,
    gamma: f64,
) -> f64 {
    let mut delta: f64 = 0.0;
    for s in 0..mdp.num_states() {
        new_values[s] = state_value(s, mdp, policy, values, gamma);
        delta = delta.max((new_values[s] - values[s]).abs());
    }
    delta
}

fn evaluate_counting_sweeps<M: Mdp + ?Sized>(
    mdp: &M, policy: &Policy, mut values: ndarray::Array1<f64>, config: &SolverConfig
) -> Result<(ndarray::Array1<f64>, usize)> {
    let mut new_values = ndarray::Array1::<f64>::zeros(values.len());
    let mut sweeps = 0;
    loop {
        let delta = sweep(mdp, policy, &values, &mut new_values, config.gamma);
        std::mem::swap(&mut values, &mut new_values);
        sweeps += 1;

        if values.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::EvaluationDiverged { sweep: sweeps });
        }
        if delta <= config.epsilon {
            tracing::debug!("Policy evaluation converged after {} sweeps.", sweeps);
            return Ok((values, sweeps));
        }
        if let Some(max_sweeps) = config.max_sweeps {
            if sweeps >= max_sweeps {
                return Err(SolverError::EvaluationDidNotConverge { sweeps, delta });
            }
        }
    }
}

/// Fail unless `policy` and `values` are sized for `mdp`.
fn check_shapes<M: Mdp + ?Sized>(
    mdp: &M, policy: &Policy, values: &ndarray::Array1<f64>
) -> Result<()> {
    let expected = vec![mdp.num_states(), mdp.num_actions()];
    let found = vec![policy.num_states(), policy.num_actions()];
    if found != expected {
        return Err(SolverError::ShapeMismatch { table: "policy", expected, found });
    }
    if values.len() != mdp.num_states() {
        return Err(SolverError::ShapeMismatch {
            table: "values",
            expected: vec![mdp.num_states()],
            found: vec![values.len()],
        });
    }
    Ok(())
}

/// Compute state values under a fixed policy.
///
/// Starts from `values` and repeats Jacobi sweeps until the largest
/// per-state change is at most `config.epsilon`. Every sweep reads only the
/// previous sweep's values.
pub fn evaluate_policy<M: Mdp + ?Sized>(
    mdp: &M, policy: &Policy, values: ndarray::Array1<f64>, config: &SolverConfig
) -> Result<ndarray::Array1<f64>> {
    check_shapes(mdp, policy, &values)?;
    evaluate_counting_sweeps(mdp, policy, values, config).map(|(values, _)| values)
}

/// Lookahead reward of every action, and which actions tie for the best.
pub fn best_actions<M: Mdp + ?Sized>(
    mdp: &M, values: &ndarray::Array1<f64>, gamma: f64, tie_tolerance: f64
) -> ActionRewards {
    let n_s = mdp.num_states();
    let n_a = mdp.num_actions();
    let mut action_reward = ndarray::Array2::<f64>::zeros((n_s, n_a));
    let mut max_reward = ndarray::Array1::<f64>::from_elem(n_s, f64::NEG_INFINITY);
    let mut num_best_actions = ndarray::Array1::<usize>::zeros(n_s);

    for s in 0..n_s {
        for a in 0..n_a {
            let reward = lookahead(mdp, values, s, a, gamma);
            action_reward[[s, a]] = reward;
            if reward - max_reward[s] > tie_tolerance {
                max_reward[s] = reward;
                num_best_actions[s] = 0;
            }
            if (reward - max_reward[s]).abs() <= tie_tolerance {
                num_best_actions[s] += 1;
            }
        }
        // A near-tie can raise the maximum without resetting the count.
        if tie_tolerance > 0.0 {
            let row = action_reward.row(s);
            let best = row.fold(f64::NEG_INFINITY, |m, r| m.max(*r));
            max_reward[s] = best;
            num_best_actions[s] = row.iter().filter(|r| best - **r <= tie_tolerance).count();
        }
    }
    ActionRewards { action_reward, max_reward, num_best_actions }
}

/// Greedy policy with respect to `values`, split evenly across tied actions.
///
/// Returns `None` when the greedy policy equals `policy`, which means
/// policy iteration has converged. Fails if `policy` or `values` is not
/// sized for `mdp`.
pub fn improve_policy<M: Mdp + ?Sized>(
    policy: &Policy, mdp: &M, values: &ndarray::Array1<f64>, config: &SolverConfig
) -> Result<Option<Policy>> {
    check_shapes(mdp, policy, values)?;
    let best = best_actions(mdp, values, config.gamma, config.tie_tolerance);
    let mut new_policy = Policy::zeros(mdp.num_states(), mdp.num_actions());
    for s in 0..mdp.num_states() {
        let share = 1.0 / best.num_best_actions[s] as f64;
        for a in 0..mdp.num_actions() {
            if best.is_best(s, a, config.tie_tolerance) {
                new_policy.set(s, a, share);
            }
        }
    }

    if policy.abs_diff_eq(&new_policy, config.policy_tolerance) {
        Ok(None)
    } else {
        Ok(Some(new_policy))
    }
}

/// Find an optimal policy by policy iteration.
///
/// Starts from the uniform random policy and zero values, then alternates
/// evaluation and improvement until improvement leaves the policy unchanged.
pub fn solve<M: Mdp + ?Sized>(mdp: &M, config: &SolverConfig) -> Result<Solution> {
    config.validate()?;
    mdp::validate(mdp)?;

    let mut policy = Policy::uniform(mdp.num_states(), mdp.num_actions());
    let mut values = ndarray::Array1::<f64>::zeros(mdp.num_states());
    let mut iterations = 0;
    let mut sweeps = 0;
    loop {
        let (converged, n) = evaluate_counting_sweeps(mdp, &policy, values, config)?;
        values = converged;
        sweeps += n;

        match improve_policy(&policy, mdp, &values, config)? {
            None => {
                tracing::info!(
                    "Policy stable after {} improvements ({} sweeps).", iterations, sweeps);
                return Ok(Solution { policy, values, iterations, sweeps });
            }
            Some(next) => {
                iterations += 1;
                tracing::info!("Improvement {}: policy changed.", iterations);
                policy = next;
            }
        }
        if let Some(max_iterations) = config.max_iterations {
            if iterations >= max_iterations {
                return Err(SolverError::PolicyDidNotStabilize { iterations });
            }
        }
    }
}
