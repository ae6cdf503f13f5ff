use crate::error::{Result, SolverError};

/// Allowed deviation of a transition row sum from 1.0.
pub const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

/// Finite Markov Decision Process with a fully known model.
///
/// States are indexed `0..num_states()` and actions `0..num_actions()`.
/// For every `(state, action)` the values of `prob(state, _, action)` must
/// form a probability distribution over next states.
pub trait Mdp {
    fn num_states(&self) -> usize;

    fn num_actions(&self) -> usize;

    /// Expected immediate reward for taking `action` in `state`.
    fn reward(&self, state: usize, action: usize) -> f64;

    /// Probability of landing in `next_state` after taking `action` in `state`.
    fn prob(&self, state: usize, next_state: usize, action: usize) -> f64;
}

/// Check that `mdp` satisfies the contract the solver relies on.
pub fn validate<M: Mdp + ?Sized>(mdp: &M) -> Result<()> {
    let n_s = mdp.num_states();
    let n_a = mdp.num_actions();
    if n_a == 0 {
        return Err(SolverError::NoActions);
    }
    for state in 0..n_s {
        for action in 0..n_a {
            if !mdp.reward(state, action).is_finite() {
                return Err(SolverError::NonFiniteReward { state, action });
            }
            let mut sum = 0.0;
            for next_state in 0..n_s {
                let prob = mdp.prob(state, next_state, action);
                if prob < 0.0 || !prob.is_finite() {
                    return Err(SolverError::NegativeProbability {
                        state, next_state, action, prob
                    });
                }
                sum += prob;
            }
            if (sum - 1.0).abs() > DISTRIBUTION_TOLERANCE {
                return Err(SolverError::InvalidDistribution { state, action, sum });
            }
        }
    }
    Ok(())
}

/// MDP backed by dense reward and transition tables.
#[derive(Debug, Clone)]
pub struct TabularMdp {
    /// Indexes: state, action
    pub rewards: ndarray::Array2<f64>,
    /// Indexes: state, next state, action
    pub transitions: ndarray::Array3<f64>,
}

impl TabularMdp {
    pub fn new(
        rewards: ndarray::Array2<f64>, transitions: ndarray::Array3<f64>
    ) -> Result<TabularMdp> {
        let (n_s, n_a) = rewards.dim();
        let expected = (n_s, n_s, n_a);
        if transitions.dim() != expected {
            let found = transitions.dim();
            return Err(SolverError::ShapeMismatch {
                table: "transitions",
                expected: vec![expected.0, expected.1, expected.2],
                found: vec![found.0, found.1, found.2],
            });
        }
        Ok(TabularMdp { rewards, transitions })
    }

    /// Build from nested rows: `rewards[state][action]` and
    /// `transitions[state][action][next_state]`.
    pub fn from_rows(
        rewards: &[Vec<f64>], transitions: &[Vec<Vec<f64>>]
    ) -> Result<TabularMdp> {
        let n_s = rewards.len();
        let n_a = rewards.first().map_or(0, |row| row.len());

        let mut reward_table = ndarray::Array2::<f64>::zeros((n_s, n_a));
        for (s, row) in rewards.iter().enumerate() {
            if row.len() != n_a {
                return Err(SolverError::ShapeMismatch {
                    table: "rewards",
                    expected: vec![n_s, n_a],
                    found: vec![n_s, row.len()],
                });
            }
            for (a, r) in row.iter().enumerate() {
                reward_table[[s, a]] = *r;
            }
        }

        if transitions.len() != n_s {
            return Err(SolverError::ShapeMismatch {
                table: "transitions",
                expected: vec![n_s, n_a, n_s],
                found: vec![transitions.len()],
            });
        }
        let mut transition_table = ndarray::Array3::<f64>::zeros((n_s, n_s, n_a));
        for (s, per_action) in transitions.iter().enumerate() {
            if per_action.len() != n_a {
                return Err(SolverError::ShapeMismatch {
                    table: "transitions",
                    expected: vec![n_s, n_a, n_s],
                    found: vec![n_s, per_action.len()],
                });
            }
            for (a, row) in per_action.iter().enumerate() {
                if row.len() != n_s {
                    return Err(SolverError::ShapeMismatch {
                        table: "transitions",
                        expected: vec![n_s, n_a, n_s],
                        found: vec![n_s, n_a, row.len()],
                    });
                }
                for (s2, p) in row.iter().enumerate() {
                    transition_table[[s, s2, a]] = *p;
                }
            }
        }
        TabularMdp::new(reward_table, transition_table)
    }
}

impl Mdp for TabularMdp {
    fn num_states(&self) -> usize {
        self.rewards.dim().0
    }

    fn num_actions(&self) -> usize {
        self.rewards.dim().1
    }

    fn reward(&self, state: usize, action: usize) -> f64 {
        self.rewards[[state, action]]
    }

    fn prob(&self, state: usize, next_state: usize, action: usize) -> f64 {
        self.transitions[[state, next_state, action]]
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn two_state_rows() -> (Vec<Vec<f64>>, Vec<Vec<Vec<f64>>>) {
        let rewards = vec![vec![10.0, 0.0], vec![0.0, 0.0]];
        let transitions = vec![
            vec![vec![0.0, 1.0], vec![1.0, 0.0]],
            vec![vec![0.0, 1.0], vec![0.0, 1.0]],
        ];
        (rewards, transitions)
    }

    #[test]
    fn build_from_rows() {
        // Arrange
        let (rewards, transitions) = two_state_rows();
        // Act
        let mdp = TabularMdp::from_rows(&rewards, &transitions).unwrap();
        // Assert
        assert_eq!(mdp.num_states(), 2);
        assert_eq!(mdp.num_actions(), 2);
        assert_eq!(mdp.reward(0, 0), 10.0);
        assert_eq!(mdp.prob(0, 1, 0), 1.0);
        assert_eq!(mdp.prob(0, 0, 1), 1.0);
        assert!(validate(&mdp).is_ok());
    }

    #[test]
    fn ragged_rewards_rejected() {
        let rewards = vec![vec![1.0, 2.0], vec![3.0]];
        let transitions = vec![vec![vec![1.0, 0.0]; 2]; 2];
        let result = TabularMdp::from_rows(&rewards, &transitions);
        assert!(matches!(
            result, Err(SolverError::ShapeMismatch { table: "rewards", .. })
        ));
    }

    #[test]
    fn short_transition_row_rejected() {
        let (rewards, mut transitions) = two_state_rows();
        transitions[1][0] = vec![1.0];
        let result = TabularMdp::from_rows(&rewards, &transitions);
        assert!(matches!(
            result, Err(SolverError::ShapeMismatch { table: "transitions", .. })
        ));
    }

    #[test]
    fn rows_not_summing_to_one_rejected() {
        // Arrange
        let (rewards, mut transitions) = two_state_rows();
        transitions[0][1] = vec![0.5, 0.4];
        let mdp = TabularMdp::from_rows(&rewards, &transitions).unwrap();
        // Act
        let result = validate(&mdp);
        // Assert
        match result {
            Err(SolverError::InvalidDistribution { state, action, sum }) => {
                assert_eq!((state, action), (0, 1));
                approx::assert_abs_diff_eq!(sum, 0.9, epsilon = 1e-12);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn negative_probability_rejected() {
        let (rewards, mut transitions) = two_state_rows();
        transitions[1][1] = vec![-0.5, 1.5];
        let mdp = TabularMdp::from_rows(&rewards, &transitions).unwrap();
        assert!(matches!(
            validate(&mdp), Err(SolverError::NegativeProbability { state: 1, .. })
        ));
    }

    #[test]
    fn infinite_reward_rejected() {
        let (mut rewards, transitions) = two_state_rows();
        rewards[1][0] = f64::INFINITY;
        let mdp = TabularMdp::from_rows(&rewards, &transitions).unwrap();
        assert!(matches!(
            validate(&mdp), Err(SolverError::NonFiniteReward { state: 1, action: 0 })
        ));
    }

    #[test]
    fn no_actions_rejected() {
        let mdp = TabularMdp::new(
            ndarray::Array2::<f64>::zeros((2, 0)),
            ndarray::Array3::<f64>::zeros((2, 2, 0)),
        ).unwrap();
        assert!(matches!(validate(&mdp), Err(SolverError::NoActions)));
    }
}
