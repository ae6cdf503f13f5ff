use approx::AbsDiffEq;

/// Stochastic policy over a finite MDP.
///
/// `table[[state, action]]` is the probability of choosing `action` in
/// `state`. Each row is a distribution over actions.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub table: ndarray::Array2<f64>,
}

impl Policy {
    /// Policy with every probability set to zero. Rows must be filled in
    /// before the policy is valid.
    pub fn zeros(num_states: usize, num_actions: usize) -> Policy {
        Policy { table: ndarray::Array2::<f64>::zeros((num_states, num_actions)) }
    }

    /// All actions equally likely in every state.
    pub fn uniform(num_states: usize, num_actions: usize) -> Policy {
        let p = 1.0 / num_actions as f64;
        Policy { table: ndarray::Array2::<f64>::from_elem((num_states, num_actions), p) }
    }

    pub fn num_states(&self) -> usize {
        self.table.dim().0
    }

    pub fn num_actions(&self) -> usize {
        self.table.dim().1
    }

    pub fn get(&self, state: usize, action: usize) -> f64 {
        self.table[[state, action]]
    }

    pub fn set(&mut self, state: usize, action: usize, prob: f64) {
        self.table[[state, action]] = prob;
    }

    /// Actions chosen with non-zero probability in `state`.
    pub fn best_actions(&self, state: usize) -> Vec<usize> {
        self.table.row(state).iter()
            .enumerate()
            .filter(|(_, p)| **p > 0.0)
            .map(|(a, _)| a)
            .collect()
    }

    /// True if every entry is in [0, 1] and every row sums to 1 within `tolerance`.
    pub fn is_valid(&self, tolerance: f64) -> bool {
        self.table.rows().into_iter().all(|row| {
            row.iter().all(|p| (0.0..=1.0).contains(p))
                && (row.sum() - 1.0).abs() <= tolerance
        })
    }
}

impl AbsDiffEq for Policy {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Policy, epsilon: f64) -> bool {
        self.table.abs_diff_eq(&other.table, epsilon)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_abs_diff_ne};
    use test_case::test_case;

    #[test_case(1, 1; "Single state and action")]
    #[test_case(4, 3; "Three actions")]
    #[test_case(21, 11; "Car rental sized")]
    fn build_uniform_policy(num_states: usize, num_actions: usize) {
        // Act
        let policy = Policy::uniform(num_states, num_actions);
        // Assert
        assert_eq!(policy.num_states(), num_states);
        assert_eq!(policy.num_actions(), num_actions);
        for s in 0..num_states {
            for a in 0..num_actions {
                assert_eq!(policy.get(s, a), 1.0 / num_actions as f64);
            }
        }
        assert!(policy.is_valid(1e-12));
    }

    #[test]
    fn zero_policy_is_not_valid() {
        let policy = Policy::zeros(2, 2);
        assert!(!policy.is_valid(1e-12));
    }

    #[test]
    fn best_actions_skips_zero_entries() {
        // Arrange
        let mut policy = Policy::zeros(2, 3);
        policy.set(0, 0, 0.5);
        policy.set(0, 2, 0.5);
        policy.set(1, 1, 1.0);
        // Act / Assert
        assert_eq!(policy.best_actions(0), vec![0, 2]);
        assert_eq!(policy.best_actions(1), vec![1]);
        assert!(policy.is_valid(1e-12));
    }

    #[test]
    fn tolerance_equality() {
        // Arrange
        let a = Policy::uniform(2, 3);
        let mut b = a.clone();
        b.set(1, 2, b.get(1, 2) + 1e-12);
        // Assert
        assert_ne!(a, b);
        assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        assert_abs_diff_ne!(a, Policy::uniform(2, 2));
    }
}
