use std::cmp::{self, Ordering};
use std::fmt::{self, Write};

use statrs::distribution::{Discrete, DiscreteCDF, Poisson};

use crate::error::{Result, SolverError};
use crate::mdp::Mdp;
use crate::policy::Policy;

/// Jack's car rental problem (Sutton & Barto, example 4.2) as a finite MDP.
///
/// A state is the number of cars on each lot at the end of a day. An action
/// moves cars overnight from lot #1 to lot #2 (negative moves go the other
/// way). Rentals and returns at each lot are Poisson distributed and limited
/// by the cars and spaces available.
///
/// Indices to the probability tables x1, y1, x2, and y2 are
/// [cars on lot, number of cars rented or returned].
pub struct CarRental {
    /// Maximum number of cars that can be stored at location #1
    pub max1: u8,
    /// Expected number of cars rented each day
    pub rent_mean1: f32,
    /// Expected number of cars returned each day
    pub return_mean1: f32,
    /// Loc 1 rental probs. Indexes: number of cars on lot, number of cars rented
    pub x1: ndarray::Array2<f64>,
    /// Loc 1 return probs. Indexes: number of cars on lot, number of cars returned
    pub y1: ndarray::Array2<f64>,
    /// Maximum number of cars that can be stored at location #2
    pub max2: u8,
    pub rent_mean2: f32,
    pub return_mean2: f32,
    pub x2: ndarray::Array2<f64>,
    pub y2: ndarray::Array2<f64>,
    /// Maximum number of cars that can be moved between loc #1 and loc #2
    pub max_move: u8,
    /// Income per car rented
    pub rent_reward: f64,
    /// Cost per car moved
    pub move_cost: f64,
    // Indexes: cars after moving, cars at end of day
    t1: ndarray::Array2<f64>,
    t2: ndarray::Array2<f64>,
    // Expected rentals given cars after moving
    e1: ndarray::Array1<f64>,
    e2: ndarray::Array1<f64>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct State {
    pub n1: u8,  // Number of cars at site #1 at end of day
    pub n2: u8,  // Number of cars at site #2 at end of day
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(n1: {}, n2: {})", self.n1, self.n2)
    }
}

/// Visits every state in index order.
pub struct StateIterator {
    n1: u8,
    n2: u8,
    max_n1: u8,
    max_n2: u8,
}

impl StateIterator {
    pub fn new(max_n1: u8, max_n2: u8) -> StateIterator {
        StateIterator { n1: 0, n2: 0, max_n1, max_n2 }
    }
}

impl Iterator for StateIterator {
    type Item = State;

    fn next(&mut self) -> Option<State> {
        if self.n1 > self.max_n1 {
            return None;
        }
        let state = State { n1: self.n1, n2: self.n2 };
        if self.n2 < self.max_n2 {
            self.n2 += 1;
        } else {
            self.n2 = 0;
            // Past the last row the iterator is exhausted.
            match self.n1.checked_add(1) {
                Some(n1) => self.n1 = n1,
                None => self.max_n1 = 0,
            }
        }
        Some(state)
    }
}

impl CarRental {
    pub fn new(
        max1: u8, rent_mean1: f32, return_mean1: f32,
        max2: u8, rent_mean2: f32, return_mean2: f32,
        max_move: u8, rent_reward: f64, move_cost: f64,
    ) -> Result<CarRental> {
        if max_move > cmp::max(max1, max2) {
            return Err(SolverError::InvalidModel(format!(
                "max move {} exceeds the largest lot", max_move)));
        }
        let x1 = CarRental::rent_probs(rent_mean1, max1)?;
        let y1 = CarRental::return_probs(return_mean1, max1)?;
        let x2 = CarRental::rent_probs(rent_mean2, max2)?;
        let y2 = CarRental::return_probs(return_mean2, max2)?;
        let t1 = CarRental::day_transitions(&x1, &y1);
        let t2 = CarRental::day_transitions(&x2, &y2);
        let e1 = CarRental::expected_rentals(&x1);
        let e2 = CarRental::expected_rentals(&x2);

        Ok(CarRental {
            max1, rent_mean1, return_mean1, x1, y1,
            max2, rent_mean2, return_mean2, x2, y2,
            max_move, rent_reward, move_cost,
            t1, t2, e1, e2,
        })
    }

    fn poisson(mean: f32) -> Result<Poisson> {
        Poisson::new(f64::from(mean)).map_err(|e| SolverError::InvalidModel(
            format!("Poisson mean {}: {}", mean, e)))
    }

    fn rent_probs(mean: f32, max_n: u8) -> Result<ndarray::Array2<f64>> {
        let dist = CarRental::poisson(mean)?;
        let dim = max_n as usize + 1;
        Ok(ndarray::Array2::<f64>::from_shape_fn((dim, dim), |(n, x)| {
            CarRental::rent_prob(n as u64, x as u64, &dist)
        }))
    }

    fn rent_prob(n: u64, x: u64, dist: &Poisson) -> f64 {
        match x.cmp(&n) {
            // Renting fewer cars than what's on the lot.
            Ordering::Less => dist.pmf(x),
            // Demand of n or more empties the lot. 1 - CDF keeps the row summing to 1.
            Ordering::Equal if n == 0 => 1.0,
            Ordering::Equal => 1.0 - dist.cdf(n - 1),
            Ordering::Greater => 0.0,
        }
    }

    fn return_probs(mean: f32, max_n: u8) -> Result<ndarray::Array2<f64>> {
        let dist = CarRental::poisson(mean)?;
        let dim = max_n as usize + 1;
        Ok(ndarray::Array2::<f64>::from_shape_fn((dim, dim), |(n, y)| {
            CarRental::return_prob((max_n as usize - n) as u64, y as u64, &dist)
        }))
    }

    /// `space` is the number of empty spaces on the lot.
    fn return_prob(space: u64, y: u64, dist: &Poisson) -> f64 {
        match y.cmp(&space) {
            Ordering::Less => dist.pmf(y),
            // Filling the lot.
            Ordering::Equal if space == 0 => 1.0,
            Ordering::Equal => 1.0 - dist.cdf(space - 1),
            Ordering::Greater => 0.0,
        }
    }

    /// Probability of ending the day with n' cars given m cars after moving.
    fn day_transitions(
        x: &ndarray::Array2<f64>, y: &ndarray::Array2<f64>
    ) -> ndarray::Array2<f64> {
        let dim = x.dim().0;
        let mut t = ndarray::Array2::<f64>::zeros((dim, dim));
        for m in 0..dim {
            for rented in 0..=m {
                let left = m - rented;
                for returned in 0..(dim - left) {
                    t[[m, left + returned]] += x[[m, rented]] * y[[left, returned]];
                }
            }
        }
        t
    }

    fn expected_rentals(x: &ndarray::Array2<f64>) -> ndarray::Array1<f64> {
        ndarray::Array1::from_shape_fn(x.dim().0, |m| {
            x.row(m).iter().enumerate().map(|(rented, p)| rented as f64 * p).sum::<f64>()
        })
    }

    pub fn states(&self) -> StateIterator {
        StateIterator::new(self.max1, self.max2)
    }

    pub fn state_index(&self, s: &State) -> usize {
        s.n1 as usize * (self.max2 as usize + 1) + s.n2 as usize
    }

    pub fn state_at(&self, index: usize) -> State {
        let width = self.max2 as usize + 1;
        State { n1: (index / width) as u8, n2: (index % width) as u8 }
    }

    /// Cars requested to move from lot #1 to lot #2 for an action index.
    pub fn cars_moved(&self, action: usize) -> i16 {
        action as i16 - self.max_move as i16
    }

    pub fn action_index(&self, moved: i16) -> usize {
        (moved + self.max_move as i16) as usize
    }

    /// Cars on each lot after the overnight move.
    ///
    /// Only the cars available can be moved. Cars beyond a lot's capacity
    /// are returned to the company.
    pub fn after_move(&self, s: &State, moved: i16) -> (usize, usize) {
        let (n1, n2) = (s.n1 as i16, s.n2 as i16);
        let moved = moved.clamp(-n2, n1);
        let m1 = cmp::min(n1 - moved, self.max1 as i16);
        let m2 = cmp::min(n2 + moved, self.max2 as i16);
        (m1 as usize, m2 as usize)
    }

    /// Rental income for `rented` cars, less the cost of moving `moved` cars.
    pub fn day_reward(&self, rented: f64, moved: i16) -> f64 {
        rented * self.rent_reward - self.move_cost * moved.abs() as f64
    }

    /// Expected number of cars moved from lot #1 to lot #2 in every state.
    /// Indexes: cars at lot #1, cars at lot #2
    pub fn move_grid(&self, policy: &Policy) -> ndarray::Array2<f64> {
        let mut grid = ndarray::Array2::<f64>::zeros(
            (self.max1 as usize + 1, self.max2 as usize + 1));
        for state in self.states() {
            let s = self.state_index(&state);
            let max_move = self.max_move as i16;
            let expected: f64 = (-max_move..=max_move)
                .map(|moved| policy.get(s, self.action_index(moved)) * moved as f64)
                .sum();
            grid[[state.n1 as usize, state.n2 as usize]] = expected;
        }
        grid
    }

    fn format_array(out: &mut String, arr: &ndarray::Array2<f64>, row_prefix: &str) {
        let _ = write!(out, "    cars on lot:");
        for n in 0..arr.dim().0 {
            let _ = write!(out, "{:9}", n);
        }
        let _ = writeln!(out);
        for (x, col) in arr.columns().into_iter().enumerate() {
            let _ = write!(out, "{row_prefix}: {x:>3} | ");
            for elem in col.iter() {
                let _ = write!(out, "{:8.4} ", elem);
            }
            let _ = writeln!(out);
        }
    }

    /// Rental and return probability tables, one column per lot size.
    pub fn format_probs(&self) -> String {
        let mut out = String::new();
        out.push_str("\n=== Location #1 Rental Probabilities ===\n");
        CarRental::format_array(&mut out, &self.x1, "  cars rented");
        out.push_str("\n=== Location #1 Return Probabilities ===\n");
        CarRental::format_array(&mut out, &self.y1, "cars returned");
        out.push_str("\n=== Location #2 Rental Probabilities ===\n");
        CarRental::format_array(&mut out, &self.x2, "  cars rented");
        out.push_str("\n=== Location #2 Return Probabilities ===\n");
        CarRental::format_array(&mut out, &self.y2, "cars returned");
        out
    }
}

impl Mdp for CarRental {
    fn num_states(&self) -> usize {
        (self.max1 as usize + 1) * (self.max2 as usize + 1)
    }

    fn num_actions(&self) -> usize {
        self.max_move as usize * 2 + 1
    }

    fn reward(&self, state: usize, action: usize) -> f64 {
        let moved = self.cars_moved(action);
        let (m1, m2) = self.after_move(&self.state_at(state), moved);
        self.day_reward(self.e1[m1] + self.e2[m2], moved)
    }

    fn prob(&self, state: usize, next_state: usize, action: usize) -> f64 {
        let (m1, m2) = self.after_move(&self.state_at(state), self.cars_moved(action));
        let next = self.state_at(next_state);
        self.t1[[m1, next.n1 as usize]] * self.t2[[m2, next.n2 as usize]]
    }
}
