use serde::Deserialize;

use crate::cars::CarRental;
use crate::error::{Result, SolverError};
use crate::mdp::{Mdp, TabularMdp};
use crate::solver::SolverConfig;

/// Contents of a rustmdp TOML configuration file.
///
/// Exactly one of `tabular` or `cars` describes the model to solve.
#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default)]
    pub solver: SolverConfig,
    pub tabular: Option<TabularConfig>,
    pub cars: Option<CarConfig>,
}

/// Explicit reward and transition tables.
#[derive(Deserialize, Debug)]
pub struct TabularConfig {
    /// Indexes: state, action
    pub rewards: Vec<Vec<f64>>,
    /// Indexes: state, action, next state
    pub transitions: Vec<Vec<Vec<f64>>>,
}

/// Car rental problem parameters.
///
/// The car rental never ends, so its values only converge with a discount.
/// Set `gamma` below 1.0 in `[solver]`; the default of 1.0 runs evaluation
/// until `max_sweeps` and fails.
#[derive(Deserialize, Debug)]
pub struct CarConfig {
    pub max1: u8,
    pub rent_mean1: f32,
    pub return_mean1: f32,
    pub max2: u8,
    pub rent_mean2: f32,
    pub return_mean2: f32,
    pub max_move: u8,
    #[serde(default = "default_rent_reward")]
    pub rent_reward: f64,
    #[serde(default = "default_move_cost")]
    pub move_cost: f64,
}

fn default_rent_reward() -> f64 {
    10.0
}

fn default_move_cost() -> f64 {
    2.0
}

/// A model built from configuration.
pub enum Model {
    Tabular(TabularMdp),
    Cars(CarRental),
}

impl Config {
    /// Explains why this configuration cannot converge, if it is known not to.
    pub fn discount_warning(&self) -> Option<String> {
        if self.cars.is_some() && self.solver.gamma >= 1.0 {
            Some(format!(
                "car rental values do not converge with gamma = {}; set [solver] gamma below 1.0",
                self.solver.gamma))
        } else {
            None
        }
    }

    pub fn model(&self) -> Result<Model> {
        if let Some(warning) = self.discount_warning() {
            tracing::warn!("{}", warning);
        }
        match (&self.tabular, &self.cars) {
            (Some(t), None) => Ok(Model::Tabular(
                TabularMdp::from_rows(&t.rewards, &t.transitions)?)),
            (None, Some(c)) => Ok(Model::Cars(CarRental::new(
                c.max1, c.rent_mean1, c.return_mean1,
                c.max2, c.rent_mean2, c.return_mean2,
                c.max_move, c.rent_reward, c.move_cost,
            )?)),
            (None, None) => Err(SolverError::InvalidModel(
                String::from("configuration has no [tabular] or [cars] section"))),
            (Some(_), Some(_)) => Err(SolverError::InvalidModel(
                String::from("configuration has both [tabular] and [cars] sections"))),
        }
    }
}

impl Mdp for Model {
    fn num_states(&self) -> usize {
        match self {
            Model::Tabular(m) => m.num_states(),
            Model::Cars(m) => m.num_states(),
        }
    }

    fn num_actions(&self) -> usize {
        match self {
            Model::Tabular(m) => m.num_actions(),
            Model::Cars(m) => m.num_actions(),
        }
    }

    fn reward(&self, state: usize, action: usize) -> f64 {
        match self {
            Model::Tabular(m) => m.reward(state, action),
            Model::Cars(m) => m.reward(state, action),
        }
    }

    fn prob(&self, state: usize, next_state: usize, action: usize) -> f64 {
        match self {
            Model::Tabular(m) => m.prob(state, next_state, action),
            Model::Cars(m) => m.prob(state, next_state, action),
        }
    }
}
