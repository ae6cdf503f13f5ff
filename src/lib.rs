//! Optimal policies for finite Markov Decision Processes by policy iteration.
//!
//! [`solver::solve`] alternates policy evaluation and greedy policy
//! improvement until the policy stops changing. Models implement the
//! [`mdp::Mdp`] trait; [`mdp::TabularMdp`] and [`cars::CarRental`] are
//! provided.

pub mod cars;
pub mod config;
pub mod error;
pub mod mdp;
pub mod policy;
pub mod report;
pub mod solver;

pub use error::{Result, SolverError};
pub use mdp::Mdp;
pub use policy::Policy;
pub use solver::{solve, Solution, SolverConfig};
