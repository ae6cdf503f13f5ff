use std::fmt::Write as _;
use std::io;
use std::path::Path;

use serde::Serialize;

use crate::cars::{CarRental, State};
use crate::solver::Solution;

/// One CSV line per state and action.
#[derive(Serialize, Debug, PartialEq)]
pub struct PolicyRow {
    pub state: usize,
    pub action: usize,
    pub probability: f64,
    pub value: f64,
}

pub fn policy_rows(solution: &Solution) -> Vec<PolicyRow> {
    let policy = &solution.policy;
    let mut rows = Vec::with_capacity(policy.num_states() * policy.num_actions());
    for state in 0..policy.num_states() {
        for action in 0..policy.num_actions() {
            rows.push(PolicyRow {
                state,
                action,
                probability: policy.get(state, action),
                value: solution.values[state],
            });
        }
    }
    rows
}

pub fn write_csv<W: io::Write>(solution: &Solution, writer: W) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in policy_rows(solution) {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_csv_file<P: AsRef<Path>>(solution: &Solution, path: P) -> csv::Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv(solution, file)
}

/// Value and action probabilities of every state, one state per line.
pub fn format_solution(solution: &Solution) -> String {
    let policy = &solution.policy;
    let mut out = String::new();
    let _ = write!(out, "{:>6} {:>12} |", "state", "value");
    for a in 0..policy.num_actions() {
        let _ = write!(out, " {:>7}", format!("a{}", a));
    }
    let _ = writeln!(out);
    for s in 0..policy.num_states() {
        let _ = write!(out, "{:>6} {:>12.4} |", s, solution.values[s]);
        for a in 0..policy.num_actions() {
            let _ = write!(out, " {:>7.4}", policy.get(s, a));
        }
        let _ = writeln!(out);
    }
    out
}

/// Expected overnight moves laid out by cars on each lot.
pub fn format_car_policy(cars: &CarRental, solution: &Solution) -> String {
    let grid = cars.move_grid(&solution.policy);
    let mut out = String::from("Cars moved from lot #1 to lot #2 (rows: lot #1, cols: lot #2)\n");
    let _ = write!(out, "     ");
    for n2 in 0..grid.dim().1 {
        let _ = write!(out, "{:>6}", n2);
    }
    let _ = writeln!(out);
    for (n1, row) in grid.rows().into_iter().enumerate() {
        let _ = write!(out, "{:>3} |", n1);
        for moved in row.iter() {
            let _ = write!(out, "{:>6.1}", moved);
        }
        let _ = writeln!(out);
    }
    out
}

/// Value of one car rental state and the moves its policy makes.
pub fn format_car_state(cars: &CarRental, solution: &Solution, state: &State) -> String {
    let s = cars.state_index(state);
    let mut out = String::new();
    let _ = writeln!(out, "State {}: value {:.4}", state, solution.values[s]);
    let max_move = cars.max_move as i16;
    for moved in -max_move..=max_move {
        let p = solution.policy.get(s, cars.action_index(moved));
        if p > 0.0 {
            let _ = writeln!(out, "  move {:>3} with probability {:.4}", moved, p);
        }
    }
    out
}
