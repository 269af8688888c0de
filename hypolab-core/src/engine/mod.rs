//! Simulation engine — turns (series, signals, exit model) into trades and an
//! equity curve.

pub mod simulator;

pub use simulator::{SimulationConfig, SimulationResult, Simulator};
