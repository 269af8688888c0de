//! Domain types: bars, series, positions, trades, equity, parameters.

pub mod bar;
pub mod equity;
pub mod interval;
pub mod params;
pub mod position;
pub mod series;
pub mod trade;

pub use bar::Bar;
pub use equity::EquityPoint;
pub use interval::Interval;
pub use params::{ParameterSet, EXIT_PARAM_PREFIX};
pub use position::Position;
pub use series::TimeSeries;
pub use trade::{ExitReason, Trade};
