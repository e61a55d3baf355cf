//! # Data Model
//!
//! Value types that flow through the executor: the inbound [`Task`], the
//! [`SensorData`] fetched for it, and the [`PredictionData`] that gets stored.
//! None of these are mutated once produced.

pub mod prediction_data;
pub mod sensor_data;
pub mod task;

pub use prediction_data::{PredictionData, PredictionSeries};
pub use sensor_data::{SensorData, SensorDataSpec, SensorSeries, SensorTag};
pub use task::{Task, TimeRange};
