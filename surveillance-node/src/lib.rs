pub mod alerts;
pub mod api;
pub mod camera;
pub mod config;
pub mod detection;
pub mod error;
pub mod face;
pub mod metrics;
pub mod pipeline;
pub mod storage;
pub mod surveillance;

pub use error::{Result, SurveillanceError};
