pub mod analysis;
pub mod column;
pub mod config;
pub mod error;
pub mod value;

pub use analysis::Analysis;
pub use column::*;
pub use config::{AnalysisConfig, AnalysisNeeds, SamplingConfig};
pub use error::*;
pub use value::*;
