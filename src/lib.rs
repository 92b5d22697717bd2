pub mod action;
pub mod attribution;
pub mod batch;
pub mod classifier;
pub mod config;
pub mod derive;
pub mod encode;
pub mod error;
pub mod explain;
pub mod fields;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod registry;
pub mod risk;
pub mod scale;
pub mod selector;

pub use batch::{BatchReport, BatchRunner, CancelToken};
pub use classifier::{ChurnClassifier, LogisticModel};
pub use config::EngineConfig;
pub use error::{ChurnError, Result};
pub use pipeline::{Assessment, ChurnPipeline};
pub use record::RawRecord;
pub use registry::SchemaRegistry;
