pub mod error;
pub mod pipeline;
pub mod processor;

pub use error::{Result, WorkerError};
pub use pipeline::WorkerPipeline;
pub use processor::{LoggingMediaProcessor, MediaProcessor};
