pub mod error;
pub mod store;
pub mod types;

pub use error::{JobStoreError, JobStoreResult};
pub use store::JobStore;
pub use types::FailedJobRecord;
