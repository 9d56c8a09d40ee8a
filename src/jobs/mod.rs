//! Long-running server jobs tracked by repeated status queries.

pub mod poller;

pub use poller::{
    AsyncOperation, AsyncOperationBuilder, JobStatusSource, OperationOutcome, OperationState,
    OperationStatus, OperationWatcher, PollPolicy,
};
