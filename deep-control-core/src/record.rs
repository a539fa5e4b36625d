//! Types and traits for recording training metrics.
//!
//! * [`Record`] - key-value container of [`RecordValue`]s
//! * [`Recorder`] - destination of records
//! * [`BufferedRecorder`] - keeps records in memory, mainly for tests
//! * [`NullRecorder`] - discards records
//!
//! ```rust
//! use deep_control_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("env_steps", RecordValue::Scalar(100.0));
//! record.insert("eval_return", RecordValue::Scalar(-3.5));
//! assert_eq!(record.get_scalar("eval_return").unwrap(), -3.5);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
