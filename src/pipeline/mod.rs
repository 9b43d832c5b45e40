//! Concurrent job pipeline
//!
//! ```text
//! JobSource -> Validator -> Jobber -> job queue -> Worker x N -> result queue -> Stasher -> Sink
//!                              \                       |                           |
//!                               +--- hard max ----> Counters ---- events ----> ProgressMonitor
//! ```
//!
//! Stages communicate through bounded crossbeam channels carrying [`Message`]s and
//! through shared [`Counter`]s. Every consumer gets exactly one `Done`.

pub mod cancel;
pub mod counter;
pub mod job;
pub mod jobber;
pub mod message;
pub mod monitor;
pub mod orchestrator;
pub mod source;
pub mod stasher;
pub mod validator;
pub mod worker;

pub use cancel::CancelToken;
pub use counter::{Counter, CounterEvent, CounterSnapshot};
pub use job::{AnalysisResult, Job};
pub use jobber::{Jobber, JobberReport};
pub use message::Message;
pub use monitor::{MonitorReport, ProgressMonitor};
pub use orchestrator::{JOBS_COUNTER, Pipeline, PipelineReport, RESULTS_COUNTER};
pub use source::JobSource;
pub use stasher::{StashReport, Stasher};
pub use validator::{MaxSizeValidator, RegularFileValidator, Validator, ValidatorChain};
pub use worker::{Warning, Worker, WorkerReport, analyze_job};
