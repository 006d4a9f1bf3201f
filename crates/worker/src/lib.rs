//! Worker process for the analysis swarm.
//!
//! A worker detects its hardware, registers with the dispatcher, keeps a
//! heartbeat running and polls for tasks. Each task is a handful of analysis
//! components for one record, generated through an [`InferenceBackend`] and
//! submitted back as a per-component map.
//!
//! [`InferenceBackend`]: swarm_core::traits::InferenceBackend

pub mod client;
pub mod executor;
pub mod hardware;
pub mod heartbeat;
pub mod inference;
pub mod lifecycle;
pub mod prompts;

pub use client::{ClientTimeouts, DispatcherClient};
pub use executor::{ExecutionOutcome, TaskExecutor};
pub use hardware::{detect_capabilities, WorkerProfile};
pub use heartbeat::{HeartbeatManager, WorkerState};
pub use inference::OllamaBackend;
pub use lifecycle::{WorkerLifecycle, WorkerSummary};
