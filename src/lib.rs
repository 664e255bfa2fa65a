//! Minechat - resilient client for a dual-socket, line-oriented chat.
//!
//! One socket streams broadcast messages, a second socket authenticates and
//! sends. This crate keeps both alive and authorized across network
//! failures and exposes their traffic and state to a presenter through
//! plain queues.
//!
//! # Architecture
//!
//! The crate follows a supervised-generation pattern:
//!
//! - **Supervisor** - Runs one generation of tasks, restarts it on failure
//! - **Inbound** - Read socket state machine, feeds `receive` and the transcript
//! - **Outbound** - Write socket state machine, handshake plus message round trips
//! - **Keep-alive** - Idle traffic so liveness is observable
//! - **Watchdog** - Turns silence into a generation restart
//!
//! # Modules
//!
//! - [`transport`] - Line framing with bounded reads and writes
//! - [`handshake`] - Token authorization exchange
//! - [`queues`] - The four channels between core and presenter
//! - [`supervisor`] - Generation lifecycle and restart policy
//! - [`config`] - Configuration loading

// Library modules
pub mod config;
pub mod console;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod handshake;
pub mod inbound;
pub mod keepalive;
pub mod oneshot;
pub mod outbound;
pub mod queues;
pub mod registration;
pub mod supervisor;
pub mod transcript;
pub mod transport;
pub mod watchdog;

// Re-export commonly used types
pub use config::Config;
pub use credentials::Credentials;
pub use error::SessionError;
pub use queues::{channels, ConnectionState, PresenterQueues, SessionQueues, StatusUpdate};
pub use supervisor::Supervisor;
