//! Terminal frontend for the ikviz solver view.
//!
//! - [`config`]: client settings from flags, environment and the config dir
//! - [`transport`]: the WebSocket transport (tokio-tungstenite)
//! - [`session`]: the tokio event loop around a `SolverView`
//! - [`commands`]: interactive line commands
//! - [`panel`]: status line and results panel text

pub mod commands;
pub mod config;
pub mod panel;
pub mod session;
pub mod transport;
