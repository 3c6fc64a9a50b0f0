//! # barista-cli
//!
//! Terminal front end for the Reykal Coffee voice barista.
//!
//! - [`Cli`]: command-line flags
//! - [`Settings`]: config file, `.env`, environment and flags merged
//! - [`console`]: renders conversation updates to the terminal
//! - [`launcher::run`]: wires the model, devices and conversation together
//!
//! ```bash
//! GEMINI_API_KEY=... barista
//! cargo run -p barista-cli --features desktop-audio   # real microphone and speaker
//! ```

pub mod cli;
pub mod config;
pub mod console;
pub mod launcher;

pub use cli::Cli;
pub use config::{FileConfig, Settings};
