// Command line front end for spider-lock
// Library half of the binary so the commands can be driven from tests

pub mod cli; // Argument parsing
pub mod commands; // Subcommand implementations
pub mod logging; // Tracing subscriber setup
pub mod settings; // Layered configuration

pub use cli::{Cli, Command};
pub use commands::{EXIT_NOT_ACQUIRED, execute};
pub use settings::{Overrides, Settings, SettingsError};
