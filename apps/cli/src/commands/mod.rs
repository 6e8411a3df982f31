//! 命令定义和实现

pub mod config;
pub mod dump;
pub mod run;

pub use config::ConfigCommand;
pub use dump::DumpCommand;
pub use run::RunCommand;
