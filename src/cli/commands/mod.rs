//! One module per subcommand.  Each exposes an `execute` function.

pub mod audit_cmd;
pub mod delete;
pub mod export;
pub mod get;
pub mod import_cmd;
pub mod init;
pub mod list;
pub mod rotate;
pub mod set;
pub mod stats;
