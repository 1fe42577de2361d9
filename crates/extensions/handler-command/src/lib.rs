//! Command handler for deferrun.
//!
//! Runs an external program against each payload, e.g. `python3 <payload>`
//! for kind `py`.

mod command;

pub use command::CommandHandler;
