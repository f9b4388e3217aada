mod pipeline;
mod posted;

pub use pipeline::{CycleArgs, ExtractArgs, ResolveArgs, WatchArgs};
pub use posted::{ForgetArgs, PostedCommands};
