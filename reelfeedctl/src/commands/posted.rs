use clap::{Args, Subcommand};

#[derive(Subcommand, Debug, Clone)]
pub enum PostedCommands {
    /// Lists titles already published
    List,
    /// Removes a title so the next cycle publishes it again
    Forget(ForgetArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ForgetArgs {
    /// Exact listing title
    pub title: String,
}
