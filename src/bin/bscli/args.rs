use clap::{ArgAction, Parser};

/// Interactive beanstalk client.
#[derive(Parser, Debug)]
#[command(about, long_about = None, version, disable_help_flag = true)]
pub(crate) struct Args {
    /// Server hostname. The short flag shadows clap's help flag on
    /// purpose; `--help` still works.
    #[arg(short = 'h', long, default_value = "localhost")]
    pub(crate) host: String,
    /// (TCP) port to connect to.
    #[arg(short, long, default_value_t = 11300)]
    pub(crate) port: u16,
    /// Enables verbose logging.
    #[arg(short, long, default_value_t)]
    pub(crate) debug: bool,
    /// Print help.
    #[arg(long, action = ArgAction::Help)]
    pub(crate) help: Option<bool>,
    /// Run this command and exit instead of starting the shell.
    #[arg(trailing_var_arg = true)]
    pub(crate) command: Vec<String>,
}
