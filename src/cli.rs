use crate::command::Pipeline;
use crate::config::{validate_run_config, ExitPolicy, RunConfig};
use crate::error::{Error, Result};
use crate::relay::DEFAULT_BLOCK_SIZE;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dp",
    version,
    about = "Pipe the output of one command into the input of two others",
    after_help = "Example: dp printf 'hello\\n' : cat : wc -c"
)]
pub struct Cli {
    /// Exit with the highest child exit status instead of always 0.
    #[arg(long)]
    pub strict: bool,

    /// Print a JSON summary of every child's exit status on stderr.
    #[arg(long)]
    pub report: bool,

    /// Bytes the relay reads from the head per iteration.
    #[arg(long = "block-size", value_name = "BYTES", default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,

    /// `<cmd1 arg...> : <cmd2 arg...> : <cmd3 arg...>`. Options are only
    /// recognised before the first command word.
    #[arg(value_name = "COMMANDS", trailing_var_arg = true)]
    pub words: Vec<String>,
}

impl Cli {
    pub fn run_config(&self) -> Result<RunConfig> {
        let cfg = RunConfig {
            block_size: self.block_size,
            exit_policy: if self.strict {
                ExitPolicy::WorstChild
            } else {
                ExitPolicy::AlwaysZero
            },
            report: self.report,
        };
        validate_run_config(&cfg).map_err(Error::Config)?;
        Ok(cfg)
    }

    pub fn pipeline(&self) -> Result<Pipeline> {
        Ok(Pipeline::parse(&self.words)?)
    }
}
