//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`validate`], or [`health`]. Each handler
//! lives in its own submodule.

pub mod health;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::FrontdoorError;

pub async fn dispatch(cli: Cli) -> Result<(), FrontdoorError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Validate(ref args)) => validate::execute(args),
        Some(Commands::Health(args)) => health::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  frontdoor v{version}: edge gateway for a hosted-script events backend\n\n  \
         No command provided. To get started:\n\n    \
         frontdoor run                       Start the gateway (auto-detects ./frontdoor.yaml)\n    \
         frontdoor run -c frontdoor.yaml     Start with a specific config file\n    \
         frontdoor validate frontdoor.yaml   Check a config file\n    \
         frontdoor --help                    See all commands and options\n"
    );
}
