use controlino_frame::Command;
use tracing::debug;

use crate::cmd::EncodeArgs;
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_command, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let command = build_command(args)?;
    debug!(command = %command, "encoded command");
    print_command(&command, format);
    Ok(SUCCESS)
}

/// The firmware splits command lines on spaces and ends them at a carriage
/// return, so neither may appear inside a token.
fn build_command(args: EncodeArgs) -> CliResult<Command> {
    let invalid = |token: &str| token.is_empty() || token.contains([' ', '\r', '\n']);
    if invalid(&args.name) {
        return Err(CliError::new(
            USAGE,
            format!("invalid command name: {:?}", args.name),
        ));
    }
    if let Some(param) = args.params.iter().find(|p| invalid(p.as_str())) {
        return Err(CliError::new(
            USAGE,
            format!("invalid command parameter: {param:?}"),
        ));
    }
    Ok(Command::new(args.name).args(args.params))
}
