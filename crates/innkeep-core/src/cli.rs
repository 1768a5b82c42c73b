use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::commands;
use crate::config::Config;

/// Global flags. Everything after them is the free-form
/// `[filter terms] <command> [args]` tail, carved up by [`Invocation`].
#[derive(Parser, Debug)]
#[command(
    name = "innkeep",
    version,
    about = "Innkeep: property-management CLI",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    /// Raise log verbosity (repeatable).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Lower log verbosity (repeatable).
    #[arg(short, long, action = ArgAction::Count)]
    pub quiet: u8,

    /// Override a config key for this run (repeatable).
    #[arg(long = "rc", value_name = "KEY=VALUE", value_parser = parse_key_val, action = ArgAction::Append)]
    pub rc_overrides: Vec<(String, String)>,

    /// Read settings from this file instead of ~/.innkeeprc.
    #[arg(long)]
    pub rcfile: Option<PathBuf>,

    /// Data directory holding the .data files.
    #[arg(long)]
    pub data: Option<PathBuf>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) => Ok((key.trim().to_string(), value.trim().to_string())),
        None => Err(format!("expected KEY=VALUE, got: {raw}")),
    }
}

/// Splits positional `rc.key=value` (or `rc.key:value`) settings out of
/// the raw argument list; clap never sees them. argv[0] passes through
/// untouched.
pub fn strip_rc_overrides(raw: Vec<OsString>) -> (Vec<OsString>, Vec<(String, String)>) {
    let mut args = Vec::with_capacity(raw.len());
    let mut overrides = Vec::new();

    for (idx, arg) in raw.into_iter().enumerate() {
        if idx > 0
            && let Some((key, value)) = parse_rc_token(&arg)
        {
            debug!(key = %key, value = %value, "positional rc override");
            overrides.push((key, value));
            continue;
        }
        args.push(arg);
    }

    (args, overrides)
}

fn parse_rc_token(arg: &OsString) -> Option<(String, String)> {
    let rest = arg.to_str()?.strip_prefix("rc.")?;
    let (key, value) = rest.split_once('=').or_else(|| rest.split_once(':'))?;
    Some((key.to_string(), value.to_string()))
}

/// Maps the -q/-v counts onto a default log level; an explicit RUST_LOG
/// wins when set. Logs go to stderr so tables and exports on stdout
/// stay pipeable.
pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = match (quiet, verbose) {
        (2.., _) => "error",
        (1, _) => "warn",
        (0, 0) => "warn",
        (0, 1) => "info",
        (0, 2) => "debug",
        (0, _) => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|err| anyhow!("invalid log filter: {err}"))?;

    // tests may have installed their own subscriber already
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .try_init();

    Ok(())
}

/// The free-form tail of the command line. The first token matching a
/// known command name (or a unique prefix of one) is the pivot:
/// everything before it selects records, everything after it belongs to
/// the command.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub filter_terms: Vec<String>,
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let tokens: Vec<String> = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();

        // bare `innkeep` runs the configured default report
        if tokens.is_empty() {
            let command = cfg
                .get("default.command")
                .unwrap_or_else(|| "list".to_string());
            debug!(command = %command, "empty invocation, using default command");
            return Ok(Self {
                filter_terms: vec![],
                command,
                command_args: vec![],
            });
        }

        // `innkeep 3` is shorthand for `innkeep 3 info`
        if let [token] = tokens.as_slice()
            && token.parse::<u64>().is_ok()
        {
            return Ok(Self {
                filter_terms: tokens,
                command: "info".to_string(),
                command_args: vec![],
            });
        }

        let known = commands::known_command_names();
        let pivot = tokens.iter().enumerate().find_map(|(idx, tok)| {
            commands::expand_command_abbrev(tok, &known).map(|full| (idx, full.to_string()))
        });

        let invocation = match pivot {
            Some((idx, command)) => {
                debug!(token = %tokens[idx], command = %command, "resolved command token");
                Self {
                    filter_terms: tokens[..idx].to_vec(),
                    command,
                    command_args: tokens[idx + 1..].to_vec(),
                }
            }
            None => {
                warn!("no command given; treating every term as a filter for 'list'");
                Self {
                    filter_terms: tokens,
                    command: "list".to_string(),
                    command_args: vec![],
                }
            }
        };

        Ok(invocation)
    }
}
