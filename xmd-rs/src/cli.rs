//! Command-line argument parsing.
//!
//! Usage:
//!   xmd [-c<config>] [-vqd] process <input> [-o<output>]
//!   xmd [-c<config>] [-vqd] run <script>
//!   xmd [-c<config>] [-vqd] validate <input>
//!   xmd config | help | version
//!
//! `-` as an input reads standard input.  A lone file argument means
//! `process <file>`.

use std::path::PathBuf;

use log::LevelFilter;

pub const USAGE: &str = "\
Usage: xmd [-c<config>] [-vqd] process <input> [-o<output>]
       xmd [-c<config>] [-vqd] run <script>
       xmd [-c<config>] [-vqd] validate <input>
       xmd config | help | version";

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    pub command: Command,
    /// Which config file to load.
    pub config: ConfigFile,
    /// Where `process` writes its result (`-o<file>`); stdout if unset.
    pub output: Option<PathBuf>,
    /// Info-level logging (`-v`).
    pub verbose: bool,
    /// Errors only (`-q`).
    pub quiet: bool,
    /// Debug-level logging (`-d`).
    pub debug: bool,
}

/// What to do.
#[derive(Debug, Default, PartialEq)]
pub enum Command {
    Process(PathBuf),
    Run(PathBuf),
    Validate(PathBuf),
    /// Print the effective configuration.
    Config,
    #[default]
    Help,
    Version,
}

/// How to choose the config file.
#[derive(Debug, Default, PartialEq)]
pub enum ConfigFile {
    /// `<config_dir>/xmd/xmdrc`, then `./.xmdrc` (default).
    #[default]
    Search,
    /// `-c<file>`: load this specific file.
    Explicit(PathBuf),
}

impl CliArgs {
    /// Default log filter implied by `-q`/`-v`/`-d`; `RUST_LOG` still wins.
    pub fn log_filter(&self) -> LevelFilter {
        if self.debug {
            LevelFilter::Debug
        } else if self.verbose {
            LevelFilter::Info
        } else if self.quiet {
            LevelFilter::Error
        } else {
            LevelFilter::Warn
        }
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or_default())
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut positional: Vec<String> = Vec::new();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            i += 1;
            positional.extend(argv[i..].iter().cloned());
            break;
        }

        // Non-flag argument.
        if !arg.starts_with('-') || arg == "-" {
            positional.push(arg.to_owned());
            i += 1;
            continue;
        }

        // Flag argument: iterate over characters after the leading `-`.
        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'd' => args.debug = true,
                'q' => args.quiet = true,
                'v' => args.verbose = true,

                // -c<file> / -o<file>
                c @ ('c' | 'o') => {
                    let value = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err(format!("-{c} requires a file argument"));
                    };
                    if c == 'c' {
                        args.config = ConfigFile::Explicit(PathBuf::from(value));
                    } else {
                        args.output = Some(PathBuf::from(value));
                    }
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    args.command = command(positional)?;
    Ok(args)
}

fn command(mut positional: Vec<String>) -> Result<Command, String> {
    if positional.is_empty() {
        return Ok(Command::Help);
    }
    let name = positional.remove(0);
    let cmd = match name.as_str() {
        "process" => Command::Process(file_arg(&name, &mut positional, "an input file")?),
        "run" => Command::Run(file_arg(&name, &mut positional, "a script file")?),
        "validate" => Command::Validate(file_arg(&name, &mut positional, "an input file")?),
        "config" => Command::Config,
        "help" => Command::Help,
        "version" => Command::Version,
        _ if positional.is_empty() => Command::Process(PathBuf::from(&name)),
        _ => return Err(format!("unknown command: {name}")),
    };
    if !positional.is_empty() {
        return Err(format!("too many arguments ({})", positional.len() + 1));
    }
    Ok(cmd)
}

/// The single file operand of `name`.
fn file_arg(name: &str, rest: &mut Vec<String>, what: &str) -> Result<PathBuf, String> {
    match rest.len() {
        0 => Err(format!("{name} requires {what}")),
        1 => Ok(PathBuf::from(rest.remove(0))),
        n => Err(format!("too many arguments to {name} ({n})")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
