use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use xmd::cli::{self, CliArgs, Command, ConfigFile};
use xmd::config::Config;
use xmd::error::{Result, XmdError};
use xmd::processor::{self, Processor};

fn main() {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("xmd: {e}");
            eprintln!("{}", cli::USAGE);
            std::process::exit(1);
        }
    };

    env_logger::Builder::new()
        .filter_level(args.log_filter())
        .parse_env("RUST_LOG")
        .init();

    match run(&args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("xmd: {e}");
            std::process::exit(1);
        }
    }
}

/// Execute the command.  `Ok(false)` means it ran but reported problems.
fn run(args: &CliArgs) -> Result<bool> {
    let config = load_config(&args.config)?;

    match &args.command {
        Command::Help => println!("{}", cli::USAGE),
        Command::Version => println!("xmd {}", env!("CARGO_PKG_VERSION")),
        Command::Config => print!("{}", config.to_rc_string()),

        Command::Process(input) | Command::Run(input) => {
            let src = read_input(input)?;
            let mut processor = Processor::new(config);
            if let Some(dir) = input.parent().filter(|d| !d.as_os_str().is_empty()) {
                processor.evaluator_mut().set_base_dir(dir);
            }
            let out = if matches!(args.command, Command::Run(_)) {
                processor.run_script(&src)
            } else {
                processor.process(&src)
            };
            write_output(args.output.as_deref(), &out)?;
            if let Some(msg) = processor.evaluator().error_message() {
                log::error!("{}: {msg}", input.display());
                return Ok(false);
            }
        }

        Command::Validate(input) => {
            let src = read_input(input)?;
            let errors = processor::validate(&src);
            for e in &errors {
                eprintln!("{}:{e}", input.display());
            }
            if !errors.is_empty() {
                return Ok(false);
            }
            log::info!("{}: ok", input.display());
        }
    }
    Ok(true)
}

/// Config from `-c`, the default location, or built-in defaults, then
/// `XMD_*` environment overrides.
fn load_config(source: &ConfigFile) -> Result<Config> {
    let path: Option<PathBuf> = match source {
        ConfigFile::Explicit(p) => Some(p.clone()),
        ConfigFile::Search => Config::default_path(),
    };
    let mut config = match &path {
        Some(p) => {
            let (config, errors) = Config::load_file(p).map_err(|source| XmdError::Io {
                path: p.display().to_string(),
                source,
            })?;
            for e in errors {
                log::warn!("{}: {e}", p.display());
            }
            log::debug!("loaded config from {}", p.display());
            config
        }
        None => Config::default(),
    };
    for problem in config.apply_env() {
        log::warn!("{problem}");
    }
    Ok(config)
}

fn read_input(path: &Path) -> Result<String> {
    let io_err = |source: std::io::Error| XmdError::Io {
        path: path.display().to_string(),
        source,
    };
    if path == Path::new("-") {
        let mut s = String::new();
        std::io::stdin().read_to_string(&mut s).map_err(io_err)?;
        Ok(s)
    } else {
        std::fs::read_to_string(path).map_err(io_err)
    }
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(p) => std::fs::write(p, text).map_err(|source| XmdError::Io {
            path: p.display().to_string(),
            source,
        }),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(text.as_bytes())
                .and_then(|()| stdout.flush())
                .map_err(|source| XmdError::Io {
                    path: "<stdout>".to_owned(),
                    source,
                })
        }
    }
}
