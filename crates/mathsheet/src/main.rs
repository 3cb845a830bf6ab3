//! Mathsheet command line
//!
//! Types each argument into its own equation, evaluates the worksheet top to bottom and
//! prints every equation with its result.
//!
//! # Usage
//!
//! ```bash
//! mathsheet "a:3" "b:a^2" "a+b"
//! mathsheet --config sheet.yaml --save sheet.json "f(x):x*x" "f(4)"
//! ```
//!
//! `RUST_LOG` controls logging (`RUST_LOG=mathsheet=debug`).

use mathsheet::{ConfigError, EquationStatus, MathsheetConfig, Worksheet, WorksheetError};
use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
usage: mathsheet [options] <equation>...

options:
  -c, --config <file>   load settings from a YAML or JSON file
  -l, --load <file>     start from a saved worksheet
  -s, --save <file>     save the worksheet as JSON after evaluating
  -v, --verbose         log evaluation details to stderr
  -h, --help            show this message";

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}\n\n{usage}", usage = USAGE)]
    Usage(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Worksheet(#[from] WorksheetError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Default)]
struct Options {
    config: Option<PathBuf>,
    load: Option<PathBuf>,
    save: Option<PathBuf>,
    verbose: bool,
    help: bool,
    equations: Vec<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Options, CliError> {
    let mut options = Options::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let mut path = |flag: &str| {
            args.next()
                .map(PathBuf::from)
                .ok_or_else(|| CliError::Usage(format!("{flag} needs a file")))
        };
        match arg.as_str() {
            "-c" | "--config" => options.config = Some(path(&arg)?),
            "-l" | "--load" => options.load = Some(path(&arg)?),
            "-s" | "--save" => options.save = Some(path(&arg)?),
            "-v" | "--verbose" => options.verbose = true,
            "-h" | "--help" => options.help = true,
            "--" => {
                options.equations.extend(args.by_ref());
            }
            flag if flag.starts_with('-') && flag.len() > 1 && !is_number(flag) => {
                return Err(CliError::Usage(format!("unknown option {flag}")));
            }
            equation => options.equations.push(equation.to_string()),
        }
    }
    Ok(options)
}

/// `-2` is an equation, `-x` an option.
fn is_number(arg: &str) -> bool {
    arg[1..].starts_with(|c: char| c.is_ascii_digit() || c == '.')
}

fn setup_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("mathsheet=debug,mathsheet_exec=debug,mathsheet_compiler=debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(options: Options) -> Result<bool, CliError> {
    let config = match &options.config {
        Some(path) => MathsheetConfig::load(path)?,
        None => MathsheetConfig::default(),
    };
    let mut worksheet = match &options.load {
        Some(path) => Worksheet::from_json(&std::fs::read_to_string(path)?, config)?,
        None => Worksheet::new(config)?,
    };
    for text in &options.equations {
        worksheet.add_text(text)?;
    }
    worksheet.recalculate()?;

    let mut ok = true;
    for equation in worksheet.equations() {
        let code = equation.code().unwrap_or_else(|| "?".to_string());
        match equation.status() {
            EquationStatus::Ok => match equation.result_string() {
                Some(result) => println!("{code} = {result}"),
                None => println!("{code}"),
            },
            status => {
                ok = false;
                println!("{code}  [{status}]");
            }
        }
    }

    if let Some(path) = &options.save {
        std::fs::write(path, worksheet.to_json()?)?;
        tracing::info!(path = %path.display(), "saved worksheet");
    }
    Ok(ok)
}

fn main() -> ExitCode {
    let options = match parse_args(env::args().skip(1)) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };
    if options.help || (options.equations.is_empty() && options.load.is_none()) {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }
    setup_tracing(options.verbose);

    match run(options) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("mathsheet: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn options_and_equations() {
        let options = parse_args(args(&["-v", "a:2", "--save", "out.json", "-3+a"])).unwrap();
        assert!(options.verbose);
        assert_eq!(options.save, Some(PathBuf::from("out.json")));
        assert_eq!(options.equations, vec!["a:2".to_string(), "-3+a".to_string()]);
    }

    #[test]
    fn missing_file_is_a_usage_error() {
        let err = parse_args(args(&["--config"])).unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
        let err = parse_args(args(&["-x"])).unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
    }
}
