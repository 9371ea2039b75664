//! loopcheck CLI - continuous loopback integrity tester for serial links.
//!
//! ## Features
//!
//! - Repeated write/read/compare trials against a looped-back serial port
//! - Live status line with error and mismatch rates
//! - Append-only CSV log of every trial
//! - TOML configuration files and environment variable overrides
//! - Internationalization (i18n) support

use anyhow::Result;
use clap::{CommandFactory, FromArgMatches, Parser};
use console::style;
use env_logger::Env;
use log::debug;
use rust_i18n::t;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

mod commands;
mod config;

use config::Config;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Check if decorated output should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

// Initialize i18n with locale files from the locales directory
rust_i18n::i18n!("locales", fallback = "en");

/// loopcheck - continuous loopback integrity tester for serial links.
///
/// Environment variables:
///   LOOPCHECK_PORT   - Default serial port
///   LOOPCHECK_BAUD   - Default baud rate (default: 115200)
///   LOOPCHECK_LANG   - Language/locale (en, zh-CN)
#[derive(Parser, Debug)]
#[command(name = "loopcheck")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Press Ctrl+C to stop a running test.")]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Serial port to test.
    #[arg(short, long, env = "LOOPCHECK_PORT")]
    port: Option<String>,

    /// Baud rate.
    #[arg(
        short,
        long,
        env = "LOOPCHECK_BAUD",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    baud: Option<u32>,

    /// Payload to send on every trial, as hex (e.g. "5A 00 F6 96").
    #[arg(long, value_name = "HEX")]
    payload: Option<String>,

    /// Path to a configuration file.
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,

    /// CSV log file (default: serial_log.csv).
    #[arg(long = "log", value_name = "PATH", conflicts_with = "no_log")]
    log_path: Option<PathBuf>,

    /// Do not write the CSV log.
    #[arg(long)]
    no_log: bool,

    /// Stop after this many trials.
    #[arg(
        short = 'n',
        long,
        value_name = "N",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    count: Option<u64>,

    /// Print the final statistics as JSON.
    #[arg(long)]
    summary_json: bool,

    /// List available serial ports and exit.
    #[arg(long)]
    list_ports: bool,

    /// Output the port list as JSON.
    #[arg(long, requires = "list_ports")]
    json: bool,

    /// Language/locale for messages (e.g., en, zh-CN).
    #[arg(long, env = "LOOPCHECK_LANG")]
    lang: Option<String>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (only warnings and errors in the log output).
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// User-facing failures that carry their own exit code.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Invalid command-line usage.
    #[error("{0}")]
    Usage(String),
    /// Invalid configuration value.
    #[error("{0}")]
    Config(String),
}

/// Map an error to the process exit code.
///
/// 2 usage, 3 configuration or payload format, 4 port open failure,
/// 5 transport fault during the run, 1 anything else.
fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(cli_err) = cause.downcast_ref::<CliError>() {
            return match cli_err {
                CliError::Usage(_) => 2,
                CliError::Config(_) => 3,
            };
        }
        if let Some(lib_err) = cause.downcast_ref::<loopcheck::Error>() {
            return match lib_err {
                loopcheck::Error::Format(_) => 3,
                loopcheck::Error::TransportOpen { .. } => 4,
                e if e.is_transport_fault() => 5,
                _ => 1,
            };
        }
    }
    1
}

/// Supported locales for i18n
const SUPPORTED_LOCALES: &[&str] = &["en", "zh-CN"];

/// Detect the best matching locale from system settings.
///
/// Handles locale formats like:
/// - `zh_CN.UTF-8` -> `zh-CN`
/// - `zh` -> `zh-CN`
/// - `en_US.UTF-8` -> `en`
/// - `C` or `POSIX` -> `en`
fn detect_locale() -> String {
    let system_locale = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    match_locale(&system_locale)
}

/// Normalize a locale string to one of [`SUPPORTED_LOCALES`].
fn match_locale(raw: &str) -> String {
    // Remove encoding suffix (e.g., .UTF-8)
    let locale = raw.split('.').next().unwrap_or(raw);

    // Replace underscore with hyphen for BCP 47 format
    let locale = locale.replace('_', "-");

    if SUPPORTED_LOCALES.contains(&locale.as_str()) {
        return locale;
    }

    let lang_code = locale.split('-').next().unwrap_or(&locale);
    match lang_code.to_lowercase().as_str() {
        "zh" => "zh-CN".to_string(),
        _ => "en".to_string(),
    }
}

/// Find `--lang` on the raw command line so help text is already localized.
fn early_lang(raw_args: &[String]) -> Option<String> {
    let mut lang = None;
    for (i, arg) in raw_args.iter().enumerate() {
        if let Some(val) = arg.strip_prefix("--lang=") {
            lang = Some(val.to_string());
        } else if arg == "--lang" && i + 1 < raw_args.len() {
            lang = Some(raw_args[i + 1].clone());
        }
    }
    lang.or_else(|| env::var("LOOPCHECK_LANG").ok())
}

/// Build the clap command with translated headings and argument help.
fn build_localized_command() -> clap::Command {
    let tpl = format!(
        "{bin} {version}\n\n{about}\n\n\
         {usage_h}:\n  {usage}\n\n\
         {opts_h}:\n{options}\n\n\
         {after_help}\n",
        bin = "{bin}",
        version = "{version}",
        about = "{about}",
        usage_h = t!("help.usage_heading"),
        usage = "{usage}",
        opts_h = t!("help.options_heading"),
        options = "{options}",
        after_help = "{after-help}",
    );

    Cli::command()
        .help_template(tpl)
        .about(t!("app.about").to_string())
        .after_help(t!("app.after_help").to_string())
        .mut_args(localize_arg)
}

/// Replace an arg's help text with its localized version if available.
///
/// Looks up `arg.<id>.help` in the current locale and keeps the doc-comment
/// text when there is no translation.
fn localize_arg(arg: clap::Arg) -> clap::Arg {
    let key = format!("arg.{}.help", arg.get_id().as_str());
    let localized = t!(&key).to_string();
    if localized != key {
        arg.help(localized)
    } else {
        arg
    }
}

fn init_logging(cli: &Cli) {
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();
}

fn run() -> Result<()> {
    let raw_args: Vec<String> = env::args().collect();

    let locale = early_lang(&raw_args).map_or_else(detect_locale, |lang| match_locale(&lang));
    rust_i18n::set_locale(&locale);

    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);

    if env::var_os("NO_COLOR").is_some() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    // Help and version exit 0 on stdout, usage errors exit 2 on stderr
    let matches = build_localized_command()
        .try_get_matches_from(&raw_args)
        .unwrap_or_else(|e| e.exit());
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    init_logging(&cli);

    // Explicit --lang wins over the early guess (which may have come from env)
    if let Some(ref lang) = cli.lang {
        rust_i18n::set_locale(&match_locale(lang));
    }

    debug!(
        "loopcheck v{} (verbose level: {}, locale: {locale})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    if cli.list_ports {
        return commands::ports::cmd_list_ports(cli.json);
    }

    let options = commands::run::RunOptions::resolve(&cli, &config)?;
    commands::run::cmd_run(&options)
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = exit_code(&err);
            eprintln!("{} {err:#}", style("Error:").red().bold());
            if matches!(code, 4 | 5) {
                let hint = t!("run.serial_error_hint");
                if use_fancy_output() {
                    eprintln!("  {}", style(hint).dim());
                } else {
                    eprintln!("  {hint}");
                }
            }
            ExitCode::from(code)
        },
    }
}

#[cfg(test)]
mod locale_tests {
    use super::*;

    #[test]
    fn test_locale_chinese_variants() {
        assert_eq!(match_locale("zh_CN.UTF-8"), "zh-CN");
        assert_eq!(match_locale("zh_CN"), "zh-CN");
        assert_eq!(match_locale("zh-CN"), "zh-CN");
        assert_eq!(match_locale("zh_TW.UTF-8"), "zh-CN");
        assert_eq!(match_locale("zh"), "zh-CN");
    }

    #[test]
    fn test_locale_english_variants() {
        assert_eq!(match_locale("en_US.UTF-8"), "en");
        assert_eq!(match_locale("en_GB.UTF-8"), "en");
        assert_eq!(match_locale("en"), "en");
    }

    #[test]
    fn test_locale_posix_defaults() {
        assert_eq!(match_locale("C"), "en");
        assert_eq!(match_locale("POSIX"), "en");
        assert_eq!(match_locale("C.UTF-8"), "en");
    }

    #[test]
    fn test_locale_unsupported_fallback() {
        assert_eq!(match_locale("de_DE.UTF-8"), "en");
        assert_eq!(match_locale("ja_JP.UTF-8"), "en");
    }

    #[test]
    fn test_early_lang_forms() {
        let args = |v: &[&str]| v.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(
            early_lang(&args(&["loopcheck", "--lang", "zh-CN"])).as_deref(),
            Some("zh-CN")
        );
        assert_eq!(
            early_lang(&args(&["loopcheck", "--lang=en"])).as_deref(),
            Some("en")
        );
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn test_cli_command_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_localized_command_is_valid() {
        build_localized_command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["loopcheck"]).unwrap();
        assert!(cli.payload.is_none());
        assert!(cli.count.is_none());
        assert!(!cli.no_log);
        assert!(!cli.summary_json);
        assert!(!cli.list_ports);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_parse_run_options() {
        let cli = Cli::try_parse_from([
            "loopcheck",
            "-p",
            "/dev/ttyACM0",
            "-b",
            "921600",
            "--payload",
            "AA BB",
            "-n",
            "50",
            "--log",
            "run.csv",
            "--summary-json",
        ])
        .unwrap();
        assert_eq!(cli.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(cli.baud, Some(921600));
        assert_eq!(cli.payload.as_deref(), Some("AA BB"));
        assert_eq!(cli.count, Some(50));
        assert_eq!(cli.log_path, Some(PathBuf::from("run.csv")));
        assert!(cli.summary_json);
    }

    #[test]
    fn test_cli_log_and_no_log_conflict() {
        assert!(Cli::try_parse_from(["loopcheck", "--log", "a.csv", "--no-log"]).is_err());
    }

    #[test]
    fn test_cli_zero_count_rejected() {
        assert!(Cli::try_parse_from(["loopcheck", "-n", "0"]).is_err());
    }

    #[test]
    fn test_cli_zero_baud_rejected() {
        assert!(Cli::try_parse_from(["loopcheck", "--baud", "0"]).is_err());
    }

    #[test]
    fn test_cli_json_requires_list_ports() {
        assert!(Cli::try_parse_from(["loopcheck", "--json"]).is_err());
        let cli = Cli::try_parse_from(["loopcheck", "--list-ports", "--json"]).unwrap();
        assert!(cli.list_ports && cli.json);
    }

    #[test]
    fn test_cli_verbose_count() {
        let cli = Cli::try_parse_from(["loopcheck", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["loopcheck", "-q", "-v"]).is_err());
    }

    #[test]
    fn test_exit_code_mapping() {
        let usage: anyhow::Error = CliError::Usage("bad".into()).into();
        assert_eq!(exit_code(&usage), 2);

        let config: anyhow::Error = CliError::Config("bad".into()).into();
        assert_eq!(exit_code(&config), 3);

        let format = anyhow::Error::new(loopcheck::Error::from(
            "5G".parse::<loopcheck::Payload>().unwrap_err(),
        ))
        .context("Invalid payload");
        assert_eq!(exit_code(&format), 3);

        let open = anyhow::Error::new(loopcheck::Error::TransportOpen {
            port: "COM99".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        });
        assert_eq!(exit_code(&open), 4);

        let fault = anyhow::Error::new(loopcheck::Error::PortClosed).context("Serial error");
        assert_eq!(exit_code(&fault), 5);

        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }
}
