//! The loopback run.
//!
//! Resolves the effective settings from the command line and config files,
//! opens the log and the port, then hands both to a [`Session`] until Ctrl+C,
//! the trial limit, or a transport fault ends it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use console::style;
use log::{info, warn};
use loopcheck::{
    CancelToken, CsvLog, NativePort, Payload, Port, SerialConfig, Session, Statistics,
    StopReason, TerminalReporter, TrialTiming, error_log_header,
};
use rust_i18n::t;

use crate::config::Config;
use crate::{Cli, CliError};

/// Separator printed around the error-log header.
const RULE: &str = "----------------------------------------------------------------";

/// Effective settings for one run.
#[derive(Debug)]
pub(crate) struct RunOptions {
    pub serial: SerialConfig,
    pub payload: Payload,
    pub timing: TrialTiming,
    pub log_path: Option<PathBuf>,
    pub count: Option<u64>,
    pub summary_json: bool,
}

impl RunOptions {
    /// Merge command-line values over the loaded configuration.
    ///
    /// Fails before any device or file is touched when the payload or a
    /// setting is invalid.
    pub(crate) fn resolve(cli: &Cli, config: &Config) -> Result<Self> {
        let port_name = cli
            .port
            .as_deref()
            .unwrap_or_else(|| config.port_name());
        if port_name.trim().is_empty() {
            return Err(CliError::Usage(t!("error.empty_port").to_string()).into());
        }

        let baud = cli.baud.unwrap_or_else(|| config.baud_rate());
        if baud == 0 {
            return Err(CliError::Config(t!("error.zero_baud").to_string()).into());
        }

        let hex = cli
            .payload
            .as_deref()
            .unwrap_or_else(|| config.payload_hex());
        let payload = hex
            .parse::<Payload>()
            .map_err(loopcheck::Error::from)
            .with_context(|| t!("error.invalid_payload", payload = hex).to_string())?;

        let log_path = if cli.no_log {
            None
        } else if let Some(ref path) = cli.log_path {
            Some(path.clone())
        } else if config.log_enabled() {
            Some(config.log_path())
        } else {
            None
        };

        Ok(Self {
            serial: SerialConfig::new(port_name, baud).with_timeout(config.read_timeout()),
            payload,
            timing: TrialTiming {
                send_delay: config.send_delay(),
                read_timeout: config.read_timeout(),
                loop_delay: config.loop_delay(),
            },
            log_path,
            count: cli.count,
            summary_json: cli.summary_json,
        })
    }
}

/// Run the loopback test until it is stopped.
pub(crate) fn cmd_run(options: &RunOptions) -> Result<()> {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context(t!("error.ctrlc").to_string())?;

    // The log is bootstrapped before the port so a bad path fails fast
    let sink = match options.log_path {
        Some(ref path) => Some(CsvLog::open(path).with_context(|| {
            t!("error.log_open_failed", path = path.display().to_string()).to_string()
        })?),
        None => None,
    };

    let port_name = options.serial.port_name.as_str();
    let mut port = NativePort::open(&options.serial)
        .with_context(|| t!("error.open_failed", port = port_name).to_string())?;
    if let Err(e) = port.clear_buffers() {
        warn!("Failed to clear stale input on {port_name}: {e}");
    }

    println!(
        "{}",
        t!(
            "run.banner",
            port = port_name,
            baud = options.serial.baud_rate,
            payload = options.payload.to_string()
        )
    );
    if let Some(ref sink) = sink {
        info!("Logging every trial to {}", sink.path().display());
    }
    println!("{RULE}");
    println!("{}", error_log_header());
    println!("{RULE}");

    let mut session = Session::new(options.payload.clone(), options.timing, cancel);
    if let Some(sink) = sink {
        session = session.with_sink(Box::new(sink));
    }
    if let Some(count) = options.count {
        session = session.with_trial_limit(count);
    }

    let mut reporter = TerminalReporter::stdout();
    let result = session.run(&mut port, &mut reporter);

    let reason = match result {
        Ok(ref summary) => {
            let message = match summary.reason {
                StopReason::Cancelled => t!("run.stopped_by_user").to_string(),
                StopReason::TrialLimit => {
                    t!("run.completed", count = summary.stats.total_sent()).to_string()
                },
            };
            println!("\n{}", style(message).bold());
            reason_name(Some(summary.reason))
        },
        Err(_) => reason_name(None),
    };

    let stats = session.stats();
    println!("{}", t!("run.final_stats", stats = stats.to_string()));
    println!("{}", style(t!("run.port_closed")).dim());

    if options.summary_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary_json(port_name, reason, stats)?)?
        );
    }

    result
        .map(|_| ())
        .with_context(|| t!("run.serial_error", port = port_name).to_string())
}

fn reason_name(reason: Option<StopReason>) -> &'static str {
    match reason {
        Some(StopReason::Cancelled) => "cancelled",
        Some(StopReason::TrialLimit) => "trial_limit",
        None => "transport_fault",
    }
}

/// Counters come from the library's serialized [`Statistics`], so the summary
/// keys follow the struct fields.
fn summary_json(
    port: &str,
    reason: &str,
    stats: &Statistics,
) -> serde_json::Result<serde_json::Value> {
    let mut value = serde_json::to_value(stats)?;
    if let Some(object) = value.as_object_mut() {
        object.insert("port".to_string(), port.into());
        object.insert("reason".to_string(), reason.into());
        object.insert(
            "percentages".to_string(),
            serde_json::to_value(stats.percentages())?,
        );
    }
    Ok(value)
}
