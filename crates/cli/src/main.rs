use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

use wildcheck_cfn as cfn;

#[derive(Parser, Debug)]
#[command(author, version, about="wildcheck — flag wildcard Resources in IAM policies")]
struct Cli {
    /// Exit with status 1 when a wildcard resource is found
    #[arg(long, default_value_t=false, global = true)]
    deny_wildcards: bool,

    /// Log level (logs go to stderr as JSON)
    #[arg(long, value_enum, default_value_t=LogLevel::Warn, global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum LogLevel { Error, Warn, Info, Debug, Trace }

impl From<LogLevel> for Level {
    fn from(l: LogLevel) -> Level {
        match l {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn  => Level::WARN,
            LogLevel::Info  => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum Format { Text, Json }

#[derive(Subcommand, Debug)] enum Cmd {
    /// Check one policy document ({"PolicyName", "PolicyDocument"}); prints true when asterisk free
    Check {
        /// Policy file; stdin when omitted or "-"
        file: Option<PathBuf>,
    },
    /// Check every inline policy of the AWS::IAM::Role resources in a CloudFormation template
    Template {
        /// Template file (.json, .yaml or .yml)
        file: PathBuf,
        #[arg(long, value_enum, default_value_t=Format::Text)]
        format: Format,
    },
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(p) if p != Path::new("-") => std::fs::read_to_string(p)
            .with_context(|| format!("read policy {}", p.display())),
        _ => {
            let mut s = String::new();
            std::io::stdin().read_to_string(&mut s).context("read policy from stdin")?;
            Ok(s)
        }
    }
}

/// Returns whether everything scanned was asterisk free.
fn run(cli: &Cli) -> Result<bool> {
    match &cli.cmd {
        Cmd::Check { file } => {
            let _span = tracing::info_span!("check", file = ?file).entered();
            let text = read_input(file.as_deref())?;
            let free = wildcheck_policy::is_asterisk_free(&text)?;
            println!("{}", free);
            Ok(free)
        }
        Cmd::Template { file, format } => {
            let _span = tracing::info_span!("template", file = %file.display()).entered();
            let tpl = cfn::load_template(file)?;
            let findings = cfn::scan_template(&tpl)?;
            tracing::info!(policies = findings.len(), "template scanned");
            match format {
                Format::Text => for f in &findings { println!("{}/{}: {}", f.role, f.policy, f.asterisk_free); },
                Format::Json => println!("{}", serde_json::to_string_pretty(&findings)?),
            }
            Ok(findings.iter().all(|f| f.asterisk_free))
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt().json()
        .with_max_level(Level::from(cli.log_level))
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    match run(&cli) {
        Ok(free) if !free && cli.deny_wildcards => {
            tracing::warn!("wildcard resource found");
            ExitCode::from(1)
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "check failed");
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
