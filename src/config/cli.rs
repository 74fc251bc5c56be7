use crate::utils::logger::LogFormat;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "bounce-sweep")]
#[command(about = "Deactivate accounts whose email address hard-bounced at the mail provider")]
pub struct CliArgs {
    #[arg(long, short, help = "TOML settings file (defaults to SENDGRID_API_KEY from the environment)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}
