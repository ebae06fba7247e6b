use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "student-portal",
    about = "Student daily activity aggregation & statistics"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the portal HTTP API.
    Serve,
    Status,
    /// Print daily reports for one student as JSON.
    Report {
        #[arg(long)]
        student_id: String,
        /// YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
        /// Bearer token forwarded to the attendance service.
        #[arg(long)]
        token: Option<String>,
    },
    /// Store activity submissions from a JSON array file.
    Import {
        #[arg(long)]
        file: PathBuf,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, ConfigCommands};
    use clap::Parser;

    #[test]
    fn report_arguments_parse() {
        let cli = Cli::try_parse_from([
            "student-portal",
            "report",
            "--student-id",
            "s-1",
            "--date",
            "2025-03-04",
        ])
        .expect("valid arguments");

        match cli.command {
            Commands::Report {
                student_id,
                date,
                token,
            } => {
                assert_eq!(student_id, "s-1");
                assert_eq!(date.as_deref(), Some("2025-03-04"));
                assert_eq!(token, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_set_takes_key_and_value() {
        let cli = Cli::try_parse_from(["student-portal", "config", "set", "api.port", "9000"])
            .expect("valid arguments");

        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Set { ref key, ref value }
            } if key == "api.port" && value == "9000"
        ));
    }

    #[test]
    fn report_requires_student() {
        assert!(Cli::try_parse_from(["student-portal", "report"]).is_err());
    }
}
