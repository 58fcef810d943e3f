// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Druckwerk - print documents through configured printers
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "druckwerk")]
#[command(version)]
#[command(about = "Printer application service: discover devices and print files")]
pub struct Cli {
    /// System configuration file (JSON)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the devices every enabled scheme can see
    Devices,

    /// Print files, one job each, and wait for them to finish
    Print {
        /// Configured printer name
        printer: String,

        /// Documents to print
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_print_with_config() {
        let cli = Cli::try_parse_from([
            "druckwerk", "--config", "/etc/dw.json", "print", "lp", "a.png", "b.pwg",
        ])
        .expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("/etc/dw.json")));
        assert_eq!(
            cli.command,
            Command::Print {
                printer: "lp".into(),
                files: vec![PathBuf::from("a.png"), PathBuf::from("b.pwg")],
            }
        );
    }

    #[test]
    fn config_is_accepted_after_the_command() {
        let cli = Cli::try_parse_from(["druckwerk", "devices", "-c", "dw.json"]).expect("parse");
        assert_eq!(cli.command, Command::Devices);
        assert_eq!(cli.config, Some(PathBuf::from("dw.json")));
    }

    #[test]
    fn rejects_bad_command_lines() {
        assert!(Cli::try_parse_from(["druckwerk"]).is_err());
        assert!(Cli::try_parse_from(["druckwerk", "print", "lp"]).is_err());
        assert!(Cli::try_parse_from(["druckwerk", "devices", "extra"]).is_err());
        assert!(Cli::try_parse_from(["druckwerk", "--config"]).is_err());
        assert!(Cli::try_parse_from(["druckwerk", "scan"]).is_err());
    }
}
