// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Druckwerk — printer application service.
//
// Entry point. Loads configuration, initialises logging, starts the printing
// system and runs one command. Ctrl-C shuts the system down cleanly.

mod cli;

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use druckwerk_core::config::SystemConfig;
use druckwerk_core::error::Result;
use druckwerk_core::types::{DocumentFormat, JobId, JobState};
use druckwerk_print::{Event, System};
use druckwerk_raster::PrintRequest;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SystemConfig::load(path),
        None => Ok(SystemConfig::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("cannot load configuration: {e}");
            return ExitCode::from(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!("Druckwerk starting");

    match run(cli.command, config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "druckwerk failed");
            eprintln!("druckwerk: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run a command; `Ok(false)` when it finished but something did not print.
async fn run(command: Command, config: SystemConfig) -> Result<bool> {
    let system = Arc::new(System::new(config)?);

    let outcome = match command {
        Command::Devices => {
            for device in system.list_devices(None) {
                println!("{:?}\t{}\t{}", device.device_type, device.uri, device.info);
                if let Some(id) = &device.device_id {
                    println!("\t{id}");
                }
            }
            Ok(true)
        }
        Command::Print { printer, files } => {
            system.add_configured_printers()?;
            print_files(&system, &printer, &files).await
        }
    };

    let sys = system.clone();
    if tokio::task::spawn_blocking(move || sys.shutdown()).await.is_err() {
        tracing::error!("shutdown task panicked");
    }
    outcome
}

/// Submit each file as its own job and wait until all are finished or
/// Ctrl-C is pressed.
async fn print_files(system: &System, printer: &str, files: &[impl AsRef<Path>]) -> Result<bool> {
    let mut events = system.subscribe();
    let mut waiting: BTreeMap<JobId, String> = BTreeMap::new();

    for path in files {
        let path = path.as_ref();
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(DocumentFormat::from_extension)
            .unwrap_or_else(|| DocumentFormat::Other("application/octet-stream".into()));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut file = File::open(path)?;
        let job = system.printer(printer)?.print_job(
            &name,
            &whoami(),
            PrintRequest::default(),
            &mut file,
            format,
        )?;
        println!("{printer}-{}\t{name}", job.id());
        waiting.insert(job.id(), name);
    }

    let target = system.printer(printer)?;
    let mut all_completed = true;
    let mut settle = |waiting: &mut BTreeMap<JobId, String>| {
        waiting.retain(|id, name| match target.job(*id).map(|j| j.attributes()) {
            Ok(attrs) if attrs.state.is_terminal() => {
                let message = attrs.state_message.unwrap_or_default();
                println!("{printer}-{id}\t{name}\t{}\t{message}", attrs.state_keyword);
                all_completed &= attrs.state == JobState::Completed;
                false
            }
            Ok(_) => true,
            Err(_) => false,
        });
    };

    settle(&mut waiting);
    while !waiting.is_empty() {
        tokio::select! {
            event = events.recv() => match event {
                Ok(Event::JobStateChanged { printer: p, job_id, state, .. })
                    if p == printer && state.is_terminal() && waiting.contains_key(&job_id) =>
                {
                    settle(&mut waiting);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event receiver lagged");
                    settle(&mut waiting);
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, shutting down");
                return Ok(false);
            }
        }
    }
    Ok(all_completed)
}

fn whoami() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "anonymous".into())
}
