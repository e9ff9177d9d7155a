//! breakpad-upload CLI - send Breakpad minidumps to a crash collector
//!
//! Asks for consent on the terminal, then uploads the dump with the
//! configured metadata. Can also preview the exact request body and list
//! pending dumps.

use breakpad_upload::{
    list_dumps, AlwaysSend, Consent, ConsentPrompt, CrashHandler, CrashOutcome, UploaderConfig,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "breakpad-upload")]
#[command(about = "Send Breakpad crash dumps to a crash collection server, with user consent")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask for consent and upload a crash dump
    Upload {
        /// Dump file name (relative to the dump directory) or path
        dump: String,

        /// JSON config file
        #[arg(short, long, env = "BREAKPAD_UPLOAD_CONFIG")]
        config: Option<PathBuf>,

        /// Upload endpoint (overrides the config file)
        #[arg(short, long, env = "BREAKPAD_UPLOAD_URL")]
        endpoint: Option<String>,

        /// Send without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Write the request body that would be sent
    Preview {
        /// Dump file name (relative to the dump directory) or path
        dump: String,

        /// JSON config file
        #[arg(short, long, env = "BREAKPAD_UPLOAD_CONFIG")]
        config: Option<PathBuf>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List dumps waiting in the dump directory
    List {
        /// JSON config file
        #[arg(short, long, env = "BREAKPAD_UPLOAD_CONFIG")]
        config: Option<PathBuf>,

        /// Dump directory (overrides the config file)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

/// Asks on the terminal; anything but yes declines.
struct TerminalPrompt;

impl ConsentPrompt for TerminalPrompt {
    fn ask(&self, dump: &Path) -> Consent {
        println!("{}", "The application has crashed.".red().bold());
        println!("  {} {}", "Dump:".cyan(), dump.display());
        print!("Send a crash report? [y/N] ");
        if io::stdout().flush().is_err() {
            return Consent::Declined;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) if matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") => Consent::Send,
            _ => Consent::Declined,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Upload {
            dump,
            config,
            endpoint,
            yes,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }
            upload(config, &dump, yes).await?;
        }
        Commands::Preview {
            dump,
            config,
            output,
        } => {
            let config = load_config(config.as_deref())?;
            preview(config, &dump, output.as_deref())?;
        }
        Commands::List { config, dir } => {
            let config = load_config(config.as_deref())?;
            let dir = dir.unwrap_or(config.dump_dir);
            show_dumps(&dir)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<UploaderConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(UploaderConfig::load(path)?),
        None => Ok(UploaderConfig::default()),
    }
}

async fn upload(config: UploaderConfig, dump: &str, yes: bool) -> Result<(), Box<dyn std::error::Error>> {
    let handler = CrashHandler::new(config)?;

    let outcome = if yes {
        handler.on_crashed(dump, &AlwaysSend).await?
    } else {
        handler.on_crashed(dump, &TerminalPrompt).await?
    };

    match outcome {
        CrashOutcome::Uploaded(status) => {
            println!(
                "{} crash report sent to {} ({})",
                "✓".green().bold(),
                handler.config().endpoint,
                status
            );
        }
        CrashOutcome::Declined => {
            println!("{} crash report not sent", "✗".yellow());
        }
    }

    Ok(())
}

fn preview(config: UploaderConfig, dump: &str, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config.resolve_dump(dump);
    let mut body = breakpad_upload::build_report(&config, dump, &path)?;

    eprintln!("{} {}", "Content-Type:".cyan(), body.content_type());
    eprintln!("{} {}", "Content-Length:".cyan(), body.content_length());

    let mut stream = body.open_stream()?;
    let written = match output {
        Some(file) => {
            let mut sink = io::BufWriter::new(std::fs::File::create(file)?);
            stream.write_to(&mut sink)?
        }
        None => stream.write_to(&mut io::stdout().lock())?,
    };

    eprintln!("{} {} bytes written", "✓".green().bold(), written);
    Ok(())
}

fn show_dumps(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let dumps = list_dumps(dir)?;

    println!("{}", "━".repeat(60).dimmed());
    println!(
        "{} {} in {}",
        "Pending dumps:".green().bold(),
        dumps.len(),
        dir.display()
    );
    println!("{}", "━".repeat(60).dimmed());

    for dump in &dumps {
        println!(
            "  {} {} {}",
            dump.modified.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            dump.name().cyan(),
            format!("({} bytes)", dump.size).dimmed()
        );
    }

    Ok(())
}
