//! Vaultvar CLI - sealed variables in nested variable files
//!
//! Lists, shows, encrypts and decrypts individual values of a YAML-style
//! variable file in place, using scrypt + NaCl secretbox (XSalsa20Poly1305).

use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use vaultvar::commands::Operations;
use vaultvar::config::Config;
use vaultvar::editor::DisplaySink;
use vaultvar::error::{ErrorCategory, ErrorKind, Result, VaultvarError};
use vaultvar::file_ops;
use vaultvar::seal::SecretboxSealer;
use vaultvar::secret::{
    FileSecretSource, ReaderSecretReader, SecretSource, TerminalSecretReader,
};

#[derive(Parser)]
#[command(name = "vaultvar")]
#[command(version)]
#[command(about = "Locate, view and patch sealed variables in variable files.", long_about = None)]
struct Cli {
    /// Configuration file (default: .vaultvar.toml if present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Read the secret from stdin instead of the configured secret file
    #[arg(long, global = true, conflicts_with = "ask_secret")]
    secret_stdin: bool,

    /// Prompt for the secret on the terminal instead of reading the secret file
    #[arg(long, global = true)]
    ask_secret: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decrypt every sealed variable and list them, one per line
    #[command(alias = "l")]
    List {
        /// Path to the variable file
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// Maximum width of a listed line (default: config `width`, else 80)
        #[arg(short, long)]
        width: Option<usize>,

        /// Print a JSON array of {path, key, value, line} instead
        #[arg(long)]
        json: bool,
    },

    /// Print the full value of the variable declared on a line
    #[command(alias = "s")]
    Show {
        /// Path to the variable file
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// 1-based line of the variable's key
        #[arg(short, long)]
        line: usize,
    },

    /// Encrypt the plaintext variable declared on a line, in place
    #[command(alias = "e")]
    Encrypt {
        /// Path to the variable file
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// 1-based line of the variable's key
        #[arg(short, long)]
        line: usize,
    },

    /// Decrypt the sealed variable declared on a line, in place
    #[command(alias = "d")]
    Decrypt {
        /// Path to the variable file
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// 1-based line of the variable's key
        #[arg(short, long)]
        line: usize,
    },
}

/// Shows values on stdout.
struct StdoutDisplay;

impl DisplaySink for StdoutDisplay {
    fn show(&mut self, content: &str) -> Result<()> {
        let mut stdout = io::stdout().lock();
        stdout
            .write_all(content.as_bytes())
            .and_then(|_| {
                if content.ends_with('\n') {
                    Ok(())
                } else {
                    stdout.write_all(b"\n")
                }
            })
            .and_then(|_| stdout.flush())
            .map_err(|e| {
                VaultvarError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to write to stdout",
                    e,
                )
            })
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env("VAULTVAR_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("vaultvar=debug")
        } else {
            EnvFilter::new("vaultvar=warn")
        }
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(io::stderr),
        )
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e.chain());
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::discover(cli.config.as_deref())?;
    config.apply_env(std::env::vars());

    let mut secrets = get_secret_source(cli.secret_stdin, cli.ask_secret, &config);
    let mut ops = Operations::new(&mut *secrets, &SecretboxSealer, &config);

    match cli.command {
        Commands::List { file, width, json } => {
            let buffer = file_ops::read_document(&file)?;
            if json {
                let leaves = ops.decrypt_all(&buffer)?;
                let out = serde_json::to_string_pretty(&leaves).map_err(|e| {
                    VaultvarError::with_kind_and_source(
                        ErrorCategory::Internal,
                        ErrorKind::Io,
                        "failed to render JSON",
                        e,
                    )
                })?;
                println!("{}", out);
            } else {
                for entry in ops.decrypt_all_entries(&buffer, width)? {
                    println!("{}", entry);
                }
            }
        }
        Commands::Show { file, line } => {
            let buffer = file_ops::read_document(&file)?;
            ops.view_secret(&buffer, line, &mut StdoutDisplay)?;
        }
        Commands::Encrypt { file, line } => {
            let mut buffer = file_ops::read_document(&file)?;
            ops.encrypt_under_cursor(&mut buffer, line)?;
            save(&file, &buffer)?;
        }
        Commands::Decrypt { file, line } => {
            let mut buffer = file_ops::read_document(&file)?;
            ops.decrypt_under_cursor(&mut buffer, line)?;
            save(&file, &buffer)?;
        }
    }
    Ok(())
}

fn save(file: &Path, buffer: &vaultvar::editor::MemoryBuffer) -> Result<()> {
    file_ops::write_document(file, buffer)
        .map_err(|e| e.with_context(format!("failed to write to {}", file.display())))
}

fn get_secret_source<'a>(
    use_stdin: bool,
    ask: bool,
    config: &'a Config,
) -> Box<dyn SecretSource + 'a> {
    if use_stdin {
        Box::new(ReaderSecretReader::new(Box::new(io::stdin())))
    } else if ask {
        Box::new(TerminalSecretReader)
    } else {
        Box::new(FileSecretSource::new(config))
    }
}
