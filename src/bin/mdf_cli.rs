//! Model Definition Format CLI
//!
//! Tokenize, check and dump definition files.
//!
//! # Usage
//!
//! ```bash
//! # Show the token stream of a file
//! mdf_cli tokens schema/user.mdl
//!
//! # Load files as one batch and report diagnostics
//! mdf_cli check schema/*.mdl
//!
//! # Print resolved models as JSON
//! mdf_cli --format json dump schema/*.mdl --model User
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use mdf::{tokenize, BuiltModel, Diagnostic, MdfConfig, MdfError, Named, Registry, TokenKind};

#[derive(Parser)]
#[command(name = "mdf_cli")]
#[command(version)]
#[command(about = "Tokenize, check and dump model definition files")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: json or pretty (default)
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,

    /// Config file (defaults to $MDF_CONFIG, then ./mdf.yaml)
    #[arg(long, short, global = true, env = "MDF_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the token stream of a file
    Tokens {
        file: PathBuf,
    },

    /// Load files as one batch and report diagnostics
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Load files and print the resolved models
    Dump {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Only dump this model
        #[arg(short, long)]
        model: Option<String>,
    },
}

// =============================================================================
// MAIN
// =============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Tokens { file } => cmd_tokens(file, cli.format),
        Commands::Check { files } => {
            load_config(cli.config).and_then(|config| cmd_check(files, config, cli.format))
        }
        Commands::Dump { files, model } => load_config(cli.config)
            .and_then(|config| cmd_dump(files, model, config, cli.format)),
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "error": e }));
            } else {
                eprintln!("{}: {}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<MdfConfig, String> {
    match path {
        Some(path) => MdfConfig::load(path),
        None => MdfConfig::from_env(),
    }
    .map_err(|e| format!("{:#}", e))
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

fn cmd_tokens(file: PathBuf, format: OutputFormat) -> Result<(), String> {
    let source = std::fs::read_to_string(&file)
        .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
    let path = file.to_string_lossy();

    let tokens = match tokenize(&source, Some(path.as_ref())) {
        Ok(tokens) => tokens,
        Err(errors) => {
            print_diagnostics(&errors, format)?;
            return Err(format!("{} lexical error(s)", errors.len()));
        }
    };

    match format {
        OutputFormat::Json => {
            let output: Vec<_> = tokens
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "kind": t.kind.to_string(),
                        "lexeme": t.lexeme,
                        "line": t.line,
                        "offset": t.offset,
                    })
                })
                .collect();
            print_json(&output)?;
        }
        OutputFormat::Pretty => {
            for token in &tokens {
                let kind = match token.kind {
                    TokenKind::Keyword(_) => token.kind.to_string().magenta(),
                    TokenKind::Symbol(_) => token.kind.to_string().dimmed(),
                    TokenKind::Eof => token.kind.to_string().dimmed(),
                    _ => token.kind.to_string().cyan(),
                };
                println!(
                    "{:>4}:{:<4} {:<20} {}",
                    token.line, token.offset, kind, token.lexeme
                );
            }
        }
    }

    Ok(())
}

fn cmd_check(files: Vec<PathBuf>, config: MdfConfig, format: OutputFormat) -> Result<(), String> {
    let mut registry = Registry::with_config(config);

    match registry.load_all_files(&files) {
        Ok(()) => {
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "valid": true,
                    "models": registry.models().count(),
                    "enums": registry.enums().count(),
                    "typedefs": registry.typedefs().count(),
                }))?,
                OutputFormat::Pretty => {
                    println!(
                        "{} {} file(s): {} models, {} enums, {} typedefs",
                        "OK".green(),
                        files.len(),
                        registry.models().count(),
                        registry.enums().count(),
                        registry.typedefs().count()
                    );
                    for decl in registry.declarations() {
                        println!("  {} {} ({})", decl.kind(), decl.name(), decl.trace());
                    }
                }
            }
            Ok(())
        }
        Err(e) => report_load_error(e, format),
    }
}

fn cmd_dump(
    files: Vec<PathBuf>,
    model: Option<String>,
    config: MdfConfig,
    format: OutputFormat,
) -> Result<(), String> {
    let mut registry = Registry::with_config(config);
    if let Err(e) = registry.load_all_files(&files) {
        return report_load_error(e, format);
    }

    let models: Vec<BuiltModel> = match &model {
        Some(name) => {
            let model = registry
                .model(name)
                .ok_or_else(|| format!("Unknown model `{}`", name))?;
            vec![model.build(&registry).map_err(|e| e.to_string())?]
        }
        None => registry
            .models()
            .map(|m| m.build(&registry))
            .collect::<Result<_, _>>()
            .map_err(|e| e.to_string())?,
    };

    match format {
        OutputFormat::Json => print_json(&models)?,
        OutputFormat::Pretty => {
            for built in &models {
                let table = built.table.as_deref().unwrap_or("-");
                println!("{} {} -> {}", "model".bold(), built.name.bold(), table);
                for field in built.fields.values() {
                    let default = field
                        .default
                        .as_ref()
                        .map(|d| format!(" = {}", d))
                        .unwrap_or_default();
                    println!(
                        "  {:<8} {:<24} {}{}",
                        field.visibility.as_str().dimmed(),
                        field.ty.to_string().cyan(),
                        field.name,
                        default
                    );
                }
            }
        }
    }

    Ok(())
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

fn report_load_error(e: MdfError, format: OutputFormat) -> Result<(), String> {
    print_diagnostics(e.diagnostics(), format)?;
    Err(e.to_string())
}

fn print_diagnostics(diagnostics: &[Diagnostic], format: OutputFormat) -> Result<(), String> {
    match format {
        OutputFormat::Json => print_json(&diagnostics),
        OutputFormat::Pretty => {
            for diagnostic in diagnostics {
                eprintln!("{} {}", "✗".red(), diagnostic);
            }
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("JSON serialization failed: {}", e))?;
    println!("{}", json);
    Ok(())
}
