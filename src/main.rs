//! Stylemix CLI
//!
//! The `stylemix` command expands mixins in a stylesheet.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use stylemix::{lexer, parser, stringify, Message, Options, Processor};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "stylemix")]
#[command(version = stylemix::VERSION)]
#[command(about = "Expand mixins in stylesheets", long_about = None)]
struct Cli {
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand every mixin in a stylesheet
    Expand {
        /// Input stylesheet
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// JSON options file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Directory to load mixins from
        #[arg(long = "mixins-dir", value_name = "DIR")]
        mixins_dir: Vec<PathBuf>,

        /// Glob of mixin files
        #[arg(long = "mixins-file", value_name = "GLOB")]
        mixins_file: Vec<String>,

        /// Drop calls to undefined mixins instead of failing
        #[arg(long)]
        silent: bool,

        /// Parent reported for discovered files
        #[arg(long, value_name = "PATH")]
        parent: Option<PathBuf>,

        /// Print dependency messages to stderr
        #[arg(long)]
        print_deps: bool,
    },

    /// Tokenize a file and print tokens
    Tokenize {
        /// Input file to tokenize
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Parse a file and print its tree
    Parse {
        /// Input file to parse
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "stylemix=debug",
        _ => "stylemix=trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Expand {
            input,
            output,
            config,
            mixins_dir,
            mixins_file,
            silent,
            parent,
            print_deps,
        } => {
            let mut options = match config {
                Some(path) => Options::from_json_file(&path).map_err(|e| miette::miette!("{}", e))?,
                None => Options::new(),
            };
            options.mixins_dir.extend(mixins_dir);
            options.mixins_files.extend(mixins_file);
            options.silent |= silent;
            if parent.is_some() {
                options.parent = parent;
            }

            let source = fs::read_to_string(&input)
                .map_err(|e| miette::miette!("Failed to read file: {}", e))?;
            let mut root = parser::parse_file(&source, &input)
                .map_err(|e| miette::miette!("Parse error: {}", e))?;

            let processor = Processor::new(options);
            let result = processor
                .process_async(&mut root)
                .await
                .map_err(|e| miette::miette!("{}", e))?;

            if print_deps {
                for message in &result.messages {
                    match message {
                        Message::Dependency { file, parent } => match parent {
                            Some(parent) => eprintln!("dependency {} (from {})", file.display(), parent.display()),
                            None => eprintln!("dependency {}", file.display()),
                        },
                        Message::DirDependency { dir, glob, .. } => {
                            eprintln!("dir-dependency {} {}", dir.display(), glob)
                        }
                    }
                }
            }

            let css = stringify(&root);
            match output {
                Some(path) => fs::write(&path, css)
                    .map_err(|e| miette::miette!("Failed to write {}: {}", path.display(), e))?,
                None => println!("{}", css),
            }

            Ok(())
        }

        Commands::Tokenize { input } => {
            let source = fs::read_to_string(&input)
                .map_err(|e| miette::miette!("Failed to read file: {}", e))?;

            let (tokens, errors) = lexer::lex(&source);

            for token in &tokens {
                let text = token.text(&source);
                println!(
                    "{:>4}..{:<4} {:20} {:?}",
                    token.span.start,
                    token.span.end,
                    format!("{:?}", token.kind),
                    text
                );
            }

            if !errors.is_empty() {
                eprintln!("\nLexer errors:");
                for err in errors {
                    eprintln!("  {}", err);
                }
            }

            Ok(())
        }

        Commands::Parse { input } => {
            let source = fs::read_to_string(&input)
                .map_err(|e| miette::miette!("Failed to read file: {}", e))?;

            let root = parser::parse_file(&source, &input)
                .map_err(|e| miette::miette!("Parse error: {}", e))?;
            println!("{:#?}", root);

            Ok(())
        }
    }
}
