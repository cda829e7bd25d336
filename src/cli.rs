use clap::{Parser, Subcommand};
use snippet_store::config::Config;
use snippet_store::error::{Error, Result};
use snippet_store::snippet::{Revision, SnippetStore};
use snippet_store::storage::FileStorage;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "snippet-store")]
#[command(about = "Versioned code snippet store backed by one JSON file per snippet")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: "human" or "json"
    #[arg(short, long)]
    pub format: Option<String>,

    /// Storage directory path
    #[arg(short, long)]
    pub data_dir: Option<String>,

    /// Default log level when RUST_LOG is unset
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new snippet and print its id
    Add {
        /// Language tag (free-form)
        #[arg(short, long)]
        language: String,

        /// Snippet content (or read from --file / stdin if not provided)
        #[arg(short, long)]
        content: Option<String>,

        /// Read content from this file
        #[arg(long)]
        file: Option<String>,
    },

    /// Append a new revision to an existing snippet
    Update {
        id: String,

        #[arg(short, long)]
        content: Option<String>,

        #[arg(long)]
        file: Option<String>,
    },

    /// Show the latest (or a specific) revision
    Show {
        id: String,

        #[arg(short, long)]
        version: Option<u64>,
    },

    /// Show every revision, oldest first
    History { id: String },

    /// Delete a snippet and its history
    Delete { id: String },

    /// List snippet ids
    List,
}

/// Resolve content from the flag, a file, or stdin (in that order)
fn read_content(content: Option<String>, file: Option<&str>) -> Result<String> {
    if let Some(content) = content {
        return Ok(content);
    }
    match file {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| Error::InvalidInput(format!("Failed to read file {}: {}", path, e))),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| Error::InvalidInput(format!("Failed to read from stdin: {}", e)))?;
            Ok(buffer)
        }
    }
}

/// Format output based on format type
fn format_output<T: serde::Serialize + std::fmt::Debug>(data: &T, format: &str) -> Result<String> {
    match format {
        "json" => serde_json::to_string_pretty(data)
            .map_err(|e| Error::InvalidInput(format!("Failed to serialize JSON: {}", e))),
        _ => Ok(format!("{:#?}", data)),
    }
}

pub fn config_for(cli: &Cli) -> Config {
    let mut config = Config::from_env();
    if let Some(dir) = &cli.data_dir {
        config.set_storage_dir(PathBuf::from(dir));
    }
    if let Some(format) = &cli.format {
        config.set_output_format(format.clone());
    }
    if let Some(level) = &cli.log_level {
        config.set_log_level(level.clone());
    }
    config
}

pub fn run(cli: Cli, config: &Config) -> Result<()> {
    let store = SnippetStore::open(FileStorage::new(config));
    let format = config.get_output_format();

    match cli.command {
        Commands::Add {
            language,
            content,
            file,
        } => {
            let content = read_content(content, file.as_deref())?;
            let id = store.add_snippet(&language, &content)?;
            match format {
                "json" => println!("{}", format_output(&AddOutput { id }, format)?),
                _ => println!("{}", id),
            }
            Ok(())
        }

        Commands::Update { id, content, file } => {
            let content = read_content(content, file.as_deref())?;
            let revision = store.update_snippet(&id, &content)?;
            match format {
                "json" => println!("{}", format_output(&revision, format)?),
                _ => println!("✓ {} is now at version {}", id, revision.version),
            }
            Ok(())
        }

        Commands::Show { id, version } => {
            let revision = match version {
                Some(v) => store.fetch_version(&id, v)?,
                None => store.fetch_snippet(&id)?,
            };
            println!("{}", format_output(&revision, format)?);
            Ok(())
        }

        Commands::History { id } => {
            let revisions: Vec<Revision> = store.fetch_version_history(&id)?;
            println!("{}", format_output(&revisions, format)?);
            Ok(())
        }

        Commands::Delete { id } => {
            store.delete_snippet(&id)?;
            println!("✓ Deleted {}", id);
            Ok(())
        }

        Commands::List => {
            let ids = store.list_ids()?;
            match format {
                "json" => println!("{}", format_output(&ids, format)?),
                _ => {
                    for id in ids {
                        println!("{}", id);
                    }
                }
            }
            Ok(())
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct AddOutput {
    id: String,
}
