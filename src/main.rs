//! Thin CLI over the indexing core: index a workspace, then query it.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use smartindex::extractor::ExtractorFactory;
use smartindex::index::{BackgroundIndex, DynamicIndex, MergedIndex};
use smartindex::query::{QueryContext, QueryEngine};
use smartindex::types::CancellationToken;
use smartindex::{FindReferencesOptions, Settings};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "smartindex", version, about = "Workspace symbol index for TypeScript/JavaScript")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a default settings file under .smart-index/
    Init {
        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },
    /// Index the workspace incrementally
    Index {
        /// Workspace root; defaults to the discovered root or cwd
        path: Option<PathBuf>,
        /// Drop the existing index first
        #[arg(long)]
        force: bool,
    },
    /// Fuzzy search for symbols
    Search {
        query: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Definitions of an exact name
    Defs { name: String },
    /// References to an exact name
    Refs {
        name: String,
        /// Include scope-local references
        #[arg(long)]
        include_local: bool,
    },
    /// Index statistics
    Stats,
    /// Drop all cached index state
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Arc::new(Settings::load().context("failed to load settings")?);
    smartindex::logging::init_with_config(&settings.logging);

    if let Command::Init { force } = &cli.command {
        let path = Settings::init_config_file(*force)
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        println!("Created configuration at {}", path.display());
        return Ok(());
    }

    let workspace_root = match (&cli.command, &settings.workspace_root) {
        (Command::Index { path: Some(path), .. }, _) => path.clone(),
        (_, Some(root)) => root.clone(),
        _ => std::env::current_dir()?,
    };
    if !workspace_root.is_dir() {
        bail!("workspace root {} is not a directory", workspace_root.display());
    }

    let engine = build_engine(settings.clone(), workspace_root.clone())?;

    match cli.command {
        Command::Init { .. } => unreachable!("handled above"),
        Command::Index { force, .. } => {
            if force {
                engine.clear_cache()?;
            }
            let stats = engine
                .merged()
                .background()
                .index_workspace(&workspace_root, &CancellationToken::new())?;
            println!("{stats}");
        }
        Command::Search { query, limit } => {
            for symbol in engine.search_symbols(&query, limit, &QueryContext::default()) {
                println!(
                    "{}  {:?}  {}:{}",
                    symbol.name, symbol.kind, symbol.location.uri, symbol.location.line
                );
            }
        }
        Command::Defs { name } => {
            for symbol in engine.find_definitions(&name, &QueryContext::default()) {
                println!(
                    "{}  {}:{}:{}",
                    symbol.semantic_path(),
                    symbol.location.uri,
                    symbol.location.line,
                    symbol.location.character
                );
            }
        }
        Command::Refs { name, include_local } => {
            let options = FindReferencesOptions {
                exclude_local: !include_local,
                ..Default::default()
            };
            for reference in engine
                .merged()
                .find_references_by_name(&name, &options)
            {
                println!(
                    "{}:{}:{}",
                    reference.location.uri, reference.location.line, reference.location.character
                );
            }
        }
        Command::Stats => {
            println!("{}", engine.stats());
        }
        Command::Clear => {
            engine.clear_cache()?;
            println!("Index cleared");
        }
    }
    Ok(())
}

fn build_engine(settings: Arc<Settings>, workspace_root: PathBuf) -> Result<QueryEngine> {
    let cache_dir = settings.cache_dir(&workspace_root);
    let background = Arc::new(
        BackgroundIndex::init(settings.clone(), cache_dir).context("failed to open index")?,
    );
    let dynamic = Arc::new(Mutex::new(DynamicIndex::new(ExtractorFactory::new())));
    let merged = MergedIndex::new(dynamic, background);
    Ok(QueryEngine::new(settings, workspace_root, merged))
}
