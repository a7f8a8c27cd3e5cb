//! Sharpitect CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;
mod tools;

pub const DEFAULT_DB: &str = "./.sharpitect/graph.db";

#[derive(Parser)]
#[command(name = "sharpitect")]
#[command(about = "Typed declaration graph for C# solutions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Graph database path
    #[arg(long, global = true, default_value = DEFAULT_DB)]
    db: PathBuf,

    /// Output format for query commands: text or json
    #[arg(long, global = true, default_value = "text")]
    format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a solution and persist its declaration graph
    Analyze {
        /// Path to a .sln, a .csproj, or a directory containing one
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Database file to write
        #[arg(long)]
        output: Option<PathBuf>,

        /// Keep the workspace open and apply file changes incrementally
        #[arg(long)]
        watch: bool,

        /// Also emit parameter, type-parameter, and local nodes
        #[arg(long)]
        visit_locals: bool,
    },
    /// Serve the graph over the stdio tool protocol
    Serve {
        /// Path to the graph database
        db: PathBuf,
    },
    /// Search node names
    Search {
        query: String,
        /// Match mode: contains, startswith, endswith, exact
        #[arg(long = "match", default_value = "contains")]
        match_mode: String,
        /// Restrict to a node kind
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        case_sensitive: bool,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Show one node
    Node { id: String },
    /// Contained children of a node
    Children {
        id: String,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Containment chain from the root down to a node
    Ancestors { id: String },
    /// Edges incident to a node
    Relationships {
        id: String,
        /// outgoing, incoming, or both
        #[arg(long, default_value = "both")]
        direction: String,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Transitive callers of a method
    Callers {
        id: String,
        #[arg(long, default_value_t = 1)]
        depth: u32,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Transitive callees of a method
    Callees {
        id: String,
        #[arg(long, default_value_t = 1)]
        depth: u32,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Inheritance neighbourhood of a type
    Inheritance {
        id: String,
        /// ancestors, descendants, or both
        #[arg(long, default_value = "both")]
        direction: String,
        #[arg(long, default_value_t = 3)]
        depth: u32,
    },
    /// Incoming usages of a node
    Usages {
        id: String,
        /// calls, references, constructs, implementations, or all
        #[arg(long, default_value = "all")]
        kind: String,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// One-line signature of a declaration
    Signature { id: String },
    /// Source snippet of a declaration
    Code { id: String },
    /// Containment tree rooted at a node
    Tree {
        id: String,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long, default_value_t = 3)]
        depth: u32,
    },
    /// Projects a project depends on
    Dependencies {
        id: String,
        #[arg(long)]
        transitive: bool,
    },
    /// Projects depending on a project
    Dependents {
        id: String,
        #[arg(long)]
        transitive: bool,
    },
    /// List nodes of one kind
    List {
        kind: String,
        /// Restrict to the containment subtree of this node
        #[arg(long)]
        scope: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Declarations in one source file (workspace-relative path)
    File { path: String },
    /// Graph statistics
    Stats,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // help/version are not failures; bad arguments exit 1
            if e.use_stderr() {
                eprint!("{e}");
                std::process::exit(1);
            }
            print!("{e}");
            return Ok(());
        }
    };

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("sharpitect={log_level}")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let json = match cli.format.as_str() {
        "json" => true,
        "text" => false,
        other => anyhow::bail!("unknown format '{other}' (expected text or json)"),
    };

    match cli.command {
        Commands::Analyze {
            path,
            output,
            watch,
            visit_locals,
        } => {
            let db = output.unwrap_or(cli.db);
            commands::analyze(path, db, watch, visit_locals).await
        }
        Commands::Serve { db } => commands::serve(db).await,
        Commands::Search {
            query,
            match_mode,
            kind,
            case_sensitive,
            limit,
        } => commands::search(&cli.db, &query, &match_mode, kind.as_deref(), case_sensitive, limit, json),
        Commands::Node { id } => commands::node(&cli.db, &id, json),
        Commands::Children { id, kind, limit } => {
            commands::children(&cli.db, &id, kind.as_deref(), limit, json)
        }
        Commands::Ancestors { id } => commands::ancestors(&cli.db, &id, json),
        Commands::Relationships {
            id,
            direction,
            kind,
            limit,
        } => commands::relationships(&cli.db, &id, &direction, kind.as_deref(), limit, json),
        Commands::Callers { id, depth, limit } => {
            commands::callers(&cli.db, &id, depth, limit, json)
        }
        Commands::Callees { id, depth, limit } => {
            commands::callees(&cli.db, &id, depth, limit, json)
        }
        Commands::Inheritance { id, direction, depth } => {
            commands::inheritance(&cli.db, &id, &direction, depth, json)
        }
        Commands::Usages { id, kind, limit } => {
            commands::usages(&cli.db, &id, &kind, limit, json)
        }
        Commands::Signature { id } => commands::signature(&cli.db, &id, json),
        Commands::Code { id } => commands::code(&cli.db, &id, json),
        Commands::Tree { id, kind, depth } => {
            commands::tree(&cli.db, &id, kind.as_deref(), depth, json)
        }
        Commands::Dependencies { id, transitive } => {
            commands::dependencies(&cli.db, &id, transitive, json)
        }
        Commands::Dependents { id, transitive } => {
            commands::dependents(&cli.db, &id, transitive, json)
        }
        Commands::List { kind, scope, limit } => {
            commands::list(&cli.db, &kind, scope.as_deref(), limit, json)
        }
        Commands::File { path } => commands::file(&cli.db, &path, json),
        Commands::Stats => commands::stats(&cli.db, json),
        Commands::Version => {
            println!("sharpitect v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
