use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookkeep::config::{Config, Overrides};
use bookkeep::{Catalog, ListController, MemoryCatalog, Session};
use bookkeep_core::{Resource, SortDir};

/// Bookstore inventory client and development backend
#[derive(Parser, Debug)]
#[command(name = "bookkeep")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// API base URL
    #[arg(long, value_name = "URL", global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the in-memory development backend
    Serve {
        /// Bind address
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,

        /// Port number
        #[arg(short, long, value_name = "PORT")]
        port: Option<u16>,

        /// Start with a small demo catalog
        #[arg(long)]
        seed: bool,
    },
    /// List one page of a resource kind
    List {
        kind: Kind,

        /// Zero-based page index
        #[arg(long, default_value_t = 0)]
        page: u32,

        /// Page size (10, 20, 50 or 100)
        #[arg(long)]
        size: Option<u32>,

        /// Field to sort by
        #[arg(long, default_value = "id")]
        sort_by: String,

        /// Sort descending
        #[arg(long)]
        desc: bool,
    },
    /// Fetch one resource by id
    Get { kind: Kind, id: String },
    /// Search a resource kind by title or name
    Search { kind: Kind, term: String },
    /// Books similar to the given book
    Recommend {
        book_id: String,

        #[arg(long, default_value_t = bookkeep::ai::DEFAULT_RECOMMENDATIONS)]
        size: u32,
    },
    /// Free-text search over book embeddings
    SemanticSearch {
        query: String,

        #[arg(long, default_value_t = bookkeep::ai::DEFAULT_SEARCH_HITS)]
        size: u32,
    },
    /// Recompute book embeddings
    RecomputeEmbeddings {
        /// Recompute books that already have one
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
    Books,
    Authors,
    Categories,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Parse CLI arguments
    let args = Args::parse();

    let mut overrides = Overrides {
        base_url: args.base_url.clone(),
        ..Default::default()
    };
    if let Command::Serve { bind, port, .. } = &args.command {
        overrides.bind = bind.clone();
        overrides.port = *port;
    }

    // Load configuration
    let config = Config::load(args.config.as_ref(), &overrides)?;

    match args.command {
        Command::Serve { seed, .. } => {
            info!("Configuration loaded: bind={}:{}", config.bind, config.port);
            let catalog: Arc<dyn Catalog> = if seed {
                Arc::new(MemoryCatalog::seeded().await?)
            } else {
                Arc::new(MemoryCatalog::new())
            };
            bookkeep::api::run(config, catalog).await
        }
        command => {
            info!("Using API at {}", config.base_url);
            let session = Session::new(&config)?;
            let result = run_client(&session, command, config.page_size).await;
            session.close();
            result
        }
    }
}

async fn run_client(session: &Session, command: Command, page_size: u32) -> anyhow::Result<()> {
    match command {
        Command::Serve { .. } => anyhow::bail!("serve runs the backend, not a client command"),
        Command::List {
            kind,
            page,
            size,
            sort_by,
            desc,
        } => {
            let dir = if desc { SortDir::Desc } else { SortDir::Asc };
            let size = size.unwrap_or(page_size);
            match kind {
                Kind::Books => list(session.books(), page, size, sort_by, dir).await,
                Kind::Authors => list(session.authors(), page, size, sort_by, dir).await,
                Kind::Categories => list(session.categories(), page, size, sort_by, dir).await,
            }
        }
        Command::Get { kind, id } => match kind {
            Kind::Books => print_json(&session.books().load(&id).await?),
            Kind::Authors => print_json(&session.authors().load(&id).await?),
            Kind::Categories => print_json(&session.categories().load(&id).await?),
        },
        Command::Search { kind, term } => match kind {
            Kind::Books => search(session.books(), &term).await,
            Kind::Authors => search(session.authors(), &term).await,
            Kind::Categories => search(session.categories(), &term).await,
        },
        Command::Recommend { book_id, size } => {
            print_json(&session.ai().recommendations(&book_id, size).await?)
        }
        Command::SemanticSearch { query, size } => {
            print_json(&session.ai().semantic_search(&query, size).await?)
        }
        Command::RecomputeEmbeddings { force } => {
            print_json(&session.ai().recompute_embeddings(force).await?)
        }
    }
}

async fn list<R: Resource>(
    list: &ListController<R>,
    page: u32,
    size: u32,
    sort_by: String,
    dir: SortDir,
) -> anyhow::Result<()> {
    let params = list.params().with_size(size).with_page(page).with_sort(sort_by, dir);
    list.open_page(params).await?;
    print_page(list)
}

async fn search<R: Resource>(list: &ListController<R>, term: &str) -> anyhow::Result<()> {
    list.search(term).await;
    print_page(list)
}

fn print_page<R: Resource>(list: &ListController<R>) -> anyhow::Result<()> {
    let state = list.state();
    if let Some(error) = state.error {
        return Err(error.into());
    }
    print_json(&state.items)?;
    eprintln!(
        "page {}/{} ({} total)",
        state.current_page + 1,
        state.total_pages.max(1),
        state.total_elements
    );
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
