use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use ipl_store::registry::{
    DirectoryModuleLister, FixedEnvironment, JsonFileEnumerator, ProcessEnvironment,
};
use ipl_store::{Ipl, NameFilter, SnapshotBuilder, SnapshotStore};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "ipl", about = "Installed program list snapshots")]
struct Cli {
    /// Snapshot database
    #[arg(long, default_value = "IPL.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a snapshot from exported registry entries and save it
    Snapshot {
        /// JSON file of raw registry entries (repeatable, earlier files win)
        #[arg(long = "entries")]
        entries: Vec<PathBuf>,
        /// Directory searched for top-level modules (repeatable)
        #[arg(long = "modules")]
        modules: Vec<PathBuf>,
        /// Owner name recorded with the snapshot
        #[arg(long)]
        host: Option<String>,
    },
    /// Print the program names of a stored snapshot
    Show {
        #[arg(long)]
        date: Option<String>,
        #[arg(long, value_enum, default_value_t = FilterArg::All)]
        filter: FilterArg,
    },
    /// Compare two stored snapshots
    Diff {
        older: String,
        /// Defaults to the latest snapshot
        newer: Option<String>,
    },
    /// List stored snapshots
    History,
}

#[derive(Clone, Copy, ValueEnum)]
enum FilterArg {
    All,
    Manual,
    Silent,
    Ninite,
    Tagged,
}

impl From<FilterArg> for NameFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::All => NameFilter::All,
            FilterArg::Manual => NameFilter::Manual,
            FilterArg::Silent => NameFilter::Silent,
            FilterArg::Ninite => NameFilter::Ninite,
            FilterArg::Tagged => NameFilter::Tagged,
        }
    }
}

fn print_names(ipl: &Ipl, filter: NameFilter) {
    for name in ipl.get_names(filter) {
        println!("  {name}");
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Snapshot {
            entries,
            modules,
            host,
        } => {
            let mut builder = match host {
                Some(host) => SnapshotBuilder::new(FixedEnvironment(host)),
                None => SnapshotBuilder::new(ProcessEnvironment),
            };
            for path in entries {
                builder = builder.source(JsonFileEnumerator::new(path));
            }
            let ipl = builder.modules(DirectoryModuleLister::new(modules)).build();

            let mut store = SnapshotStore::open(&cli.db)?;
            let date = store.save(&ipl)?;
            println!("{ipl}");
            println!("Saved as {date}");
        }
        Commands::Show { date, filter } => {
            let store = SnapshotStore::open(&cli.db)?;
            let ipl = store.load(date.as_deref())?;
            println!("{ipl}");
            print_names(&ipl, filter.into());
        }
        Commands::Diff { older, newer } => {
            let store = SnapshotStore::open(&cli.db)?;
            let older = store.load(Some(older.as_str()))?;
            let newer = store.load(newer.as_deref())?;
            info!("Comparing {} with {}", older.date(), newer.date());

            let added = newer.difference(&older);
            let removed = older.difference(&newer);
            println!("Added or changed ({}):", added.len());
            print_names(&added, NameFilter::All);
            println!("Removed or changed ({}):", removed.len());
            print_names(&removed, NameFilter::All);
        }
        Commands::History => {
            let store = SnapshotStore::open(&cli.db)?;
            for row in store.history()? {
                println!("{}  {}  modified {}", row.date, row.name, row.modified);
            }
        }
    }

    Ok(())
}
