use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use shelf::config::keys;
use shelf::lock::BestEffortLock;
use shelf::navigation::TitleList;
use shelf::{
    ConfigStore, ContentId, FilterEngine, FilterQuery, LibraryEntry, LoggingOptions, ProgressSample, RuntimeConfig,
    init_logging,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "shelf-cli", author, version, about = "Inspect and tweak a content shelf", long_about = None)]
struct Cli {
    /// Directory holding settings.json and library.json
    #[arg(long, global = true, default_value = ".shelf")]
    config_dir: PathBuf,

    /// Debug output on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write a debug log file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the base, add-on and patch IDs derived from a content ID
    Variants { id: String },
    /// Read or change persisted settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Render a progress sample the way the progress bar shows it
    Progress {
        #[command(subcommand)]
        shape: ProgressShape,
    },
    /// Dry-run the title filter over `[REGION] Name` labels
    Filter {
        #[arg(long, default_value = "")]
        region: String,
        #[arg(long, default_value = "")]
        text: String,
        /// Directory with `<Name>.png` cover art
        #[arg(long)]
        covers: Option<PathBuf>,
        /// Show titles without cover art
        #[arg(long)]
        show_all: bool,
        labels: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Show,
    Set { key: String, value: String },
    /// Delete settings.json and library.json
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ProgressShape {
    Basic {
        current: u64,
        max: u64,
    },
    Files {
        current: u64,
        max: u64,
        index: u32,
        count: u32,
    },
    Download {
        received: u64,
        total: u64,
        elapsed_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let runtime = RuntimeConfig::default();

    let store = ConfigStore::new(&cli.config_dir);
    let debug_logging = store
        .load()
        .map(|settings| settings.get_bool(keys::DEBUG_LOGGING))
        .unwrap_or(false);
    let log_file = cli
        .log_file
        .clone()
        .or_else(|| debug_logging.then(|| cli.config_dir.join(&runtime.log_file)));
    init_logging(&LoggingOptions {
        verbose: cli.verbose,
        log_file,
    })
    .context("failed to set up logging")?;

    match cli.command {
        Commands::Variants { id } => show_variants(&id)?,
        Commands::Config { action } => run_config(&store, action)?,
        Commands::Progress { shape } => {
            let sample = match shape {
                ProgressShape::Basic { current, max } => ProgressSample::Basic { current, max },
                ProgressShape::Files {
                    current,
                    max,
                    index,
                    count,
                } => ProgressSample::MultiFile {
                    current,
                    max,
                    file_index: index,
                    file_count: count,
                },
                ProgressShape::Download {
                    received,
                    total,
                    elapsed_ms,
                } => ProgressSample::Download {
                    received,
                    total,
                    elapsed: Duration::from_millis(elapsed_ms),
                },
            };
            let display = sample.render();
            println!("[{}/{}] {}", display.value, display.max, display.label);
        }
        Commands::Filter {
            region,
            text,
            covers,
            show_all,
            labels,
        } => {
            let covers = covers.unwrap_or_else(|| cli.config_dir.join(&runtime.cover_art_directory));
            run_filter(FilterQuery::new(region, text), &covers, show_all, &labels, &runtime).await?;
        }
    }

    Ok(())
}

fn show_variants(raw: &str) -> anyhow::Result<()> {
    let id = ContentId::parse_input(raw)?;
    match id.variant() {
        Some(variant) => println!("{} ({})", id, variant),
        None => println!("{} (unknown variant)", id),
    }
    for variant in id.offerable_variants() {
        println!("  {:<15} {}", variant.download_label(), id.with_variant(variant));
    }
    Ok(())
}

fn run_config(store: &ConfigStore, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let settings = store.load_or_create()?;
            for (key, value) in settings.iter() {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Set { key, value } => {
            let mut settings = store.load_or_create()?;
            settings
                .set_from_str(&key, &value)
                .with_context(|| format!("cannot set {}", key))?;
            store.save(&settings)?;
            tracing::info!("{} set to {}", key, value);
        }
        ConfigAction::Clear { yes } => {
            if !yes {
                bail!("refusing to clear settings without --yes");
            }
            store.clear()?;
            println!("Cleared {}", store.persistent_directory().display());
        }
    }
    Ok(())
}

/// `[USA] Kart Racer` into region and name
fn split_label(label: &str) -> anyhow::Result<(String, String)> {
    let rest = label
        .strip_prefix('[')
        .with_context(|| format!("label {:?} does not start with [REGION]", label))?;
    let (region, name) = rest
        .split_once(']')
        .with_context(|| format!("label {:?} has no closing ]", label))?;
    Ok((region.to_string(), name.trim().to_string()))
}

async fn run_filter(
    query: FilterQuery,
    covers: &Path,
    show_all: bool,
    labels: &[String],
    runtime: &RuntimeConfig,
) -> anyhow::Result<()> {
    let placeholder = ContentId::parse("0000000000000000")?;
    let mut list = TitleList::new();
    for label in labels {
        let (region, name) = split_label(label)?;
        list.push(Arc::new(LibraryEntry {
            id: placeholder.clone(),
            directory: PathBuf::from(&name),
            executable: PathBuf::new(),
            metadata: PathBuf::new(),
            cover_art: covers.join(format!("{}.png", name)),
            name,
            region,
        }));
    }

    let mut settings = shelf::Settings::default();
    settings.set_bool(keys::SHOW_ALL_TITLES, show_all);
    let settings = BestEffortLock::with_wait("settings", settings, runtime.lock_wait);

    let report = FilterEngine::new(runtime.filter_concurrency)
        .apply(&mut list, &query, &settings)
        .await;

    println!("pattern: {}", query.pattern());
    for label in list.visible_labels() {
        println!("  {}", label);
    }
    println!(
        "{} matched, {} visible, {} skipped",
        report.matched, report.visible, report.skipped
    );
    Ok(())
}
