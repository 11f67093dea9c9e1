//! CLI binary for refscreen.
//!
//! Usage: refscreen resolve "3b. Clonazepam.docx" --layout rba

#[cfg(feature = "cli")]
mod cli {
    use clap::{Parser, Subcommand};
    use refscreen::extract::{self, DocxDocument, Layout};
    use refscreen::search::eutils::EUtilsClient;
    use refscreen::store::{OutputStore, output_path_for};
    use refscreen::{Error, ReferenceRecord, Resolver, RunSummary, Settings, screening};
    use std::fs::OpenOptions;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tracing::info;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    #[derive(Parser)]
    #[command(
        name = "refscreen",
        about = "Resolve review references against PubMed and enrich screening exports",
        version
    )]
    struct Cli {
        /// Settings file (TOML)
        #[arg(long, global = true)]
        config: Option<PathBuf>,

        /// Log debug events
        #[arg(short, long, global = true)]
        verbose: bool,

        #[command(subcommand)]
        command: Commands,
    }

    #[derive(Subcommand)]
    enum Commands {
        /// Extract references from Word documents and add matches to their stores
        Resolve {
            /// Documents to process
            #[arg(required = true)]
            documents: Vec<PathBuf>,
            /// Document layout
            #[arg(short, long, value_enum, default_value = "rba")]
            layout: Layout,
            /// Store to append to (defaults to a path derived from each document)
            #[arg(short, long)]
            output: Option<PathBuf>,
        },
        /// Resolve a plain list of titles, one per line
        ResolveTitles {
            /// Text file with one title per line
            titles: PathBuf,
            /// Store to append to
            #[arg(short, long)]
            output: PathBuf,
        },
        /// Add labels and labeling metadata to a screening export
        Screen {
            /// Screening export (CSV)
            export: PathBuf,
            /// Labeling data (CSV with record_id, labeling_time, notes)
            #[arg(long)]
            labeling: Option<PathBuf>,
        },
    }

    pub fn run() -> refscreen::Result<()> {
        let cli = Cli::parse();
        let settings = match &cli.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        init_logging(&settings, cli.verbose)?;

        match cli.command {
            Commands::Resolve {
                documents,
                layout,
                output,
            } => {
                let resolver = Resolver::new(
                    EUtilsClient::from_config(&settings.eutils)?,
                    settings.matching.clone(),
                );
                let mut total = RunSummary::default();
                for document in &documents {
                    info!(document = %document.display(), ?layout, "extracting references");
                    let doc = DocxDocument::open(document)?;
                    let references = extract::collect_references(&doc, layout);
                    let target = output.clone().unwrap_or_else(|| output_path_for(document));
                    total.extend(resolve(&resolver, &references, &target)?);
                }
                if documents.len() > 1 {
                    report("total", &total);
                }
            }
            Commands::ResolveTitles { titles, output } => {
                let content = std::fs::read_to_string(&titles).map_err(|source| Error::Io {
                    path: titles.clone(),
                    source,
                })?;
                let references: Vec<ReferenceRecord> = content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(ReferenceRecord::from_title)
                    .collect();
                let resolver = Resolver::new(
                    EUtilsClient::from_config(&settings.eutils)?,
                    settings.matching.clone(),
                );
                resolve(&resolver, &references, &output)?;
            }
            Commands::Screen { export, labeling } => {
                let output = screening::process(&export, labeling.as_deref(), &settings.screening)?;
                println!("{}", output.display());
            }
        }
        Ok(())
    }

    fn resolve(
        resolver: &Resolver<EUtilsClient>,
        references: &[ReferenceRecord],
        target: &Path,
    ) -> refscreen::Result<RunSummary> {
        let mut store = OutputStore::initialize(target)?;
        let summary = resolver.run(references, &mut store)?;

        let follow_up = target.with_extension("followup.csv");
        let logged = summary.write_follow_up_log(&follow_up)?;
        if logged > 0 {
            info!(path = %follow_up.display(), logged, "references need manual follow-up");
        }

        report(&target.display().to_string(), &summary);
        Ok(summary)
    }

    fn report(label: &str, summary: &RunSummary) {
        println!(
            "{label}: {} written, {} already present, {} unresolved, {} malformed, {} failed",
            summary.written(),
            summary.already_present(),
            summary.unresolved(),
            summary.malformed(),
            summary.failed()
        );
    }

    fn init_logging(settings: &Settings, verbose: bool) -> refscreen::Result<()> {
        let filter = if verbose {
            EnvFilter::new("refscreen=debug,info")
        } else {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter))
        };

        let file_layer = match &settings.logging.file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| Error::Io {
                        path: path.clone(),
                        source,
                    })?;
                Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            }
            None => None,
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(file_layer)
            .init();
        Ok(())
    }
}

#[cfg(feature = "cli")]
fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("This binary requires the 'cli' feature. Build with: cargo build --features cli");
    std::process::exit(1);
}
