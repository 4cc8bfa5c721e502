use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use arxmap_cli::init_tracing;
use arxmap_cli::pipeline::Stages;
use arxmap_core::config::{expand_path, Config, Settings};
use arxmap_embed::{get_default_embedder, Embedder, EmbeddingInput};

#[derive(Parser, Debug)]
#[command(name = "arxmap", about = "Harvest arXiv papers, embed them and build a 3D map")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch new papers per category and append them to the corpus table.
    Acquire(AcquireArgs),
    /// Extract text for papers that have none yet.
    Extract,
    /// Embed the corpus and write the embeddings artifact.
    Embed(EmbedArgs),
    /// Normalize and reduce the embeddings to 3D.
    Project(ProjectArgs),
    /// Merge coordinates with metadata and write the payload and palette.
    Visualize(VisualizeArgs),
    /// Every stage in order.
    Run {
        #[command(flatten)]
        acquire: AcquireArgs,
        #[command(flatten)]
        embed: EmbedArgs,
        #[command(flatten)]
        project: ProjectArgs,
        #[command(flatten)]
        visualize: VisualizeArgs,
        /// Reuse the existing corpus table instead of querying the catalog.
        #[arg(long)]
        skip_acquire: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct AcquireArgs {
    /// Category to query; repeat for several. Replaces `catalog.categories`.
    #[arg(long = "category")]
    categories: Vec<String>,
    /// Scrape category codes from `catalog.categories_url` instead.
    #[arg(long, conflicts_with = "categories")]
    discover_categories: bool,
    #[arg(long)]
    max_results: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
struct EmbedArgs {
    #[arg(long, env = "APP_MODEL_DIR")]
    model_dir: Option<PathBuf>,
    #[arg(long)]
    chunk_size: Option<usize>,
    /// `title_summary` or `full_text`.
    #[arg(long)]
    input: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
struct ProjectArgs {
    /// `pca`, `umap` or `pca_umap`.
    #[arg(long)]
    method: Option<String>,
    /// `standard`, `minmax` or `l2`.
    #[arg(long)]
    normalization: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
struct VisualizeArgs {
    /// Fail when the merge loses ids instead of warning.
    #[arg(long)]
    strict: bool,
}

impl AcquireArgs {
    fn apply(&self, s: &mut Settings) {
        if !self.categories.is_empty() {
            s.catalog.categories = self.categories.clone();
        }
        if self.discover_categories {
            s.catalog.discover_categories = true;
        }
        if let Some(n) = self.max_results {
            s.catalog.max_results_per_category = n;
        }
    }
}

impl EmbedArgs {
    fn apply(&self, s: &mut Settings) {
        if let Some(dir) = &self.model_dir {
            s.embedding.model_dir = Some(dir.display().to_string());
        }
        if let Some(n) = self.chunk_size {
            s.embedding.chunk_size = n;
        }
        if let Some(input) = &self.input {
            s.embedding.input = input.clone();
        }
    }
}

impl ProjectArgs {
    fn apply(&self, s: &mut Settings) {
        if let Some(m) = &self.method {
            s.projection.method = m.clone();
        }
        if let Some(n) = &self.normalization {
            s.projection.normalization = n.clone();
        }
    }
}

impl VisualizeArgs {
    fn apply(&self, s: &mut Settings) {
        if self.strict {
            s.viz.verify_policy = "strict".to_string();
        }
    }
}

async fn embed(stages: &Stages) -> Result<()> {
    let model_dir = stages.settings().embedding.model_dir.as_deref().map(expand_path);
    let embedder = get_default_embedder(model_dir.as_deref())?;
    let embeddings = stages.embed(embedder.as_ref()).await?;
    println!("✅ Embedded {} papers (dim {})", embeddings.len(), embedder.dim());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let mut settings = config.settings()?;

    match &cli.command {
        Command::Acquire(a) => a.apply(&mut settings),
        Command::Extract => {}
        Command::Embed(e) => e.apply(&mut settings),
        Command::Project(p) => p.apply(&mut settings),
        Command::Visualize(v) => v.apply(&mut settings),
        Command::Run { acquire, embed, project, visualize, .. } => {
            acquire.apply(&mut settings);
            embed.apply(&mut settings);
            project.apply(&mut settings);
            visualize.apply(&mut settings);
        }
    }
    let stages = Stages::new(settings)?;

    match cli.command {
        Command::Acquire(_) => {
            let report = stages.acquire().await?;
            println!("✅ Acquired {} new papers ({} already known)", report.fetched, report.skipped_known);
        }
        Command::Extract => {
            let report = stages.extract().await?;
            println!("✅ Extracted text for {} papers ({} failed)", report.extracted, report.failed);
        }
        Command::Embed(_) => embed(&stages).await?,
        Command::Project(_) => {
            let reduced = stages.project()?;
            println!("✅ Reduced {} embeddings to 3D", reduced.len());
        }
        Command::Visualize(_) => {
            let payload = stages.visualize().await?;
            println!("✅ Visualization payload with {} papers", payload.metadata.total_papers);
        }
        Command::Run { skip_acquire, .. } => {
            if !skip_acquire {
                let report = stages.acquire().await?;
                println!("📊 Acquired {} new papers", report.fetched);
            }
            if stages.settings().embedding.input.parse::<EmbeddingInput>()? == EmbeddingInput::FullText {
                let report = stages.extract().await?;
                println!("📊 Extracted text for {} papers", report.extracted);
            }
            embed(&stages).await?;
            let reduced = stages.project()?;
            println!("📊 Reduced {} embeddings", reduced.len());
            let payload = stages.visualize().await?;
            println!("\n✅ Pipeline complete: {} papers", payload.metadata.total_papers);
        }
    }
    Ok(())
}
