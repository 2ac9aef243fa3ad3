use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use textrec_cli::init_tracing;
use textrec_core::config::{BuildSettings, Config};
use textrec_core::types::Metric;
use textrec_search::run_build;

#[derive(Parser)]
#[command(name = "textrec-build", about = "Fit TF-IDF, SVD and the ANN forest from a CSV corpus")]
struct Args {
    /// CSV file with a `text` column
    #[arg(long)]
    data: Option<PathBuf>,

    /// Directory the artifact set is published into
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Vocabulary cap
    #[arg(long)]
    max_features: Option<usize>,

    /// Requested reduced dimensionality
    #[arg(long)]
    n_components: Option<usize>,

    /// Trees in the ANN forest
    #[arg(long)]
    n_trees: Option<usize>,

    /// angular, euclidean, manhattan or dot
    #[arg(long)]
    metric: Option<Metric>,

    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn apply(self, mut settings: BuildSettings) -> textrec_core::error::Result<BuildSettings> {
        if let Some(v) = self.data { settings.text_data_path = v; }
        if let Some(v) = self.models_dir { settings.models_dir = v; }
        if let Some(v) = self.max_features { settings.max_features = v; }
        if let Some(v) = self.n_components { settings.n_components = v; }
        if let Some(v) = self.n_trees { settings.n_trees = v; }
        if let Some(v) = self.metric { settings.metric = v; }
        if let Some(v) = self.seed { settings.seed = v; }
        settings.validated()
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let settings = args.apply(Config::load()?.build_settings()?)?;

    println!("📚 textrec-build\n================");
    println!("Data: {}", settings.text_data_path.display());
    println!("Models directory: {}", settings.models_dir.display());
    println!(
        "max_features={} n_components={} n_trees={} metric={}",
        settings.max_features, settings.n_components, settings.n_trees, settings.metric
    );

    let report = run_build(&settings).context("build failed")?;

    println!("\n✅ Build {} finished in {:.2?}", report.build_id, report.elapsed);
    println!("   records:    {}", report.n_records);
    println!("   vocabulary: {}", report.vocabulary_size);
    if report.clamped {
        println!("   dims:       {} (requested {}, clamped to vocabulary - 1)", report.dims, report.requested_dims);
    } else {
        println!("   dims:       {}", report.dims);
    }
    println!("   trees:      {} ({})", report.n_trees, report.metric);
    println!("   output:     {}", report.output_dir.display());
    Ok(())
}
