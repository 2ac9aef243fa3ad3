use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use textrec_cli::init_tracing;
use textrec_core::config::Config;
use textrec_search::{SearchOptions, Searcher};

#[derive(Parser)]
#[command(name = "textrec-query", about = "Find corpus items similar to a piece of text")]
struct Args {
    /// Query text
    text: String,

    /// Number of results (defaults to the configured default_top_k)
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// CSV corpus the artifacts were built from
    #[arg(long)]
    data: Option<PathBuf>,

    /// Candidate budget per query
    #[arg(long)]
    search_k: Option<usize>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut settings = Config::load()?.serve_settings()?;
    if let Some(v) = args.models_dir { settings.models_dir = v; }
    if let Some(v) = args.data { settings.text_data_path = v; }
    if args.search_k.is_some() { settings.search_k = args.search_k; }
    let settings = settings.validated()?;
    let top_k = args.top_k.unwrap_or(settings.default_top_k);

    let searcher = Searcher::open(&settings.models_dir, &settings.text_data_path, SearchOptions { search_k: settings.search_k })
        .with_context(|| format!("cannot open artifacts in {}", settings.models_dir.display()))?;

    println!("🔍 textrec-query\n================");
    println!("Query: {}", args.text);
    println!("Build: {} ({} items, {} dims)", searcher.build_id(), searcher.len(), searcher.dims());

    let hits = searcher.neighbors(&args.text, top_k)?;
    println!("\n🔍 Found {} results", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let Some(record) = searcher.corpus().get(hit.id) else { continue };
        println!("\n  {}. distance={:.4}  #{}", i + 1, hit.distance, hit.id);
        println!("     📝 {}", record.text);
        for (key, value) in &record.metadata {
            println!("     {key}: {value}");
        }
    }
    Ok(())
}
