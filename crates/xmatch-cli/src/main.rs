mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use xmatch_core::{BelowThresholdPolicy, Marketplace, SearchOptions, SourceProduct};

#[derive(Debug, Parser)]
#[command(name = "xmatch-cli")]
#[command(about = "Find the same product on another marketplace")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Search one or more target marketplaces for the best match.
    Match {
        #[command(flatten)]
        product: ProductArgs,
        /// Target marketplace; repeat to search several at once.
        #[arg(long = "target", required = true)]
        targets: Vec<Marketplace>,
        #[command(flatten)]
        tuning: TuningArgs,
    },
    /// Print the search URL a match would open.
    Query {
        #[command(flatten)]
        product: ProductArgs,
        #[arg(long)]
        target: Marketplace,
        #[command(flatten)]
        tuning: TuningArgs,
    },
    /// Run a marketplace extractor over a saved search-results page.
    Extract {
        #[arg(long)]
        marketplace: Marketplace,
        /// HTML file to read.
        #[arg(long)]
        file: PathBuf,
        /// URL the page was served from; relative links resolve against it.
        #[arg(long)]
        page_url: Option<String>,
    },
}

/// The product being viewed.
#[derive(Debug, Args)]
struct ProductArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    brand: Option<String>,
    #[arg(long)]
    price: Option<f64>,
    /// Marketplace the product is listed on.
    #[arg(long = "source", default_value = "target")]
    source: Marketplace,
}

/// Per-request overrides of the configured search options.
#[derive(Debug, Args)]
struct TuningArgs {
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Minimum combined score, between 0 and 1.
    #[arg(long, value_parser = parse_unit_interval)]
    min_similarity: Option<f64>,
    #[arg(long, value_parser = parse_positive_count)]
    max_title_words: Option<usize>,
    /// Leave the brand out of the search query.
    #[arg(long)]
    no_brand: bool,
    /// Fail instead of returning a match scored below `min_similarity`.
    #[arg(long)]
    strict: bool,
}

impl TuningArgs {
    fn apply(&self, defaults: &SearchOptions) -> SearchOptions {
        let mut options = defaults.clone();
        if let Some(timeout_ms) = self.timeout_ms {
            options = options.with_timeout_ms(timeout_ms);
        }
        if let Some(min_similarity) = self.min_similarity {
            options = options.with_min_similarity(min_similarity);
        }
        if let Some(max_title_words) = self.max_title_words {
            options = options.with_max_title_words(max_title_words);
        }
        if self.no_brand {
            options = options.with_include_brand(false);
        }
        if self.strict {
            options = options.with_below_threshold(BelowThresholdPolicy::Fail);
        }
        options
    }
}

fn parse_unit_interval(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|e| format!("`{raw}` is not a number: {e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("`{raw}` is outside 0..=1"))
    }
}

fn parse_positive_count(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_owned()),
        Ok(value) => Ok(value),
        Err(e) => Err(format!("`{raw}` is not a count: {e}")),
    }
}

impl ProductArgs {
    fn to_source(&self) -> SourceProduct {
        let mut product = SourceProduct::new(self.title.clone(), self.source);
        if let Some(brand) = &self.brand {
            product = product.with_brand(brand.clone());
        }
        if let Some(price) = self.price {
            product = product.with_price(price);
        }
        product
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = xmatch_core::load_app_config()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Match {
            product,
            targets,
            tuning,
        } => {
            let options = tuning.apply(&config.search);
            commands::run_match(&config, &product.to_source(), &targets, options).await
        }
        Commands::Query {
            product,
            target,
            tuning,
        } => {
            let options = tuning.apply(&config.search);
            commands::run_query(&config, &product.to_source(), target, &options)
        }
        Commands::Extract {
            marketplace,
            file,
            page_url,
        } => commands::run_extract(&config, marketplace, &file, page_url.as_deref()),
    }
}
