use clap::Parser;
use ctcrawl_engine::cache::CachePolicy;
use ctcrawl_engine::config::{CrawlConfig, ZonePolicy};
use ctcrawl_engine::targets;
use ctcrawl_engine::traversal::Crawler;
use ctcrawl_h::session::CdpSession;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Crawl the ECS pricing catalog", long_about = None)]
struct Args {
    /// Target pricing page.
    #[arg(long)]
    url: Option<String>,

    /// Crawl only the first N provinces.
    #[arg(long)]
    limit: Option<usize>,

    /// Cache staleness window in days; 0 always re-extracts.
    #[arg(long)]
    ttl_days: Option<u64>,

    /// Zone selection policy: `first` (one representative zone per pool)
    /// or `all`.
    #[arg(long)]
    zone_policy: Option<String>,

    /// Output directory for the cache, logs and catalog files.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Run the browser headed.
    #[arg(long)]
    headed: bool,
}

fn apply_args(config: &mut CrawlConfig, args: &Args) {
    if let Some(url) = &args.url {
        config.target_url = url.clone();
    }
    if let Some(limit) = args.limit {
        config.province_limit = (limit > 0).then_some(limit);
    }
    if let Some(days) = args.ttl_days {
        config.cache_policy = if days == 0 {
            CachePolicy::AlwaysRefresh
        } else {
            CachePolicy::TtlDays(days)
        };
    }
    if let Some(policy) = args.zone_policy.as_deref().and_then(ZonePolicy::parse) {
        config.zone_policy = policy;
    }
    if let Some(output) = &args.output {
        config.output_root = output.clone();
    }
    if args.headed {
        config.headless = false;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut config = CrawlConfig::from_env();
    apply_args(&mut config, &args);
    std::fs::create_dir_all(&config.output_root)?;

    let file_appender = tracing_appender::rolling::never(&config.output_root, "run-log.txt");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    let session = CdpSession::new(config.clone());
    let mut crawler = Crawler::new(session, config, targets::production());
    match crawler.run().await {
        Ok(summary) => {
            info!("{}", summary);
            Ok(())
        }
        Err(e) => {
            error!("fatal: {}", e);
            Err(e.into())
        }
    }
}
