//! `shelfscan scrape` and `shelfscan parse`.

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::{Context, Result},
    clap::Args,
    shelfscan_browser::ChromeLauncher,
    shelfscan_config::ShelfscanConfig,
    shelfscan_engine::{ArtifactStore, HarvestStatus, Harvester},
    shelfscan_parser::{ParseRules, parse_detailed},
    tracing::warn,
};

#[derive(Args, Debug)]
pub struct ScrapeArgs {
    /// Search keyword (defaults to `target.default_keyword`).
    #[arg(short, long)]
    pub keyword: Option<String>,
    /// Scrape this listing URL instead of a keyword search.
    #[arg(long, conflicts_with = "keyword")]
    pub url: Option<String>,
    /// Suffix for artifact file names when several workers share a directory.
    #[arg(long, env = "SHELFSCAN_WORKER_ID")]
    pub worker_id: Option<String>,
    /// Where to write snapshots and product lists (overrides config value).
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Print the product records as JSON on stdout.
    #[arg(long, default_value_t = false)]
    pub print_products: bool,
}

pub async fn handle_scrape(config: ShelfscanConfig, args: ScrapeArgs) -> Result<()> {
    let mut store = ArtifactStore::new(&config.output);
    if let Some(dir) = args.output_dir {
        store = store.with_dir(dir);
    }
    let default_keyword = config.target.default_keyword.clone();
    let launcher = Arc::new(ChromeLauncher::new(config.browser.clone()));
    let harvester = Harvester::new(launcher, config).context("invalid convergence or parser rules")?;

    let report = match args.url {
        Some(ref url) => harvester.harvest_url(url).await,
        None => {
            let keyword = args.keyword.unwrap_or(default_keyword);
            harvester.harvest_keyword(&keyword).await
        },
    };

    match store.save(&report, args.worker_id.as_deref()) {
        Ok(saved) => {
            for path in [saved.snapshot, saved.midpoint, saved.products]
                .into_iter()
                .flatten()
            {
                eprintln!("saved {}", path.display());
            }
        },
        Err(e) => warn!(error = %e, "failed to save artifacts"),
    }

    for line in &report.trail {
        eprintln!("{line}");
    }
    eprintln!("{}", report.summary());
    if !report.reasons.is_empty() {
        let reasons: Vec<&str> = report.reasons.iter().map(|r| r.as_str()).collect();
        eprintln!("reasons: {}", reasons.join(", "));
    }

    if args.print_products {
        println!("{}", serde_json::to_string_pretty(&report.records)?);
    }

    match report.status {
        HarvestStatus::Failed => anyhow::bail!(
            "harvest failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        ),
        HarvestStatus::Blocked => anyhow::bail!("harvest blocked by an anti-bot interstitial"),
        HarvestStatus::Converged | HarvestStatus::Partial => Ok(()),
    }
}

/// Re-parse a saved snapshot without a browser.
pub fn handle_parse(config: &ShelfscanConfig, file: PathBuf) -> Result<()> {
    let html = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let rules = ParseRules::from_config(&config.parser)?;
    let outcome = parse_detailed(&html, &rules);

    eprintln!(
        "{} records via {} strategy ({} containers)",
        outcome.records.len(),
        outcome.strategy,
        outcome.containers_found
    );
    let doc = serde_json::json!({
        "source_file": file.display().to_string(),
        "source": outcome.strategy,
        "total_products": outcome.records.len(),
        "products": outcome.records,
    });
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}
