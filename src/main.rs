use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use viralscan::cli::{Cli, Commands, ConfigAction};
use viralscan::config::{Config, ConfigValidator};
use viralscan::error::{Result, ViralscanError};
use viralscan::search::{
    ResultEnvelope, SearchCriteria, SearchOrchestrator, SearchRequest, TimeWindow,
};
use viralscan::sources::RedditClient;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Search {
            sources,
            window,
            count,
            json,
        } => {
            cmd_search(cli.config, sources, window, count, json)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "viralscan=debug"
    } else {
        "viralscan=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_search(
    config_path: Option<PathBuf>,
    sources: Vec<String>,
    window: Option<TimeWindow>,
    count: Option<u32>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;

    let criteria = SearchCriteria::from_request(
        SearchRequest {
            time_window: window,
            sources,
            result_count: count,
        },
        &config.search,
    )?;

    let client = Arc::new(RedditClient::from_env(&config.reddit)?);
    let orchestrator = SearchOrchestrator::new(client, &config)?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    let envelope = rt.block_on(orchestrator.execute(criteria))?;

    if json {
        let output =
            serde_json::to_string_pretty(envelope.as_ref()).map_err(|e| ViralscanError::Json {
                source: e,
                context: "Failed to serialize search results".to_string(),
            })?;
        println!("{}", output);
    } else {
        print_results(&envelope);
    }

    Ok(())
}

fn print_results(envelope: &ResultEnvelope) {
    let criteria = &envelope.criteria_used;
    let sources: Vec<&str> = criteria.sources.iter().map(String::as_str).collect();

    println!(
        "Top {} of r/{} over {} ({}ms)",
        envelope.total_found,
        sources.join(", r/"),
        criteria.time_window,
        envelope.execution_time_ms
    );

    if envelope.items.is_empty() {
        println!("No posts matched the engagement thresholds");
        return;
    }

    println!();
    for (rank, ranked) in envelope.items.iter().enumerate() {
        let item = &ranked.item;
        println!("{:>3}. [{:>8.2}] {}", rank + 1, ranked.score, item.title);
        println!(
            "     r/{} · {} upvotes · {} comments · u/{} · {}",
            item.source_name,
            item.upvote_count,
            item.comment_count,
            item.author_name,
            item.created_at().format("%Y-%m-%d %H:%M")
        );
        if !item.permalink.is_empty() {
            println!("     https://reddit.com{}", item.permalink);
        }
    }
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let output = toml::to_string_pretty(&config)?;
            println!("{}", output);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            // Create parent directory
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ViralscanError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
            println!("  Set REDDIT_CLIENT_ID and REDDIT_CLIENT_SECRET before searching");
        }
        ConfigAction::Path => {
            println!("{}", Config::default_path()?.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'viralscan config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    Config::load(&path)
}
