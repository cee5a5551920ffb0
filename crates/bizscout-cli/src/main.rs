mod extract;
mod profiles;
mod tasks;

use clap::{Parser, Subcommand};

use crate::tasks::TasksCommands;

#[derive(Debug, Parser)]
#[command(name = "bizscout")]
#[command(about = "Business profile discovery command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run an ad-hoc extraction and persist the accepted profiles
    Search {
        /// Keyword to search for (repeatable)
        #[arg(long = "keyword")]
        keywords: Vec<String>,
        /// Hashtag to walk, with or without a leading '#' (repeatable)
        #[arg(long = "hashtag")]
        hashtags: Vec<String>,
        /// Stop once this many business profiles are accepted
        #[arg(long, default_value = "10")]
        limit: i64,
    },
    /// Fetch one account now and persist it regardless of classification
    Sync { username: String },
    /// List stored company profiles
    Profiles {
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "25")]
        page_size: u32,
        /// Only profiles whose primary source matches (e.g. instagram)
        #[arg(long)]
        source: Option<String>,
    },
    /// Inspect or run stored search tasks
    Tasks {
        #[command(subcommand)]
        command: TasksCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    Ping,
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("bizscout: no command given; see --help");
        return Ok(());
    };

    let config = bizscout_core::load_app_config()?;
    let pool_config = bizscout_db::PoolConfig::from_app_config(&config);
    let pool = bizscout_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            bizscout_db::health_check(&pool).await?;
            println!("database ok");
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let applied = bizscout_db::run_migrations(&pool).await?;
            println!("migrations applied ({applied} total)");
        }
        Commands::Search {
            keywords,
            hashtags,
            limit,
        } => extract::run_search(&pool, &config, keywords, hashtags, limit).await?,
        Commands::Sync { username } => extract::run_sync(&pool, &config, &username).await?,
        Commands::Profiles {
            page,
            page_size,
            source,
        } => profiles::run_profiles_list(&pool, page, page_size, source).await?,
        Commands::Tasks { command } => tasks::run_tasks(&pool, &config, command).await?,
    }

    Ok(())
}
