use clap::{Parser, Subcommand};
use std::sync::Arc;
use whitelist_registry::{
    config::AppConfig,
    db,
    models::{ListQuery, ModerationAction, StageFilter},
    repositories::{SqliteWhitelistRepository, WhitelistRepository},
    services::{ConfirmationService, ListingService},
};

#[derive(Parser)]
#[command(name = "whitelist-cli")]
#[command(about = "CLI tool for reviewing whitelist applications", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List applications
    List {
        /// Stage filter: all, unconfirmed, confirmed, declined, question, accepted
        #[arg(short, long, default_value = "all")]
        stage: String,

        /// Only applications whose name contains this text
        #[arg(long)]
        search: Option<String>,

        /// Maximum number of applications to display
        #[arg(short, long, default_value_t = 100)]
        limit: i64,
    },

    /// Show one application and its confirmation tokens
    Show {
        /// Applicant email address
        #[arg(short, long)]
        email: String,
    },

    /// Accept an application
    Accept {
        #[arg(short, long)]
        id: i64,
    },

    /// Decline an application
    Decline {
        #[arg(short, long)]
        id: i64,
    },

    /// Mark an application as needing clarification
    Question {
        #[arg(short, long)]
        id: i64,
    },

    /// Confirm an applicant's email with their token
    Confirm {
        #[arg(short, long)]
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    // Connect to database
    let pool = db::create_pool(&config).await?;

    // Run migrations
    db::run_migrations(&pool).await?;

    // Initialize services
    let repository: Arc<dyn WhitelistRepository> = Arc::new(SqliteWhitelistRepository::new(pool));
    let confirmation_service = ConfirmationService::new(repository.clone());
    let listing_service = ListingService::new(repository.clone());

    // Parse CLI arguments
    let cli = Cli::parse();

    match cli.command {
        Commands::List {
            stage,
            search,
            limit,
        } => {
            let stage = match stage.parse::<StageFilter>() {
                Ok(stage) => stage,
                Err(err) => {
                    eprintln!("❌ {}", err);
                    std::process::exit(1);
                }
            };

            let query = ListQuery {
                stage,
                search,
                rows_per_page: limit.max(0),
                page: 1,
                ..ListQuery::default()
            };

            match listing_service.list(query).await {
                Ok(page) => {
                    if page.data.is_empty() {
                        println!("No applications found.");
                    } else {
                        println!(
                            "{:<5} {:<30} {:<35} {:<12} {:<20} {:<12}",
                            "ID", "Name", "Email", "Birthday", "Country", "Stage"
                        );
                        println!("{}", "-".repeat(119));
                        for whitelist in &page.data {
                            println!(
                                "{:<5} {:<30} {:<35} {:<12} {:<20} {:<12}",
                                whitelist.id,
                                whitelist.name,
                                whitelist.email,
                                whitelist.birthday,
                                whitelist.country,
                                whitelist.verification_stage
                            );
                        }
                        println!(
                            "\nShowing {} of {} applications",
                            page.data.len(),
                            page.pagination.rows_number
                        );
                    }
                }
                Err(err) => {
                    eprintln!("❌ Failed to list applications: {}", err);
                    std::process::exit(1);
                }
            }
        }

        Commands::Show { email } => match repository.find_by_email(&email).await {
            Ok(Some(whitelist)) => {
                println!("  ID: {}", whitelist.id);
                println!("  Name: {}", whitelist.name);
                println!("  Email: {}", whitelist.email);
                println!("  Phone: {}", whitelist.phone);
                println!("  Birthday: {}", whitelist.birthday);
                println!("  Country: {}", whitelist.country);
                println!("  Stage: {}", whitelist.verification_stage);
                println!("  Created: {}", whitelist.created_at);

                match repository.find_tokens(whitelist.id).await {
                    Ok(tokens) => {
                        for token in tokens {
                            let status = match token.used_at {
                                Some(used_at) => format!("used {}", used_at),
                                None => format!("expires {}", token.expired_at),
                            };
                            println!("  Token issued {}: {}", token.created_at, status);
                        }
                    }
                    Err(err) => {
                        eprintln!("❌ Failed to load tokens: {}", err);
                        std::process::exit(1);
                    }
                }
            }
            Ok(None) => {
                eprintln!("❌ Application for '{}' not found", email);
                std::process::exit(1);
            }
            Err(err) => {
                eprintln!("❌ Failed to find application: {}", err);
                std::process::exit(1);
            }
        },

        Commands::Accept { id } => {
            moderate(&confirmation_service, id, ModerationAction::Accept).await
        }
        Commands::Decline { id } => {
            moderate(&confirmation_service, id, ModerationAction::Decline).await
        }
        Commands::Question { id } => {
            moderate(&confirmation_service, id, ModerationAction::Question).await
        }

        Commands::Confirm { token } => match confirmation_service.confirm_email(&token).await {
            Ok(email) => {
                println!("✅ Email '{}' confirmed successfully!", email);
            }
            Err(err) => {
                eprintln!("❌ Failed to confirm email: {}", err);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

async fn moderate(service: &ConfirmationService, id: i64, action: ModerationAction) {
    match service.moderate(id, action).await {
        Ok(whitelist) => {
            println!(
                "✅ Application {} is now {}",
                whitelist.id, whitelist.verification_stage
            );
        }
        Err(err) => {
            eprintln!("❌ Failed to {} application {}: {}", action, id, err);
            std::process::exit(1);
        }
    }
}
