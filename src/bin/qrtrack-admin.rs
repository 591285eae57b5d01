use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use qrtrack::analytics::aggregate;
use qrtrack::config::Config;
use qrtrack::redirect::resolve_slug;
use qrtrack::storage::connect;

#[derive(Parser)]
#[command(name = "qrtrack-admin")]
#[command(about = "QR code tracker admin CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a user's QR codes, newest first
    List {
        /// Owner user id
        user_id: String,
    },
    /// Show the QR code a slug points to
    Resolve {
        slug: String,
    },
    /// Print the analytics summary of a QR code as JSON
    Stats {
        /// QR code id
        id: String,
    },
    /// Delete a QR code together with its visits
    Delete {
        /// QR code id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let storage = connect(&config.database).await?;

    match cli.command {
        Commands::List { user_id } => {
            let codes = storage.list_qr_codes_by_user(&user_id).await?;
            if codes.is_empty() {
                println!("No QR codes found for user '{}'.", user_id);
            } else {
                println!("{:<38} {:<20} {:<30} {}", "ID", "Slug", "Title", "Target URL");
                println!("{}", "-".repeat(110));
                for code in codes {
                    println!(
                        "{:<38} {:<20} {:<30} {}",
                        code.id, code.slug, code.title, code.target_url
                    );
                }
            }
        }
        Commands::Resolve { slug } => match resolve_slug(storage.as_ref(), &slug).await {
            Ok(code) => {
                println!("{} -> {}", code.slug, code.target_url);
                println!("  id:    {}", code.id);
                println!("  owner: {}", code.user_id);
            }
            Err(_) => println!("⚠ No QR code with slug '{}'", slug),
        },
        Commands::Stats { id } => {
            let code = storage
                .get_qr_code(&id)
                .await?
                .with_context(|| format!("QR code '{}' not found", id))?;
            let summary = aggregate(storage.as_ref(), &code).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Delete { id } => match storage.delete_qr_code(&id).await? {
            Some(code) => println!("✓ Deleted QR code '{}' ({})", code.id, code.slug),
            None => println!("⚠ QR code '{}' was not found", id),
        },
    }

    Ok(())
}
