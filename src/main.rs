use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use tally::models::CreateUserInput;
use tally::{api, db, export};

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Collaborative todo service with @mention support")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Tally server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Export a user's todos to stdout or a file
    Export {
        /// Output format: json or csv
        #[arg(short, long, default_value = "json")]
        format: String,

        /// User whose todos to export
        #[arg(short, long)]
        user_id: Uuid,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },
    /// Populate the database with sample users and tags
    Seed,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "tally=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(port: u16) -> anyhow::Result<()> {
    tracing::info!("Starting Tally server on port {}", port);

    let db = db::Database::open_default()?;
    db.migrate()?;

    let app = api::create_router(db);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Tally server listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn export_todos(
    format: &str,
    user_id: Uuid,
    output: Option<std::path::PathBuf>,
) -> anyhow::Result<()> {
    let db = db::Database::open_default()?;
    db.migrate()?;

    let todos = db.get_todos_for_user(user_id)?;
    let body = match format {
        "csv" => export::to_csv(&todos),
        "json" => export::to_json(&todos)?,
        other => anyhow::bail!("unknown export format: {}", other),
    };

    match output {
        Some(path) => {
            std::fs::write(&path, body)?;
            tracing::info!("Exported {} todos to {}", todos.len(), path.display());
        }
        None => println!("{}", body),
    }
    Ok(())
}

const SEED_USERS: [(&str, &str, &str); 5] = [
    ("Sushant Verma", "sushant", "sushant@example.com"),
    ("Akshita Kapoor", "akshita", "akshita@example.com"),
    ("Mohan Sharma", "mohan", "mohan@example.com"),
    ("Gurupreet Kaur", "gurupreet", "gurupreet@example.com"),
    ("Puneet Malhotra", "puneet", "puneet@example.com"),
];

const SEED_TAGS: [&str; 6] = ["Work", "Personal", "Urgent", "Later", "Ideas", "Meeting"];

fn seed() -> anyhow::Result<()> {
    let db = db::Database::open_default()?;
    db.migrate()?;

    for (name, username, email) in SEED_USERS {
        if db.get_user_by_email(email)?.is_some() {
            tracing::debug!("User {} already present, skipping", email);
            continue;
        }
        let user = db.create_user(CreateUserInput {
            name: name.to_string(),
            username: Some(username.to_string()),
            email: email.to_string(),
        })?;
        tracing::info!("Created user {} ({})", user.name, user.email);
    }

    for tag in SEED_TAGS {
        db.ensure_tag(tag)?;
    }
    tracing::info!("Seeded {} tags", SEED_TAGS.len());

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Serve { port }) => serve(port).await?,
        Some(Commands::Export {
            format,
            user_id,
            output,
        }) => export_todos(&format, user_id, output)?,
        Some(Commands::Seed) => seed()?,
        None => serve(3000).await?,
    }

    Ok(())
}
