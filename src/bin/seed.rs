//! CLI tool that wipes the database and loads demo fixtures.
//!
//! Usage: `cargo run --bin seed [config.yml]`
//!
//! Every seeded account gets a fresh temporary password, printed once.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cms_admin::{
    config::Config,
    db::{self, repositories::SqlxSeedRepository},
    services::SeedService,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cms_admin=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yml"));
    let config = Config::load_with_env(&config_path)?;

    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;

    let outcome = SeedService::new(SqlxSeedRepository::boxed(pool))
        .run()
        .await?;

    let summary = &outcome.summary;
    println!("Seeded database ({:?})", config.database.driver);
    println!("  permissions: {}", summary.permissions);
    println!("  roles:       {}", summary.roles);
    println!("  users:       {}", summary.users);
    println!("  categories:  {}", summary.categories);
    println!("  tags:        {}", summary.tags);
    println!("  assets:      {}", summary.assets);
    println!("  posts:       {}", summary.posts);
    println!("  members:     {}", summary.members);
    println!("  events:      {}", summary.events);
    println!("  faqs:        {}", summary.faqs);
    println!("  settings:    {}", summary.settings);
    println!();
    println!("Temporary passwords (change after first login):");
    for credential in &outcome.credentials {
        println!(
            "  {:<28} {:<14} [{}]",
            credential.email,
            credential.password,
            credential.roles.join(", ")
        );
    }

    Ok(())
}
