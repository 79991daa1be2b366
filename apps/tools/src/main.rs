use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use client_core::{AttendanceGuard, EventSource, LocalBackend};
use shared::domain::{EventDraft, EventId};
use storage::Storage;
use tracing::info;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/showgo.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateUser {
        email: String,
        name: String,
    },
    DeleteUser {
        email: String,
    },
    /// Inserts a handful of upcoming events owned by `owner_email`.
    SeedDemo {
        owner_email: String,
    },
    ListEvents {
        #[arg(long)]
        category: Option<String>,
    },
    /// Toggles attendance for the user, as the app would.
    Attend {
        event_id: i64,
        email: String,
    },
}

const DEMO_EVENTS: [(&str, &str, &str, i64, &str); 5] = [
    ("Basement Show", "Punk", "Denver, CO", 3, "09:00 PM"),
    ("Rooftop Set", "Electronic", "Austin, TX", 5, "10:30 PM"),
    ("Late Night Trio", "Jazz", "New Orleans, LA", 8, "11:00 PM"),
    ("Porch Sessions", "Folk", "Nashville, TN", 12, "06:00 PM"),
    ("Warehouse Rave", "Electronic", "Detroit, MI", 15, "11:30 PM"),
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();
    let storage = Arc::new(Storage::new(&cli.database_url).await?);
    storage.health_check().await?;

    match cli.command {
        Command::CreateUser { email, name } => {
            let user_id = storage.create_user(&email, &name).await?;
            println!("user_id={user_id}");
        }
        Command::DeleteUser { email } => {
            let user_id = user_for_email(&storage, &email).await?;
            storage.delete_user(user_id).await?;
            println!("deleted user_id={user_id}");
        }
        Command::SeedDemo { owner_email } => {
            let owner = user_for_email(&storage, &owner_email).await?;
            let today = Utc::now().date_naive();
            for (name, category, location, days_out, time) in DEMO_EVENTS {
                let draft = EventDraft {
                    name: name.to_string(),
                    description: format!("{category} night in {location}"),
                    image_url: String::new(),
                    location: location.to_string(),
                    venue: String::new(),
                    event_date: today + Duration::days(days_out),
                    event_time: time.to_string(),
                    category: category.to_string(),
                };
                let event = storage.insert_event(Some(owner), &draft).await?;
                info!(event_id = %event.id, name, "seeded event");
            }
            println!("seeded {} events", DEMO_EVENTS.len());
        }
        Command::ListEvents { category } => {
            for event in storage.list_events().await? {
                if category.as_deref().is_some_and(|c| c != event.category) {
                    continue;
                }
                let attendees = storage.attendee_count(event.id).await?;
                println!(
                    "{}\t{}\t{}\t{}\t{} attending",
                    event.id, event.event_date, event.category, event.name, attendees
                );
            }
        }
        Command::Attend { event_id, email } => {
            let user_id = user_for_email(&storage, &email).await?;
            let local = Arc::new(LocalBackend::new(storage.clone()));
            local.set_actor(Some(user_id)).await;
            let event = local
                .fetch_all_events()
                .await?
                .into_iter()
                .find(|event| event.id == EventId(event_id))
                .ok_or_else(|| anyhow!("no event with id {event_id}"))?;
            let guard = AttendanceGuard::new(local, &event, Some(user_id));
            guard.sync().await.map_err(|notice| anyhow!("{notice}"))?;
            let snapshot = guard.toggle_attendance().await?;
            println!(
                "user_id={user_id} attending={} event_id={event_id} attendees={}",
                snapshot.is_attending, snapshot.attendee_count
            );
        }
    }

    Ok(())
}

async fn user_for_email(storage: &Storage, email: &str) -> Result<shared::domain::UserId> {
    storage
        .user_for_email(email)
        .await?
        .ok_or_else(|| anyhow!("no user with email {email}"))
}
