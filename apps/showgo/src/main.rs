use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    forms::{EditEventForm, ImageUpload, NewEventForm, Period, CATEGORY_CHOICES},
    load_settings, AttendanceGuard, Authenticator, EventEditor, EventFeed, ProfileTab,
    EventSource, ProfileView, RestBackend, SessionHub,
};
use shared::domain::{Event, EventId};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "showgo", about = "Find live music and RSVP from the terminal")]
struct Cli {
    /// Sign in with this account before running the command.
    #[arg(long, global = true)]
    email: Option<String>,
    #[arg(long, global = true)]
    password: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Browse upcoming events.
    Events {
        #[arg(long)]
        category: Option<String>,
        /// Number of pages to show.
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Show one event with its attendance.
    Show { event_id: i64 },
    /// Toggle your attendance for an event.
    Attend { event_id: i64 },
    SignUp {
        #[arg(long)]
        name: String,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        location: String,
        /// YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// HH:MM
        #[arg(long)]
        time: String,
        #[arg(long, default_value = "PM")]
        period: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    Edit {
        event_id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        venue: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        time: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    Delete { event_id: i64 },
    Profile {
        #[arg(long, default_value = "attending")]
        tab: ProfileTab,
    },
    /// List the categories offered when creating an event.
    Categories,
}

struct App {
    backend: Arc<RestBackend>,
    hub: Arc<SessionHub>,
    auth: Authenticator,
}

impl App {
    fn new(backend: Arc<RestBackend>) -> Self {
        let hub = Arc::new(SessionHub::new());
        let auth = Authenticator::new(backend.clone(), backend.clone(), hub.clone());
        Self { backend, hub, auth }
    }

    fn editor(&self) -> EventEditor {
        EventEditor::new(self.backend.clone(), self.backend.clone(), self.hub.clone())
    }

    async fn find_event(&self, event_id: i64) -> Result<Event> {
        self.backend
            .fetch_all_events()
            .await?
            .into_iter()
            .find(|event| event.id == EventId(event_id))
            .ok_or_else(|| anyhow!("event {event_id} not found"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let settings = load_settings()?;
    let app = App::new(Arc::new(RestBackend::new(settings)?));
    tracing::debug!(backend = %app.backend.settings().backend_url, "showgo: backend configured");

    let signing_up = matches!(cli.command, Command::SignUp { .. });
    if !signing_up && (cli.email.is_some() || cli.password.is_some()) {
        let (email, password) = credentials(cli.email.as_deref(), cli.password.as_deref())?;
        app.auth.sign_in(email, password).await?;
    }

    let result = run(&app, cli).await;
    if app.hub.current().is_some() {
        if let Err(err) = app.auth.sign_out().await {
            tracing::warn!(error = %err, "sign-out after command failed");
        }
    }
    result
}

fn credentials<'a>(email: Option<&'a str>, password: Option<&'a str>) -> Result<(&'a str, &'a str)> {
    match (email, password) {
        (Some(email), Some(password)) => Ok((email, password)),
        _ => bail!("both --email and --password are required"),
    }
}

async fn run(app: &App, cli: Cli) -> Result<()> {
    match cli.command {
        Command::Events { category, pages } => {
            let mut feed = EventFeed::new(app.backend.clone());
            feed.refresh().await?;
            println!("Categories: {}", feed.list().categories().join(", "));
            feed.set_category(category);
            for _ in 1..pages.max(1) {
                feed.load_more();
            }
            if feed.is_empty_result() {
                println!("No events found");
                return Ok(());
            }
            for event in feed.visible() {
                print_summary(event);
            }
            if feed.list().has_more() {
                println!("(more events available, use --pages {})", pages.max(1) + 1);
            }
        }
        Command::Show { event_id } => {
            let event = app.find_event(event_id).await?;
            let mounted = AttendanceGuard::mount(app.backend.clone(), &event, &app.hub).await;
            print_details(&event);
            match &mounted.initial_sync {
                Ok(snapshot) => {
                    println!("Attendees:   {}", snapshot.attendee_count);
                    if app.hub.current().is_some() {
                        let status = if snapshot.is_attending { "yes" } else { "no" };
                        println!("Attending:   {status}");
                    } else {
                        println!("Sign in to attend this event");
                    }
                }
                Err(notice) => println!("{notice}"),
            }
            if mounted.guard.can_modify().await {
                println!("You created this event (edit / delete available)");
            }
        }
        Command::Attend { event_id } => {
            let event = app.find_event(event_id).await?;
            let mounted = AttendanceGuard::mount(app.backend.clone(), &event, &app.hub).await;
            if let Err(notice) = &mounted.initial_sync {
                bail!("{notice}");
            }
            let snapshot = mounted.guard.toggle_attendance().await?;
            let verb = if snapshot.is_attending {
                "You're going to"
            } else {
                "You're no longer going to"
            };
            println!("{verb} {} ({} attending)", event.name, snapshot.attendee_count);
        }
        Command::SignUp { name } => {
            let (email, password) = credentials(cli.email.as_deref(), cli.password.as_deref())?;
            let user_id = app.auth.sign_up(&name, email, password).await?;
            println!("Account created. Signed in as {user_id}");
        }
        Command::Create {
            name,
            description,
            location,
            date,
            time,
            period,
            category,
            image,
        } => {
            let form = NewEventForm {
                name,
                description,
                location,
                event_date: date,
                event_time: time,
                period: period.parse::<Period>()?,
                category,
            };
            let image = image.as_deref().map(ImageUpload::from_path).transpose()?;
            let created = app.editor().create(&form, image.as_ref()).await?;
            println!("Created event {}", created.id);
            print_details(&created);
        }
        Command::Edit {
            event_id,
            name,
            description,
            location,
            venue,
            date,
            time,
            category,
            image,
        } => {
            let event = app.find_event(event_id).await?;
            let mut form = EditEventForm::from_event(&event);
            form.name = name.unwrap_or(form.name);
            form.description = description.unwrap_or(form.description);
            form.location = location.unwrap_or(form.location);
            form.venue = venue.unwrap_or(form.venue);
            form.event_date = date.unwrap_or(form.event_date);
            form.event_time = time.unwrap_or(form.event_time);
            form.category = category.unwrap_or(form.category);
            let image = image.as_deref().map(ImageUpload::from_path).transpose()?;
            let updated = app.editor().update(&event, &form, image.as_ref()).await?;
            println!("Updated event {}", updated.id);
            print_details(&updated);
        }
        Command::Delete { event_id } => {
            let event = app.find_event(event_id).await?;
            app.editor().delete(&event).await?;
            println!("Deleted event {}", event.id);
        }
        Command::Profile { tab } => {
            let mut view = ProfileView::new(app.backend.clone(), app.backend.clone(), app.hub.clone());
            view.open().await?;
            if tab != view.tab() {
                view.select_tab(tab).await?;
            }
            println!("{}", view.display_name().unwrap_or("(no profile)"));
            println!("-- {} --", view.tab());
            if view.events().is_empty() {
                println!("No events yet");
            }
            for event in view.events() {
                print_summary(event);
            }
        }
        Command::Categories => {
            for category in CATEGORY_CHOICES {
                println!("{category}");
            }
        }
    }
    Ok(())
}

fn print_summary(event: &Event) {
    println!(
        "[{}] {} | {} | {} {} | {}",
        event.id,
        event.name,
        event.category,
        event.event_date,
        event.event_time,
        event.location
    );
}

fn print_details(event: &Event) {
    println!("{}", event.name);
    println!("Category:    {}", event.category);
    println!("When:        {} at {}", event.display_date(), event.event_time);
    println!("Where:       {}", event.location);
    if !event.venue.is_empty() {
        println!("Venue:       {}", event.venue);
    }
    println!("Image:       {}", event.image_url);
    println!();
    println!("{}", event.description);
}
