use clap::{Parser, Subcommand};
use rocket::figment::Figment;
use rocket::fs::FileServer;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Build, Request, Rocket};
use tracing::info;
use tracing_subscriber::EnvFilter;

use std::sync::{Arc, Mutex};

mod auth;
mod config;
mod data;
mod grammar;
mod internal_error;
mod lists;
mod media;
mod seed;
mod tasks;
mod users;


use config::AppConfig;
use data::DBConnection;
use grammar::GrammarClient;
use internal_error::{InternalError, InternalResult};
use media::MediaStore;
use users::data::MessageResponse;

#[macro_use]
extern crate rocket;

#[derive(Parser)]
#[command(name = "rpractice", version, about = "Language-learning task practice backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Insert example tasks for a user, one per category (first six per task type)
    SeedTasks {
        #[arg(long, env = "RPRACTICE_SEED_USER_ID")]
        user_id: i64,
    },
}

#[get("/")]
fn index() -> &'static str {
    "API is running..."
}

#[catch(default)]
fn default_catcher(status: Status, request: &Request) -> (Status, Json<MessageResponse>) {
    let message = match status.code {
        401 => "Not authorized",
        404 => "Not found",
        500 => "Server error",
        _ => status.reason().unwrap_or("Request failed"),
    };
    tracing::debug!("{} {} -> {}", request.method(), request.uri(), status);

    (status, Json(MessageResponse::new(message)))
}

pub fn build_rocket(figment: Figment) -> InternalResult<Rocket<Build>> {
    let config = AppConfig::from_figment(&figment)?;

    let connection = data::open_database(&config.database_path)?;
    info!("Database path: {}", config.database_path.display());

    let media_store = MediaStore::new(&config.upload_dir);
    media_store.ensure_directories()?;
    info!("Upload directory: {}", media_store.root().display());

    let grammar_client =
        GrammarClient::from_config(&config).map_err(|e| InternalError::Config(e.to_string()))?;
    let token_keys = auth::TokenKeys::new(&config.jwt_secret, config.token_ttl_secs);
    let file_server = FileServer::from(media_store.root());

    let connection: DBConnection = Arc::new(Mutex::new(connection));

    Ok(rocket::custom(figment)
        .manage(connection)
        .manage(media_store)
        .manage(token_keys)
        .manage(grammar_client)
        .manage(config)
        .mount("/", routes![index])
        .mount("/api", routes![grammar::grammar_check])
        .mount(
            "/api/users",
            routes![
                users::endpoints::register,
                users::endpoints::login,
                users::endpoints::protected,
            ],
        )
        .mount(
            "/api/tasks",
            routes![
                lists::endpoints::get_all_task_types,
                lists::endpoints::get_all_categories,
                lists::endpoints::create_category,
                tasks::endpoints::get_tasks,
                tasks::endpoints::get_task,
                tasks::endpoints::create_task,
                tasks::endpoints::update_task,
                tasks::endpoints::update_task_with_media,
                tasks::endpoints::delete_task,
                tasks::endpoints::delete_image,
                tasks::endpoints::delete_audio,
            ],
        )
        .mount("/api/lists", routes![lists::endpoints::list_categories])
        .mount("/uploads", file_server)
        .register("/", catchers![default_catcher]))
}

fn seed_tasks(figment: &Figment, user_id: i64) -> InternalResult<usize> {
    let config = AppConfig::from_figment(figment)?;
    let mut connection = data::open_database(&config.database_path)?;

    seed::seed_example_tasks(user_id, &mut connection)
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let figment = config::figment();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("Starting rpractice v{}", env!("CARGO_PKG_VERSION"));

            build_rocket(figment)?
                .launch()
                .await
                .map_err(|e| anyhow::anyhow!("Server failed: {}", e))?;
        }
        Command::SeedTasks { user_id } => {
            let inserted = seed_tasks(&figment, user_id)?;
            info!("Seeded {} example tasks for user {}", inserted, user_id);
        }
    }

    Ok(())
}
