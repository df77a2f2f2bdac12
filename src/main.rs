mod commands;
mod handlers;
mod tasks;

use handlers::SessionStore;
use log::{error, info};
use photo_duel::config::Config;
use photo_duel::db::Database;
use serenity::async_trait;
use serenity::model::application::command::Command;
use serenity::model::application::interaction::Interaction;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct Bot {
    database: Arc<Database>,
    sessions: Arc<SessionStore>,
    reaper_started: AtomicBool,
}

#[async_trait]
impl EventHandler for Bot {
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let db = Arc::clone(&self.database);
        let sessions = Arc::clone(&self.sessions);

        tokio::spawn(async move {
            handlers::handle_interaction(&db, &sessions, &ctx, interaction).await;
        });
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);

        let registered = Command::set_global_application_commands(&ctx.http, |builder| {
            commands::create_commands(builder)
        })
        .await;

        if let Err(why) = registered {
            error!("Failed to register slash commands: {:?}", why);
        } else {
            info!("Successfully registered global slash commands.");
        }

        // ready fires again on reconnect
        if !self.reaper_started.swap(true, Ordering::SeqCst) {
            let sessions = Arc::clone(&self.sessions);
            tokio::spawn(async move {
                tasks::session_reaper::prune_idle_sessions_task(sessions).await;
            });
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    let database = match Database::new(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return;
        }
    };

    let bot = Bot {
        database,
        sessions: Arc::new(SessionStore::new()),
        reaper_started: AtomicBool::new(false),
    };

    let mut client = match Client::builder(&config.discord_token, GatewayIntents::GUILDS)
        .event_handler(bot)
        .await
    {
        Ok(client) => client,
        Err(e) => {
            error!("Error creating client: {:?}", e);
            return;
        }
    };

    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }
}
