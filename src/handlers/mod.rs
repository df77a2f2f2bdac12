mod duel;

pub use duel::build_view;

use lazy_static::lazy_static;
use log::{error, info, warn};
use photo_duel::db::Database;
use photo_duel::voting::VotingSession;
use regex::Regex;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::message_component::MessageComponentInteraction;
use serenity::model::application::interaction::{Interaction, InteractionResponseType};
use serenity::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

lazy_static! {
    // duel<Action>_<contest_id>_<round>
    static ref DUEL_CUSTOM_ID: Regex =
        Regex::new(r"^duel(Left|Right|Done|More|Retry)_(.+)_(\d+)$").expect("duel custom id pattern");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelAction {
    Left,
    Right,
    Done,
    More,
    Retry,
}

impl DuelAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuelAction::Left => "Left",
            DuelAction::Right => "Right",
            DuelAction::Done => "Done",
            DuelAction::More => "More",
            DuelAction::Retry => "Retry",
        }
    }

    pub fn custom_id(&self, contest_id: &str, round: u64) -> String {
        format!("duel{}_{}_{}", self.as_str(), contest_id, round)
    }
}

pub fn parse_duel_custom_id(custom_id: &str) -> Option<(DuelAction, String, u64)> {
    let caps = DUEL_CUSTOM_ID.captures(custom_id)?;
    let action = match &caps[1] {
        "Left" => DuelAction::Left,
        "Right" => DuelAction::Right,
        "Done" => DuelAction::Done,
        "More" => DuelAction::More,
        "Retry" => DuelAction::Retry,
        _ => return None,
    };
    let round = caps[3].parse().ok()?;
    Some((action, caps[2].to_string(), round))
}

/// (user id, contest id)
pub type SessionKey = (String, String);

struct SessionEntry {
    session: Arc<Mutex<VotingSession>>,
    last_used: Instant,
}

/// Live voting sessions, one per user and contest.
///
/// A session is locked for the whole of a vote, so a second click on the same
/// session waits and then finds its pair already replaced.
#[derive(Default)]
pub struct SessionStore {
    entries: Mutex<HashMap<SessionKey, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any session the user already had on this contest.
    pub async fn insert(&self, key: SessionKey, session: VotingSession) -> Arc<Mutex<VotingSession>> {
        let session = Arc::new(Mutex::new(session));
        let entry = SessionEntry {
            session: Arc::clone(&session),
            last_used: Instant::now(),
        };
        self.entries.lock().await.insert(key, entry);
        session
    }

    pub async fn get(&self, key: &SessionKey) -> Option<Arc<Mutex<VotingSession>>> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(key)?;
        entry.last_used = Instant::now();
        Some(Arc::clone(&entry.session))
    }

    pub async fn prune_idle(&self, max_idle: Duration) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.last_used.elapsed() < max_idle);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

// Handle slash commands
pub async fn handle_command(
    database: &Arc<Database>,
    sessions: &SessionStore,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Received command: {}", command.data.name);
    match command.data.name.as_str() {
        "duel" => crate::commands::duel::handle_duel_command(database, sessions, ctx, command).await?,
        _ => {
            command.create_interaction_response(&ctx.http, |response| {
                response
                    .kind(InteractionResponseType::ChannelMessageWithSource)
                    .interaction_response_data(|message| message.content("Unknown command").ephemeral(true))
            }).await?;
        }
    }
    Ok(())
}

pub async fn handle_component(
    sessions: &SessionStore,
    ctx: &Context,
    component: &MessageComponentInteraction,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let custom_id = &component.data.custom_id;
    info!("Received component interaction: {}", custom_id);

    match parse_duel_custom_id(custom_id) {
        Some((action, contest_id, round)) => {
            duel::handle_duel_action(sessions, ctx, component, action, &contest_id, round).await?;
        }
        None => {
            warn!("Unhandled component custom_id: {}", custom_id);
            component.create_interaction_response(&ctx.http, |response| {
                response
                    .kind(InteractionResponseType::ChannelMessageWithSource)
                    .interaction_response_data(|message| message.content("Unknown button action.").ephemeral(true))
            }).await?;
        }
    }

    Ok(())
}

pub async fn handle_interaction(
    database: &Arc<Database>,
    sessions: &SessionStore,
    ctx: &Context,
    interaction: Interaction,
) {
    let result = match interaction {
        Interaction::ApplicationCommand(command) => {
            handle_command(database, sessions, ctx, &command).await
        }
        Interaction::MessageComponent(component) => {
            handle_component(sessions, ctx, &component).await
        }
        _ => {
            warn!("Unhandled interaction type: {:?}", interaction.kind());
            Ok(())
        }
    };

    if let Err(why) = result {
        error!("Interaction handler error: {:?}", why);
    }
}
