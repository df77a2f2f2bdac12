use log::{error, info};
use photo_duel::db::Database;
use photo_duel::error::{LedgerError, VotingError};
use photo_duel::ledger::PhotoSource;
use photo_duel::models::CandidatePool;
use photo_duel::voting::standings::{format_leaderboard, rank_photos};
use photo_duel::voting::{PairGenerator, VoteCoordinator, VotingSession};
use serenity::builder::CreateApplicationCommand;
use serenity::model::application::command::CommandOptionType;
use serenity::model::application::interaction::application_command::{
    ApplicationCommandInteraction, CommandDataOption,
};
use serenity::model::application::interaction::InteractionResponseType;
use serenity::prelude::*;
use std::sync::Arc;

use crate::handlers::{self, SessionStore};

const LEADERBOARD_SIZE: usize = 10;

pub fn create_duel_command(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("duel")
        .description("Vote on contest photos two at a time")
        .create_option(|option| {
            option
                .name("start")
                .description("Start comparing photos in a contest")
                .kind(CommandOptionType::SubCommand)
                .create_sub_option(|sub_option| {
                    sub_option
                        .name("contest")
                        .description("ID of the contest")
                        .kind(CommandOptionType::String)
                        .required(true)
                })
        })
        .create_option(|option| {
            option
                .name("leaderboard")
                .description("Show the most voted photos in a contest")
                .kind(CommandOptionType::SubCommand)
                .create_sub_option(|sub_option| {
                    sub_option
                        .name("contest")
                        .description("ID of the contest")
                        .kind(CommandOptionType::String)
                        .required(true)
                })
        })
}

pub async fn handle_duel_command(
    database: &Arc<Database>,
    sessions: &SessionStore,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(subcommand) = command.data.options.first() else {
        send_error_response(ctx, command, "No subcommand provided").await?;
        return Ok(());
    };

    let Some(contest_id) = contest_option(subcommand) else {
        send_error_response(ctx, command, "Please provide a contest ID").await?;
        return Ok(());
    };

    match subcommand.name.as_str() {
        "start" => handle_start(database, sessions, ctx, command, contest_id).await?,
        "leaderboard" => handle_leaderboard(database, ctx, command, contest_id).await?,
        _ => send_error_response(ctx, command, "Unknown subcommand").await?,
    }

    Ok(())
}

fn contest_option(subcommand: &CommandDataOption) -> Option<&str> {
    subcommand
        .options
        .iter()
        .find(|option| option.name == "contest")
        .and_then(|option| option.value.as_ref())
        .and_then(|value| value.as_str())
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

async fn handle_start(
    database: &Arc<Database>,
    sessions: &SessionStore,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    contest_id: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let user_id = command.user.id.to_string();

    let photos = match database.get_approved_photos(contest_id).await {
        Ok(photos) => photos,
        Err(LedgerError::UnknownContest(_)) => {
            send_error_response(ctx, command, "No contest with that ID.").await?;
            return Ok(());
        }
        Err(e) => {
            error!("Failed to load photos for contest {}: {}", contest_id, e);
            send_error_response(ctx, command, "Could not load photos for that contest.").await?;
            return Ok(());
        }
    };

    let coordinator = VoteCoordinator::new(database.clone(), Some(user_id.clone()), contest_id);
    let mut session = VotingSession::new(coordinator, PairGenerator::from_entropy());
    let notice = match session.start_session(CandidatePool::new(contest_id, photos)).await {
        Ok(()) | Err(VotingError::PoolInsufficient) => None,
        Err(e) => Some(e.to_string()),
    };
    info!("User {} started voting on contest {}", user_id, contest_id);

    let view = handlers::build_view(&session, notice.as_deref());
    sessions.insert((user_id, contest_id.to_string()), session).await;

    command.create_interaction_response(&ctx.http, |response| {
        response
            .kind(InteractionResponseType::ChannelMessageWithSource)
            .interaction_response_data(|message| view.render(message))
    }).await?;

    Ok(())
}

async fn handle_leaderboard(
    database: &Arc<Database>,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    contest_id: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (contest, tallies) = match database.get_contest(contest_id).await {
        Ok(contest) => match database.get_photo_tallies(contest_id).await {
            Ok(tallies) => (contest, tallies),
            Err(e) => {
                error!("Failed to load tallies for contest {}: {}", contest_id, e);
                send_error_response(ctx, command, "Could not load the leaderboard.").await?;
                return Ok(());
            }
        },
        Err(LedgerError::UnknownContest(_)) => {
            send_error_response(ctx, command, "No contest with that ID.").await?;
            return Ok(());
        }
        Err(e) => {
            error!("Failed to load contest {}: {}", contest_id, e);
            send_error_response(ctx, command, "Could not load the leaderboard.").await?;
            return Ok(());
        }
    };

    let summary = format_leaderboard(&rank_photos(&tallies), LEADERBOARD_SIZE);

    command.create_interaction_response(&ctx.http, |response| {
        response
            .kind(InteractionResponseType::ChannelMessageWithSource)
            .interaction_response_data(|message| {
                message.embed(|embed| {
                    embed
                        .title(format!("Leaderboard: {}", contest.name))
                        .description(&summary)
                })
            })
    }).await?;

    Ok(())
}

async fn send_error_response(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    error_message: &str,
) -> Result<(), serenity::Error> {
    command
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| message.content(error_message).ephemeral(true))
        })
        .await
}
