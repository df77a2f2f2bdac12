use log::info;
use photo_duel::error::VotingError;
use photo_duel::models::{Photo, Side, VoteQuota};
use photo_duel::voting::{SessionState, VotingSession};
use serenity::builder::{CreateEmbed, CreateInteractionResponseData};
use serenity::model::application::component::ButtonStyle;
use serenity::model::application::interaction::{
    message_component::MessageComponentInteraction, InteractionResponseType,
};
use serenity::prelude::*;

use super::{DuelAction, SessionStore};

struct DuelButton {
    custom_id: String,
    label: &'static str,
    style: ButtonStyle,
    disabled: bool,
}

/// Everything shown for one session state: text, the two photos and the buttons.
pub struct DuelView {
    pub content: String,
    embeds: Vec<CreateEmbed>,
    buttons: Vec<DuelButton>,
}

impl DuelView {
    pub fn render<'a, 'b>(
        &self,
        message: &'b mut CreateInteractionResponseData<'a>,
    ) -> &'b mut CreateInteractionResponseData<'a> {
        message
            .ephemeral(true)
            .content(&self.content)
            .set_embeds(self.embeds.clone())
            .components(|c| {
                if !self.buttons.is_empty() {
                    c.create_action_row(|row| {
                        for button in &self.buttons {
                            row.create_button(|btn| {
                                btn.custom_id(&button.custom_id)
                                   .label(button.label)
                                   .style(button.style)
                                   .disabled(button.disabled)
                            });
                        }
                        row
                    });
                }
                c
            })
    }

    pub fn button_ids(&self) -> Vec<&str> {
        self.buttons.iter().map(|b| b.custom_id.as_str()).collect()
    }
}

pub fn build_view(session: &VotingSession, notice: Option<&str>) -> DuelView {
    let contest_id = session.contest_id();
    let round = session.round();
    let button = |action: DuelAction, label: &'static str, style: ButtonStyle, disabled: bool| DuelButton {
        custom_id: action.custom_id(contest_id, round),
        label,
        style,
        disabled,
    };

    let mut content = String::new();
    if let Some(notice) = notice {
        content.push_str(&format!("⚠️ {}\n\n", notice));
    }

    match session.state() {
        SessionState::Loading => {
            content.push_str("Loading photos...");
            DuelView { content, embeds: Vec::new(), buttons: Vec::new() }
        }
        SessionState::Insufficient => {
            content.push_str(&VotingError::PoolInsufficient.to_string());
            DuelView { content, embeds: Vec::new(), buttons: Vec::new() }
        }
        SessionState::Active { pair, votes_cast } => {
            content.push_str("**Which photo is better?**\n");
            content.push_str(&progress_line(*votes_cast, session.quota()));
            let locked = !session.can_vote();
            DuelView {
                content,
                embeds: vec![photo_embed(pair.left(), "Left"), photo_embed(pair.right(), "Right")],
                buttons: vec![
                    button(DuelAction::Left, "Left wins", ButtonStyle::Primary, locked),
                    button(DuelAction::Right, "Right wins", ButtonStyle::Primary, locked),
                    button(DuelAction::Done, "I'm done", ButtonStyle::Secondary, false),
                ],
            }
        }
        SessionState::Error { pair, votes_cast, error } => {
            content.push_str(&format!("⚠️ {}\n", error));
            content.push_str(&progress_line(*votes_cast, session.quota()));
            DuelView {
                content,
                embeds: vec![photo_embed(pair.left(), "Left"), photo_embed(pair.right(), "Right")],
                buttons: vec![
                    button(DuelAction::Retry, "Retry", ButtonStyle::Primary, false),
                    button(DuelAction::Done, "I'm done", ButtonStyle::Secondary, false),
                ],
            }
        }
        SessionState::Exhausted { votes_cast } => {
            let plural = if *votes_cast == 1 { "" } else { "s" };
            content.push_str(&format!("Thanks for voting! You cast {} vote{} this session.", votes_cast, plural));
            DuelView {
                content,
                embeds: Vec::new(),
                buttons: vec![button(DuelAction::More, "Vote more", ButtonStyle::Success, false)],
            }
        }
    }
}

fn progress_line(votes_cast: u32, quota: &VoteQuota) -> String {
    let mut line = format!("Votes this session: {}", votes_cast);
    if let (Some(total), Some(daily)) = (quota.total_votes_remaining, quota.daily_votes_remaining) {
        line.push_str(&format!(" | {} left today, {} left overall", daily, total));
    }
    line
}

fn photo_embed(photo: &Photo, side: &str) -> CreateEmbed {
    let mut embed = CreateEmbed::default();
    embed
        .title(side)
        .image(&photo.image_url)
        .author(|author| {
            author.name(&photo.photographer_name);
            if let Some(avatar) = &photo.photographer_avatar_url {
                author.icon_url(avatar);
            }
            author
        });
    if let Some(description) = &photo.description {
        embed.description(description);
    }
    embed
}

// One message per failure: errors the view already shows are not repeated as a notice.
fn notice_for(error: &VotingError, state: &SessionState) -> Option<String> {
    match (error, state) {
        (_, SessionState::Error { .. }) | (VotingError::PoolInsufficient, _) => None,
        _ => Some(error.to_string()),
    }
}

pub async fn handle_duel_action(
    sessions: &SessionStore,
    ctx: &Context,
    component: &MessageComponentInteraction,
    action: DuelAction,
    contest_id: &str,
    round: u64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let key = (component.user.id.to_string(), contest_id.to_string());

    let Some(session) = sessions.get(&key).await else {
        component.create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| {
                    message
                        .ephemeral(true)
                        .content("This voting session has expired. Use `/duel start` to begin again.")
                })
        }).await?;
        return Ok(());
    };

    let mut session = session.lock().await;

    // The pair behind this button has already been voted on or replaced
    if session.round() != round {
        info!("Ignoring stale {} click from {} on contest {}", action.as_str(), key.0, contest_id);
        component.create_interaction_response(&ctx.http, |response| {
            response.kind(InteractionResponseType::DeferredUpdateMessage)
        }).await?;
        return Ok(());
    }

    let outcome = match action {
        DuelAction::Left => session.vote(Side::Left).await.map(|_| ()),
        DuelAction::Right => session.vote(Side::Right).await.map(|_| ()),
        DuelAction::Done => session.finish().map(|_| ()),
        DuelAction::More => session.reset_session(),
        DuelAction::Retry => session.retry(),
    };

    let notice = outcome.err().and_then(|e| notice_for(&e, session.state()));
    let view = build_view(&session, notice.as_deref());

    component.create_interaction_response(&ctx.http, |response| {
        response
            .kind(InteractionResponseType::UpdateMessage)
            .interaction_response_data(|message| view.render(message))
    }).await?;

    Ok(())
}
