//! Review reaction endpoints

use crate::middleware::ClientCtx;
use crate::rate_limit::check_reaction_rate_limit;
use crate::reactions::{ReactionCounts, ReactionKind, ReactionState};
use crate::web::error::ApiError;
use crate::wordpress::{Backend, CommentUpdate};
use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(toggle_reaction).service(get_reactions);
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleReactionRequest {
    #[serde(alias = "type", alias = "reaction")]
    reaction_type: Option<String>,
}

/// Response for a toggle or a read of a review's reactions
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReactionsResponse {
    success: bool,
    reactions: ReactionCounts,
    user_reaction: Option<ReactionKind>,
}

/// Toggle the caller's reaction on a review.
///
/// Picking the reaction already held removes it, picking another one
/// switches to it. All four lists are written back in one update.
#[post("/api/comments/{comment_id}/reactions")]
async fn toggle_reaction(
    client: ClientCtx,
    backend: web::Data<Backend>,
    path: web::Path<u64>,
    body: web::Json<ToggleReactionRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = client.require_login()?.id;
    let comment_id = path.into_inner();

    let kind: ReactionKind = body
        .reaction_type
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("Missing reactionType".to_owned()))?
        .parse()
        .map_err(|_| {
            ApiError::BadRequest(
                "reactionType must be one of useful, helpful, insightful, inappropriate"
                    .to_owned(),
            )
        })?;

    check_reaction_rate_limit(user_id)?;

    let comment = backend.get_comment(comment_id).await?;
    let mut state = ReactionState::from_fields(&comment.acf);
    let user_reaction = state.toggle(&user_id.to_string(), kind);

    backend
        .update_comment(comment_id, &CommentUpdate::acf(state.to_patch()))
        .await?;

    log::debug!(
        "User {} reaction on comment {} is now {:?}",
        user_id,
        comment_id,
        user_reaction
    );

    Ok(HttpResponse::Ok().json(ReactionsResponse {
        success: true,
        reactions: state.counts(),
        user_reaction,
    }))
}

/// Reaction counts for a review, plus the caller's own reaction if signed in
#[get("/api/comments/{comment_id}/reactions")]
async fn get_reactions(
    client: ClientCtx,
    backend: web::Data<Backend>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let comment = backend.get_comment(path.into_inner()).await?;
    let state = ReactionState::from_fields(&comment.acf);

    Ok(HttpResponse::Ok().json(ReactionsResponse {
        success: true,
        reactions: state.counts(),
        user_reaction: client
            .get_id()
            .and_then(|id| state.reaction_of(&id.to_string())),
    }))
}
