use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use bson::{DateTime, doc, oid::ObjectId};
use chrono::Utc;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use validator::Validate;

use super::{parse_id, user_id};
use crate::auth::AuthUser;
use crate::database::is_duplicate_key;
use crate::error::AppError;
use crate::matching::{
    Action, Conversation, Match, MatchDetails, MatchStatus, canonical_pair,
};
use crate::project::Project;
use crate::scoring::{compatibility, confidence_level, match_reason};
use crate::state::AppState;
use crate::user::{User, UserSummary};
use crate::utils::Pagination;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/discover", get(discover))
        .route("/like", post(like))
        .route("/pass", post(pass))
        .route("/my-matches", get(my_matches))
        .route("/stats", get(stats))
        .route("/{id}/start-conversation", post(start_conversation))
        .route("/{id}/feedback", post(feedback))
}

#[derive(Deserialize)]
struct DiscoverQuery {
    page: Option<u64>,
    limit: Option<u64>,
    #[serde(rename = "type")]
    deck_type: Option<String>,
}

/// Ranks candidate users for the swipe deck: everyone not yet swiped on,
/// active within 30 days, of a complementary type, ordered by
/// compatibility.
async fn discover(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(params): Query<DiscoverQuery>,
) -> Result<impl IntoResponse, AppError> {
    let my_id = user_id(&user)?;
    let pagination = Pagination::from_parts(params.page, params.limit, 10);
    debug!(
        "Discovery for {} (deck type {:?})",
        my_id,
        params.deck_type.as_deref().unwrap_or("all")
    );

    // Every user sharing a match record with the requester is out,
    // whatever the status: liked, passed, and expired alike.
    let existing: Vec<Match> = state
        .matches()
        .find(doc! { "$or": [ { "user1": my_id }, { "user2": my_id } ] })
        .await?
        .try_collect()
        .await?;

    let mut exclude = vec![my_id];
    exclude.extend(existing.iter().map(|m| m.other_user(&my_id)));

    let now = Utc::now();
    let cutoff = DateTime::from_chrono(now - chrono::Duration::days(30));
    let wanted_types = bson::to_bson(user.user_type.complementary())?;

    let candidates: Vec<User> = state
        .users()
        .find(doc! {
            "_id": { "$nin": exclude },
            "isActive": true,
            "lastActive": { "$gte": cutoff },
            "userType": { "$in": wanted_types },
        })
        .sort(doc! { "rating.average": -1, "lastActive": -1 })
        .limit((pagination.skip() + pagination.limit) as i64)
        .await?
        .try_collect()
        .await?;

    let mut ranked: Vec<(User, f64)> = candidates
        .into_iter()
        .map(|candidate| {
            let score = compatibility(&user, &candidate, now);
            (candidate, score)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    #[cfg(feature = "verbose")]
    for (candidate, score) in &ranked {
        debug!("candidate {:?} scored {score}", candidate.id);
    }

    let page = pagination.window(ranked);
    let matches: Vec<serde_json::Value> = page
        .iter()
        .map(|(candidate, score)| {
            json!({
                "user": UserSummary::from(candidate),
                "compatibilityScore": score,
                "matchDetails": {
                    "commonCategories": user.common_categories(candidate),
                    "reasonForMatch": match_reason(&user, candidate, *score),
                    "confidenceLevel": confidence_level(*score),
                },
            })
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "matches": matches,
        "pagination": {
            "page": pagination.page,
            "limit": pagination.limit,
            "total": matches.len(),
        },
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LikeRequest {
    target_user_id: String,
    project_id: Option<String>,
    #[serde(rename = "type")]
    action: Option<Action>,
}

async fn like(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<LikeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let action = payload.action.unwrap_or(Action::Like);
    if !matches!(action, Action::Like | Action::SuperLike) {
        return Err(AppError::Validation(
            "Action must be like or super-like".to_string(),
        ));
    }

    let project_id = payload
        .project_id
        .as_deref()
        .map(|raw| parse_id(raw, "project"))
        .transpose()?;

    let match_record = swipe(&state, &user, &payload.target_user_id, project_id, action).await?;
    let is_mutual = match_record.status == MatchStatus::Mutual;

    Ok(Json(json!({
        "success": true,
        "message": if is_mutual { "It's a match!" } else { "Like sent successfully" },
        "match": match_view(&state, &user, &match_record).await?,
        "isMutual": is_mutual,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PassRequest {
    target_user_id: String,
}

async fn pass(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<PassRequest>,
) -> Result<impl IntoResponse, AppError> {
    swipe(&state, &user, &payload.target_user_id, None, Action::Pass).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Pass recorded successfully",
    })))
}

/// Applies one user's swipe on another, creating the pair's match record
/// on first contact. The unique index on the canonical pair settles the
/// simultaneous-swipe race: the losing insert re-fetches the winner's
/// document and applies its action as an update.
async fn swipe(
    state: &AppState,
    user: &User,
    raw_target_id: &str,
    project_id: Option<ObjectId>,
    action: Action,
) -> Result<Match, AppError> {
    let my_id = user_id(user)?;
    let target_id = parse_id(raw_target_id, "user")?;
    if target_id == my_id {
        return Err(AppError::Validation(
            "You cannot swipe on yourself".to_string(),
        ));
    }

    let target = state
        .users()
        .find_one(doc! { "_id": target_id })
        .await?
        .ok_or_else(|| AppError::NotFound("Target user not found".to_string()))?;

    let now = DateTime::now();
    let (user1, user2) = canonical_pair(my_id, target_id);
    let pair_filter = doc! { "user1": user1, "user2": user2 };

    if let Some(mut existing) = state.matches().find_one(pair_filter.clone()).await? {
        existing.record_action(&my_id, action, now)?;
        save_match(state, &existing).await?;
        return Ok(existing);
    }

    let score = compatibility(user, &target, now.to_chrono());
    let details = MatchDetails {
        common_categories: user.common_categories(&target),
        reason_for_match: match_reason(user, &target, score),
        confidence_level: confidence_level(score),
    };
    let mut fresh = Match::new(my_id, target_id, project_id, action, score, details, now);

    match state.matches().insert_one(&fresh).await {
        Ok(result) => {
            fresh.id = result.inserted_id.as_object_id();
            Ok(fresh)
        }
        Err(e) if is_duplicate_key(&e) => {
            // Lost the race against the other user's first swipe.
            let mut existing = state
                .matches()
                .find_one(pair_filter)
                .await?
                .ok_or_else(|| AppError::Internal("match vanished after duplicate key".into()))?;
            existing.record_action(&my_id, action, now)?;
            save_match(state, &existing).await?;
            Ok(existing)
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Deserialize)]
struct MyMatchesQuery {
    status: Option<MatchStatus>,
    page: Option<u64>,
    limit: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActionView {
    action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<chrono::DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversationView {
    started: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<chrono::DateTime<Utc>>,
    message_count: i64,
}

impl From<&Conversation> for ConversationView {
    fn from(c: &Conversation) -> Self {
        Self {
            started: c.started,
            started_at: c.started_at.map(|t| t.to_chrono()),
            message_count: c.message_count,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectBrief {
    id: String,
    title: String,
    category: crate::user::Category,
    status: crate::project::ProjectStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MatchSummary {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    other_user: Option<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<ProjectBrief>,
    status: MatchStatus,
    user_action: ActionView,
    other_user_action: ActionView,
    compatibility_score: f64,
    match_details: MatchDetails,
    conversation: ConversationView,
    created_at: chrono::DateTime<Utc>,
    age_in_hours: i64,
    hours_until_expiry: i64,
    is_live: bool,
}

async fn my_matches(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(params): Query<MyMatchesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let my_id = user_id(&user)?;
    let pagination = Pagination::from_parts(params.page, params.limit, 20);
    let status = params.status.unwrap_or(MatchStatus::Mutual);

    let matches: Vec<Match> = state
        .matches()
        .find(doc! {
            "$or": [ { "user1": my_id }, { "user2": my_id } ],
            "status": bson::to_bson(&status)?,
        })
        .sort(doc! { "createdAt": -1 })
        .skip(pagination.skip())
        .limit(pagination.limit as i64)
        .await?
        .try_collect()
        .await?;

    let other_users = load_users(
        &state,
        matches.iter().map(|m| m.other_user(&my_id)).collect(),
    )
    .await?;
    let projects = load_project_briefs(
        &state,
        matches.iter().filter_map(|m| m.project).collect(),
    )
    .await?;

    let now = Utc::now();
    let bson_now = DateTime::from_chrono(now);
    let shaped: Vec<MatchSummary> = matches
        .iter()
        .map(|m| {
            let other_id = m.other_user(&my_id);
            let own = m.action_of(&my_id);
            let theirs = m.action_of(&other_id);
            MatchSummary {
                id: m.id.map(|id| id.to_hex()).unwrap_or_default(),
                other_user: other_users.get(&other_id).map(UserSummary::from),
                project: m.project.and_then(|id| projects.get(&id).cloned().map(Into::into)),
                status: m.status,
                user_action: ActionView {
                    action: own.action,
                    timestamp: own.timestamp.map(|t| t.to_chrono()),
                },
                other_user_action: ActionView {
                    action: theirs.action,
                    timestamp: theirs.timestamp.map(|t| t.to_chrono()),
                },
                compatibility_score: m.compatibility_score,
                match_details: m.match_details.clone(),
                conversation: ConversationView::from(&m.conversation),
                created_at: m.created_at.to_chrono(),
                age_in_hours: m.age_in_hours(now),
                hours_until_expiry: m.hours_until_expiry(now),
                is_live: m.is_live(bson_now),
            }
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "matches": shaped,
        "pagination": {
            "page": pagination.page,
            "limit": pagination.limit,
            "total": shaped.len(),
        },
    })))
}

async fn start_conversation(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let my_id = user_id(&user)?;
    let mut match_record = load_match_for(&state, &id, &my_id).await?;

    match_record.start_conversation(DateTime::now())?;
    save_match(&state, &match_record).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Conversation started successfully",
        "match": match_view(&state, &user, &match_record).await?,
    })))
}

#[derive(Deserialize, Validate)]
struct FeedbackRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    rating: u8,
    comment: Option<String>,
}

async fn feedback(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<FeedbackRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let my_id = user_id(&user)?;
    let mut match_record = load_match_for(&state, &id, &my_id).await?;

    match_record.add_feedback(my_id, payload.rating, payload.comment, DateTime::now());
    save_match(&state, &match_record).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Feedback added successfully",
    })))
}

async fn stats(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let my_id = user_id(&user)?;

    let matches: Vec<Match> = state
        .matches()
        .find(doc! { "$or": [ { "user1": my_id }, { "user2": my_id } ] })
        .await?
        .try_collect()
        .await?;

    let total = matches.len();
    let mutual = matches
        .iter()
        .filter(|m| m.status == MatchStatus::Mutual)
        .count();
    let pending = matches
        .iter()
        .filter(|m| m.status == MatchStatus::Pending)
        .count();
    let passed = matches
        .iter()
        .filter(|m| m.action_of(&my_id).action == Action::Pass)
        .count();
    let conversations = matches.iter().filter(|m| m.conversation.started).count();
    let average_compatibility = if total == 0 {
        0.0
    } else {
        matches.iter().map(|m| m.compatibility_score).sum::<f64>() / total as f64
    };

    Ok(Json(json!({
        "success": true,
        "stats": {
            "totalMatches": total,
            "mutualMatches": mutual,
            "pendingMatches": pending,
            "passedMatches": passed,
            "averageCompatibility": average_compatibility,
            "conversationsStarted": conversations,
        },
    })))
}

async fn load_match_for(
    state: &AppState,
    raw_id: &str,
    requester: &ObjectId,
) -> Result<Match, AppError> {
    let id = parse_id(raw_id, "match")?;
    let match_record = state
        .matches()
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("Match not found".to_string()))?;

    if !match_record.involves(requester) {
        return Err(AppError::Forbidden(
            "Unauthorized access to match".to_string(),
        ));
    }
    Ok(match_record)
}

async fn save_match(state: &AppState, match_record: &Match) -> Result<(), AppError> {
    let id = match_record
        .id
        .ok_or_else(|| AppError::Internal("match document missing id".into()))?;
    state
        .matches()
        .replace_one(doc! { "_id": id }, match_record)
        .await?;
    Ok(())
}

/// Single-match response payload, shaped from the requester's side.
async fn match_view(
    state: &AppState,
    user: &User,
    match_record: &Match,
) -> Result<serde_json::Value, AppError> {
    let my_id = user_id(user)?;
    let other_id = match_record.other_user(&my_id);
    let other = state.users().find_one(doc! { "_id": other_id }).await?;

    Ok(json!({
        "id": match_record.id.map(|id| id.to_hex()),
        "otherUser": other.as_ref().map(UserSummary::from),
        "status": match_record.status,
        "compatibilityScore": match_record.compatibility_score,
        "matchDetails": match_record.match_details,
        "conversation": ConversationView::from(&match_record.conversation),
        "expiresAt": match_record.expires_at.to_chrono(),
    }))
}

async fn load_users(
    state: &AppState,
    ids: Vec<ObjectId>,
) -> Result<HashMap<ObjectId, User>, AppError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let users: Vec<User> = state
        .users()
        .find(doc! { "_id": { "$in": ids } })
        .await?
        .try_collect()
        .await?;
    Ok(users.into_iter().filter_map(|u| u.id.map(|id| (id, u))).collect())
}

#[derive(Clone)]
struct LoadedProject {
    id: ObjectId,
    title: String,
    category: crate::user::Category,
    status: crate::project::ProjectStatus,
}

impl From<LoadedProject> for ProjectBrief {
    fn from(p: LoadedProject) -> Self {
        Self {
            id: p.id.to_hex(),
            title: p.title,
            category: p.category,
            status: p.status,
        }
    }
}

async fn load_project_briefs(
    state: &AppState,
    ids: Vec<ObjectId>,
) -> Result<HashMap<ObjectId, LoadedProject>, AppError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let projects: Vec<Project> = state
        .projects()
        .find(doc! { "_id": { "$in": ids } })
        .await?
        .try_collect()
        .await?;
    Ok(projects
        .into_iter()
        .filter_map(|p| {
            p.id.map(|id| {
                (
                    id,
                    LoadedProject {
                        id,
                        title: p.title.clone(),
                        category: p.category,
                        status: p.status,
                    },
                )
            })
        })
        .collect())
}
