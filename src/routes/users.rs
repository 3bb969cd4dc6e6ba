use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use bson::{DateTime, Document, doc};
use futures::TryStreamExt;
use mongodb::options::ReturnDocument;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::{parse_id, user_id};
use crate::auth::{AuthUser, require_complete_profile, verify_token};
use crate::error::AppError;
use crate::state::AppState;
use crate::user::{
    Availability, Category, PortfolioItem, Preferences, Skill, SkillLevel, User, UserProfile,
    UserSummary, UserType, WorkStyle,
};
use crate::utils::Pagination;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/search", get(search_users))
        .route("/analytics", get(analytics))
        .route("/preferences", put(update_preferences))
        .route("/skills", post(add_skill))
        .route("/skills/{name}", delete(remove_skill))
        .route("/portfolio", post(add_portfolio))
        .route("/portfolio/{index}", delete(remove_portfolio))
        .route("/deactivate", post(deactivate))
        .route("/reactivate", post(reactivate))
        .route("/{id}", get(get_user))
}

async fn get_profile(AuthUser(user): AuthUser) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "user": UserProfile::from(&user),
        "profileCompletion": user.profile_completion(),
    }))
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2-100 characters"))]
    name: Option<String>,
    user_type: Option<UserType>,
    categories: Option<Vec<Category>>,
    #[validate(length(max = 500, message = "Bio cannot exceed 500 characters"))]
    bio: Option<String>,
    #[validate(length(max = 200, message = "Experience cannot exceed 200 characters"))]
    experience: Option<String>,
    availability: Option<Availability>,
    #[validate(length(max = 100, message = "Location cannot exceed 100 characters"))]
    location: Option<String>,
    avatar: Option<String>,
    skills: Option<Vec<Skill>>,
    portfolio: Option<Vec<PortfolioItem>>,
    preferences: Option<Preferences>,
}

/// Partial update over an allow-list; the payload struct itself is the
/// allow-list.
async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut updates = Document::new();
    if let Some(name) = payload.name {
        updates.insert("name", name);
    }
    if let Some(user_type) = payload.user_type {
        updates.insert("userType", bson::to_bson(&user_type)?);
    }
    if let Some(categories) = payload.categories {
        updates.insert("categories", bson::to_bson(&categories)?);
    }
    if let Some(bio) = payload.bio {
        updates.insert("bio", bio);
    }
    if let Some(experience) = payload.experience {
        updates.insert("experience", experience);
    }
    if let Some(availability) = payload.availability {
        updates.insert("availability", bson::to_bson(&availability)?);
    }
    if let Some(location) = payload.location {
        updates.insert("location", location);
    }
    if let Some(avatar) = payload.avatar {
        updates.insert("avatar", avatar);
    }
    if let Some(skills) = payload.skills {
        updates.insert("skills", bson::to_bson(&skills)?);
    }
    if let Some(portfolio) = payload.portfolio {
        updates.insert("portfolio", bson::to_bson(&portfolio)?);
    }
    if let Some(preferences) = payload.preferences {
        updates.insert("preferences", bson::to_bson(&preferences)?);
    }
    updates.insert("updatedAt", DateTime::now());

    let updated = state
        .users()
        .find_one_and_update(doc! { "_id": user_id(&user)? }, doc! { "$set": updates })
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Profile updated successfully",
        "user": UserProfile::from(&updated),
        "profileCompletion": updated.profile_completion(),
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchQuery {
    query: Option<String>,
    category: Option<Category>,
    user_type: Option<UserType>,
    location: Option<String>,
    min_rating: Option<f64>,
    page: Option<u64>,
    limit: Option<u64>,
}

async fn search_users(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(params): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    require_complete_profile(&user)?;

    let pagination = Pagination::from_parts(params.page, params.limit, 20);
    let mut filter = doc! {
        "_id": { "$ne": user_id(&user)? },
        "isActive": true,
    };

    if let Some(query) = &params.query {
        filter.insert(
            "$or",
            vec![
                doc! { "name": { "$regex": query, "$options": "i" } },
                doc! { "bio": { "$regex": query, "$options": "i" } },
                doc! { "skills.name": { "$regex": query, "$options": "i" } },
            ],
        );
    }
    if let Some(category) = &params.category {
        filter.insert("categories", bson::to_bson(category)?);
    }
    if let Some(user_type) = &params.user_type {
        filter.insert("userType", bson::to_bson(user_type)?);
    }
    if let Some(location) = &params.location {
        filter.insert("location", doc! { "$regex": location, "$options": "i" });
    }
    if let Some(min_rating) = params.min_rating {
        if min_rating > 0.0 {
            filter.insert("rating.average", doc! { "$gte": min_rating });
        }
    }

    let total = state.users().count_documents(filter.clone()).await?;
    let users: Vec<User> = state
        .users()
        .find(filter)
        .sort(doc! { "rating.average": -1, "lastActive": -1 })
        .skip(pagination.skip())
        .limit(pagination.limit as i64)
        .await?
        .try_collect()
        .await?;

    let summaries: Vec<UserSummary> = users.iter().map(Into::into).collect();

    Ok(Json(json!({
        "success": true,
        "users": summaries,
        "pagination": {
            "page": pagination.page,
            "limit": pagination.limit,
            "total": total,
            "pages": pagination.pages(total),
        },
    })))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "user")?;
    let user = state
        .users()
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "user": UserSummary::from(&user),
    })))
}

#[derive(Deserialize, Validate)]
struct SkillRequest {
    #[validate(length(min = 1, message = "Skill name is required"))]
    name: String,
    level: SkillLevel,
}

async fn add_skill(
    State(state): State<Arc<AppState>>,
    AuthUser(mut user): AuthUser,
    Json(payload): Json<SkillRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    match user
        .skills
        .iter_mut()
        .find(|s| s.name.eq_ignore_ascii_case(&payload.name))
    {
        Some(existing) => existing.level = payload.level,
        None => user.skills.push(Skill {
            name: payload.name,
            level: payload.level,
        }),
    }

    save_user(&state, &mut user).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Skill added successfully",
        "skills": user.skills,
    })))
}

async fn remove_skill(
    State(state): State<Arc<AppState>>,
    AuthUser(mut user): AuthUser,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    user.skills.retain(|s| !s.name.eq_ignore_ascii_case(&name));
    save_user(&state, &mut user).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Skill removed successfully",
        "skills": user.skills,
    })))
}

#[derive(Deserialize, Validate)]
struct PortfolioRequest {
    #[validate(length(min = 1, message = "Portfolio title is required"))]
    title: String,
    #[validate(length(min = 1, message = "Portfolio description is required"))]
    description: String,
    #[validate(url(message = "Invalid URL format"))]
    url: Option<String>,
    image: Option<String>,
}

async fn add_portfolio(
    State(state): State<Arc<AppState>>,
    AuthUser(mut user): AuthUser,
    Json(payload): Json<PortfolioRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    user.portfolio.push(PortfolioItem {
        title: payload.title,
        description: payload.description,
        url: payload.url,
        image: payload.image,
    });
    save_user(&state, &mut user).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Portfolio item added successfully",
        "portfolio": user.portfolio,
    })))
}

async fn remove_portfolio(
    State(state): State<Arc<AppState>>,
    AuthUser(mut user): AuthUser,
    Path(index): Path<usize>,
) -> Result<impl IntoResponse, AppError> {
    if index >= user.portfolio.len() {
        return Err(AppError::NotFound("Portfolio item not found".to_string()));
    }

    user.portfolio.remove(index);
    save_user(&state, &mut user).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Portfolio item removed successfully",
        "portfolio": user.portfolio,
    })))
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct PreferencesRequest {
    max_distance: Option<u32>,
    preferred_project_types: Option<Vec<String>>,
    work_style: Option<WorkStyle>,
}

async fn update_preferences(
    State(state): State<Arc<AppState>>,
    AuthUser(mut user): AuthUser,
    Json(payload): Json<PreferencesRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(max_distance) = payload.max_distance {
        user.preferences.max_distance = max_distance;
    }
    if let Some(types) = payload.preferred_project_types {
        user.preferences.preferred_project_types = types;
    }
    if let Some(work_style) = payload.work_style {
        user.preferences.work_style = work_style;
    }
    save_user(&state, &mut user).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Preferences updated successfully",
        "preferences": user.preferences,
    })))
}

async fn deactivate(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    state
        .users()
        .update_one(
            doc! { "_id": user_id(&user)? },
            doc! { "$set": { "isActive": false, "updatedAt": DateTime::now() } },
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Account deactivated successfully",
    })))
}

/// Counterpart of deactivate. The `AuthUser` extractor refuses inactive
/// accounts, so this handler verifies the token itself.
async fn reactivate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let missing = || AppError::Unauthorized("Access denied. No token provided.".to_string());
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or_else(missing)?;

    let claims = verify_token(token, &state.config.jwt_secret)?;
    let id = parse_id(&claims.sub, "user")?;

    let now = DateTime::now();
    let result = state
        .users()
        .update_one(
            doc! { "_id": id },
            doc! { "$set": { "isActive": true, "lastActive": now, "updatedAt": now } },
        )
        .await?;
    if result.matched_count == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Account reactivated successfully",
    })))
}

async fn analytics(AuthUser(user): AuthUser) -> Result<impl IntoResponse, AppError> {
    let now = chrono::Utc::now();
    let account_age_days = (now - user.created_at.to_chrono()).num_days().max(0);
    let last_active_hours = (now - user.last_active.to_chrono()).num_hours().max(0);

    Ok(Json(json!({
        "success": true,
        "analytics": {
            "profileCompletion": user.profile_completion(),
            "accountAge": account_age_days,
            "lastActiveAgo": last_active_hours,
            "totalSkills": user.skills.len(),
            "totalPortfolioItems": user.portfolio.len(),
            "currentRating": user.rating.average,
            "totalRatings": user.rating.count,
            "completedProjects": user.completed_projects,
        },
    })))
}

async fn save_user(state: &AppState, user: &mut User) -> Result<(), AppError> {
    user.updated_at = DateTime::now();
    state
        .users()
        .replace_one(doc! { "_id": user_id(user)? }, &*user)
        .await?;
    Ok(())
}
