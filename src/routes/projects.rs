use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use validator::Validate;

use super::{parse_id, user_id};
use crate::auth::{AuthUser, require_complete_profile, require_user_type};
use crate::error::AppError;
use crate::project::{
    Application, ApplicationStatus, Collaborator, CollaboratorStatus, Milestone, Project,
    ProjectStatus, ProjectView, RequiredSkill, TeamSize,
};
use crate::scoring::project_match_score;
use crate::state::AppState;
use crate::user::{Category, User, UserSummary, UserType, WorkStyle};
use crate::utils::Pagination;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_project).get(list_projects))
        .route("/my-projects", get(my_projects))
        .route("/featured", get(featured_projects))
        .route("/categories/stats", get(category_stats))
        .route("/{id}", get(get_project).put(update_project).delete(delete_project))
        .route("/{id}/apply", post(apply))
        .route("/{id}/applications/{application_id}", put(decide_application))
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct TeamSizeRequest {
    #[validate(range(min = 1, max = 50, message = "Team size target must be between 1 and 50"))]
    target: u32,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateProjectRequest {
    #[validate(length(min = 5, max = 200, message = "Title must be between 5-200 characters"))]
    title: String,
    #[validate(length(
        min = 20,
        max = 2000,
        message = "Description must be between 20-2000 characters"
    ))]
    description: String,
    category: Category,
    subcategory: String,
    #[serde(default)]
    required_skills: Vec<RequiredSkill>,
    #[validate(nested)]
    team_size: TeamSizeRequest,
    location: Option<String>,
    work_style: Option<WorkStyle>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    milestones: Vec<Milestone>,
    is_public: Option<bool>,
}

async fn create_project(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_user_type(&user, &[UserType::Creator, UserType::Both])?;
    require_complete_profile(&user)?;
    payload.validate()?;

    let creator_id = user_id(&user)?;
    let now = DateTime::now();
    let mut project = Project {
        id: None,
        title: payload.title,
        description: payload.description,
        creator: creator_id,
        category: payload.category,
        subcategory: payload.subcategory,
        status: ProjectStatus::Open,
        required_skills: payload.required_skills,
        team_size: TeamSize {
            current: 1,
            target: payload.team_size.target,
        },
        location: payload.location,
        work_style: payload.work_style.unwrap_or(WorkStyle::Remote),
        tags: payload.tags,
        collaborators: Vec::new(),
        applications: Vec::new(),
        milestones: payload.milestones,
        rating: Default::default(),
        views: 0,
        featured: false,
        is_public: payload.is_public.unwrap_or(true),
        created_at: now,
        updated_at: now,
    };

    let result = state.projects().insert_one(&project).await?;
    project.id = result.inserted_id.as_object_id();
    info!("Project created by {creator_id}: {}", project.title);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Project created successfully",
            "project": ProjectView::new(&project, Some(UserSummary::from(&user))),
        })),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    page: Option<u64>,
    limit: Option<u64>,
    category: Option<Category>,
    subcategory: Option<String>,
    status: Option<ProjectStatus>,
    location: Option<String>,
    work_style: Option<WorkStyle>,
    featured: Option<bool>,
    search: Option<String>,
    sort_by: Option<String>,
    exclude_own: Option<bool>,
}

/// Listing payload: the full project view plus the requester's fit score.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoredProject {
    #[serde(flatten)]
    project: ProjectView,
    match_score: f64,
}

async fn list_projects(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(params): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    require_complete_profile(&user)?;

    let my_id = user_id(&user)?;
    let pagination = Pagination::from_parts(params.page, params.limit, 20);

    let mut filter = doc! { "isPublic": true };
    filter.insert(
        "status",
        bson::to_bson(&params.status.unwrap_or(ProjectStatus::Open))?,
    );
    if let Some(category) = params.category {
        filter.insert("category", bson::to_bson(&category)?);
    }
    if let Some(subcategory) = &params.subcategory {
        filter.insert("subcategory", subcategory);
    }
    if let Some(location) = &params.location {
        filter.insert("location", doc! { "$regex": location, "$options": "i" });
    }
    if let Some(work_style) = params.work_style {
        filter.insert("workStyle", bson::to_bson(&work_style)?);
    }
    if let Some(featured) = params.featured {
        filter.insert("featured", featured);
    }
    if let Some(search) = &params.search {
        filter.insert("$text", doc! { "$search": search });
    }
    if params.exclude_own.unwrap_or(true) {
        filter.insert("creator", doc! { "$ne": my_id });
    }

    let sort_by = params.sort_by.as_deref().unwrap_or("createdAt");
    let relevance_sort = sort_by == "relevance";
    let sort = match sort_by {
        "views" => doc! { "views": -1 },
        "rating" => doc! { "rating.average": -1 },
        "teamSize" => doc! { "teamSize.target": -1 },
        _ => doc! { "createdAt": -1 },
    };

    let collection = state.projects();
    let total = collection.count_documents(filter.clone()).await?;

    let mut find = collection.find(filter).sort(sort);
    if relevance_sort {
        // Relevance is scored against the requester's profile, so the
        // whole result set is ranked in memory before paging.
        find = find.limit((pagination.skip() + pagination.limit) as i64);
    } else {
        find = find.skip(pagination.skip()).limit(pagination.limit as i64);
    }
    let projects: Vec<Project> = find.await?.try_collect().await?;

    let creators = load_creators(&state, &projects).await?;
    let mut scored: Vec<ScoredProject> = projects
        .iter()
        .map(|p| ScoredProject {
            project: ProjectView::new(p, creators.get(&p.creator).map(UserSummary::from)),
            match_score: project_match_score(p, &user),
        })
        .collect();

    if relevance_sort {
        scored.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
        scored = pagination.window(scored);
    }

    Ok(Json(json!({
        "success": true,
        "projects": scored,
        "pagination": {
            "page": pagination.page,
            "limit": pagination.limit,
            "total": total,
            "pages": pagination.pages(total),
        },
    })))
}

#[derive(Deserialize)]
struct MyProjectsQuery {
    status: Option<ProjectStatus>,
}

async fn my_projects(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(params): Query<MyProjectsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let my_id = user_id(&user)?;

    let mut filter = doc! { "creator": my_id };
    if let Some(status) = params.status {
        filter.insert("status", bson::to_bson(&status)?);
    }

    let projects: Vec<Project> = state
        .projects()
        .find(filter)
        .sort(doc! { "createdAt": -1 })
        .await?
        .try_collect()
        .await?;

    let me = UserSummary::from(&user);
    let views: Vec<ProjectView> = projects
        .iter()
        .map(|p| ProjectView::new(p, Some(me.clone())))
        .collect();

    Ok(Json(json!({ "success": true, "projects": views })))
}

#[derive(Deserialize)]
struct FeaturedQuery {
    limit: Option<i64>,
}

async fn featured_projects(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FeaturedQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(10).clamp(1, 50);
    let projects: Vec<Project> = state
        .projects()
        .find(doc! { "featured": true, "status": "open", "isPublic": true })
        .sort(doc! { "rating.average": -1, "createdAt": -1 })
        .limit(limit)
        .await?
        .try_collect()
        .await?;

    let creators = load_creators(&state, &projects).await?;
    let views: Vec<ProjectView> = projects
        .iter()
        .map(|p| ProjectView::new(p, creators.get(&p.creator).map(UserSummary::from)))
        .collect();

    Ok(Json(json!({ "success": true, "projects": views })))
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct CategoryStats {
    category: Category,
    count: u64,
    avg_team_size: f64,
    avg_rating: f64,
}

async fn category_stats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let projects: Vec<Project> = state
        .projects()
        .find(doc! { "isPublic": true, "status": "open" })
        .await?
        .try_collect()
        .await?;

    Ok(Json(json!({
        "success": true,
        "stats": fold_category_stats(&projects),
    })))
}

/// Groups open projects per category with average team target and rating,
/// busiest category first.
fn fold_category_stats(projects: &[Project]) -> Vec<CategoryStats> {
    let mut grouped: HashMap<Category, (u64, u64, f64)> = HashMap::new();
    for project in projects {
        let (count, team_total, rating_total) = grouped.entry(project.category).or_default();
        *count += 1;
        *team_total += u64::from(project.team_size.target);
        *rating_total += project.rating.average;
    }

    let mut stats: Vec<CategoryStats> = grouped
        .into_iter()
        .map(|(category, (count, team_total, rating_total))| CategoryStats {
            category,
            count,
            avg_team_size: team_total as f64 / count as f64,
            avg_rating: rating_total / count as f64,
        })
        .collect();
    stats.sort_by(|a, b| b.count.cmp(&a.count));
    stats
}

async fn get_project(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let my_id = user_id(&user)?;
    let project_id = parse_id(&id, "project")?;

    let mut project = state
        .projects()
        .find_one(doc! { "_id": project_id })
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

    if !project.is_public && project.creator != my_id {
        return Err(AppError::NotFound("Project not found".to_string()));
    }

    // View counts only track visitors, not the owner refreshing the page.
    if project.creator != my_id {
        state
            .projects()
            .update_one(doc! { "_id": project_id }, doc! { "$inc": { "views": 1 } })
            .await?;
        project.views += 1;
    }

    let creator = state
        .users()
        .find_one(doc! { "_id": project.creator })
        .await?;

    Ok(Json(json!({
        "success": true,
        "project": ProjectView::new(&project, creator.as_ref().map(UserSummary::from)),
        "matchScore": project_match_score(&project, &user),
        "canApply": project.can_user_apply(&my_id),
    })))
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct UpdateProjectRequest {
    #[validate(length(min = 5, max = 200, message = "Title must be between 5-200 characters"))]
    title: Option<String>,
    #[validate(length(
        min = 20,
        max = 2000,
        message = "Description must be between 20-2000 characters"
    ))]
    description: Option<String>,
    category: Option<Category>,
    subcategory: Option<String>,
    status: Option<ProjectStatus>,
    required_skills: Option<Vec<RequiredSkill>>,
    #[validate(nested)]
    team_size: Option<TeamSizeRequest>,
    location: Option<String>,
    work_style: Option<WorkStyle>,
    tags: Option<Vec<String>>,
    milestones: Option<Vec<Milestone>>,
    is_public: Option<bool>,
}

async fn update_project(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateProjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let my_id = user_id(&user)?;
    let project_id = parse_id(&id, "project")?;

    let project = state
        .projects()
        .find_one(doc! { "_id": project_id })
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;
    if project.creator != my_id {
        return Err(AppError::Forbidden(
            "Only the project creator can update this project".to_string(),
        ));
    }

    let mut set = Document::new();
    if let Some(title) = payload.title {
        set.insert("title", title);
    }
    if let Some(description) = payload.description {
        set.insert("description", description);
    }
    if let Some(category) = payload.category {
        set.insert("category", bson::to_bson(&category)?);
    }
    if let Some(subcategory) = payload.subcategory {
        set.insert("subcategory", subcategory);
    }
    if let Some(status) = payload.status {
        set.insert("status", bson::to_bson(&status)?);
    }
    if let Some(skills) = payload.required_skills {
        set.insert("requiredSkills", bson::to_bson(&skills)?);
    }
    if let Some(team_size) = payload.team_size {
        set.insert("teamSize.target", team_size.target);
    }
    if let Some(location) = payload.location {
        set.insert("location", location);
    }
    if let Some(work_style) = payload.work_style {
        set.insert("workStyle", bson::to_bson(&work_style)?);
    }
    if let Some(tags) = payload.tags {
        set.insert("tags", tags);
    }
    if let Some(milestones) = payload.milestones {
        set.insert("milestones", bson::to_bson(&milestones)?);
    }
    if let Some(is_public) = payload.is_public {
        set.insert("isPublic", is_public);
    }
    if set.is_empty() {
        return Err(AppError::Validation("No fields to update".to_string()));
    }
    set.insert("updatedAt", Bson::DateTime(DateTime::now()));

    let updated = state
        .projects()
        .find_one_and_update(doc! { "_id": project_id }, doc! { "$set": set })
        .return_document(mongodb::options::ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Project updated successfully",
        "project": ProjectView::new(&updated, Some(UserSummary::from(&user))),
    })))
}

async fn delete_project(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let my_id = user_id(&user)?;
    let project_id = parse_id(&id, "project")?;

    let project = state
        .projects()
        .find_one(doc! { "_id": project_id })
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;
    if project.creator != my_id {
        return Err(AppError::Forbidden(
            "Only the project creator can delete this project".to_string(),
        ));
    }

    state
        .projects()
        .delete_one(doc! { "_id": project_id })
        .await?;
    info!("Project {project_id} deleted by {my_id}");

    Ok(Json(json!({
        "success": true,
        "message": "Project deleted successfully",
    })))
}

#[derive(Deserialize, Validate)]
struct ApplyRequest {
    #[validate(length(
        min = 10,
        max = 1000,
        message = "Application message must be between 10-1000 characters"
    ))]
    message: String,
}

async fn apply(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<ApplyRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_user_type(&user, &[UserType::Contributor, UserType::Both])?;
    require_complete_profile(&user)?;
    payload.validate()?;

    let my_id = user_id(&user)?;
    let project_id = parse_id(&id, "project")?;

    let mut project = state
        .projects()
        .find_one(doc! { "_id": project_id })
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

    if !project.can_user_apply(&my_id) {
        return Err(AppError::Validation(
            "You cannot apply to this project".to_string(),
        ));
    }

    project
        .applications
        .push(Application::new(my_id, payload.message, DateTime::now()));
    save_project(&state, &mut project).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Application submitted successfully",
    })))
}

#[derive(Deserialize)]
struct DecisionRequest {
    status: ApplicationStatus,
    role: Option<String>,
}

/// Accepts or rejects an application. Acceptance also seats the applicant
/// as a collaborator and recounts the team.
async fn decide_application(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((id, application_id)): Path<(String, String)>,
    Json(payload): Json<DecisionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.status == ApplicationStatus::Pending {
        return Err(AppError::Validation(
            "Status must be accepted or rejected".to_string(),
        ));
    }

    let my_id = user_id(&user)?;
    let project_id = parse_id(&id, "project")?;
    let application_id = parse_id(&application_id, "application")?;

    let mut project = state
        .projects()
        .find_one(doc! { "_id": project_id })
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;
    if project.creator != my_id {
        return Err(AppError::Forbidden(
            "Only the project creator can review applications".to_string(),
        ));
    }

    let now = DateTime::now();
    let application = project
        .applications
        .iter_mut()
        .find(|a| a.id == application_id)
        .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;
    if application.status != ApplicationStatus::Pending {
        return Err(AppError::Validation(
            "Application has already been reviewed".to_string(),
        ));
    }

    application.status = payload.status;
    let applicant = application.user;

    if payload.status == ApplicationStatus::Accepted {
        project.collaborators.push(Collaborator {
            user: applicant,
            role: payload.role.unwrap_or_else(|| "Collaborator".to_string()),
            joined_at: now,
            status: CollaboratorStatus::Accepted,
        });
        project.recount_team_size();
    }
    save_project(&state, &mut project).await?;

    let message = match payload.status {
        ApplicationStatus::Accepted => "Application accepted",
        _ => "Application rejected",
    };
    Ok(Json(json!({
        "success": true,
        "message": message,
        "project": ProjectView::new(&project, Some(UserSummary::from(&user))),
    })))
}

async fn save_project(state: &AppState, project: &mut Project) -> Result<(), AppError> {
    let id = project
        .id
        .ok_or_else(|| AppError::Internal("project document missing id".into()))?;
    project.updated_at = DateTime::now();
    state
        .projects()
        .replace_one(doc! { "_id": id }, &*project)
        .await?;
    Ok(())
}

async fn load_creators(
    state: &AppState,
    projects: &[Project],
) -> Result<HashMap<ObjectId, User>, AppError> {
    let ids: Vec<ObjectId> = projects.iter().map(|p| p.creator).collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let users: Vec<User> = state
        .users()
        .find(doc! { "_id": { "$in": ids } })
        .await?
        .try_collect()
        .await?;
    Ok(users
        .into_iter()
        .filter_map(|u| u.id.map(|id| (id, u)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::Rating;

    fn project(category: Category, target: u32, rating: f64) -> Project {
        let now = DateTime::now();
        Project {
            id: Some(ObjectId::new()),
            title: "p".into(),
            description: "d".into(),
            creator: ObjectId::new(),
            category,
            subcategory: "sub".into(),
            status: ProjectStatus::Open,
            required_skills: Vec::new(),
            team_size: TeamSize { current: 1, target },
            location: None,
            work_style: WorkStyle::Remote,
            tags: Vec::new(),
            collaborators: Vec::new(),
            applications: Vec::new(),
            milestones: Vec::new(),
            rating: Rating {
                average: rating,
                count: 1,
            },
            views: 0,
            featured: false,
            is_public: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_category_stats_counts_and_averages() {
        let projects = vec![
            project(Category::Technology, 3, 4.0),
            project(Category::Technology, 5, 2.0),
            project(Category::Design, 2, 5.0),
        ];

        let stats = fold_category_stats(&projects);
        assert_eq!(stats.len(), 2);

        // Busiest category first.
        assert_eq!(stats[0].category, Category::Technology);
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats[0].avg_team_size, 4.0);
        assert_eq!(stats[0].avg_rating, 3.0);

        assert_eq!(stats[1].category, Category::Design);
        assert_eq!(stats[1].count, 1);
        assert_eq!(stats[1].avg_team_size, 2.0);
        assert_eq!(stats[1].avg_rating, 5.0);
    }

    #[test]
    fn test_category_stats_empty() {
        assert!(fold_category_stats(&[]).is_empty());
    }
}
