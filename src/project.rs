//! Project listings: team composition, applications, and the invariant
//! that `teamSize.current` always counts the creator plus every accepted
//! or active collaborator.

use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::user::{Category, Rating, SkillLevel, UserSummary, WorkStyle};

pub const PROJECT_COLLECTION: &str = "projects";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    Draft,
    Open,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CollaboratorStatus {
    Pending,
    Accepted,
    Active,
    Left,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RequiredSkill {
    pub skill: String,
    pub level: SkillLevel,
    pub required: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
pub struct TeamSize {
    pub current: u32,
    pub target: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub user: ObjectId,
    pub role: String,
    pub joined_at: DateTime,
    pub status: CollaboratorStatus,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user: ObjectId,
    pub message: String,
    pub applied_at: DateTime,
    pub status: ApplicationStatus,
}

impl Application {
    pub fn new(user: ObjectId, message: String, now: DateTime) -> Self {
        Self {
            id: ObjectId::new(),
            user,
            message,
            applied_at: now,
            status: ApplicationStatus::Pending,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime>,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub description: String,
    pub creator: ObjectId,
    pub category: Category,
    pub subcategory: String,
    pub status: ProjectStatus,
    pub required_skills: Vec<RequiredSkill>,
    pub team_size: TeamSize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub work_style: WorkStyle,
    pub tags: Vec<String>,
    pub collaborators: Vec<Collaborator>,
    pub applications: Vec<Application>,
    pub milestones: Vec<Milestone>,
    pub rating: Rating,
    pub views: i64,
    pub featured: bool,
    pub is_public: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Project {
    pub fn available_spots(&self) -> i64 {
        i64::from(self.team_size.target) - i64::from(self.team_size.current)
    }

    /// Re-establishes the team size invariant. Called at every write that
    /// touches the collaborator list.
    pub fn recount_team_size(&mut self) {
        let joined = self
            .collaborators
            .iter()
            .filter(|c| {
                matches!(
                    c.status,
                    CollaboratorStatus::Accepted | CollaboratorStatus::Active
                )
            })
            .count();
        self.team_size.current = 1 + joined as u32;
    }

    pub fn can_user_apply(&self, user_id: &ObjectId) -> bool {
        if self.creator == *user_id {
            return false;
        }
        if self.applications.iter().any(|a| a.user == *user_id) {
            return false;
        }
        if self.collaborators.iter().any(|c| c.user == *user_id) {
            return false;
        }
        self.status == ProjectStatus::Open && self.available_spots() > 0
    }

    pub fn completion_percentage(&self) -> u32 {
        if self.milestones.is_empty() {
            return 0;
        }
        let done = self.milestones.iter().filter(|m| m.completed).count();
        (done * 100 / self.milestones.len()) as u32
    }

}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    pub id: String,
    pub user: String,
    pub message: String,
    pub applied_at: chrono::DateTime<chrono::Utc>,
    pub status: ApplicationStatus,
}

impl From<&Application> for ApplicationView {
    fn from(app: &Application) -> Self {
        Self {
            id: app.id.to_hex(),
            user: app.user.to_hex(),
            message: app.message.clone(),
            applied_at: app.applied_at.to_chrono(),
            status: app.status,
        }
    }
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CollaboratorView {
    pub user: String,
    pub role: String,
    pub joined_at: chrono::DateTime<chrono::Utc>,
    pub status: CollaboratorStatus,
}

impl From<&Collaborator> for CollaboratorView {
    fn from(c: &Collaborator) -> Self {
        Self {
            user: c.user.to_hex(),
            role: c.role.clone(),
            joined_at: c.joined_at.to_chrono(),
            status: c.status,
        }
    }
}

/// Listing/detail payload. The creator summary is attached by the route
/// when it has the creator document at hand.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub creator_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<UserSummary>,
    pub category: Category,
    pub subcategory: String,
    pub status: ProjectStatus,
    pub required_skills: Vec<RequiredSkill>,
    pub team_size: TeamSize,
    pub available_spots: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub work_style: WorkStyle,
    pub tags: Vec<String>,
    pub collaborators: Vec<CollaboratorView>,
    pub applications: Vec<ApplicationView>,
    pub completion_percentage: u32,
    pub rating: Rating,
    pub views: i64,
    pub featured: bool,
    pub is_public: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ProjectView {
    pub fn new(project: &Project, creator: Option<UserSummary>) -> Self {
        Self {
            id: project.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: project.title.clone(),
            description: project.description.clone(),
            creator_id: project.creator.to_hex(),
            creator,
            category: project.category,
            subcategory: project.subcategory.clone(),
            status: project.status,
            required_skills: project.required_skills.clone(),
            team_size: project.team_size,
            available_spots: project.available_spots(),
            location: project.location.clone(),
            work_style: project.work_style,
            tags: project.tags.clone(),
            collaborators: project.collaborators.iter().map(Into::into).collect(),
            applications: project.applications.iter().map(Into::into).collect(),
            completion_percentage: project.completion_percentage(),
            rating: project.rating,
            views: project.views,
            featured: project.featured,
            is_public: project.is_public,
            created_at: project.created_at.to_chrono(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_project(creator: ObjectId) -> Project {
        let now = DateTime::now();
        Project {
            id: Some(ObjectId::new()),
            title: "Build a synth".into(),
            description: "A modular synth UI with a shared patch library".into(),
            creator,
            category: Category::Technology,
            subcategory: "Audio".into(),
            status: ProjectStatus::Open,
            required_skills: Vec::new(),
            team_size: TeamSize {
                current: 1,
                target: 3,
            },
            location: None,
            work_style: WorkStyle::Remote,
            tags: Vec::new(),
            collaborators: Vec::new(),
            applications: Vec::new(),
            milestones: Vec::new(),
            rating: Rating::default(),
            views: 0,
            featured: false,
            is_public: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn collaborator(status: CollaboratorStatus) -> Collaborator {
        Collaborator {
            user: ObjectId::new(),
            role: "Collaborator".into(),
            joined_at: DateTime::now(),
            status,
        }
    }

    #[test]
    fn test_recount_counts_accepted_and_active_only() {
        let mut project = base_project(ObjectId::new());
        project.collaborators = vec![
            collaborator(CollaboratorStatus::Accepted),
            collaborator(CollaboratorStatus::Active),
            collaborator(CollaboratorStatus::Pending),
            collaborator(CollaboratorStatus::Left),
        ];
        project.recount_team_size();
        assert_eq!(project.team_size.current, 3);
        assert_eq!(project.available_spots(), 0);
    }

    #[test]
    fn test_creator_cannot_apply() {
        let creator = ObjectId::new();
        let project = base_project(creator);
        assert!(!project.can_user_apply(&creator));
        assert!(project.can_user_apply(&ObjectId::new()));
    }

    #[test]
    fn test_cannot_apply_twice() {
        let mut project = base_project(ObjectId::new());
        let applicant = ObjectId::new();
        project
            .applications
            .push(Application::new(applicant, "let me in".into(), DateTime::now()));
        assert!(!project.can_user_apply(&applicant));
    }

    #[test]
    fn test_collaborator_cannot_apply() {
        let mut project = base_project(ObjectId::new());
        let member = ObjectId::new();
        project.collaborators.push(Collaborator {
            user: member,
            role: "Designer".into(),
            joined_at: DateTime::now(),
            status: CollaboratorStatus::Accepted,
        });
        assert!(!project.can_user_apply(&member));
    }

    #[test]
    fn test_cannot_apply_when_full_or_closed() {
        let mut project = base_project(ObjectId::new());
        project.team_size.current = project.team_size.target;
        assert!(!project.can_user_apply(&ObjectId::new()));

        let mut project = base_project(ObjectId::new());
        project.status = ProjectStatus::Completed;
        assert!(!project.can_user_apply(&ObjectId::new()));
    }

    #[test]
    fn test_completion_percentage() {
        let mut project = base_project(ObjectId::new());
        assert_eq!(project.completion_percentage(), 0);

        project.milestones = vec![
            Milestone {
                title: "mvp".into(),
                description: None,
                due_date: None,
                completed: true,
                completed_at: Some(DateTime::now()),
            },
            Milestone {
                title: "launch".into(),
                description: None,
                due_date: None,
                completed: false,
                completed_at: None,
            },
        ];
        assert_eq!(project.completion_percentage(), 50);
    }
}
