//! User profile documents and the derived profile logic used by the
//! matching pipeline: completion percentage, completeness gating, and
//! category overlap.

use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

pub const USER_COLLECTION: &str = "users";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Creator,
    Contributor,
    Both,
}

impl UserType {
    /// Types a user of this type should be shown in discovery.
    pub fn complementary(self) -> &'static [UserType] {
        match self {
            UserType::Creator => &[UserType::Contributor, UserType::Both],
            UserType::Contributor => &[UserType::Creator, UserType::Both],
            UserType::Both => &[UserType::Creator, UserType::Contributor, UserType::Both],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserType::Creator => "creator",
            UserType::Contributor => "contributor",
            UserType::Both => "both",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Technology,
    Design,
    Content,
    Business,
    Events,
    Creative,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl SkillLevel {
    pub fn rank(self) -> u8 {
        match self {
            SkillLevel::Beginner => 1,
            SkillLevel::Intermediate => 2,
            SkillLevel::Advanced => 3,
            SkillLevel::Expert => 4,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    FullTime,
    PartTime,
    Freelance,
    Weekends,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WorkStyle {
    Remote,
    InPerson,
    Hybrid,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Skill {
    pub name: String,
    pub level: SkillLevel,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PortfolioItem {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default)]
pub struct Rating {
    pub average: f64,
    pub count: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub max_distance: u32,
    pub preferred_project_types: Vec<String>,
    pub work_style: WorkStyle,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            max_distance: 50,
            preferred_project_types: Vec::new(),
            work_style: WorkStyle::Hybrid,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default)]
pub struct VerificationStatus {
    pub email: bool,
    pub phone: bool,
    pub identity: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub user_type: UserType,
    pub categories: Vec<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<Availability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub avatar: String,
    pub skills: Vec<Skill>,
    pub portfolio: Vec<PortfolioItem>,
    pub rating: Rating,
    pub completed_projects: i64,
    pub preferences: Preferences,
    pub is_active: bool,
    pub last_active: DateTime,
    pub verification_status: VerificationStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl User {
    pub fn new(
        name: String,
        email: String,
        password_hash: String,
        user_type: UserType,
        now: DateTime,
    ) -> Self {
        Self {
            id: None,
            name,
            email: email.to_lowercase(),
            password_hash,
            user_type,
            categories: Vec::new(),
            bio: None,
            experience: None,
            availability: None,
            location: None,
            avatar: "👤".to_string(),
            skills: Vec::new(),
            portfolio: Vec::new(),
            rating: Rating::default(),
            completed_projects: 0,
            preferences: Preferences::default(),
            is_active: true,
            last_active: now,
            verification_status: VerificationStatus::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Percentage of the ten tracked profile fields a user has filled in.
    pub fn profile_completion(&self) -> u32 {
        let filled_text = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.trim().is_empty());

        let mut score = 3; // name, email, userType are required at registration
        if filled_text(&self.bio) {
            score += 1;
        }
        if filled_text(&self.experience) {
            score += 1;
        }
        if filled_text(&self.location) {
            score += 1;
        }
        if self.availability.is_some() {
            score += 1;
        }
        if !self.categories.is_empty() {
            score += 1;
        }
        if !self.skills.is_empty() {
            score += 1;
        }
        if !self.portfolio.is_empty() {
            score += 1;
        }

        score * 100 / 10
    }

    /// Gate for discovery and project features. The swipe deck is useless
    /// without the fields scoring reads.
    pub fn is_profile_complete(&self) -> bool {
        let filled = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.trim().is_empty());

        !self.name.trim().is_empty()
            && filled(&self.bio)
            && filled(&self.experience)
            && filled(&self.location)
            && !self.categories.is_empty()
    }

    pub fn common_categories(&self, other: &User) -> Vec<Category> {
        self.categories
            .iter()
            .filter(|c| other.categories.contains(c))
            .copied()
            .collect()
    }
}

/// Trimmed profile shown to other users and embedded in match/project
/// responses. Ids and dates are rendered as plain strings.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub user_type: UserType,
    pub categories: Vec<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub skills: Vec<Skill>,
    pub rating: Rating,
    pub completed_projects: i64,
    pub last_active: chrono::DateTime<chrono::Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: user.name.clone(),
            avatar: user.avatar.clone(),
            user_type: user.user_type,
            categories: user.categories.clone(),
            bio: user.bio.clone(),
            experience: user.experience.clone(),
            location: user.location.clone(),
            skills: user.skills.clone(),
            rating: user.rating,
            completed_projects: user.completed_projects,
            last_active: user.last_active.to_chrono(),
        }
    }
}

/// Full own-profile view. Never carries the password hash.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub user_type: UserType,
    pub categories: Vec<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<Availability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub avatar: String,
    pub skills: Vec<Skill>,
    pub portfolio: Vec<PortfolioItem>,
    pub rating: Rating,
    pub completed_projects: i64,
    pub preferences: Preferences,
    pub is_active: bool,
    pub last_active: chrono::DateTime<chrono::Utc>,
    pub verification_status: VerificationStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: user.name.clone(),
            email: user.email.clone(),
            user_type: user.user_type,
            categories: user.categories.clone(),
            bio: user.bio.clone(),
            experience: user.experience.clone(),
            availability: user.availability,
            location: user.location.clone(),
            avatar: user.avatar.clone(),
            skills: user.skills.clone(),
            portfolio: user.portfolio.clone(),
            rating: user.rating,
            completed_projects: user.completed_projects,
            preferences: user.preferences.clone(),
            is_active: user.is_active,
            last_active: user.last_active.to_chrono(),
            verification_status: user.verification_status,
            created_at: user.created_at.to_chrono(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_user() -> User {
        User::new(
            "Ada".to_string(),
            "ADA@example.com".to_string(),
            "hash".to_string(),
            UserType::Creator,
            DateTime::now(),
        )
    }

    #[test]
    fn test_email_lowercased() {
        assert_eq!(base_user().email, "ada@example.com");
    }

    #[test]
    fn test_profile_completion_fresh_account() {
        // name, email, userType only
        assert_eq!(base_user().profile_completion(), 30);
    }

    #[test]
    fn test_profile_completion_full() {
        let mut user = base_user();
        user.bio = Some("bio".into());
        user.experience = Some("5 years".into());
        user.location = Some("Berlin".into());
        user.availability = Some(Availability::Freelance);
        user.categories = vec![Category::Technology];
        user.skills = vec![Skill {
            name: "rust".into(),
            level: SkillLevel::Advanced,
        }];
        user.portfolio = vec![PortfolioItem {
            title: "t".into(),
            description: "d".into(),
            url: None,
            image: None,
        }];
        assert_eq!(user.profile_completion(), 100);
    }

    #[test]
    fn test_blank_fields_do_not_count() {
        let mut user = base_user();
        user.bio = Some("   ".into());
        assert_eq!(user.profile_completion(), 30);
        assert!(!user.is_profile_complete());
    }

    #[test]
    fn test_is_profile_complete() {
        let mut user = base_user();
        assert!(!user.is_profile_complete());

        user.bio = Some("bio".into());
        user.experience = Some("exp".into());
        user.location = Some("Oslo".into());
        assert!(!user.is_profile_complete());

        user.categories = vec![Category::Design];
        assert!(user.is_profile_complete());
    }

    #[test]
    fn test_common_categories() {
        let mut a = base_user();
        let mut b = base_user();
        a.categories = vec![Category::Technology, Category::Design];
        b.categories = vec![Category::Design, Category::Events];
        assert_eq!(a.common_categories(&b), vec![Category::Design]);
        assert!(a.common_categories(&base_user()).is_empty());
    }

    #[test]
    fn test_complementary_types() {
        assert!(
            UserType::Creator
                .complementary()
                .contains(&UserType::Contributor)
        );
        assert!(
            !UserType::Creator
                .complementary()
                .contains(&UserType::Creator)
        );
        assert_eq!(UserType::Both.complementary().len(), 3);
    }
}
