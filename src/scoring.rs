//! Compatibility heuristics.
//!
//! Two independent weighted sums, both clamped to [0, 100]:
//! user-to-user compatibility (30 categories + 25 type + 20 experience +
//! 15 rating + 10 recency) and project-to-user fit (40 category + 30
//! skills + 20 type + 10 rating). Every component is deterministic, so
//! discovery ordering is stable for a given pair of profiles.

use chrono::{DateTime, Utc};

use crate::matching::ConfidenceLevel;
use crate::project::Project;
use crate::user::{User, UserType};

/// Weighted affinity between two profiles, in [0, 100].
pub fn compatibility(user: &User, other: &User, now: DateTime<Utc>) -> f64 {
    let score = category_score(user, other)
        + type_score(user.user_type, other.user_type)
        + experience_score(user, other)
        + rating_score(other)
        + activity_score(other, now);

    score.clamp(0.0, 100.0)
}

/// Category overlap fraction, weight 30.
pub fn category_score(user: &User, other: &User) -> f64 {
    let denominator = user.categories.len().max(other.categories.len());
    if denominator == 0 {
        return 0.0;
    }

    let overlap = user
        .categories
        .iter()
        .filter(|c| other.categories.contains(c))
        .count();

    overlap as f64 / denominator as f64 * 30.0
}

/// Full weight (25) when either side plays both roles or the pair is
/// creator/contributor complementary; zero otherwise.
pub fn type_score(a: UserType, b: UserType) -> f64 {
    let complementary = a == UserType::Both
        || b == UserType::Both
        || (a == UserType::Creator && b == UserType::Contributor)
        || (a == UserType::Contributor && b == UserType::Creator);

    if complementary { 25.0 } else { 0.0 }
}

/// Skill-level proximity, weight 20. The closer the two mean skill levels
/// (beginner=1 .. expert=4), the higher the term. Zero when either side
/// has no skills to compare.
pub fn experience_score(user: &User, other: &User) -> f64 {
    let mean_level = |u: &User| {
        if u.skills.is_empty() {
            None
        } else {
            let total: u32 = u.skills.iter().map(|s| u32::from(s.level.rank())).sum();
            Some(total as f64 / u.skills.len() as f64)
        }
    };

    match (mean_level(user), mean_level(other)) {
        (Some(a), Some(b)) => 20.0 * (1.0 - (a - b).abs() / 3.0),
        _ => 0.0,
    }
}

/// The other user's rating scaled into weight 15.
pub fn rating_score(other: &User) -> f64 {
    other.rating.average / 5.0 * 15.0
}

/// One point per day of recency, capped at 10.
pub fn activity_score(other: &User, now: DateTime<Utc>) -> f64 {
    let days_since_active = (now - other.last_active.to_chrono()).num_days().max(0);
    (10 - days_since_active).max(0) as f64
}

/// Project-to-user fit, in [0, 100].
pub fn project_match_score(project: &Project, user: &User) -> f64 {
    let mut score = 0.0;

    if user.categories.contains(&project.category) {
        score += 40.0;
    }

    score += skill_overlap_score(project, user);

    if matches!(user.user_type, UserType::Contributor | UserType::Both) {
        score += 20.0;
    }

    score += user.rating.average / 5.0 * 10.0;

    score.clamp(0.0, 100.0)
}

/// Fraction of required skills the user covers, weight 30. Names match
/// case-insensitively when either contains the other.
fn skill_overlap_score(project: &Project, user: &User) -> f64 {
    if project.required_skills.is_empty() {
        return 0.0;
    }

    let user_skills: Vec<String> = user.skills.iter().map(|s| s.name.to_lowercase()).collect();
    let covered = project
        .required_skills
        .iter()
        .map(|s| s.skill.to_lowercase())
        .filter(|required| {
            user_skills
                .iter()
                .any(|have| have.contains(required.as_str()) || required.contains(have.as_str()))
        })
        .count();

    covered as f64 / project.required_skills.len() as f64 * 30.0
}

pub fn confidence_level(score: f64) -> ConfidenceLevel {
    if score >= 70.0 {
        ConfidenceLevel::High
    } else if score >= 40.0 {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

/// Human-readable explanation shown on a discovery card.
pub fn match_reason(user: &User, other: &User, score: f64) -> String {
    let common: Vec<String> = user
        .common_categories(other)
        .iter()
        .map(|c| format!("{c:?}"))
        .collect();
    let common = common.join(", ");

    if score >= 80.0 {
        format!("Excellent match! You both work in {common} and have complementary skills.")
    } else if score >= 60.0 {
        format!("Great potential! You share interests in {common}.")
    } else if score >= 40.0 {
        "Interesting match with some overlapping areas.".to_string()
    } else {
        "Different backgrounds might bring fresh perspectives.".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{ProjectStatus, RequiredSkill, TeamSize};
    use crate::user::{Category, Rating, Skill, SkillLevel, WorkStyle};
    use bson::oid::ObjectId;

    fn user(user_type: UserType, categories: Vec<Category>) -> User {
        User::new(
            "test".to_string(),
            "test@example.com".to_string(),
            "hash".to_string(),
            user_type,
            bson::DateTime::now(),
        )
        .with_categories(categories)
    }

    trait WithCategories {
        fn with_categories(self, categories: Vec<Category>) -> Self;
    }

    impl WithCategories for User {
        fn with_categories(mut self, categories: Vec<Category>) -> Self {
            self.categories = categories;
            self
        }
    }

    fn project(category: Category, skills: &[&str]) -> Project {
        let now = bson::DateTime::now();
        Project {
            id: Some(ObjectId::new()),
            title: "p".into(),
            description: "d".into(),
            creator: ObjectId::new(),
            category,
            subcategory: "sub".into(),
            status: ProjectStatus::Open,
            required_skills: skills
                .iter()
                .map(|s| RequiredSkill {
                    skill: (*s).to_string(),
                    level: SkillLevel::Intermediate,
                    required: true,
                })
                .collect(),
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

    #[test]
    fn test_creator_contributor_baseline() {
        // A (Technology+Design, creator) x B (Technology, contributor):
        // overlap 1/2 * 30 = 15, type 25, baseline 40.
        let a = user(
            UserType::Creator,
            vec![Category::Technology, Category::Design],
        );
        let b = user(UserType::Contributor, vec![Category::Technology]);

        assert_eq!(category_score(&a, &b), 15.0);
        assert_eq!(type_score(a.user_type, b.user_type), 25.0);
        assert_eq!(experience_score(&a, &b), 0.0);
        assert_eq!(rating_score(&b), 0.0);

        // B is active right now, so the recency term is maxed.
        let total = compatibility(&a, &b, Utc::now());
        assert_eq!(total, 50.0);
    }

    #[test]
    fn test_score_bounds() {
        let mut a = user(
            UserType::Both,
            vec![
                Category::Technology,
                Category::Design,
                Category::Content,
                Category::Business,
                Category::Events,
                Category::Creative,
            ],
        );
        let mut b = a.clone();
        a.skills = vec![Skill {
            name: "rust".into(),
            level: SkillLevel::Expert,
        }];
        b.skills = a.skills.clone();
        b.rating = Rating {
            average: 5.0,
            count: 10,
        };

        let score = compatibility(&a, &b, Utc::now());
        assert!((0.0..=100.0).contains(&score));
        // 30 + 25 + 20 + 15 + 10, exactly at the ceiling
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_empty_categories_score_zero_overlap() {
        let a = user(UserType::Creator, vec![]);
        let b = user(UserType::Contributor, vec![Category::Design]);
        assert_eq!(category_score(&a, &b), 0.0);
    }

    #[test]
    fn test_type_score_matrix() {
        assert_eq!(type_score(UserType::Creator, UserType::Contributor), 25.0);
        assert_eq!(type_score(UserType::Contributor, UserType::Creator), 25.0);
        assert_eq!(type_score(UserType::Both, UserType::Creator), 25.0);
        assert_eq!(type_score(UserType::Creator, UserType::Both), 25.0);
        assert_eq!(type_score(UserType::Creator, UserType::Creator), 0.0);
        assert_eq!(
            type_score(UserType::Contributor, UserType::Contributor),
            0.0
        );
    }

    #[test]
    fn test_experience_score_proximity() {
        let mut a = user(UserType::Creator, vec![]);
        let mut b = user(UserType::Contributor, vec![]);

        a.skills = vec![Skill {
            name: "rust".into(),
            level: SkillLevel::Expert,
        }];
        b.skills = vec![Skill {
            name: "figma".into(),
            level: SkillLevel::Expert,
        }];
        assert_eq!(experience_score(&a, &b), 20.0);

        b.skills = vec![Skill {
            name: "figma".into(),
            level: SkillLevel::Beginner,
        }];
        // Maximal distance (4 vs 1) collapses the term to zero.
        assert!(experience_score(&a, &b).abs() < 1e-9);
    }

    #[test]
    fn test_activity_score_decay() {
        let mut b = user(UserType::Contributor, vec![]);
        let now = Utc::now();

        b.last_active = bson::DateTime::from_chrono(now - chrono::Duration::days(3));
        assert_eq!(activity_score(&b, now), 7.0);

        b.last_active = bson::DateTime::from_chrono(now - chrono::Duration::days(30));
        assert_eq!(activity_score(&b, now), 0.0);
    }

    #[test]
    fn test_project_match_score() {
        let mut contributor = user(UserType::Contributor, vec![Category::Technology]);
        contributor.skills = vec![
            Skill {
                name: "Rust".into(),
                level: SkillLevel::Advanced,
            },
            Skill {
                name: "PostgreSQL".into(),
                level: SkillLevel::Intermediate,
            },
        ];

        let p = project(Category::Technology, &["rust", "react"]);

        // 40 category + 15 skills (1 of 2) + 20 type + 0 rating
        assert_eq!(project_match_score(&p, &contributor), 75.0);
    }

    #[test]
    fn test_project_match_substring_skill_matching() {
        let mut contributor = user(UserType::Both, vec![]);
        contributor.skills = vec![Skill {
            name: "node.js backend".into(),
            level: SkillLevel::Advanced,
        }];

        let p = project(Category::Design, &["node.js"]);

        // 0 category + 30 skills + 20 type
        assert_eq!(project_match_score(&p, &contributor), 50.0);
    }

    #[test]
    fn test_project_match_creator_gets_no_type_points() {
        let creator = user(UserType::Creator, vec![Category::Design]);
        let p = project(Category::Design, &[]);
        assert_eq!(project_match_score(&p, &creator), 40.0);
    }

    #[test]
    fn test_confidence_tiers() {
        assert_eq!(confidence_level(85.0), ConfidenceLevel::High);
        assert_eq!(confidence_level(70.0), ConfidenceLevel::High);
        assert_eq!(confidence_level(55.0), ConfidenceLevel::Medium);
        assert_eq!(confidence_level(40.0), ConfidenceLevel::Medium);
        assert_eq!(confidence_level(39.9), ConfidenceLevel::Low);
    }

    #[test]
    fn test_match_reason_tiers() {
        let a = user(
            UserType::Creator,
            vec![Category::Technology, Category::Design],
        );
        let b = user(UserType::Contributor, vec![Category::Technology]);

        assert!(match_reason(&a, &b, 85.0).contains("Excellent match"));
        assert!(match_reason(&a, &b, 65.0).contains("Technology"));
        assert!(match_reason(&a, &b, 45.0).contains("overlapping"));
        assert!(match_reason(&a, &b, 10.0).contains("fresh perspectives"));
    }
}
