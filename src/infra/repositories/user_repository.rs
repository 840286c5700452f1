//! User repository - data access for user aggregates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend,
    EntityTrait, QueryFilter, QueryOrder, Set, Statement,
};
use uuid::Uuid;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

use super::entities::to_json;
use super::entities::user::{self, ActiveModel, Entity as UserEntity};
use crate::domain::{PortfolioItem, Skill, User};
use crate::errors::{AppError, AppResult};

/// Fields required to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

/// Partial profile update; absent fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub github_profile: Option<String>,
    pub linkedin_profile: Option<String>,
}

/// Filters for the people directory search
#[derive(Debug, Clone, Default)]
pub struct UserSearch {
    /// Free-text match on name and bio
    pub text: Option<String>,
    /// Any-of match on declared skill names
    pub skills: Vec<String>,
    pub min_rating: Option<f64>,
    /// Caller to exclude from results
    pub exclude: Option<Uuid>,
}

/// User repository trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Lookup by email, case-insensitive (emails are stored lowercased)
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Batch lookup used to resolve participant identities
    async fn find_many(&self, ids: Vec<Uuid>) -> AppResult<Vec<User>>;

    async fn create(&self, new_user: NewUser) -> AppResult<User>;

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> AppResult<User>;

    /// Replace the user's skill list
    async fn save_skills(&self, id: Uuid, skills: Vec<Skill>) -> AppResult<User>;

    /// Replace the user's portfolio list
    async fn save_portfolio(&self, id: Uuid, portfolio: Vec<PortfolioItem>) -> AppResult<User>;

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: String,
        expires: DateTime<Utc>,
    ) -> AppResult<()>;

    async fn find_by_reset_token(&self, token: &str) -> AppResult<Option<User>>;

    /// Store a new password hash and clear any reset token
    async fn update_password(&self, id: Uuid, password_hash: String) -> AppResult<()>;

    async fn search(&self, search: UserSearch) -> AppResult<Vec<User>>;

    /// Distinct skill names across all users (the global catalogue)
    async fn distinct_skill_names(&self) -> AppResult<Vec<String>>;

    /// All users declaring the named skill
    async fn find_by_skill(&self, name: &str) -> AppResult<Vec<User>>;
}

/// SeaORM-backed implementation of [`UserRepository`].
pub struct UserStore {
    db: DatabaseConnection,
}

impl UserStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// JSONB containment test for a skill name
fn skill_contains(name: &str) -> sea_orm::sea_query::SimpleExpr {
    Expr::cust_with_values(
        "skills @> ?::jsonb",
        [serde_json::json!([{ "name": name }]).to_string()],
    )
}

#[async_trait]
impl UserRepository for UserStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let result = UserEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let result = UserEntity::find()
            .filter(user::Column::Email.eq(email.to_lowercase()))
            .one(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.map(User::from))
    }

    async fn find_many(&self, ids: Vec<Uuid>) -> AppResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = UserEntity::find()
            .filter(user::Column::Id.is_in(ids))
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(models.into_iter().map(User::from).collect())
    }

    async fn create(&self, new_user: NewUser) -> AppResult<User> {
        let now = Utc::now();
        let active_model = ActiveModel {
            id: Set(Uuid::new_v4()),
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            email: Set(new_user.email.to_lowercase()),
            password_hash: Set(new_user.password_hash),
            bio: Set(None),
            avatar_url: Set(None),
            github_profile: Set(None),
            linkedin_profile: Set(None),
            skills: Set(serde_json::json!([])),
            portfolio: Set(serde_json::json!([])),
            credits: Set(0),
            rating: Set(0.0),
            reset_password_token: Set(None),
            reset_password_expires: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active_model.insert(&self.db).await.map_err(AppError::from)?;

        Ok(User::from(model))
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> AppResult<User> {
        let model = UserEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = model.into();

        if let Some(first_name) = changes.first_name {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = changes.last_name {
            active.last_name = Set(last_name);
        }
        if let Some(email) = changes.email {
            active.email = Set(email.to_lowercase());
        }
        if let Some(bio) = changes.bio {
            active.bio = Set(Some(bio));
        }
        if let Some(avatar_url) = changes.avatar_url {
            active.avatar_url = Set(Some(avatar_url));
        }
        if let Some(github_profile) = changes.github_profile {
            active.github_profile = Set(Some(github_profile));
        }
        if let Some(linkedin_profile) = changes.linkedin_profile {
            active.linkedin_profile = Set(Some(linkedin_profile));
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await.map_err(AppError::from)?;

        Ok(User::from(model))
    }

    async fn save_skills(&self, id: Uuid, skills: Vec<Skill>) -> AppResult<User> {
        let model = UserEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = model.into();
        active.skills = Set(to_json(&skills));
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await.map_err(AppError::from)?;
        Ok(User::from(model))
    }

    async fn save_portfolio(&self, id: Uuid, portfolio: Vec<PortfolioItem>) -> AppResult<User> {
        let model = UserEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = model.into();
        active.portfolio = Set(to_json(&portfolio));
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await.map_err(AppError::from)?;
        Ok(User::from(model))
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: String,
        expires: DateTime<Utc>,
    ) -> AppResult<()> {
        let model = UserEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = model.into();
        active.reset_password_token = Set(Some(token));
        active.reset_password_expires = Set(Some(expires));
        active.updated_at = Set(Utc::now());

        active.update(&self.db).await.map_err(AppError::from)?;
        Ok(())
    }

    async fn find_by_reset_token(&self, token: &str) -> AppResult<Option<User>> {
        let result = UserEntity::find()
            .filter(user::Column::ResetPasswordToken.eq(token))
            .one(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.map(User::from))
    }

    async fn update_password(&self, id: Uuid, password_hash: String) -> AppResult<()> {
        let model = UserEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = model.into();
        active.password_hash = Set(password_hash);
        active.reset_password_token = Set(None);
        active.reset_password_expires = Set(None);
        active.updated_at = Set(Utc::now());

        active.update(&self.db).await.map_err(AppError::from)?;
        Ok(())
    }

    async fn search(&self, search: UserSearch) -> AppResult<Vec<User>> {
        let mut query = UserEntity::find();

        if let Some(ref text) = search.text {
            let pattern = format!("%{}%", text.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(Expr::cust_with_values(
                        "LOWER(first_name) LIKE ?",
                        [pattern.clone()],
                    ))
                    .add(Expr::cust_with_values(
                        "LOWER(last_name) LIKE ?",
                        [pattern.clone()],
                    ))
                    .add(Expr::cust_with_values("LOWER(bio) LIKE ?", [pattern])),
            );
        }

        if !search.skills.is_empty() {
            let mut any_skill = Condition::any();
            for name in &search.skills {
                any_skill = any_skill.add(skill_contains(name));
            }
            query = query.filter(any_skill);
        }

        if let Some(min_rating) = search.min_rating {
            query = query.filter(user::Column::Rating.gte(min_rating));
        }

        if let Some(exclude) = search.exclude {
            query = query.filter(user::Column::Id.ne(exclude));
        }

        let models = query
            .order_by_desc(user::Column::Rating)
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(models.into_iter().map(User::from).collect())
    }

    async fn distinct_skill_names(&self) -> AppResult<Vec<String>> {
        let rows = self
            .db
            .query_all(Statement::from_string(
                DbBackend::Postgres,
                "SELECT DISTINCT jsonb_array_elements(skills) ->> 'name' AS name FROM users"
                    .to_string(),
            ))
            .await
            .map_err(AppError::from)?;

        let mut names: Vec<String> = rows
            .iter()
            .filter_map(|row| row.try_get::<Option<String>>("", "name").ok().flatten())
            .collect();
        names.sort();

        Ok(names)
    }

    async fn find_by_skill(&self, name: &str) -> AppResult<Vec<User>> {
        let models = UserEntity::find()
            .filter(skill_contains(name))
            .all(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(models.into_iter().map(User::from).collect())
    }
}
