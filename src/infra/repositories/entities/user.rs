//! `users` table entity.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub github_profile: Option<String>,
    pub linkedin_profile: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub skills: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub portfolio: Json,
    pub credits: i64,
    pub rating: f64,
    pub reset_password_token: Option<String>,
    pub reset_password_expires: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::domain::User {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            password_hash: model.password_hash,
            bio: model.bio,
            avatar_url: model.avatar_url,
            github_profile: model.github_profile,
            linkedin_profile: model.linkedin_profile,
            skills: serde_json::from_value(model.skills).unwrap_or_default(),
            portfolio: serde_json::from_value(model.portfolio).unwrap_or_default(),
            credits: model.credits,
            rating: model.rating,
            reset_password_token: model.reset_password_token,
            reset_password_expires: model.reset_password_expires,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
