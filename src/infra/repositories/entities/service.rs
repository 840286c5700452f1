//! `services` table entity.

use sea_orm::entity::prelude::*;

use crate::domain::ServiceStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "services")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub duration: String,
    pub credits: i64,
    pub requester_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub status: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub skills_required: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub skills_offered: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub milestones: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub agreement: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub feedback: Json,
    pub completed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::domain::Service {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            description: model.description,
            category: model.category,
            location: model.location,
            duration: model.duration,
            credits: model.credits,
            requester: model.requester_id,
            provider: model.provider_id,
            status: model
                .status
                .parse()
                .unwrap_or(ServiceStatus::Available),
            skills_required: serde_json::from_value(model.skills_required).unwrap_or_default(),
            skills_offered: serde_json::from_value(model.skills_offered).unwrap_or_default(),
            milestones: serde_json::from_value(model.milestones).unwrap_or_default(),
            agreement: serde_json::from_value(model.agreement).unwrap_or_default(),
            feedback: serde_json::from_value(model.feedback).unwrap_or_default(),
            completed_at: model.completed_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
