use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub chat_id: String,
    pub created_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::searches::Entity")]
    Searches,
    #[sea_orm(has_many = "super::legacy_seen::Entity")]
    LegacySeen,
}

impl Related<super::searches::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Searches.def()
    }
}

impl Related<super::legacy_seen::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LegacySeen.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
