use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "searches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub chat_id: String,
    pub text: String,
    pub label: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::ChatId",
        to = "super::users::Column::ChatId",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
    #[sea_orm(has_many = "super::search_filters::Entity")]
    SearchFilters,
    #[sea_orm(has_many = "super::seen_items::Entity")]
    SeenItems,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::search_filters::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SearchFilters.def()
    }
}

impl Related<super::seen_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SeenItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
