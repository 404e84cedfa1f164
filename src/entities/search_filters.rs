use sea_orm::entity::prelude::*;

/// `kind` is one of `category`, `region`, `sector`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "search_filters")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub search_id: String,
    pub kind: String,
    pub value_id: String,
    pub value_name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::searches::Entity",
        from = "Column::SearchId",
        to = "super::searches::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Searches,
}

impl Related<super::searches::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Searches.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
