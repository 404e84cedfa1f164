use sea_orm::entity::prelude::*;

/// Per-search seen items. The composite primary key makes re-insertion of
/// an already-reported id a no-op at the SQL level.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "seen_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub search_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub item_id: String,
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
