use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub author_id: String,
    pub image_url: Option<String>,
    pub created_at: DateTime,
}

// Comments are not tied to posts by a foreign key; either may be deleted on its own.
#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        panic!("No RelationDef")
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::post::Post {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            content: m.content,
            author_id: m.author_id,
            image_url: m.image_url,
            created_at: m.created_at,
        }
    }
}
