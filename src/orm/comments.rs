use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "comments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub post_id: i32,
    pub author_id: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        panic!("No RelationDef")
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::comment::Comment {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            post_id: m.post_id,
            author_id: m.author_id,
            content: m.content,
            image_url: m.image_url,
            created_at: m.created_at,
        }
    }
}
