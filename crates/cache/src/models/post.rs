use crate::error::{Error, ErrorKind};
use booru_api::models::Post;
use exn::ResultExt;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: i64,
    pub(crate) md5: String,
    pub(crate) tags: String,
    pub(crate) misc: Vec<u8>,
}
impl TryFrom<&Post> for PostRow {
    type Error = Error;
    fn try_from(post: &Post) -> Result<Self, Self::Error> {
        Ok(Self {
            id: i64::try_from(post.id).or_raise(|| ErrorKind::InvalidData("post id"))?,
            md5: post.md5.clone(),
            tags: post.tags.clone(),
            misc: serde_json::to_vec(&post.extra).or_raise(|| ErrorKind::InvalidData("post attributes"))?,
        })
    }
}
