mod post;

pub(crate) use self::post::PostRow;
