mod post;
mod rating;

pub use self::post::{Post, Posts};
pub use self::rating::Rating;

fn sanitize(s: impl AsRef<str>) -> String {
    s.as_ref().trim().to_lowercase().replace(['-', '_', ' '], "")
}
