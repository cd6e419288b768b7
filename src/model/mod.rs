mod ids;
mod post;
mod state;

pub use ids::{PostId, UserId};
pub use post::Post;
pub use state::{FollowState, LikeState};

pub(crate) use state::decrement;
