use std::sync::Arc;
use std::time::Duration;

use crate::application::comments::CommentService;
use crate::application::posts::PostService;
use crate::application::repos::StoreHealth;

#[derive(Clone)]
pub struct ApiState {
    pub comments: Arc<CommentService>,
    pub posts: Arc<PostService>,
    pub health: Arc<dyn StoreHealth>,
    pub request_timeout: Duration,
}
