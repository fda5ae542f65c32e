use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{
        BlogPost, Comment, CommentRow, DashboardStats, HeroPost, HeroPostChanges, LikeState,
        LikeTarget, NewComment, NewHeroPost, NewPost, NewUser, PostChanges, PostListRow,
        PostQuery, Role, User, UserQuery, UserSummary,
    },
};

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers only see
/// this trait, so the Postgres implementation and the in-memory one used by
/// tests are interchangeable.
///
/// Methods are plain data access. Authorization, slug resolution and the
/// publish-once rule live in the handlers.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    // Conflict when the email is already registered.
    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn set_user_avatar(&self, id: Uuid, avatar: &str) -> Result<Option<User>>;
    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<Option<User>>;
    // Cascades posts, comments and likes.
    async fn delete_user(&self, id: Uuid) -> Result<bool>;
    async fn list_users(&self, query: UserQuery) -> Result<Vec<UserSummary>>;

    // --- Blog posts ---
    // Returns the total match count alongside the requested page.
    async fn list_posts(&self, query: PostQuery) -> Result<(i64, Vec<PostListRow>)>;
    async fn get_post(&self, id: Uuid) -> Result<Option<BlogPost>>;
    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<BlogPost>>;
    async fn create_post(&self, post: NewPost) -> Result<BlogPost>;
    async fn update_post(&self, id: Uuid, changes: PostChanges) -> Result<Option<BlogPost>>;
    // Cascades comments and likes.
    async fn delete_post(&self, id: Uuid) -> Result<bool>;

    // --- Comments ---
    // All comments of a post, oldest first, with author and like count.
    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentRow>>;
    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>>;
    async fn create_comment(&self, comment: NewComment) -> Result<CommentRow>;
    // Cascades replies and likes.
    async fn delete_comment(&self, id: Uuid) -> Result<bool>;

    // --- Likes ---
    // Delete-if-exists, insert-otherwise. Returns the new state and total.
    async fn toggle_like(&self, user_id: Uuid, target: LikeTarget) -> Result<LikeState>;
    async fn post_like_state(&self, post_id: Uuid, viewer: Option<Uuid>) -> Result<LikeState>;
    // Ids of the comments on `post_id` that `user_id` has liked.
    async fn liked_comment_ids(&self, user_id: Uuid, post_id: Uuid) -> Result<HashSet<Uuid>>;

    // --- Hero posts ---
    // Newest first.
    async fn list_hero_posts(&self, active_only: bool) -> Result<Vec<HeroPost>>;
    async fn get_hero_post(&self, id: Uuid) -> Result<Option<HeroPost>>;
    async fn create_hero_post(&self, post: NewHeroPost) -> Result<HeroPost>;
    async fn update_hero_post(&self, id: Uuid, changes: HeroPostChanges)
    -> Result<Option<HeroPost>>;
    async fn delete_hero_post(&self, id: Uuid) -> Result<bool>;

    // --- Dashboard ---
    async fn get_stats(&self) -> Result<DashboardStats>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
