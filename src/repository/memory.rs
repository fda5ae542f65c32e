use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Repository;
use crate::{
    error::{AppError, Result},
    models::{
        BlogPost, Comment, CommentRow, DashboardStats, HeroPost, HeroPostChanges, LikeState,
        LikeTarget, NewComment, NewHeroPost, NewPost, NewUser, PostChanges, PostListRow,
        PostQuery, PostStatus, Role, User, UserQuery, UserSummary,
    },
};

#[derive(Debug, Clone)]
struct Like {
    user_id: Uuid,
    target: LikeTarget,
}

#[derive(Default)]
struct Store {
    users: Vec<User>,
    // `author_name` is filled in from `users` on every read.
    posts: Vec<BlogPost>,
    comments: Vec<Comment>,
    likes: Vec<Like>,
    hero_posts: Vec<HeroPost>,
    last_tick: Option<DateTime<Utc>>,
}

impl Store {
    /// Strictly increasing timestamps so ordering never depends on clock ties.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_tick {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_tick = Some(next);
        next
    }

    fn author_name(&self, id: Uuid) -> String {
        self.users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.full_name.clone())
            .unwrap_or_default()
    }

    fn hydrate(&self, post: &BlogPost) -> BlogPost {
        BlogPost {
            author_name: self.author_name(post.author_id),
            ..post.clone()
        }
    }

    fn count_likes(&self, target: LikeTarget) -> i64 {
        self.likes.iter().filter(|l| l.target == target).count() as i64
    }

    fn comment_row(&self, comment: &Comment) -> CommentRow {
        let author = self.users.iter().find(|u| u.id == comment.author_id);
        CommentRow {
            id: comment.id,
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            author_id: comment.author_id,
            author_name: author.map(|u| u.full_name.clone()).unwrap_or_default(),
            author_avatar: author.and_then(|u| u.avatar.clone()),
            content: comment.content.clone(),
            created_at: comment.created_at,
            likes_count: self.count_likes(LikeTarget::Comment(comment.id)),
        }
    }

    fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> bool {
        self.posts
            .iter()
            .any(|p| p.slug == slug && Some(p.id) != except)
    }

    fn remove_comments(&mut self, ids: &HashSet<Uuid>) {
        // Replies of removed comments go too.
        let mut doomed = ids.clone();
        for c in &self.comments {
            if c.parent_id.is_some_and(|parent| ids.contains(&parent)) {
                doomed.insert(c.id);
            }
        }
        self.comments.retain(|c| !doomed.contains(&c.id));
        self.likes.retain(|l| match l.target {
            LikeTarget::Comment(id) => !doomed.contains(&id),
            LikeTarget::Post(_) => true,
        });
    }

    fn remove_posts(&mut self, ids: &HashSet<Uuid>) {
        self.posts.retain(|p| !ids.contains(&p.id));
        let comment_ids: HashSet<Uuid> = self
            .comments
            .iter()
            .filter(|c| ids.contains(&c.post_id))
            .map(|c| c.id)
            .collect();
        self.remove_comments(&comment_ids);
        self.likes.retain(|l| match l.target {
            LikeTarget::Post(id) => !ids.contains(&id),
            LikeTarget::Comment(_) => true,
        });
    }

    fn post_matches(&self, post: &BlogPost, query: &PostQuery) -> bool {
        if query.status.is_some_and(|status| post.status != status) {
            return false;
        }
        if query
            .category
            .as_ref()
            .is_some_and(|category| &post.category != category)
        {
            return false;
        }
        match &query.search {
            None => true,
            Some(search) => {
                let needle = search.to_lowercase();
                let contains = |s: &str| s.to_lowercase().contains(&needle);
                contains(&post.title)
                    || contains(&post.content)
                    || post.excerpt.as_deref().is_some_and(contains)
                    || contains(&post.category)
            }
        }
    }
}

/// MemoryRepository
///
/// In-process implementation of `Repository` with the same observable
/// behavior as the Postgres one: unique emails and slugs, cascading deletes,
/// identical ordering. Backs the handler and router tests.
#[derive(Default)]
pub struct MemoryRepository {
    store: RwLock<Store>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    // --- USERS ---

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut store = self.store.write().await;
        if store.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let now = store.tick();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            full_name: user.full_name,
            password_hash: user.password_hash,
            role: user.role,
            avatar: user.avatar,
            created_at: now,
            updated_at: now,
        };
        store.users.push(created.clone());
        Ok(created)
    }

    async fn set_user_avatar(&self, id: Uuid, avatar: &str) -> Result<Option<User>> {
        let mut store = self.store.write().await;
        let now = store.tick();
        Ok(store.users.iter_mut().find(|u| u.id == id).map(|user| {
            user.avatar = Some(avatar.to_string());
            user.updated_at = now;
            user.clone()
        }))
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<Option<User>> {
        let mut store = self.store.write().await;
        let now = store.tick();
        Ok(store.users.iter_mut().find(|u| u.id == id).map(|user| {
            user.role = role;
            user.updated_at = now;
            user.clone()
        }))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let mut store = self.store.write().await;
        let before = store.users.len();
        store.users.retain(|u| u.id != id);
        if store.users.len() == before {
            return Ok(false);
        }

        let posts: HashSet<Uuid> = store
            .posts
            .iter()
            .filter(|p| p.author_id == id)
            .map(|p| p.id)
            .collect();
        store.remove_posts(&posts);

        let comments: HashSet<Uuid> = store
            .comments
            .iter()
            .filter(|c| c.author_id == id)
            .map(|c| c.id)
            .collect();
        store.remove_comments(&comments);

        store.likes.retain(|l| l.user_id != id);
        Ok(true)
    }

    async fn list_users(&self, query: UserQuery) -> Result<Vec<UserSummary>> {
        let store = self.store.read().await;
        let needle = query.search.map(|s| s.to_lowercase());

        let mut users: Vec<UserSummary> = store
            .users
            .iter()
            .filter(|u| query.role.is_none_or(|role| u.role == role))
            .filter(|u| {
                needle.as_ref().is_none_or(|n| {
                    u.full_name.to_lowercase().contains(n) || u.email.to_lowercase().contains(n)
                })
            })
            .map(|u| UserSummary {
                id: u.id,
                full_name: u.full_name.clone(),
                email: u.email.clone(),
                role: u.role,
                avatar: u.avatar.clone(),
                created_at: u.created_at,
                post_count: store.posts.iter().filter(|p| p.author_id == u.id).count() as i64,
            })
            .collect();

        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    // --- BLOG POSTS ---

    async fn list_posts(&self, query: PostQuery) -> Result<(i64, Vec<PostListRow>)> {
        let store = self.store.read().await;

        let mut matching: Vec<&BlogPost> = store
            .posts
            .iter()
            .filter(|p| store.post_matches(p, &query))
            .collect();

        // published_at DESC NULLS LAST, then created_at DESC.
        matching.sort_by(|a, b| match (a.published_at, b.published_at) {
            (Some(x), Some(y)) => y.cmp(&x).then(b.created_at.cmp(&a.created_at)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.created_at.cmp(&a.created_at),
        });

        let total = matching.len() as i64;
        let rows = matching
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.page_size.max(0) as usize)
            .map(|p| PostListRow {
                id: p.id,
                title: p.title.clone(),
                slug: p.slug.clone(),
                excerpt: p.excerpt.clone(),
                category: p.category.clone(),
                status: p.status,
                featured_image: p.featured_image.clone(),
                author_id: p.author_id,
                author_name: store.author_name(p.author_id),
                published_at: p.published_at,
                created_at: p.created_at,
                likes: store.count_likes(LikeTarget::Post(p.id)),
                comments: store.comments.iter().filter(|c| c.post_id == p.id).count() as i64,
            })
            .collect();

        Ok((total, rows))
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<BlogPost>> {
        let store = self.store.read().await;
        Ok(store
            .posts
            .iter()
            .find(|p| p.id == id)
            .map(|p| store.hydrate(p)))
    }

    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<BlogPost>> {
        let store = self.store.read().await;
        Ok(store
            .posts
            .iter()
            .find(|p| p.slug == slug)
            .map(|p| store.hydrate(p)))
    }

    async fn create_post(&self, post: NewPost) -> Result<BlogPost> {
        let mut store = self.store.write().await;
        if store.slug_taken(&post.slug, None) {
            return Err(AppError::Conflict(
                "A post with this slug already exists".to_string(),
            ));
        }
        if !store.users.iter().any(|u| u.id == post.author_id) {
            return Err(AppError::Internal("author does not exist".to_string()));
        }

        let now = store.tick();
        let created = BlogPost {
            id: Uuid::new_v4(),
            title: post.title,
            slug: post.slug,
            excerpt: post.excerpt,
            content: post.content,
            category: post.category,
            status: post.status,
            featured_image: post.featured_image,
            author_id: post.author_id,
            author_name: String::new(),
            published_at: post.published_at,
            created_at: now,
            updated_at: now,
        };
        store.posts.push(created.clone());
        Ok(store.hydrate(&created))
    }

    async fn update_post(&self, id: Uuid, changes: PostChanges) -> Result<Option<BlogPost>> {
        let mut store = self.store.write().await;
        if let Some(slug) = &changes.slug {
            if store.slug_taken(slug, Some(id)) {
                return Err(AppError::Conflict(
                    "A post with this slug already exists".to_string(),
                ));
            }
        }

        let now = store.tick();
        let Some(post) = store.posts.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };

        if let Some(title) = changes.title {
            post.title = title;
        }
        if let Some(slug) = changes.slug {
            post.slug = slug;
        }
        if let Some(excerpt) = changes.excerpt {
            post.excerpt = excerpt;
        }
        if let Some(content) = changes.content {
            post.content = content;
        }
        if let Some(category) = changes.category {
            post.category = category;
        }
        if let Some(status) = changes.status {
            post.status = status;
        }
        if let Some(image) = changes.featured_image {
            post.featured_image = image;
        }
        if let Some(published_at) = changes.published_at {
            post.published_at = Some(published_at);
        }
        post.updated_at = now;

        let updated = post.clone();
        Ok(Some(store.hydrate(&updated)))
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool> {
        let mut store = self.store.write().await;
        if !store.posts.iter().any(|p| p.id == id) {
            return Ok(false);
        }
        store.remove_posts(&HashSet::from([id]));
        Ok(true)
    }

    // --- COMMENTS ---

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentRow>> {
        let store = self.store.read().await;
        // Insertion order is creation order.
        Ok(store
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| store.comment_row(c))
            .collect())
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>> {
        let store = self.store.read().await;
        Ok(store.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn create_comment(&self, comment: NewComment) -> Result<CommentRow> {
        let mut store = self.store.write().await;
        if !store.posts.iter().any(|p| p.id == comment.post_id) {
            return Err(AppError::Internal("post does not exist".to_string()));
        }

        let created = Comment {
            id: Uuid::new_v4(),
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            author_id: comment.author_id,
            content: comment.content,
            created_at: store.tick(),
        };
        store.comments.push(created.clone());
        Ok(store.comment_row(&created))
    }

    async fn delete_comment(&self, id: Uuid) -> Result<bool> {
        let mut store = self.store.write().await;
        if !store.comments.iter().any(|c| c.id == id) {
            return Ok(false);
        }
        store.remove_comments(&HashSet::from([id]));
        Ok(true)
    }

    // --- LIKES ---

    async fn toggle_like(&self, user_id: Uuid, target: LikeTarget) -> Result<LikeState> {
        let mut store = self.store.write().await;

        let before = store.likes.len();
        store
            .likes
            .retain(|l| !(l.user_id == user_id && l.target == target));
        let liked = store.likes.len() == before;
        if liked {
            store.likes.push(Like { user_id, target });
        }

        Ok(LikeState {
            liked,
            likes_count: store.count_likes(target),
        })
    }

    async fn post_like_state(&self, post_id: Uuid, viewer: Option<Uuid>) -> Result<LikeState> {
        let store = self.store.read().await;
        let target = LikeTarget::Post(post_id);
        Ok(LikeState {
            liked: viewer.is_some_and(|user| {
                store
                    .likes
                    .iter()
                    .any(|l| l.user_id == user && l.target == target)
            }),
            likes_count: store.count_likes(target),
        })
    }

    async fn liked_comment_ids(&self, user_id: Uuid, post_id: Uuid) -> Result<HashSet<Uuid>> {
        let store = self.store.read().await;
        let on_post: HashSet<Uuid> = store
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| c.id)
            .collect();

        Ok(store
            .likes
            .iter()
            .filter(|l| l.user_id == user_id)
            .filter_map(|l| match l.target {
                LikeTarget::Comment(id) if on_post.contains(&id) => Some(id),
                _ => None,
            })
            .collect())
    }

    // --- HERO POSTS ---

    async fn list_hero_posts(&self, active_only: bool) -> Result<Vec<HeroPost>> {
        let store = self.store.read().await;
        let mut posts: Vec<HeroPost> = store
            .hero_posts
            .iter()
            .filter(|h| !active_only || h.is_active)
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    async fn get_hero_post(&self, id: Uuid) -> Result<Option<HeroPost>> {
        let store = self.store.read().await;
        Ok(store.hero_posts.iter().find(|h| h.id == id).cloned())
    }

    async fn create_hero_post(&self, post: NewHeroPost) -> Result<HeroPost> {
        let mut store = self.store.write().await;
        let now = store.tick();
        let created = HeroPost {
            id: Uuid::new_v4(),
            title: post.title,
            content: post.content,
            image: post.image,
            is_active: post.is_active,
            orientation: post.orientation,
            created_at: now,
            updated_at: now,
        };
        store.hero_posts.push(created.clone());
        Ok(created)
    }

    async fn update_hero_post(
        &self,
        id: Uuid,
        changes: HeroPostChanges,
    ) -> Result<Option<HeroPost>> {
        let mut store = self.store.write().await;
        let now = store.tick();
        let Some(post) = store.hero_posts.iter_mut().find(|h| h.id == id) else {
            return Ok(None);
        };

        if let Some(title) = changes.title {
            post.title = title;
        }
        if let Some(content) = changes.content {
            post.content = content;
        }
        if let Some(image) = changes.image {
            post.image = image;
        }
        if let Some(is_active) = changes.is_active {
            post.is_active = is_active;
        }
        if let Some(orientation) = changes.orientation {
            post.orientation = orientation;
        }
        post.updated_at = now;

        Ok(Some(post.clone()))
    }

    async fn delete_hero_post(&self, id: Uuid) -> Result<bool> {
        let mut store = self.store.write().await;
        let before = store.hero_posts.len();
        store.hero_posts.retain(|h| h.id != id);
        Ok(store.hero_posts.len() < before)
    }

    // --- DASHBOARD ---

    async fn get_stats(&self) -> Result<DashboardStats> {
        let store = self.store.read().await;
        let with_status =
            |status: PostStatus| store.posts.iter().filter(|p| p.status == status).count() as i64;

        Ok(DashboardStats {
            total_posts: store.posts.len() as i64,
            published_posts: with_status(PostStatus::Published),
            draft_posts: with_status(PostStatus::Draft),
            archived_posts: with_status(PostStatus::Archived),
            total_users: store.users.len() as i64,
            total_comments: store.comments.len() as i64,
            total_likes: store.likes.len() as i64,
            active_hero_posts: store.hero_posts.iter().filter(|h| h.is_active).count() as i64,
        })
    }
}
