use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Enumerations (Postgres enum types) ---

/// Role
///
/// The four privilege tiers. Stored as the `user_role` Postgres enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Role {
    SuperAdmin,
    Admin,
    #[default]
    Member,
    Guest,
}

impl Role {
    /// ADMIN and SUPER_ADMIN may manage content.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }

    pub fn is_super_admin(self) -> bool {
        self == Role::SuperAdmin
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::Admin => "ADMIN",
            Role::Member => "MEMBER",
            Role::Guest => "GUEST",
        }
    }
}

impl FromStr for Role {
    type Err = ();

    /// Case-insensitive, matching how role filters arrive from query strings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUPER_ADMIN" => Ok(Role::SuperAdmin),
            "ADMIN" => Ok(Role::Admin),
            "MEMBER" => Ok(Role::Member),
            "GUEST" => Ok(Role::Guest),
            _ => Err(()),
        }
    }
}

/// PostStatus
///
/// Lifecycle of a blog post. Only PUBLISHED posts are visible to the public.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[sqlx(type_name = "post_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl FromStr for PostStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(PostStatus::Draft),
            "PUBLISHED" => Ok(PostStatus::Published),
            "ARCHIVED" => Ok(PostStatus::Archived),
            _ => Err(()),
        }
    }
}

/// Orientation
///
/// Layout hint for the homepage hero image.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[sqlx(type_name = "hero_orientation", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Canonical account record from the `users` table. Never serialized directly;
/// API responses use `UserProfile` or `UserSummary` so the hash cannot leak.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    // None for OAuth-provisioned accounts.
    pub password_hash: Option<String>,
    pub role: Role,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// BlogPost
///
/// A row of `blog_posts` joined with the author's display name.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BlogPost {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub category: String,
    pub status: PostStatus,
    pub featured_image: Option<String>,
    pub author_id: Uuid,
    pub author_name: String,
    #[ts(type = "string | null")]
    pub published_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Comment
///
/// Plain `comments` row. `parent_id` is set for replies.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// CommentRow
///
/// A comment enriched with its author and like count, as loaded for a post.
#[derive(Debug, Clone, FromRow, Default)]
pub struct CommentRow {
    pub id: Uuid,
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub likes_count: i64,
}

/// LikeTarget
///
/// A like points at exactly one post or one comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LikeTarget {
    Post(Uuid),
    Comment(Uuid),
}

/// HeroPost
///
/// Homepage announcement, independent of the blog.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HeroPost {
    pub id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
    pub orientation: Orientation,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Repository Inputs ---

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub category: String,
    pub status: PostStatus,
    pub featured_image: Option<String>,
    pub author_id: Uuid,
    pub published_at: Option<DateTime<Utc>>,
}

/// PostChanges
///
/// Column-level patch. `None` leaves a column untouched; for nullable columns
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<Option<String>>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub status: Option<PostStatus>,
    pub featured_image: Option<Option<String>>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct NewHeroPost {
    pub title: String,
    pub content: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, Default)]
pub struct HeroPostChanges {
    pub title: Option<String>,
    pub content: Option<Option<String>>,
    pub image: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub orientation: Option<Orientation>,
}

/// PostQuery
///
/// Normalised listing filter. `status == None` means every status.
#[derive(Debug, Clone)]
pub struct PostQuery {
    pub status: Option<PostStatus>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: i64,
    pub page_size: i64,
}

impl PostQuery {
    /// Rows to skip. Saturates, so an absurd page lands past the end and
    /// yields an empty page.
    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0).saturating_mul(self.page_size)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub role: Option<Role>,
    pub search: Option<String>,
}

// --- Request Payloads (Input Schemas) ---

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// GoogleSignInRequest
///
/// The Google ID token obtained by the browser; verified server-side.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GoogleSignInRequest {
    pub id_token: String,
}

/// CreatePostRequest
///
/// Required fields are optional here so a missing one yields a 400 with a
/// message rather than a deserialization rejection.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreatePostRequest {
    #[ts(optional)]
    pub title: Option<String>,
    #[ts(optional)]
    pub excerpt: Option<String>,
    #[ts(optional)]
    pub content: Option<String>,
    #[ts(optional)]
    pub category: Option<String>,
    #[ts(optional)]
    pub status: Option<PostStatus>,
    #[ts(optional)]
    pub featured_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    #[ts(optional)]
    pub excerpt: Option<Option<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub category: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub status: Option<PostStatus>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    #[ts(optional)]
    pub featured_image: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateCommentRequest {
    #[ts(optional)]
    pub content: Option<String>,
    /// Set when replying to a top-level comment.
    #[ts(optional)]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateHeroPostRequest {
    #[ts(optional)]
    pub title: Option<String>,
    #[ts(optional)]
    pub content: Option<String>,
    #[ts(optional)]
    pub image: Option<String>,
    #[ts(optional)]
    pub is_active: Option<bool>,
    #[ts(optional)]
    pub orientation: Option<Orientation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateHeroPostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    #[ts(optional)]
    pub content: Option<Option<String>>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    #[ts(optional)]
    pub image: Option<Option<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub is_active: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub orientation: Option<Orientation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRoleRequest {
    pub role: String,
}

// --- Response Views (Output Schemas) ---

/// UserProfile
///
/// Public projection of an account, used for the session and role updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub avatar: Option<String>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            avatar: user.avatar,
        }
    }
}

/// AuthResponse
///
/// Returned by every sign-in flow. The token is also set as a cookie.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

/// UserSummary
///
/// Row of the super-admin user table, with the number of authored posts.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserSummary {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub avatar: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "number")]
    pub post_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AuthorView {
    pub id: Uuid,
    pub name: String,
    pub avatar: Option<String>,
}

/// PostListRow
///
/// Listing row as produced by the repository, before presentation.
#[derive(Debug, Clone, FromRow, Default)]
pub struct PostListRow {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub category: String,
    pub status: PostStatus,
    pub featured_image: Option<String>,
    pub author_id: Uuid,
    pub author_name: String,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub likes: i64,
    pub comments: i64,
}

/// PostListItem
///
/// One card in the blog index or the admin post table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PostListItem {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub category: String,
    pub status: PostStatus,
    pub featured_image: Option<String>,
    /// Author display name.
    pub author: String,
    pub author_id: Uuid,
    /// Publication date as `YYYY-MM-DD`.
    pub date: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "number")]
    pub likes: i64,
    #[ts(type = "number")]
    pub comments: i64,
}

impl From<PostListRow> for PostListItem {
    fn from(row: PostListRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            excerpt: row.excerpt,
            category: row.category,
            status: row.status,
            featured_image: row.featured_image,
            author: row.author_name,
            author_id: row.author_id,
            date: row.published_at.map(|at| at.format("%Y-%m-%d").to_string()),
            created_at: row.created_at,
            likes: row.likes,
            comments: row.comments,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PostPage {
    pub items: Vec<PostListItem>,
    #[ts(type = "number")]
    pub total: i64,
    #[ts(type = "number")]
    pub page: i64,
    #[ts(type = "number")]
    pub page_size: i64,
    #[ts(type = "number")]
    pub total_pages: i64,
}

/// CommentView
///
/// A comment as rendered on the article page. Top-level comments carry their
/// replies; replies always have an empty `replies` list.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommentView {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub author: AuthorView,
    #[ts(type = "number")]
    pub likes_count: i64,
    pub liked_by_user: bool,
    #[schema(no_recursion)]
    pub replies: Vec<CommentView>,
}

/// PostView
///
/// Public article detail, personalised for the viewer.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PostView {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub category: String,
    pub featured_image: Option<String>,
    pub status: PostStatus,
    #[ts(type = "string | null")]
    pub published_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub author: AuthorView,
    #[ts(type = "number")]
    pub likes_count: i64,
    pub liked_by_user: bool,
    pub comments: Vec<CommentView>,
}

/// LikeState
///
/// Outcome of a like toggle: the viewer's new state and the fresh total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LikeState {
    pub liked: bool,
    #[ts(type = "number")]
    pub likes_count: i64,
}

/// DashboardStats
///
/// Counters for the admin dashboard header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DashboardStats {
    #[ts(type = "number")]
    pub total_posts: i64,
    #[ts(type = "number")]
    pub published_posts: i64,
    #[ts(type = "number")]
    pub draft_posts: i64,
    #[ts(type = "number")]
    pub archived_posts: i64,
    #[ts(type = "number")]
    pub total_users: i64,
    #[ts(type = "number")]
    pub total_comments: i64,
    #[ts(type = "number")]
    pub total_likes: i64,
    #[ts(type = "number")]
    pub active_hero_posts: i64,
}
