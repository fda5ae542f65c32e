use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use uuid::Uuid;

use super::Repository;
use crate::{
    error::Result,
    models::{
        BlogPost, Comment, CommentRow, DashboardStats, HeroPost, HeroPostChanges, LikeState,
        LikeTarget, NewComment, NewHeroPost, NewPost, NewUser, PostChanges, PostListRow,
        PostQuery, Role, User, UserQuery, UserSummary,
    },
};

const USER_COLUMNS: &str =
    "id, email, full_name, password_hash, role, avatar, created_at, updated_at";

// Expects the post relation aliased as `p` and joins its author as `u`.
const POST_SELECT: &str = r#"
    SELECT p.id, p.title, p.slug, p.excerpt, p.content, p.category, p.status,
           p.featured_image, p.author_id, u.full_name AS author_name,
           p.published_at, p.created_at, p.updated_at
    FROM p JOIN users u ON u.id = p.author_id
"#;

const HERO_COLUMNS: &str =
    "id, title, content, image, is_active, orientation, created_at, updated_at";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `%search%` for ILIKE with the search text taken literally. Paired with
/// `ESCAPE '\'` in the SQL.
fn contains_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Appends the WHERE clause shared by the listing and its count query.
fn push_post_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &PostQuery) {
    builder.push(" WHERE TRUE");

    if let Some(status) = query.status {
        builder.push(" AND p.status = ");
        builder.push_bind(status);
    }

    if let Some(category) = &query.category {
        builder.push(" AND p.category = ");
        builder.push_bind(category.clone());
    }

    if let Some(search) = &query.search {
        // Case-insensitive match across every text column a reader would search.
        let pattern = contains_pattern(search);
        builder.push(" AND (p.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR p.content ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR p.excerpt ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR p.category ILIKE ");
        builder.push_bind(pattern);
        builder.push(" ESCAPE '\\')");
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (id, email, full_name, password_hash, role, avatar)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {USER_COLUMNS}"
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(user.email)
            .bind(user.full_name)
            .bind(user.password_hash)
            .bind(user.role)
            .bind(user.avatar)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn set_user_avatar(&self, id: Uuid, avatar: &str) -> Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET avatar = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(avatar)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(role)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self, query: UserQuery) -> Result<Vec<UserSummary>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT u.id, u.full_name, u.email, u.role, u.avatar, u.created_at,
                   (SELECT COUNT(*) FROM blog_posts p WHERE p.author_id = u.id) AS post_count
            FROM users u
            WHERE TRUE
            "#,
        );

        if let Some(role) = query.role {
            builder.push(" AND u.role = ");
            builder.push_bind(role);
        }

        if let Some(search) = query.search {
            let pattern = contains_pattern(&search);
            builder.push(" AND (u.full_name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" ESCAPE '\\' OR u.email ILIKE ");
            builder.push_bind(pattern);
            builder.push(" ESCAPE '\\')");
        }

        builder.push(" ORDER BY u.created_at DESC");

        let users = builder
            .build_query_as::<UserSummary>()
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    // --- BLOG POSTS ---

    /// list_posts
    ///
    /// Count and page share the same filter so `total` always matches what
    /// pagination walks over.
    async fn list_posts(&self, query: PostQuery) -> Result<(i64, Vec<PostListRow>)> {
        let mut count: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM blog_posts p");
        push_post_filters(&mut count, &query);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT p.id, p.title, p.slug, p.excerpt, p.category, p.status, p.featured_image,
                   p.author_id, u.full_name AS author_name, p.published_at, p.created_at,
                   (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes,
                   (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments
            FROM blog_posts p
            JOIN users u ON u.id = p.author_id
            "#,
        );
        push_post_filters(&mut builder, &query);
        builder.push(" ORDER BY p.published_at DESC NULLS LAST, p.created_at DESC");
        builder.push(" LIMIT ");
        builder.push_bind(query.page_size);
        builder.push(" OFFSET ");
        builder.push_bind(query.offset());

        let rows = builder
            .build_query_as::<PostListRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok((total, rows))
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<BlogPost>> {
        let sql = format!("WITH p AS (SELECT * FROM blog_posts WHERE id = $1) {POST_SELECT}");
        let post = sqlx::query_as::<_, BlogPost>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<BlogPost>> {
        let sql = format!("WITH p AS (SELECT * FROM blog_posts WHERE slug = $1) {POST_SELECT}");
        let post = sqlx::query_as::<_, BlogPost>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn create_post(&self, post: NewPost) -> Result<BlogPost> {
        let sql = format!(
            r#"
            WITH p AS (
                INSERT INTO blog_posts
                    (id, title, slug, excerpt, content, category, status, featured_image, author_id, published_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING *
            )
            {POST_SELECT}
            "#
        );
        let created = sqlx::query_as::<_, BlogPost>(&sql)
            .bind(Uuid::new_v4())
            .bind(post.title)
            .bind(post.slug)
            .bind(post.excerpt)
            .bind(post.content)
            .bind(post.category)
            .bind(post.status)
            .bind(post.featured_image)
            .bind(post.author_id)
            .bind(post.published_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    /// update_post
    ///
    /// Builds the SET list from the provided changes only; `updated_at` is
    /// always refreshed.
    async fn update_post(&self, id: Uuid, changes: PostChanges) -> Result<Option<BlogPost>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("WITH p AS (UPDATE blog_posts SET updated_at = NOW()");

        if let Some(title) = changes.title {
            builder.push(", title = ");
            builder.push_bind(title);
        }
        if let Some(slug) = changes.slug {
            builder.push(", slug = ");
            builder.push_bind(slug);
        }
        if let Some(excerpt) = changes.excerpt {
            builder.push(", excerpt = ");
            builder.push_bind(excerpt);
        }
        if let Some(content) = changes.content {
            builder.push(", content = ");
            builder.push_bind(content);
        }
        if let Some(category) = changes.category {
            builder.push(", category = ");
            builder.push_bind(category);
        }
        if let Some(status) = changes.status {
            builder.push(", status = ");
            builder.push_bind(status);
        }
        if let Some(image) = changes.featured_image {
            builder.push(", featured_image = ");
            builder.push_bind(image);
        }
        if let Some(published_at) = changes.published_at {
            builder.push(", published_at = ");
            builder.push_bind(published_at);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" RETURNING *) ");
        builder.push(POST_SELECT);

        let post = builder
            .build_query_as::<BlogPost>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM blog_posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- COMMENTS ---

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentRow>> {
        let comments = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT c.id, c.post_id, c.parent_id, c.author_id,
                   u.full_name AS author_name, u.avatar AS author_avatar,
                   c.content, c.created_at,
                   (SELECT COUNT(*) FROM likes l WHERE l.comment_id = c.id) AS likes_count
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.post_id = $1
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            "SELECT id, post_id, parent_id, author_id, content, created_at FROM comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    /// create_comment
    ///
    /// Inserts and joins the author in one round trip through a CTE.
    async fn create_comment(&self, comment: NewComment) -> Result<CommentRow> {
        let created = sqlx::query_as::<_, CommentRow>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (id, post_id, parent_id, author_id, content)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, post_id, parent_id, author_id, content, created_at
            )
            SELECT i.id, i.post_id, i.parent_id, i.author_id,
                   u.full_name AS author_name, u.avatar AS author_avatar,
                   i.content, i.created_at, 0::BIGINT AS likes_count
            FROM inserted i
            JOIN users u ON u.id = i.author_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(comment.post_id)
        .bind(comment.parent_id)
        .bind(comment.author_id)
        .bind(comment.content)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn delete_comment(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- LIKES ---

    /// toggle_like
    ///
    /// Runs inside one transaction: a successful delete means the viewer
    /// un-liked; otherwise a row is inserted. The partial unique indexes make a
    /// concurrent double insert a no-op.
    async fn toggle_like(&self, user_id: Uuid, target: LikeTarget) -> Result<LikeState> {
        let (column, target_id) = match target {
            LikeTarget::Post(id) => ("post_id", id),
            LikeTarget::Comment(id) => ("comment_id", id),
        };

        let delete_sql = format!("DELETE FROM likes WHERE user_id = $1 AND {column} = $2");
        let insert_sql = format!(
            "INSERT INTO likes (id, user_id, {column}) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING"
        );
        let count_sql = format!("SELECT COUNT(*) FROM likes WHERE {column} = $1");

        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(&delete_sql)
            .bind(user_id)
            .bind(target_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let liked = removed == 0;
        if liked {
            sqlx::query(&insert_sql)
                .bind(Uuid::new_v4())
                .bind(user_id)
                .bind(target_id)
                .execute(&mut *tx)
                .await?;
        }

        let likes_count = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(target_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(LikeState { liked, likes_count })
    }

    async fn post_like_state(&self, post_id: Uuid, viewer: Option<Uuid>) -> Result<LikeState> {
        let (likes_count, liked) = sqlx::query_as::<_, (i64, bool)>(
            r#"
            SELECT COUNT(*), COALESCE(BOOL_OR(user_id = $2), FALSE)
            FROM likes
            WHERE post_id = $1
            "#,
        )
        .bind(post_id)
        .bind(viewer)
        .fetch_one(&self.pool)
        .await?;
        Ok(LikeState { liked, likes_count })
    }

    async fn liked_comment_ids(&self, user_id: Uuid, post_id: Uuid) -> Result<HashSet<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT l.comment_id
            FROM likes l
            JOIN comments c ON c.id = l.comment_id
            WHERE l.user_id = $1 AND c.post_id = $2
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    // --- HERO POSTS ---

    async fn list_hero_posts(&self, active_only: bool) -> Result<Vec<HeroPost>> {
        let sql = format!(
            "SELECT {HERO_COLUMNS} FROM hero_posts WHERE ($1 = FALSE OR is_active) ORDER BY created_at DESC"
        );
        let posts = sqlx::query_as::<_, HeroPost>(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?;
        Ok(posts)
    }

    async fn get_hero_post(&self, id: Uuid) -> Result<Option<HeroPost>> {
        let sql = format!("SELECT {HERO_COLUMNS} FROM hero_posts WHERE id = $1");
        let post = sqlx::query_as::<_, HeroPost>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn create_hero_post(&self, post: NewHeroPost) -> Result<HeroPost> {
        let sql = format!(
            "INSERT INTO hero_posts (id, title, content, image, is_active, orientation)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {HERO_COLUMNS}"
        );
        let created = sqlx::query_as::<_, HeroPost>(&sql)
            .bind(Uuid::new_v4())
            .bind(post.title)
            .bind(post.content)
            .bind(post.image)
            .bind(post.is_active)
            .bind(post.orientation)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn update_hero_post(
        &self,
        id: Uuid,
        changes: HeroPostChanges,
    ) -> Result<Option<HeroPost>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE hero_posts SET updated_at = NOW()");

        if let Some(title) = changes.title {
            builder.push(", title = ");
            builder.push_bind(title);
        }
        if let Some(content) = changes.content {
            builder.push(", content = ");
            builder.push_bind(content);
        }
        if let Some(image) = changes.image {
            builder.push(", image = ");
            builder.push_bind(image);
        }
        if let Some(is_active) = changes.is_active {
            builder.push(", is_active = ");
            builder.push_bind(is_active);
        }
        if let Some(orientation) = changes.orientation {
            builder.push(", orientation = ");
            builder.push_bind(orientation);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" RETURNING ");
        builder.push(HERO_COLUMNS);

        let post = builder
            .build_query_as::<HeroPost>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn delete_hero_post(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM hero_posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- DASHBOARD ---

    /// get_stats
    ///
    /// Compiles every dashboard counter in a single statement.
    async fn get_stats(&self) -> Result<DashboardStats> {
        let stats = sqlx::query_as::<_, DashboardStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM blog_posts) AS total_posts,
                (SELECT COUNT(*) FROM blog_posts WHERE status = 'PUBLISHED') AS published_posts,
                (SELECT COUNT(*) FROM blog_posts WHERE status = 'DRAFT') AS draft_posts,
                (SELECT COUNT(*) FROM blog_posts WHERE status = 'ARCHIVED') AS archived_posts,
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM comments) AS total_comments,
                (SELECT COUNT(*) FROM likes) AS total_likes,
                (SELECT COUNT(*) FROM hero_posts WHERE is_active) AS active_hero_posts
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_wildcards_are_escaped() {
        assert_eq!(contains_pattern("gala"), "%gala%");
        assert_eq!(contains_pattern("100%"), "%100\\%%");
        assert_eq!(contains_pattern("a_b"), "%a\\_b%");
        assert_eq!(contains_pattern(r"C:\dir"), r"%C:\\dir%");
    }
}
