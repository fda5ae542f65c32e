//! Runs against a live database. Start Postgres, set DATABASE_URL and run
//! `cargo test -- --ignored`.

use chapter_portal::{
    error::AppError,
    models::{
        HeroPostChanges, LikeTarget, NewComment, NewHeroPost, NewPost, NewUser, Orientation,
        PostChanges, PostQuery, PostStatus, Role, User, UserQuery,
    },
    repository::{PostgresRepository, Repository},
};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

/// Tests share one database, so every fixture carries a unique marker.
fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

async fn create_test_user(repo: &PostgresRepository, role: Role) -> User {
    repo.create_user(NewUser {
        email: format!("{}@test.org", unique("user")),
        full_name: "Integration User".to_string(),
        password_hash: None,
        role,
        avatar: None,
    })
    .await
    .expect("Failed to create test user")
}

fn new_post(author_id: Uuid, category: &str, status: PostStatus) -> NewPost {
    let title = unique("post");
    NewPost {
        slug: title.clone(),
        title,
        excerpt: None,
        content: "Integration content".to_string(),
        category: category.to_string(),
        status,
        featured_image: None,
        author_id,
        published_at: (status == PostStatus::Published).then(Utc::now),
    }
}

// --- Tests ---

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn test_user_crud_and_unique_email() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let user = create_test_user(&repo, Role::Member).await;
    let found = repo.find_user_by_email(&user.email).await.unwrap().unwrap();
    assert_eq!(found.id, user.id);

    let duplicate = repo
        .create_user(NewUser {
            email: user.email.clone(),
            full_name: "Again".to_string(),
            password_hash: None,
            role: Role::Member,
            avatar: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(duplicate, AppError::Conflict(_)));

    let promoted = repo.set_user_role(user.id, Role::Admin).await.unwrap().unwrap();
    assert_eq!(promoted.role, Role::Admin);

    let with_avatar = repo
        .set_user_avatar(user.id, "https://example.org/a.png")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(with_avatar.avatar.as_deref(), Some("https://example.org/a.png"));

    assert!(repo.delete_user(user.id).await.unwrap());
    assert!(repo.get_user(user.id).await.unwrap().is_none());
    assert!(!repo.delete_user(user.id).await.unwrap());
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn test_list_users_counts_posts() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let author = create_test_user(&repo, Role::Admin).await;
    let category = unique("cat");
    repo.create_post(new_post(author.id, &category, PostStatus::Draft))
        .await
        .unwrap();
    repo.create_post(new_post(author.id, &category, PostStatus::Published))
        .await
        .unwrap();

    let users = repo
        .list_users(UserQuery {
            role: Some(Role::Admin),
            search: Some(author.email.to_uppercase()),
        })
        .await
        .unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].post_count, 2);

    repo.delete_user(author.id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn test_post_lifecycle_and_listing() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let author = create_test_user(&repo, Role::Admin).await;
    let category = unique("cat");

    let draft = repo
        .create_post(new_post(author.id, &category, PostStatus::Draft))
        .await
        .unwrap();
    assert_eq!(draft.author_name, "Integration User");
    assert!(draft.published_at.is_none());

    let published = repo
        .create_post(new_post(author.id, &category, PostStatus::Published))
        .await
        .unwrap();

    let by_slug = repo.get_post_by_slug(&published.slug).await.unwrap().unwrap();
    assert_eq!(by_slug.id, published.id);

    let duplicate_slug = NewPost {
        slug: published.slug.clone(),
        ..new_post(author.id, &category, PostStatus::Draft)
    };
    let err = repo.create_post(duplicate_slug).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let (total, rows) = repo
        .list_posts(PostQuery {
            status: Some(PostStatus::Published),
            category: Some(category.clone()),
            search: None,
            page: 1,
            page_size: 9,
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].id, published.id);

    let (all, rows) = repo
        .list_posts(PostQuery {
            status: None,
            category: Some(category.clone()),
            search: None,
            page: 1,
            page_size: 9,
        })
        .await
        .unwrap();
    assert_eq!(all, 2);
    // Drafts have no publication date and come last.
    assert_eq!(rows[1].id, draft.id);

    let updated = repo
        .update_post(
            draft.id,
            PostChanges {
                excerpt: Some(Some("Now with an excerpt".to_string())),
                status: Some(PostStatus::Archived),
                ..PostChanges::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.excerpt.as_deref(), Some("Now with an excerpt"));
    assert_eq!(updated.status, PostStatus::Archived);
    assert!(updated.updated_at >= draft.updated_at);

    let cleared = repo
        .update_post(
            draft.id,
            PostChanges {
                excerpt: Some(None),
                ..PostChanges::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cleared.excerpt, None);

    assert!(repo.update_post(Uuid::new_v4(), PostChanges::default()).await.unwrap().is_none());

    repo.delete_user(author.id).await.unwrap();
    assert!(repo.get_post(published.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn test_likes_toggle_and_comments_cascade() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let author = create_test_user(&repo, Role::Admin).await;
    let reader = create_test_user(&repo, Role::Member).await;
    let post = repo
        .create_post(new_post(author.id, &unique("cat"), PostStatus::Published))
        .await
        .unwrap();

    let liked = repo
        .toggle_like(reader.id, LikeTarget::Post(post.id))
        .await
        .unwrap();
    assert!(liked.liked);
    assert_eq!(liked.likes_count, 1);

    let state = repo.post_like_state(post.id, Some(reader.id)).await.unwrap();
    assert!(state.liked);
    let anonymous = repo.post_like_state(post.id, None).await.unwrap();
    assert!(!anonymous.liked);
    assert_eq!(anonymous.likes_count, 1);

    let unliked = repo
        .toggle_like(reader.id, LikeTarget::Post(post.id))
        .await
        .unwrap();
    assert!(!unliked.liked);
    assert_eq!(unliked.likes_count, 0);

    let root = repo
        .create_comment(NewComment {
            post_id: post.id,
            parent_id: None,
            author_id: reader.id,
            content: "root".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(root.author_name, "Integration User");
    let reply = repo
        .create_comment(NewComment {
            post_id: post.id,
            parent_id: Some(root.id),
            author_id: author.id,
            content: "reply".to_string(),
        })
        .await
        .unwrap();

    repo.toggle_like(author.id, LikeTarget::Comment(root.id))
        .await
        .unwrap();
    let liked_ids = repo.liked_comment_ids(author.id, post.id).await.unwrap();
    assert!(liked_ids.contains(&root.id));

    let rows = repo.list_comments(post.id).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, root.id);
    assert_eq!(rows[0].likes_count, 1);

    assert!(repo.delete_comment(root.id).await.unwrap());
    assert!(repo.get_comment(reply.id).await.unwrap().is_none());

    repo.delete_user(author.id).await.unwrap();
    repo.delete_user(reader.id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn test_hero_posts() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let hero = repo
        .create_hero_post(NewHeroPost {
            title: unique("hero"),
            content: None,
            image: Some("https://example.org/h.png".to_string()),
            is_active: false,
            orientation: Orientation::Portrait,
        })
        .await
        .unwrap();

    let active = repo.list_hero_posts(true).await.unwrap();
    assert!(active.iter().all(|h| h.is_active));
    assert!(!active.iter().any(|h| h.id == hero.id));

    let everything = repo.list_hero_posts(false).await.unwrap();
    assert!(everything.iter().any(|h| h.id == hero.id));

    let stats_before = repo.get_stats().await.unwrap();
    let updated = repo
        .update_hero_post(
            hero.id,
            HeroPostChanges {
                image: Some(None),
                is_active: Some(true),
                ..HeroPostChanges::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert!(updated.is_active);
    assert_eq!(updated.image, None);
    assert_eq!(updated.orientation, Orientation::Portrait);

    let stats_after = repo.get_stats().await.unwrap();
    assert!(stats_after.active_hero_posts >= stats_before.active_hero_posts);

    assert!(repo.delete_hero_post(hero.id).await.unwrap());
    assert!(repo.get_hero_post(hero.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn test_search_wildcards_match_literally() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let author = create_test_user(&repo, Role::Admin).await;
    let category = unique("cat");
    repo.create_post(new_post(author.id, &category, PostStatus::Published))
        .await
        .unwrap();
    let discounted = repo
        .create_post(NewPost {
            title: format!("100% off {}", unique("sale")),
            ..new_post(author.id, &category, PostStatus::Published)
        })
        .await
        .unwrap();

    let search = |term: &str| PostQuery {
        status: None,
        category: Some(category.clone()),
        search: Some(term.to_string()),
        page: 1,
        page_size: 9,
    };

    let (underscore, _) = repo.list_posts(search("_")).await.unwrap();
    assert_eq!(underscore, 0);

    let (percent, rows) = repo.list_posts(search("100%")).await.unwrap();
    assert_eq!(percent, 1);
    assert_eq!(rows[0].id, discounted.id);

    let (past_end, rows) = repo
        .list_posts(PostQuery {
            page: i64::MAX,
            page_size: 100,
            ..search("off")
        })
        .await
        .unwrap();
    assert_eq!(past_end, 1);
    assert!(rows.is_empty());

    let users = repo
        .list_users(UserQuery {
            role: None,
            search: Some(format!("{}%", author.email)),
        })
        .await
        .unwrap();
    assert!(users.is_empty());

    repo.delete_user(author.id).await.unwrap();
}
