//! Test fixtures for creating test data
#![allow(dead_code)]

use actix_web::http::header;
use therapist_reviews::acf::IdList;
use therapist_reviews::wordpress::memory::MemoryBackend;
use therapist_reviews::wordpress::{CommentFields, Rendered, Therapist, WpComment, STATUS_APPROVED};

/// Test user fixture
pub struct TestUser {
    pub id: u64,
    pub email: String,
    pub password: String, // Plain text password for testing
    pub token: String,
}

impl TestUser {
    /// `Authorization` header carrying the user's token
    pub fn bearer(&self) -> (header::HeaderName, String) {
        (header::AUTHORIZATION, format!("Bearer {}", self.token))
    }
}

/// Create a test user with known credentials and a valid token
pub fn create_test_user(memory: &MemoryBackend, name: &str) -> TestUser {
    let email = format!("{}@test.com", name);
    let password = format!("{}-password", name);
    let user = memory.add_user(&email, name, &password);
    TestUser {
        id: user.id,
        token: memory.token_for(user.id),
        email,
        password,
    }
}

/// Create a therapist post
pub fn create_test_therapist(memory: &MemoryBackend, name: &str) -> Therapist {
    memory.add_therapist(name, "Anxiety, Depression", "Lisbon")
}

/// Store an approved review directly, bypassing submission
pub fn create_test_review(
    memory: &MemoryBackend,
    post: u64,
    author_name: &str,
    author_email: &str,
    rating: u8,
) -> WpComment {
    memory.insert_comment(WpComment {
        id: 0,
        post,
        author: 0,
        author_name: author_name.to_string(),
        author_email: author_email.to_string(),
        content: Rendered {
            rendered: format!("<p>Review by {}</p>", author_name),
        },
        date: "2024-05-01T10:00:00".to_string(),
        status: STATUS_APPROVED.to_string(),
        acf: CommentFields {
            rate: Some(rating.to_string()),
            anonymous: Some("0".to_string()),
            ..Default::default()
        },
    })
}

/// Store a review with a fixed id and the given reaction lists
pub fn create_review_with_reactions(
    memory: &MemoryBackend,
    id: u64,
    post: u64,
    useful: &str,
    loved: &str,
) -> WpComment {
    memory.insert_comment(WpComment {
        id,
        post,
        author: 0,
        author_name: "Reviewer".to_string(),
        author_email: "reviewer@test.com".to_string(),
        content: Rendered {
            rendered: "<p>Helpful therapist</p>".to_string(),
        },
        date: "2024-05-01T10:00:00".to_string(),
        status: STATUS_APPROVED.to_string(),
        acf: CommentFields {
            rate: Some("5".to_string()),
            useful: IdList::decode(useful),
            loved: IdList::decode(loved),
            ..Default::default()
        },
    })
}
