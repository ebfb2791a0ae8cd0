//! In-process WordPress stand-in.
//!
//! Mirrors the REST backend's observable behaviour closely enough to run the
//! service without a WordPress install. Integration tests seed it directly
//! and can make ACF or meta updates fail on demand.

use super::{
    AuthToken, CommentFields, CommentQuery, CommentUpdate, MediaObject, MediaUpload, NewComment,
    NewUser, Rendered, Therapist, TherapistFields, TherapistQuery, UserUpdate, WordPressBackend,
    WpComment, WpError, WpMedia, WpResult, WpUser, MAX_PER_PAGE, STATUS_APPROVED,
};
use crate::acf::IdList;
use actix_web::web::Bytes;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Host used to build media source URLs.
pub const MEMORY_SITE_URL: &str = "http://wordpress.local";

struct StoredUser {
    user: WpUser,
    password: String,
}

struct StoredMedia {
    content_type: String,
    data: Bytes,
}

#[derive(Default)]
struct State {
    next_id: u64,
    users: BTreeMap<u64, StoredUser>,
    comments: BTreeMap<u64, WpComment>,
    therapists: BTreeMap<u64, Therapist>,
    media: HashMap<String, StoredMedia>,
    tokens: HashMap<String, u64>,
}

impl State {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn user_by_email(&self, email: &str) -> Option<&StoredUser> {
        self.users
            .values()
            .find(|stored| stored.user.email.eq_ignore_ascii_case(email))
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    fail_acf_updates: AtomicBool,
    fail_meta_updates: AtomicBool,
    comment_updates: AtomicUsize,
    uploads: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> WpResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| WpError::Network("memory backend lock poisoned".to_owned()))
    }

    /// Create an account directly, bypassing registration.
    pub fn add_user(&self, email: &str, name: &str, password: &str) -> WpUser {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let id = state.allocate_id();
        let user = WpUser {
            id,
            email: email.to_owned(),
            name: name.to_owned(),
            acf: Default::default(),
        };
        state.users.insert(
            id,
            StoredUser {
                user: user.clone(),
                password: password.to_owned(),
            },
        );
        user
    }

    /// Issue a token for an existing user without checking a password.
    pub fn token_for(&self, user_id: u64) -> String {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let token = format!("mem.{}", uuid::Uuid::new_v4());
        state.tokens.insert(token.clone(), user_id);
        token
    }

    pub fn add_therapist(&self, name: &str, specialties: &str, city: &str) -> Therapist {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let id = state.allocate_id();
        let therapist = Therapist {
            id,
            slug: name.to_lowercase().replace(' ', "-"),
            title: Rendered {
                rendered: name.to_owned(),
            },
            content: Rendered::default(),
            acf: TherapistFields {
                specialties: specialties.to_owned(),
                city: city.to_owned(),
                photo: None,
                price: None,
            },
        };
        state.therapists.insert(id, therapist.clone());
        therapist
    }

    /// Store a comment as-is, e.g. one already approved by a moderator.
    pub fn insert_comment(&self, mut comment: WpComment) -> WpComment {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if comment.id == 0 {
            comment.id = state.allocate_id();
        } else if comment.id > state.next_id {
            state.next_id = comment.id;
        }
        state.comments.insert(comment.id, comment.clone());
        comment
    }

    pub fn set_comment_status(&self, id: u64, status: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(comment) = state.comments.get_mut(&id) {
            comment.status = status.to_owned();
        }
    }

    pub fn comment(&self, id: u64) -> Option<WpComment> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.comments.get(&id).cloned()
    }

    pub fn comment_count(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.comments.len()
    }

    pub fn user(&self, id: u64) -> Option<WpUser> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.users.get(&id).map(|stored| stored.user.clone())
    }

    pub fn set_fail_acf_updates(&self, fail: bool) {
        self.fail_acf_updates.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_meta_updates(&self, fail: bool) {
        self.fail_meta_updates.store(fail, Ordering::SeqCst);
    }

    /// Number of comment update calls received so far.
    pub fn comment_update_count(&self) -> usize {
        self.comment_updates.load(Ordering::SeqCst)
    }

    /// Number of media uploads received so far.
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

fn now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn status_matches(filter: Option<&str>, status: &str) -> bool {
    match filter {
        None | Some(STATUS_APPROVED) | Some("approve") => status == STATUS_APPROVED,
        Some("all") => true,
        Some(other) => status == other,
    }
}

fn paginate<T>(items: Vec<T>, per_page: u32, page: u32) -> Vec<T> {
    let per_page = per_page.clamp(1, MAX_PER_PAGE) as usize;
    let skip = (page.max(1) as usize - 1) * per_page;
    items.into_iter().skip(skip).take(per_page).collect()
}

#[async_trait]
impl WordPressBackend for MemoryBackend {
    async fn validate_token(&self, token: &str) -> WpResult<WpUser> {
        let state = self.lock()?;
        let user_id = state.tokens.get(token).ok_or(WpError::Unauthorized)?;
        state
            .users
            .get(user_id)
            .map(|stored| stored.user.clone())
            .ok_or(WpError::Unauthorized)
    }

    async fn issue_token(&self, email: &str, password: &str) -> WpResult<AuthToken> {
        let mut state = self.lock()?;
        let user = match state.user_by_email(email) {
            Some(stored) if stored.password == password => stored.user.clone(),
            _ => return Err(WpError::Unauthorized),
        };
        let token = format!("mem.{}", uuid::Uuid::new_v4());
        state.tokens.insert(token.clone(), user.id);
        Ok(AuthToken { token, user })
    }

    async fn register_user(&self, new_user: &NewUser) -> WpResult<WpUser> {
        let mut state = self.lock()?;
        if state.user_by_email(&new_user.email).is_some() {
            return Err(WpError::Upstream {
                status: 400,
                message: "User already exists.".to_owned(),
            });
        }
        let id = state.allocate_id();
        let user = WpUser {
            id,
            email: new_user.email.clone(),
            name: new_user.name.clone(),
            acf: Default::default(),
        };
        state.users.insert(
            id,
            StoredUser {
                user: user.clone(),
                password: new_user.password.clone(),
            },
        );
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> WpResult<Option<WpUser>> {
        let state = self.lock()?;
        Ok(state.user_by_email(email).map(|stored| stored.user.clone()))
    }

    async fn get_user(&self, id: u64) -> WpResult<WpUser> {
        let state = self.lock()?;
        state
            .users
            .get(&id)
            .map(|stored| stored.user.clone())
            .ok_or_else(|| WpError::NotFound(format!("user {}", id)))
    }

    async fn update_user(&self, id: u64, update: &UserUpdate) -> WpResult<WpUser> {
        let mut state = self.lock()?;
        let stored = state
            .users
            .get_mut(&id)
            .ok_or_else(|| WpError::NotFound(format!("user {}", id)))?;
        if let Some(name) = &update.name {
            stored.user.name = name.clone();
        }
        if let Some(acf) = &update.acf {
            if let Some(favorites) = &acf.favorites_therapists {
                stored.user.acf.favorites_therapists = favorites.clone();
            }
            if let Some(photo) = &acf.profile_photo {
                stored.user.acf.profile_photo = Some(photo.clone());
            }
        }
        Ok(stored.user.clone())
    }

    async fn get_comment(&self, id: u64) -> WpResult<WpComment> {
        let state = self.lock()?;
        state
            .comments
            .get(&id)
            .cloned()
            .ok_or_else(|| WpError::NotFound(format!("comment {}", id)))
    }

    async fn list_comments(&self, query: &CommentQuery) -> WpResult<Vec<WpComment>> {
        let state = self.lock()?;
        let matching: Vec<WpComment> = state
            .comments
            .values()
            .rev()
            .filter(|c| query.post.map_or(true, |post| c.post == post))
            .filter(|c| query.include.is_empty() || query.include.contains(&c.id))
            .filter(|c| status_matches(query.status.as_deref(), &c.status))
            .cloned()
            .collect();
        Ok(paginate(matching, query.per_page, query.page))
    }

    async fn create_comment(&self, new_comment: &NewComment) -> WpResult<WpComment> {
        let mut state = self.lock()?;
        if !state.therapists.contains_key(&new_comment.post) {
            return Err(WpError::Upstream {
                status: 403,
                message: "Sorry, you are not allowed to create a comment on this post."
                    .to_owned(),
            });
        }
        let id = state.allocate_id();
        let comment = WpComment {
            id,
            post: new_comment.post,
            author: new_comment.author.unwrap_or(0),
            author_name: new_comment.author_name.clone(),
            author_email: new_comment.author_email.clone(),
            content: Rendered {
                rendered: new_comment.content.clone(),
            },
            date: now(),
            status: new_comment.status.clone(),
            acf: CommentFields::default(),
        };
        state.comments.insert(id, comment.clone());
        Ok(comment)
    }

    async fn update_comment(&self, id: u64, update: &CommentUpdate) -> WpResult<WpComment> {
        self.comment_updates.fetch_add(1, Ordering::SeqCst);
        if update.acf.is_some() && self.fail_acf_updates.load(Ordering::SeqCst) {
            return Err(WpError::Upstream {
                status: 500,
                message: "ACF update rejected".to_owned(),
            });
        }
        if update.meta.is_some() && self.fail_meta_updates.load(Ordering::SeqCst) {
            return Err(WpError::Upstream {
                status: 500,
                message: "Meta update rejected".to_owned(),
            });
        }

        let mut state = self.lock()?;
        let comment = state
            .comments
            .get_mut(&id)
            .ok_or_else(|| WpError::NotFound(format!("comment {}", id)))?;
        // Registered meta keys are mirrored into the same fields ACF reads.
        if let Some(patch) = &update.acf {
            patch.apply_to(&mut comment.acf);
        }
        if let Some(patch) = &update.meta {
            patch.apply_to(&mut comment.acf);
        }
        Ok(comment.clone())
    }

    async fn delete_comment(&self, id: u64) -> WpResult<()> {
        let mut state = self.lock()?;
        state
            .comments
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| WpError::NotFound(format!("comment {}", id)))
    }

    async fn upload_media(&self, upload: MediaUpload) -> WpResult<WpMedia> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock()?;
        let id = state.allocate_id();
        let path = format!(
            "{}/{}-{}",
            Utc::now().format("%Y/%m"),
            id,
            upload.filename.replace('/', "_")
        );
        state.media.insert(
            path.clone(),
            StoredMedia {
                content_type: upload.content_type,
                data: upload.data,
            },
        );
        Ok(WpMedia {
            id,
            source_url: format!("{}/wp-content/uploads/{}", MEMORY_SITE_URL, path),
        })
    }

    async fn fetch_media(&self, path: &str) -> WpResult<MediaObject> {
        let state = self.lock()?;
        state
            .media
            .get(path.trim_start_matches('/'))
            .map(|stored| MediaObject {
                content_type: Some(stored.content_type.clone()),
                data: stored.data.clone(),
            })
            .ok_or_else(|| WpError::NotFound(path.to_owned()))
    }

    async fn get_therapist(&self, id: u64) -> WpResult<Therapist> {
        let state = self.lock()?;
        state
            .therapists
            .get(&id)
            .cloned()
            .ok_or_else(|| WpError::NotFound(format!("therapist {}", id)))
    }

    async fn list_therapists(&self, query: &TherapistQuery) -> WpResult<Vec<Therapist>> {
        let state = self.lock()?;
        let search = query.search.as_deref().map(str::to_lowercase);
        let matching: Vec<Therapist> = state
            .therapists
            .values()
            .filter(|t| query.include.is_empty() || query.include.contains(&t.id))
            .filter(|t| {
                search.as_deref().map_or(true, |needle| {
                    t.title.rendered.to_lowercase().contains(needle)
                        || t.content.rendered.to_lowercase().contains(needle)
                })
            })
            .cloned()
            .collect();
        Ok(paginate(matching, query.per_page, query.page))
    }
}
