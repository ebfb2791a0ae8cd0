//! Favorite therapists.
//!
//! Stored on the user as the ACF ID list `favorites_therapists`. Every change
//! re-reads the user, edits the list and writes the whole list back.

use crate::acf::IdList;
use crate::wordpress::{Backend, UserFieldsPatch, UserUpdate, WpResult};

/// Result of an add or remove.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FavoritesChange {
    /// False when the list already was in the requested state.
    pub changed: bool,
    pub favorites: Vec<u64>,
}

pub async fn list(backend: &Backend, user_id: u64) -> WpResult<Vec<u64>> {
    let user = backend.get_user(user_id).await?;
    Ok(user.acf.favorites_therapists.to_ids())
}

pub async fn add(backend: &Backend, user_id: u64, therapist_id: u64) -> WpResult<FavoritesChange> {
    change(backend, user_id, |list| list.insert(therapist_id.to_string())).await
}

pub async fn remove(
    backend: &Backend,
    user_id: u64,
    therapist_id: u64,
) -> WpResult<FavoritesChange> {
    change(backend, user_id, |list| list.remove(therapist_id.to_string())).await
}

async fn change<F>(backend: &Backend, user_id: u64, edit: F) -> WpResult<FavoritesChange>
where
    F: FnOnce(&mut IdList) -> bool,
{
    let user = backend.get_user(user_id).await?;
    let mut favorites = user.acf.favorites_therapists;

    if !edit(&mut favorites) {
        // Nothing to write.
        return Ok(FavoritesChange {
            changed: false,
            favorites: favorites.to_ids(),
        });
    }

    let update = UserUpdate {
        acf: Some(UserFieldsPatch {
            favorites_therapists: Some(favorites),
            ..Default::default()
        }),
        ..Default::default()
    };
    let updated = backend.update_user(user_id, &update).await?;

    Ok(FavoritesChange {
        changed: true,
        favorites: updated.acf.favorites_therapists.to_ids(),
    })
}
