//! Therapist browse and detail endpoints. Read-only.

use crate::app_config;
use crate::media::rewrite_media_url;
use crate::middleware::ClientCtx;
use crate::reviews::RatingSummary;
use crate::web::error::ApiError;
use crate::wordpress::{Backend, CommentQuery, Therapist, TherapistQuery};
use actix_web::{get, web, HttpResponse};
use serde::{Deserialize, Serialize};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(list_therapists).service(view_therapist);
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TherapistListQuery {
    search: Option<String>,
    specialty: Option<String>,
    city: Option<String>,
    page: Option<u32>,
    per_page: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TherapistView {
    id: u64,
    slug: String,
    name: String,
    description: String,
    specialties: Vec<String>,
    city: String,
    photo: Option<String>,
    price: Option<String>,
    is_favorite: bool,
}

impl TherapistView {
    fn new(therapist: &Therapist, favorite: bool) -> Self {
        Self {
            id: therapist.id,
            slug: therapist.slug.clone(),
            name: therapist.title.rendered.clone(),
            description: therapist.content.rendered.clone(),
            specialties: specialties(therapist),
            city: therapist.acf.city.trim().to_owned(),
            photo: therapist.acf.photo.as_deref().map(rewrite_media_url),
            price: therapist.acf.price.clone(),
            is_favorite: favorite,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TherapistListResponse {
    success: bool,
    therapists: Vec<TherapistView>,
    page: u32,
    per_page: u32,
}

#[derive(Serialize)]
struct TherapistResponse {
    success: bool,
    therapist: TherapistView,
    summary: RatingSummary,
}

fn specialties(therapist: &Therapist) -> Vec<String> {
    therapist
        .acf
        .specialties
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

/// Whether a therapist passes the specialty and city filters.
fn matches_filters(therapist: &Therapist, specialty: Option<&str>, city: Option<&str>) -> bool {
    let specialty_ok = specialty.map_or(true, |wanted| {
        specialties(therapist)
            .iter()
            .any(|s| s.to_lowercase().contains(wanted))
    });
    let city_ok = city.map_or(true, |wanted| {
        therapist.acf.city.trim().to_lowercase() == wanted
    });
    specialty_ok && city_ok
}

#[get("/api/therapists")]
async fn list_therapists(
    client: ClientCtx,
    backend: web::Data<Backend>,
    query: web::Query<TherapistListQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query
        .per_page
        .unwrap_or_else(|| app_config::limits().therapists_per_page)
        .clamp(1, 100);

    let therapists = backend
        .list_therapists(&TherapistQuery {
            search: non_blank(&query.search),
            include: Vec::new(),
            per_page,
            page,
        })
        .await?;

    let specialty = non_blank(&query.specialty);
    let city = non_blank(&query.city);
    let favorites = client
        .get_user()
        .map(|user| user.acf.favorites_therapists.clone())
        .unwrap_or_default();

    Ok(HttpResponse::Ok().json(TherapistListResponse {
        success: true,
        therapists: therapists
            .iter()
            .filter(|t| matches_filters(t, specialty.as_deref(), city.as_deref()))
            .map(|t| TherapistView::new(t, favorites.contains(t.id.to_string())))
            .collect(),
        page,
        per_page,
    }))
}

/// A therapist with the summary of their approved reviews
#[get("/api/therapists/{therapist_id}")]
async fn view_therapist(
    client: ClientCtx,
    backend: web::Data<Backend>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let therapist = backend.get_therapist(path.into_inner()).await?;
    let reviews = backend
        .list_comments(&CommentQuery::for_post(therapist.id))
        .await?;
    let favorite = client.get_user().map_or(false, |user| {
        user.acf
            .favorites_therapists
            .contains(therapist.id.to_string())
    });

    Ok(HttpResponse::Ok().json(TherapistResponse {
        success: true,
        therapist: TherapistView::new(&therapist, favorite),
        summary: RatingSummary::of(&reviews),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wordpress::{Rendered, TherapistFields};

    fn therapist(specialties: &str, city: &str) -> Therapist {
        Therapist {
            id: 1,
            slug: "t".to_string(),
            title: Rendered::default(),
            content: Rendered::default(),
            acf: TherapistFields {
                specialties: specialties.to_string(),
                city: city.to_string(),
                photo: None,
                price: None,
            },
        }
    }

    #[test]
    fn test_filters() {
        let t = therapist("Anxiety, Couples therapy", " Lisbon ");
        assert!(matches_filters(&t, None, None));
        assert!(matches_filters(&t, Some("couples"), Some("lisbon")));
        assert!(!matches_filters(&t, Some("grief"), None));
        assert!(!matches_filters(&t, None, Some("porto")));
    }
}
