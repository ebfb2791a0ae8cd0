//! Profile photos and the uploads proxy.
//!
//! Uploads are checked here before anything is sent to WordPress. Media URLs
//! handed to clients point at this service (`/api/media/...`) instead of the
//! WordPress host, which is not publicly reachable.

use crate::web::error::ApiError;
use mime::Mime;
use url::Url;

/// Image types accepted for profile photos. `image/jpg` is not a registered
/// type but some browsers send it.
pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

const UPLOADS_SEGMENT: &str = "/wp-content/uploads/";
/// Public prefix of proxied media.
pub const MEDIA_ROUTE: &str = "/api/media/";

/// Check a declared content type against [`ALLOWED_IMAGE_TYPES`] and
/// return its normalised essence.
pub fn check_image_type(content_type: Option<&str>) -> Result<String, ApiError> {
    let rejected = || {
        ApiError::UnsupportedMediaType(
            "Only JPEG, PNG and WebP images are allowed".to_owned(),
        )
    };

    let mime: Mime = content_type
        .ok_or_else(rejected)?
        .trim()
        .parse()
        .map_err(|_| rejected())?;
    let essence = mime.essence_str().to_ascii_lowercase();

    if ALLOWED_IMAGE_TYPES.contains(&essence.as_str()) {
        Ok(essence)
    } else {
        Err(rejected())
    }
}

/// Reject anything larger than `max_bytes`.
pub fn check_size(len: usize, max_bytes: usize) -> Result<(), ApiError> {
    if len > max_bytes {
        Err(ApiError::PayloadTooLarge(format!(
            "Image must be at most {} MB",
            max_bytes / (1024 * 1024)
        )))
    } else {
        Ok(())
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

/// File name used for a user's uploaded photo.
pub fn photo_filename(user_id: u64, content_type: &str) -> String {
    format!(
        "profile-{}-{}.{}",
        user_id,
        uuid::Uuid::new_v4().simple(),
        extension_for(content_type)
    )
}

/// Rewrite a WordPress uploads URL to the proxied `/api/media/<tail>` form.
///
/// URLs that do not point into uploads are returned unchanged.
pub fn rewrite_media_url(source_url: &str) -> String {
    let path = match Url::parse(source_url) {
        Ok(url) => url.path().to_owned(),
        // Already relative.
        Err(_) => source_url.to_owned(),
    };

    match path.find(UPLOADS_SEGMENT) {
        Some(index) => {
            let tail = &path[index + UPLOADS_SEGMENT.len()..];
            format!("{}{}", MEDIA_ROUTE, tail)
        }
        None => source_url.to_owned(),
    }
}

/// Whether a requested uploads path is safe to pass to WordPress.
pub fn is_safe_media_path(tail: &str) -> bool {
    !tail.is_empty()
        && !tail.starts_with('/')
        && !tail.contains('\\')
        && tail.split('/').all(|segment| !segment.is_empty() && segment != ".." && segment != ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_image_types() {
        assert_eq!(check_image_type(Some("image/png")).unwrap(), "image/png");
        assert_eq!(check_image_type(Some("IMAGE/JPEG")).unwrap(), "image/jpeg");
        assert_eq!(check_image_type(Some("image/jpg")).unwrap(), "image/jpg");
        assert_eq!(
            check_image_type(Some("image/webp; charset=binary")).unwrap(),
            "image/webp"
        );
    }

    #[test]
    fn test_rejected_image_types() {
        for bad in [Some("image/gif"), Some("application/pdf"), Some("garbage"), None] {
            assert!(matches!(
                check_image_type(bad),
                Err(ApiError::UnsupportedMediaType(_))
            ));
        }
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let max = 5 * 1024 * 1024;
        assert!(check_size(max, max).is_ok());
        assert!(matches!(
            check_size(max + 1, max),
            Err(ApiError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn test_rewrite_media_url() {
        assert_eq!(
            rewrite_media_url("https://cms.example.com/wp-content/uploads/2024/05/a.png"),
            "/api/media/2024/05/a.png"
        );
        assert_eq!(
            rewrite_media_url("/wp-content/uploads/2024/05/a.png"),
            "/api/media/2024/05/a.png"
        );
        assert_eq!(
            rewrite_media_url("https://cdn.example.com/a.png"),
            "https://cdn.example.com/a.png"
        );
    }

    #[test]
    fn test_safe_media_path() {
        assert!(is_safe_media_path("2024/05/a.png"));
        assert!(!is_safe_media_path("../wp-config.php"));
        assert!(!is_safe_media_path("2024//a.png"));
        assert!(!is_safe_media_path(""));
        assert!(!is_safe_media_path("/etc/passwd"));
    }

    #[test]
    fn test_photo_filename_extension() {
        assert!(photo_filename(3, "image/webp").starts_with("profile-3-"));
        assert!(photo_filename(3, "image/webp").ends_with(".webp"));
        assert!(photo_filename(3, "image/jpg").ends_with(".jpg"));
    }
}
