/// HTTP gallery serving the captured pump snapshots
use std::path::{Path, PathBuf};

use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use log::{info, warn};
use serde::Serialize;

use crate::camera::RECENT_IMAGE;

struct GalleryState {
    image_dir: PathBuf,
}

#[derive(Serialize)]
struct ImageList {
    images: Vec<String>,
}

/// List the basenames of all .jpg files in the image directory, sorted so
/// the timestamped history reads chronologically.
fn list_jpgs(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(".jpg"))
            .collect(),
        Err(e) => {
            warn!("Failed to read image directory {}: {}", dir.display(), e);
            Vec::new()
        }
    };
    names.sort();
    names
}

/// Accept only plain .jpg basenames so a lookup can never escape the image
/// directory.
fn is_safe_basename(name: &str) -> bool {
    !name.is_empty()
        && name.ends_with(".jpg")
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..")
}

fn serve_jpeg(path: &Path) -> HttpResponse {
    match std::fs::read(path) {
        Ok(bytes) => HttpResponse::Ok().content_type("image/jpeg").body(bytes),
        Err(_) => HttpResponse::NotFound().body("no such image"),
    }
}

async fn gallery(state: web::Data<GalleryState>) -> impl Responder {
    let mut cards = String::new();
    for name in list_jpgs(&state.image_dir) {
        cards.push_str(&format!(
            concat!(
                "        <div>\n",
                "            <img src=\"/images/{0}\" alt=\"{0}\">\n",
                "            <p>{0}</p>\n",
                "        </div>\n"
            ),
            name
        ));
    }
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(GALLERY_TEMPLATE.replace("{cards}", &cards))
}

async fn recent(state: web::Data<GalleryState>) -> impl Responder {
    serve_jpeg(&state.image_dir.join(RECENT_IMAGE))
}

async fn image(state: web::Data<GalleryState>, path: web::Path<String>) -> impl Responder {
    let name = path.into_inner();
    if !is_safe_basename(&name) {
        return HttpResponse::BadRequest().body("invalid image name");
    }
    serve_jpeg(&state.image_dir.join(name))
}

async fn list_images(state: web::Data<GalleryState>) -> impl Responder {
    web::Json(ImageList {
        images: list_jpgs(&state.image_dir),
    })
}

/// Run the gallery server until the process exits. Spawned as a background
/// task so network I/O never blocks sensor polling.
pub async fn serve(image_dir: PathBuf, port: u16) -> std::io::Result<()> {
    info!("Gallery listening on port {}", port);
    let state = web::Data::new(GalleryState { image_dir });
    // Bind in its own statement so the non-Send builder is dropped before the await
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/", web::get().to(gallery))
            .route("/recent.jpg", web::get().to(recent))
            .route("/images/{filename}", web::get().to(image))
            .route("/list_images", web::get().to(list_images))
    })
    .bind(("0.0.0.0", port))?
    .run();
    server.await
}

const GALLERY_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Image Gallery</title>
    <style>
        body { font-family: Arial, sans-serif; }
        .gallery { display: flex; flex-wrap: wrap; gap: 20px; }
        .gallery img { max-width: 200px; height: auto; }
        .gallery div { text-align: center; }
    </style>
</head>
<body>
    <h2>Image Gallery</h2>
    <div class="gallery">
{cards}    </div>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_future_can_move_to_a_spawned_task() {
        fn require_send<T: Send>(_: T) {}

        require_send(serve(PathBuf::from("/tmp"), 0));
    }

    #[test]
    fn safe_basenames_are_accepted() {
        assert!(is_safe_basename("recent.jpg"));
        assert!(is_safe_basename("29082026143015_ON.jpg"));
    }

    #[test]
    fn traversal_attempts_are_rejected() {
        assert!(!is_safe_basename("../etc/passwd"));
        assert!(!is_safe_basename("images/../../secret.jpg"));
        assert!(!is_safe_basename("/etc/passwd.jpg"));
        assert!(!is_safe_basename("a\\b.jpg"));
        assert!(!is_safe_basename("notes.txt"));
        assert!(!is_safe_basename(""));
    }

    #[test]
    fn image_list_serializes_to_the_documented_shape() {
        let list = ImageList {
            images: vec!["recent.jpg".to_string(), "29082026143015_ON.jpg".to_string()],
        };
        assert_eq!(
            serde_json::to_string(&list).unwrap(),
            r#"{"images":["recent.jpg","29082026143015_ON.jpg"]}"#
        );
    }

    #[test]
    fn listing_skips_non_jpg_entries() {
        let dir = std::env::temp_dir().join(format!("soilwatch-gallery-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("b.jpg"), b"x").unwrap();
        std::fs::write(dir.join("a.jpg"), b"x").unwrap();
        std::fs::write(dir.join("notes.txt"), b"x").unwrap();

        let names = list_jpgs(&dir);
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(names, vec!["a.jpg".to_string(), "b.jpg".to_string()]);
    }
}
