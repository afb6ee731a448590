mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{MAX_UPLOAD_BYTES, PUBLIC_BASE, TestApp, multipart_body, upload_builder};

mod upload {
    use super::*;

    #[tokio::test]
    async fn upload_returns_public_url_and_lists_image() {
        let app = TestApp::spawn().await;
        let token = app.token("user_a");

        let res = app.upload(Some(&token), "cat.png", b"PNG_DATA").await;

        assert_eq!(res.status, StatusCode::CREATED);
        assert_eq!(res.body["success"], true);
        let url = res.body["url"].as_str().unwrap();
        assert!(url.starts_with(&format!("{PUBLIC_BASE}/files/user_a/")));
        assert!(url.ends_with("-cat.png"));
        assert_eq!(res.body["image"]["userId"], "user_a");

        let list = app.list(Some(&token)).await;
        assert_eq!(list.status, StatusCode::OK);
        let images = list.body["images"].as_array().unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0]["url"], url);
    }

    #[tokio::test]
    async fn other_users_do_not_see_the_upload() {
        let app = TestApp::spawn().await;
        app.upload(Some(&app.token("user_a")), "cat.png", b"PNG").await;

        let list = app.list(Some(&app.token("user_b"))).await;
        assert_eq!(list.status, StatusCode::OK);
        assert!(list.body["images"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn anonymous_upload_is_rejected_without_side_effects() {
        let app = TestApp::spawn().await;

        let res = app.upload(None, "cat.png", b"PNG").await;

        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body["error"], "You must be logged in to upload an image.");
        assert_eq!(app.stored_file_count(), 0);
    }

    #[tokio::test]
    async fn forged_token_is_anonymous() {
        let app = TestApp::spawn().await;
        let forged = image_gallery::identity::jwt::sign(b"not-the-secret", "user_a", 60).unwrap();

        let res = app.upload(Some(&forged), "cat.png", b"PNG").await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_image_field_is_bad_request() {
        let app = TestApp::spawn().await;
        let token = app.token("user_a");

        let res = app
            .upload_field(Some(&token), "caption", None, b"hello")
            .await;

        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.body["error"], "No image provided.");
    }

    #[tokio::test]
    async fn upload_without_storage_is_misconfigured() {
        let app = TestApp::without_storage().await;
        let token = app.token("user_a");

        let res = app.upload(Some(&token), "cat.png", b"PNG").await;

        assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.body["error"], "Image storage is not configured.");
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.token("user_a");
        let data = vec![0u8; MAX_UPLOAD_BYTES + 1];

        let res = app.upload(Some(&token), "big.png", &data).await;

        assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(app.stored_file_count(), 0);
    }

    #[tokio::test]
    async fn file_names_with_inner_dots_are_accepted() {
        let app = TestApp::spawn().await;
        let token = app.token("user_a");

        let res = app.upload(Some(&token), "holiday..final.png", b"PNG").await;

        assert_eq!(res.status, StatusCode::CREATED);
        let url = res.body["url"].as_str().unwrap();
        assert!(url.ends_with("-holiday..final.png"));
        let file = app.get(url.strip_prefix(PUBLIC_BASE).unwrap()).await;
        assert_eq!(file.status, StatusCode::OK);
        assert_eq!(&file.bytes[..], b"PNG");
    }

    #[tokio::test]
    async fn browser_upload_redirects_to_gallery() {
        let app = TestApp::spawn().await;
        let token = app.token("user_a");

        let request = upload_builder(Some(&token))
            .header(header::ACCEPT, "text/html")
            .body(Body::from(multipart_body("image", Some("cat.png"), b"PNG")))
            .unwrap();
        let res = app.send(request).await;

        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.header(header::LOCATION), Some("/management"));
        assert_eq!(app.list(Some(&token)).await.body["images"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn anonymous_browser_upload_redirects_to_sign_in() {
        let app = TestApp::spawn().await;

        let request = upload_builder(None)
            .header(header::ACCEPT, "text/html")
            .body(Body::from(multipart_body("image", Some("cat.png"), b"PNG")))
            .unwrap();
        let res = app.send(request).await;

        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.header(header::LOCATION), Some("/sign-in"));
        assert_eq!(app.stored_file_count(), 0);
    }

    #[tokio::test]
    async fn uploaded_blob_is_served_from_files_route() {
        let app = TestApp::spawn().await;
        let token = app.token("user_a");
        let res = app.upload(Some(&token), "cat.png", b"PNG_DATA").await;
        let url = res.body["url"].as_str().unwrap();

        let file = app.get(url.strip_prefix(PUBLIC_BASE).unwrap()).await;

        assert_eq!(file.status, StatusCode::OK);
        assert_eq!(file.header(header::CONTENT_TYPE), Some("image/png"));
        assert_eq!(&file.bytes[..], b"PNG_DATA");
    }
}

mod delete {
    use super::*;

    async fn upload(app: &TestApp, token: &str) -> (String, String) {
        let res = app.upload(Some(token), "cat.png", b"PNG").await;
        assert_eq!(res.status, StatusCode::CREATED);
        (
            res.body["image"]["id"].to_string(),
            res.body["image"]["path"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn owner_can_delete() {
        let app = TestApp::spawn().await;
        let token = app.token("user_a");
        let (id, path) = upload(&app, &token).await;

        let res = app.delete(Some(&token), &id, &path).await;

        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["success"], true);
        assert_eq!(res.body["blobRemoved"], true);
        assert!(app.list(Some(&token)).await.body["images"].as_array().unwrap().is_empty());
        assert_eq!(app.stored_file_count(), 0);
    }

    #[tokio::test]
    async fn deleting_anothers_image_changes_nothing() {
        let app = TestApp::spawn().await;
        let owner = app.token("user_b");
        let (id, path) = upload(&app, &owner).await;

        let res = app.delete(Some(&app.token("user_a")), &id, &path).await;

        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(app.list(Some(&owner)).await.body["images"].as_array().unwrap().len(), 1);
        assert_eq!(app.stored_file_count(), 1);
    }

    #[tokio::test]
    async fn second_delete_is_a_no_op() {
        let app = TestApp::spawn().await;
        let token = app.token("user_a");
        let (id, path) = upload(&app, &token).await;

        assert_eq!(app.delete(Some(&token), &id, &path).await.status, StatusCode::OK);
        assert_eq!(
            app.delete(Some(&token), &id, &path).await.status,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn invalid_ids_are_rejected() {
        let app = TestApp::spawn().await;
        let token = app.token("user_a");

        for id in ["0", "-3", "abc"] {
            let res = app.delete(Some(&token), id, "user_a/x.png").await;
            assert_eq!(res.status, StatusCode::BAD_REQUEST, "id {id:?}");
        }
    }

    #[tokio::test]
    async fn anonymous_delete_is_unauthorized() {
        let app = TestApp::spawn().await;
        let res = app.delete(None, "1", "user_a/x.png").await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn browser_form_post_redirects_to_gallery() {
        let app = TestApp::spawn().await;
        let token = app.token("user_a");
        let (id, path) = upload(&app, &token).await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/images/delete")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::ACCEPT, "text/html")
            .header(header::COOKIE, format!("__session={token}"))
            .body(Body::from(format!("imageId={id}&imagePath=ignored")))
            .unwrap();
        let res = app.send(request).await;

        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.header(header::LOCATION), Some("/management"));
        assert!(app.list(Some(&token)).await.body["images"].as_array().unwrap().is_empty());
    }
}

mod gallery {
    use super::*;

    #[tokio::test]
    async fn anonymous_listing_is_unauthorized() {
        let app = TestApp::spawn().await;
        assert_eq!(app.list(None).await.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn listing_is_newest_first() {
        let app = TestApp::spawn().await;
        let token = app.token("user_a");
        app.upload(Some(&token), "first.png", b"1").await;
        app.upload(Some(&token), "second.png", b"2").await;

        let list = app.list(Some(&token)).await;
        let images = list.body["images"].as_array().unwrap();
        assert!(images[0]["path"].as_str().unwrap().ends_with("-second.png"));
        assert!(images[1]["path"].as_str().unwrap().ends_with("-first.png"));
    }

    #[tokio::test]
    async fn etag_short_circuits_until_a_mutation() {
        let app = TestApp::spawn().await;
        let token = app.token("user_a");

        let first = app.list(Some(&token)).await;
        let etag = first.header(header::ETAG).unwrap().to_string();

        let conditional = |tag: String| {
            Request::builder()
                .uri("/api/images")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::IF_NONE_MATCH, tag)
                .body(Body::empty())
                .unwrap()
        };

        let cached = app.send(conditional(etag.clone())).await;
        assert_eq!(cached.status, StatusCode::NOT_MODIFIED);

        app.upload(Some(&token), "cat.png", b"PNG").await;

        let fresh = app.send(conditional(etag.clone())).await;
        assert_eq!(fresh.status, StatusCode::OK);
        assert_ne!(fresh.header(header::ETAG), Some(etag.as_str()));
        assert_eq!(fresh.body["images"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn page_redirects_anonymous_visitors_to_sign_in() {
        let app = TestApp::spawn().await;
        let res = app.get("/management").await;

        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.header(header::LOCATION), Some("/sign-in"));
    }

    #[tokio::test]
    async fn upload_page_requires_sign_in() {
        let app = TestApp::spawn().await;
        let res = app.get("/").await;

        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.header(header::LOCATION), Some("/sign-in"));
    }

    #[tokio::test]
    async fn upload_page_renders_multipart_form() {
        let app = TestApp::spawn().await;
        let token = app.token("user_a");

        let request = Request::builder()
            .uri("/")
            .header(header::COOKIE, format!("__session={token}"))
            .body(Body::empty())
            .unwrap();
        let res = app.send(request).await;
        let html = String::from_utf8(res.bytes.to_vec()).unwrap();

        assert_eq!(res.status, StatusCode::OK);
        assert!(html.contains("action=\"/api/images\" enctype=\"multipart/form-data\""));
        assert!(html.contains("name=\"image\""));
        assert!(html.contains("href=\"/management\""));
    }

    #[tokio::test]
    async fn page_renders_delete_controls() {
        let app = TestApp::spawn().await;
        let token = app.token("user_a");
        let up = app.upload(Some(&token), "cat.png", b"PNG").await;

        let request = Request::builder()
            .uri("/management")
            .header(header::COOKIE, format!("__session={token}"))
            .body(Body::empty())
            .unwrap();
        let res = app.send(request).await;
        let html = String::from_utf8(res.bytes.to_vec()).unwrap();

        assert_eq!(res.status, StatusCode::OK);
        assert!(html.contains(&format!(
            "name=\"imageId\" value=\"{}\"",
            up.body["image"]["id"]
        )));
        assert!(html.contains(up.body["url"].as_str().unwrap()));
        assert!(html.contains("<a href=\"/\">Upload an image</a>"));
    }
}

mod probes {
    use super::*;

    #[tokio::test]
    async fn healthz_is_ok() {
        let app = TestApp::spawn().await;
        let res = app.get("/healthz").await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["status"], "ok");
    }

    #[tokio::test]
    async fn readyz_reports_storage_state() {
        let app = TestApp::without_storage().await;
        let res = app.get("/readyz").await;

        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["checks"]["database"]["ok"], true);
        assert_eq!(res.body["checks"]["storage"]["ok"], false);
    }

    #[tokio::test]
    async fn unknown_file_is_not_found() {
        let app = TestApp::spawn().await;
        assert_eq!(app.get("/files/user_a/missing.png").await.status, StatusCode::NOT_FOUND);
    }
}
