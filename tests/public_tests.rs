
use image_host::entities::owner::Owner;
use regex::Regex;
use reqwest::{header, StatusCode};
use serde_json::{json, Value};
use test_utils::*;
use uuid::Uuid;

async fn upload_one(app: &TestApp, owner: &TestOwner, file: TestFile) -> Value {
    let report: Value = app.upload(&owner.token, vec![file]).await.json().await.unwrap();
    report["created"][0].clone()
}

#[actix_rt::test]
async fn public_image_is_served_by_uuid_to_anyone() {
    let app = TestApp::spawn().await;
    let owner = app.create_owner(0);
    let asset = upload_one(&app, &owner, TestFile::new("cat photo.png", "image/png", PNG_1X1)).await;
    let uuid = asset["uuid"].as_str().unwrap();

    let response = app.get(&format!("/i/{}", uuid), None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert!(response.headers()[header::CACHE_CONTROL].to_str().unwrap().contains("public"));
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "inline; filename*=UTF-8''cat%20photo.png"
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), PNG_1X1);

    let view: Value = app.get(&format!("/api/i/{}", uuid), None).await.json().await.unwrap();
    assert_eq!(view["image"]["id"], asset["id"]);
    assert_eq!(view["image"]["view_count"], 2);
}

#[actix_rt::test]
async fn private_image_is_only_visible_to_its_owner() {
    let app = TestApp::spawn().await;
    let owner = app.create_owner(0);
    let stranger = app.create_owner(0);
    let asset = upload_one(&app, &owner, TestFile::new("secret.png", "image/png", PNG_1X1)).await;
    let id = asset["id"].as_i64().unwrap();
    let uuid = asset["uuid"].as_str().unwrap();

    let patched = app
        .patch_json(&format!("/api/images/{}", id), &owner.token, json!({ "is_public": false }))
        .await;
    assert_eq!(patched.status(), StatusCode::OK);

    for path in [format!("/i/{}", uuid), format!("/api/i/{}", uuid)] {
        assert_eq!(app.get(&path, None).await.status(), StatusCode::FORBIDDEN);
        assert_eq!(app.get(&path, Some(&stranger.token)).await.status(), StatusCode::FORBIDDEN);
        assert_eq!(app.get(&path, Some("not-a-token")).await.status(), StatusCode::FORBIDDEN);
        assert_eq!(app.get(&path, Some(&owner.token)).await.status(), StatusCode::OK);
    }

    let response = app.get(&format!("/i/{}", uuid), Some(&owner.token)).await;
    assert!(response.headers()[header::CACHE_CONTROL].to_str().unwrap().contains("private"));
}

#[actix_rt::test]
async fn disabled_owner_loses_access_to_private_images() {
    let app = TestApp::spawn().await;
    let owner = app.insert_owner(Owner::new(Uuid::new_v4(), "soon-disabled", 0));
    let asset = upload_one(&app, &owner, TestFile::new("secret.png", "image/png", PNG_1X1)).await;
    let uuid = asset["uuid"].as_str().unwrap();
    app.patch_json(&format!("/api/images/{}", asset["id"]), &owner.token, json!({ "is_public": false }))
        .await;

    let mut disabled = Owner::new(owner.id, "soon-disabled", 0);
    disabled.status = "disabled".to_string();
    app.repo.insert_owner(disabled);

    for path in [format!("/i/{}", uuid), format!("/api/i/{}", uuid)] {
        assert_eq!(app.get(&path, Some(&owner.token)).await.status(), StatusCode::FORBIDDEN);
    }
}

#[actix_rt::test]
async fn deleted_image_is_gone_and_releases_quota() {
    let app = TestApp::spawn().await;
    let owner = app.create_owner(1000);
    let asset = upload_one(&app, &owner, TestFile::png_of_size("gone.png", 500, 7)).await;
    let id = asset["id"].as_i64().unwrap();
    let uuid = asset["uuid"].as_str().unwrap();
    let stored_path = app.repo.all_assets_for(&owner.id)[0].file_path.clone();

    let response = app.delete(&format!("/api/images/{}", id), &owner.token).await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(app.get(&format!("/i/{}", uuid), Some(&owner.token)).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get(&format!("/api/i/{}", uuid), None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get(&format!("/api/images/{}", id), Some(&owner.token)).await.status(), StatusCode::NOT_FOUND);
    assert!(!app.storage.path().join(stored_path).exists());

    let quota: Value = app.get("/api/user/quota", Some(&owner.token)).await.json().await.unwrap();
    assert_eq!(quota["used"], 0);
}

#[actix_rt::test]
async fn unknown_and_malformed_identifiers_are_not_found() {
    let app = TestApp::spawn().await;

    let unknown = uuid::Uuid::new_v4();
    assert_eq!(app.get(&format!("/i/{}", unknown), None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get("/i/not-a-uuid", None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get("/api/i/not-a-uuid", None).await.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn concurrent_views_are_all_counted() {
    let app = TestApp::spawn().await;
    let owner = app.create_owner(0);
    let asset = upload_one(&app, &owner, TestFile::new("hot.png", "image/png", PNG_1X1)).await;
    let path = format!("/i/{}", asset["uuid"].as_str().unwrap());

    let requests = (0..20).map(|_| app.get(&path, None));
    let responses = futures::future::join_all(requests).await;
    assert!(responses.iter().all(|r| r.status() == StatusCode::OK));

    let view: Value = app
        .get(&format!("/api/images/{}", asset["id"]), Some(&owner.token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(view["view_count"], 20);
}

#[actix_rt::test]
async fn links_point_at_the_public_identifier() {
    let app = TestApp::spawn().await;
    let owner = app.create_owner(0);
    let asset = upload_one(&app, &owner, TestFile::new("cat.png", "image/png", PNG_1X1)).await;
    let uuid = asset["uuid"].as_str().unwrap();

    let response: Value = app
        .get(&format!("/api/images/{}/links", asset["id"]), Some(&owner.token))
        .await
        .json()
        .await
        .unwrap();
    let links = &response["links"];
    let url = links["url"].as_str().unwrap();

    assert!(url.ends_with(&format!("/i/{}", uuid)));
    assert_eq!(links["markdown"], format!("![cat.png]({})", url));
    assert_eq!(links["bbcode"], format!("[img]{}[/img]", url));

    let src = Regex::new(r#"src="([^"]+)""#).unwrap();
    let html = links["html"].as_str().unwrap();
    assert_eq!(&src.captures(html).unwrap()[1], url);

    let path = url.trim_start_matches(&app.address);
    let served = app.get(path, None).await;
    assert_eq!(served.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn random_endpoints_only_pick_public_images() {
    let app = TestApp::spawn().await;
    let owner = app.create_owner(0);

    assert_eq!(app.get("/api/random", None).await.status(), StatusCode::NOT_FOUND);

    let hidden = upload_one(&app, &owner, TestFile::png_of_size("hidden.png", 100, 1)).await;
    app.patch_json(&format!("/api/images/{}", hidden["id"]), &owner.token, json!({ "is_public": false }))
        .await;
    let shown = upload_one(&app, &owner, TestFile::png_of_size("shown.png", 100, 2)).await;

    let picked: Value = app.get("/api/random", None).await.json().await.unwrap();
    assert_eq!(picked["image"]["id"], shown["id"]);

    let file = app.get("/api/random/image", None).await;
    assert_eq!(file.status(), StatusCode::OK);
    assert_eq!(file.headers()["X-Image-UUID"], shown["uuid"].as_str().unwrap());

    let redirect = app.get("/api/random/redirect", None).await;
    assert_eq!(redirect.status(), StatusCode::FOUND);
    let location = redirect.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.ends_with(&format!("/i/{}", shown["uuid"].as_str().unwrap())));

    let filtered = app
        .get(&format!("/api/random?user_id={}", uuid::Uuid::new_v4()), None)
        .await;
    assert_eq!(filtered.status(), StatusCode::NOT_FOUND);
}
