
use reqwest::StatusCode;
use serde_json::{json, Value};
use test_utils::*;

#[actix_rt::test]
async fn upload_stores_file_and_reports_it_as_created() {
    let app = TestApp::spawn().await;
    let owner = app.create_owner(0);

    let response = app.upload(&owner.token, vec![TestFile::new("cat.png", "image/png", PNG_1X1)]).await;

    assert_eq!(response.status(), StatusCode::OK);
    let report: Value = response.json().await.unwrap();
    assert_eq!(report["created"].as_array().unwrap().len(), 1);
    assert_eq!(report["deduped"].as_array().unwrap().len(), 0);

    let asset = &report["created"][0];
    assert_eq!(asset["original_name"], "cat.png");
    assert_eq!(asset["mime_type"], "image/png");
    assert_eq!(asset["file_size"], PNG_1X1.len());
    assert_eq!((asset["width"].as_i64(), asset["height"].as_i64()), (Some(1), Some(1)));
    assert!(asset.get("file_path").is_none());

    let stored = app.repo.all_assets_for(&owner.id);
    assert_eq!(stored.len(), 1);
    assert!(app.storage.path().join(&stored[0].file_path).exists());
}

#[actix_rt::test]
async fn identical_content_is_deduplicated_per_owner() {
    let app = TestApp::spawn().await;
    let owner = app.create_owner(0);
    let other = app.create_owner(0);

    let first: Value = app
        .upload(&owner.token, vec![TestFile::new("a.png", "image/png", PNG_1X1)])
        .await
        .json()
        .await
        .unwrap();
    let second: Value = app
        .upload(&owner.token, vec![TestFile::new("renamed.png", "image/png", PNG_1X1)])
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(second["created"].as_array().unwrap().len(), 0);
    assert_eq!(second["deduped"][0]["id"], first["created"][0]["id"]);
    assert_eq!(app.repo.all_assets_for(&owner.id).len(), 1);

    let quota: Value = app.get("/api/user/quota", Some(&owner.token)).await.json().await.unwrap();
    assert_eq!(quota["used"], PNG_1X1.len());

    let foreign: Value = app
        .upload(&other.token, vec![TestFile::new("a.png", "image/png", PNG_1X1)])
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(foreign["created"].as_array().unwrap().len(), 1);
    assert_ne!(foreign["created"][0]["id"], first["created"][0]["id"]);
}

#[actix_rt::test]
async fn quota_boundary_is_enforced_per_item() {
    let app = TestApp::spawn().await;
    let owner = app.create_owner(1000);

    let seeded: Value = app
        .upload(&owner.token, vec![TestFile::png_of_size("base.png", 900, 1)])
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(seeded["created"].as_array().unwrap().len(), 1);

    let rejected: Value = app
        .upload(&owner.token, vec![TestFile::png_of_size("big.png", 101, 2)])
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(rejected["created"].as_array().unwrap().len(), 0);
    assert_eq!(rejected["errors"][0]["kind"], "quota_exceeded");
    assert_eq!(
        rejected["errors"][0]["quota"],
        json!({ "used": 900, "quota": 1000, "remaining": 100, "attempted": 101 })
    );

    let fits: Value = app
        .upload(&owner.token, vec![TestFile::png_of_size("fits.png", 100, 3)])
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(fits["created"].as_array().unwrap().len(), 1);

    let full: Value = app
        .upload(&owner.token, vec![TestFile::new("one.png", "image/png", vec![0x89])])
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(full["errors"][0]["kind"], "quota_exceeded");
    assert_eq!(full["errors"][0]["quota"]["remaining"], 0);

    let quota: Value = app.get("/api/user/quota", Some(&owner.token)).await.json().await.unwrap();
    assert_eq!(quota["used"], 1000);
    assert_eq!(quota["remaining"], 0);
}

#[actix_rt::test]
async fn batch_reports_each_item_independently() {
    let app = TestApp::spawn().await;
    let owner = app.create_owner(0);

    let report: Value = app
        .upload(&owner.token, vec![
            TestFile::new("ok.png", "image/png", PNG_1X1),
            TestFile::new("notes.txt", "text/plain", b"hello".to_vec()),
            TestFile::new("empty.png", "image/png", Vec::new()),
            TestFile::png_of_size("huge.png", 1024 * 1024 + 1, 9),
            TestFile::png_of_size("second.png", 200, 4),
        ])
        .await
        .json()
        .await
        .unwrap();

    let created: Vec<&str> = report["created"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["original_name"].as_str().unwrap())
        .collect();
    assert_eq!(created, ["ok.png", "second.png"]);

    let kinds: Vec<(&str, &str)> = report["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| (e["file_name"].as_str().unwrap(), e["kind"].as_str().unwrap()))
        .collect();
    assert!(report["errors"].as_array().unwrap().iter().all(|e| e.get("quota").is_none()));
    assert_eq!(kinds, [
        ("notes.txt", "unsupported_type"),
        ("empty.png", "empty_file"),
        ("huge.png", "file_too_large"),
    ]);
    assert_eq!(report["message"], "Successfully uploaded 2 file(s)");
}

#[actix_rt::test]
async fn octet_stream_uploads_are_sniffed() {
    let app = TestApp::spawn().await;
    let owner = app.create_owner(0);

    let report: Value = app
        .upload(&owner.token, vec![TestFile::new("blob", "application/octet-stream", PNG_1X1)])
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(report["created"][0]["mime_type"], "image/png");
}

#[actix_rt::test]
async fn upload_without_files_is_rejected() {
    let app = TestApp::spawn().await;
    let owner = app.create_owner(0);

    let form = reqwest::multipart::Form::new().text("note", "no files here");
    let response = app
        .client
        .post(app.url("/api/images/upload"))
        .bearer_auth(&owner.token)
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
