use std::sync::Arc;

use tempfile::TempDir;

use devteam::attachment::AttachmentSet;
use devteam::backend::mock::MockBackend;
use devteam::config::{Settings, Timings};
use devteam::dispatch::{DispatchContext, DispatchRequest, Dispatcher};
use devteam::sink::{ResultStore, default_export_name};
use devteam::team::{Mode, TeamId};

async fn store_with(teams: &[TeamId]) -> ResultStore {
    let d = Dispatcher::new(Arc::new(MockBackend::new()), &Settings::default())
        .with_timings(Timings::immediate());
    let ctx = DispatchContext::new();
    let mut store = ResultStore::new();
    for team in teams {
        let resp = d
            .dispatch(&ctx, &DispatchRequest::new("question", *team, Mode::Options))
            .await
            .unwrap();
        store.push(resp);
    }
    store
}

#[tokio::test]
async fn export_appends_md_and_writes_headings() {
    let dir = TempDir::new().unwrap();
    let store = store_with(&[TeamId::One, TeamId::Four]).await;

    let written = store.export(&dir.path().join("answers")).unwrap();
    assert_eq!(written, dir.path().join("answers.md"));

    let text = std::fs::read_to_string(&written).unwrap();
    assert!(text.starts_with("Team 1 Response:\n\n# DEEPSEEK R1\n\n\n\n"));
    assert!(text.contains("\nTeam 4 Response:\n\n# GEMINI-2.5-PRO\n\n\n\ngoogle/gemini-2.5-pro says hi"));
    assert!(!text.contains("<span"));
}

#[tokio::test]
async fn export_keeps_existing_md_extension() {
    let dir = TempDir::new().unwrap();
    let store = store_with(&[TeamId::Two]).await;
    let written = store.export(&dir.path().join("out.md")).unwrap();
    assert_eq!(written, dir.path().join("out.md"));
    assert!(written.exists());
}

#[tokio::test]
async fn export_into_missing_directory_fails() {
    let dir = TempDir::new().unwrap();
    let store = store_with(&[TeamId::Two]).await;
    let err = store
        .export(&dir.path().join("nope").join("out"))
        .unwrap_err();
    assert!(err.to_string().contains("failed to write"));
}

#[tokio::test]
async fn default_name_follows_store_order() {
    let store = store_with(&[TeamId::Three, TeamId::One]).await;
    assert_eq!(default_export_name(store.responses()), "Team3_1_Responses");
}

#[tokio::test]
async fn attachment_origin_is_recorded_on_the_response() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("notes.txt");
    std::fs::write(&file, "remember this").unwrap();
    let missing = dir.path().join("gone.txt");

    let mut set = AttachmentSet::new();
    set.load_path(&file).await.unwrap();
    set.load_path(&missing).await.unwrap();

    let backend = Arc::new(MockBackend::new());
    let d = Dispatcher::new(backend.clone(), &Settings::default())
        .with_timings(Timings::immediate());
    let req = DispatchRequest::new("use the notes", TeamId::One, Mode::Eco)
        .with_attachments(set.snapshot());
    let resp = d.dispatch(&DispatchContext::new(), &req).await.unwrap();

    assert_eq!(resp.attachment_refs, vec![file.display().to_string()]);
    let payload = backend.calls()[0].user_content().unwrap().to_string();
    assert!(payload.contains("[File: notes.txt]\n```txt\nremember this\n```\n[End of notes.txt]"));
    assert!(payload.contains("[File: gone.txt - ERROR: "));
}
