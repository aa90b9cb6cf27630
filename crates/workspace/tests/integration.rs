use avbuild_events::{channel, AppEvent, WorkspaceEvent};
use avbuild_scene::{BehaviorRegistry, NodeRecord, SceneGraph, SceneRecord};
use avbuild_workspace::{Workspace, WorkspaceGuard};

async fn workspace_with(documents: &[&str]) -> (tempfile::TempDir, Workspace) {
    let dir = tempfile::tempdir().unwrap();
    for name in documents {
        let record = SceneRecord {
            version: avbuild_scene::SCENE_FORMAT_VERSION,
            roots: vec![NodeRecord::new("Root").with_child(NodeRecord::new("Avatar"))],
        };
        let path = dir.path().join(format!("{name}.scene.json"));
        std::fs::write(path, serde_json::to_vec(&record).unwrap()).unwrap();
    }
    let ws = Workspace::load(dir.path(), BehaviorRegistry::new())
        .await
        .unwrap();
    (dir, ws)
}

#[tokio::test]
async fn load_indexes_existing_files() {
    let (dir, ws) = workspace_with(&["Main", "Other"]).await;
    assert_eq!(ws.assets().len(), 2);
    assert!(ws.assets().id_of(&dir.path().join("Main.scene.json")).is_some());
    assert!(ws
        .assets()
        .id_of(std::path::Path::new("Other.scene.json"))
        .is_some());
}

#[tokio::test]
async fn rollback_restores_layout_after_fork() {
    let (dir, mut ws) = workspace_with(&["Main", "Other"]).await;
    let main = ws.open_document("Main", 0).await.unwrap();
    let other = ws.open_document("Other", 1).await.unwrap();
    ws.set_active(other).unwrap();

    let (tx, mut rx) = channel();
    let guard = WorkspaceGuard::new(Some(tx));
    let snapshot = guard.snapshot(&ws);
    let before = snapshot.layout().clone();

    let temp = dir.path().join("Temp").join("build");
    guard.prepare_temp_dir(&temp).await.unwrap();
    let fork = ws
        .fork_document(main, "Main", temp.join("Main.scene.json"), 0)
        .unwrap();
    ws.close_document(other).unwrap();
    ws.set_active(fork).unwrap();
    ws.save_open_documents().await.unwrap();

    guard.restore(&mut ws, snapshot).await.unwrap();
    assert_eq!(ws.layout(), before);
    assert_eq!(ws.active(), Some(other));

    let mut kinds = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let AppEvent::Workspace(event) = message.event {
            kinds.push(match event {
                WorkspaceEvent::SnapshotTaken { .. } => "snapshot",
                WorkspaceEvent::TempDirPrepared { .. } => "temp",
                WorkspaceEvent::Restored { .. } => "restored",
                _ => "other",
            });
        }
    }
    assert_eq!(kinds, vec!["snapshot", "temp", "restored"]);
}

#[tokio::test]
async fn restore_fails_when_a_document_vanished() {
    let (dir, mut ws) = workspace_with(&["Main"]).await;
    let main = ws.open_document("Main", 0).await.unwrap();
    let guard = WorkspaceGuard::default();
    let snapshot = guard.snapshot(&ws);

    ws.close_document(main).unwrap();
    std::fs::remove_file(dir.path().join("Main.scene.json")).unwrap();

    let err = guard.restore(&mut ws, snapshot).await.unwrap_err();
    assert!(matches!(
        err,
        avbuild_errors::Error::Workspace(avbuild_errors::WorkspaceError::RestoreFailed { .. })
    ));
}

#[tokio::test]
async fn stale_temp_dir_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let temp = dir.path().join("stale");
    std::fs::create_dir_all(&temp).unwrap();
    std::fs::write(temp.join("leftover.prefab"), b"x").unwrap();

    let guard = WorkspaceGuard::default();
    assert!(guard.prepare_temp_dir(&temp).await.unwrap());
    assert_eq!(std::fs::read_dir(&temp).unwrap().count(), 0);
    assert!(!guard.prepare_temp_dir(&dir.path().join("fresh")).await.unwrap());
}

#[tokio::test]
async fn created_documents_persist_atomically() {
    let (dir, mut ws) = workspace_with(&[]).await;
    let mut graph = SceneGraph::new();
    graph.add_root("Solo");
    ws.create_document("Fresh", graph, 0);
    ws.save_open_documents().await.unwrap();
    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, vec!["Fresh.scene.json".to_string()]);
}
