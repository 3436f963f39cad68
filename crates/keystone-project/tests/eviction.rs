//! Invalidation and eviction tests
//!
//! Covers:
//! - Whole-component eviction on a config dependency change
//! - Reload producing fresh project ids
//! - Worker, allocator and identity cleanup during teardown
//! - File event handling and the event listener task

mod common;

use common::Harness;
use keystone_core::events::FileEvent;
use keystone_core::id::ProjectId;
use keystone_core::traits::MemoryFs;
use keystone_core::uid::MixedPath;
use keystone_core::worker::WorkerMessage;
use keystone_core::Diagnostics;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_deleting_nested_config_evicts_component() {
    let h = Harness::new();
    h.nested_repo();

    let pkg = h
        .manager
        .find_project(&h.path("repo/pkg/src/a.ts"), false)
        .await
        .unwrap()
        .unwrap();
    let app = h.manager.get_project_from_path(&h.path("repo")).unwrap();

    let deleted = h.remove("repo/pkg/.config/keystone.json");
    assert!(h.manager.maybe_evict_projects(&[deleted]).await.unwrap());

    assert!(h.manager.get_project(pkg.id).is_none());
    assert!(h.manager.get_project(app.id).is_none());
    assert!(!h.manager.has_loaded_project_directory(&h.path("repo/pkg")));

    // The outer project comes back under a new id
    let reloaded = h.manager.get_project_from_path(&h.path("repo")).unwrap();
    assert_eq!(reloaded.name(), "app");
    assert!(reloaded.id > pkg.id);
    assert!(reloaded.children.is_empty());

    let owner = h
        .manager
        .find_loaded_project(&h.path("repo/pkg/src/a.ts"))
        .unwrap();
    assert_eq!(owner.id, reloaded.id);
}

#[tokio::test]
async fn test_component_eviction_covers_siblings_only() {
    let h = Harness::new();
    h.write_config("repo", json!({"name": "app"}));
    h.write_config(
        "repo/a",
        json!({"name": "a", "dependencies": ["shared.json"]}),
    );
    let b_config = h.write_config("repo/b", json!({"name": "b"}));
    h.write_config("other", json!({"name": "other"}));
    let shared = h.write("repo/a/shared.json", "{}");
    h.write("repo/a/x.ts", "");
    h.write("other/x.ts", "");

    h.manager
        .find_project(&h.path("repo/a/x.ts"), false)
        .await
        .unwrap()
        .unwrap();
    assert!(
        h.manager
            .add_disk_project(&h.path("repo/b"), &b_config, false)
            .await
            .unwrap()
    );
    let other = h
        .manager
        .find_project(&h.path("other/x.ts"), false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(h.manager.get_projects().len(), 4);

    // `shared` is a dependency of "a" only
    assert!(h.manager.maybe_evict_projects(&[shared]).await.unwrap());

    let closed = h.fs.closed.lock().clone();
    assert_eq!(
        closed,
        vec![h.path("repo"), h.path("repo/a"), h.path("repo/b")]
    );

    // Everything reloads top-down, relinked under the new outer project
    let app = h.manager.get_project_from_path(&h.path("repo")).unwrap();
    let a = h.manager.get_project_from_path(&h.path("repo/a")).unwrap();
    let b = h.manager.get_project_from_path(&h.path("repo/b")).unwrap();
    assert_eq!(a.parent, Some(app.id));
    assert_eq!(b.parent, Some(app.id));
    assert_eq!(h.manager.get_project(other.id).unwrap().name(), "other");
    assert_eq!(h.manager.get_projects().len(), 4);
}

#[tokio::test]
async fn test_unrelated_paths_evict_nothing() {
    let h = Harness::new();
    h.write_config("repo", json!({"name": "app"}));
    let file = h.write("repo/a.ts", "");
    h.manager.find_project(&file, false).await.unwrap().unwrap();

    assert!(!h.manager.maybe_evict_projects(&[file]).await.unwrap());
    assert!(h.fs.closed.lock().is_empty());
}

#[tokio::test]
async fn test_evict_and_reload_assigns_new_id() {
    let h = Harness::new();
    h.write_config("repo", json!({"name": "app"}));
    let file = h.write("repo/a.ts", "");
    let old = h.manager.find_project(&file, false).await.unwrap().unwrap();

    h.manager.evict_project(old.id, true).await.unwrap();

    let new = h.manager.get_project_from_path(&h.path("repo")).unwrap();
    assert_ne!(new.id, old.id);
    assert!(h.manager.get_project(old.id).is_none());
    assert!(h.manager.get_projects().iter().all(|p| p.id != old.id));
    assert_eq!(h.loader.load_count(), 2);
}

#[tokio::test]
async fn test_evict_parent_reloads_nested_projects() {
    let h = Harness::new();
    h.nested_repo();
    let old_pkg = h
        .manager
        .find_project(&h.path("repo/pkg/src/a.ts"), false)
        .await
        .unwrap()
        .unwrap();
    let old_app = h.manager.get_project_from_path(&h.path("repo")).unwrap();

    h.manager.evict_project(old_app.id, true).await.unwrap();

    let app = h.manager.get_project_from_path(&h.path("repo")).unwrap();
    let pkg = h.manager.get_project_from_path(&h.path("repo/pkg")).unwrap();
    assert!(h.manager.get_project(old_pkg.id).is_none());
    assert_ne!(pkg.id, old_pkg.id);
    assert_eq!(pkg.parent, Some(app.id));
    assert_eq!(pkg.root, Some(app.id));
    assert!(app.children.contains(&pkg.id));

    // The nested config still drives eviction
    let pkg_config = h.path("repo/pkg/.config/keystone.json");
    assert!(h.manager.maybe_evict_projects(&[pkg_config]).await.unwrap());
}

#[tokio::test]
async fn test_evict_parent_without_reload_drops_subtree() {
    let h = Harness::new();
    h.nested_repo();
    h.manager
        .find_project(&h.path("repo/pkg/src/a.ts"), false)
        .await
        .unwrap()
        .unwrap();
    let app = h.manager.get_project_from_path(&h.path("repo")).unwrap();

    h.manager.evict_project(app.id, false).await.unwrap();

    assert!(h.manager.get_projects().is_empty());
    let pkg_config = h.path("repo/pkg/.config/keystone.json");
    assert!(!h.manager.maybe_evict_projects(&[pkg_config]).await.unwrap());
}

#[tokio::test]
async fn test_evict_nested_project_keeps_parent() {
    let h = Harness::new();
    h.nested_repo();
    let old_pkg = h
        .manager
        .find_project(&h.path("repo/pkg/src/a.ts"), false)
        .await
        .unwrap()
        .unwrap();
    let app = h.manager.get_project_from_path(&h.path("repo")).unwrap();

    h.manager.evict_project(old_pkg.id, true).await.unwrap();

    let app = h.manager.get_project(app.id).unwrap();
    let pkg = h.manager.get_project_from_path(&h.path("repo/pkg")).unwrap();
    assert_ne!(pkg.id, old_pkg.id);
    assert_eq!(pkg.parent, Some(app.id));
    assert_eq!(app.children.iter().copied().collect::<Vec<_>>(), vec![pkg.id]);

    // The parent's own config dependency survives the nested teardown
    let app_config = h.path("repo/.config/keystone.json");
    assert!(h.manager.maybe_evict_projects(&[app_config]).await.unwrap());
}

#[tokio::test]
async fn test_evict_unknown_project() {
    let h = Harness::new();
    let err = h
        .manager
        .evict_project(ProjectId::new(42), false)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_teardown_cleans_workers_files_and_identities() {
    let h = Harness::new();
    h.write_config("repo", json!({"name": "app"}));
    let file = h.write("repo/src/a.ts", "");
    let project = h.manager.find_project(&file, false).await.unwrap().unwrap();

    let manifest = h.manifest(7, "repo/lib", Some("lib"));
    h.manager
        .declare_manifest(project.id, true, manifest, &Diagnostics::new())
        .unwrap();
    let uid = h.manager.get_uid(&file, false).unwrap();
    h.processor.clear();
    h.script_runner.clear();

    h.manager.evict_project(project.id, false).await.unwrap();

    // Every worker hears about the eviction, script runners included
    for worker in [&h.processor, &h.script_runner] {
        assert_eq!(worker.sent_names(), vec!["evict_project", "update_manifests"]);
        let sent = worker.sent.lock();
        assert_eq!(sent[0], WorkerMessage::EvictProject(project.id));
        match &sent[1] {
            WorkerMessage::UpdateManifests(update) => {
                assert_eq!(update.manifests.len(), 1);
                assert!(update.manifests.values().all(Option::is_none));
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    assert!(h.allocator.evicted.lock().contains(&file));
    assert!(h
        .manager
        .maybe_get_file_path_from_uid(&MixedPath::Uid(uid))
        .is_none());
    assert_eq!(h.fs.unwatched.lock().clone(), vec![h.path("repo")]);
    assert!(h.manager.find_loaded_project(&file).is_none());
}

#[tokio::test]
async fn test_deleted_file_event_purges_identity() {
    let h = Harness::new();
    h.write_config("repo", json!({"name": "app"}));
    let file = h.write("repo/a.ts", "");
    h.manager.find_project(&file, false).await.unwrap().unwrap();
    let uid = h.manager.get_uid(&file, false).unwrap();

    std::fs::remove_file(&file).unwrap();
    let evicted = h
        .manager
        .handle_file_events(&[FileEvent::Deleted(file.clone())])
        .await
        .unwrap();

    assert!(!evicted);
    assert!(h
        .manager
        .maybe_get_file_path_from_uid(&MixedPath::Uid(uid))
        .is_none());
    assert!(h.manager.has_loaded_project_directory(&h.path("repo")));
}

#[tokio::test]
async fn test_renamed_config_evicts_project() {
    let h = Harness::new();
    let config = h.write_config("repo", json!({"name": "app"}));
    let file = h.write("repo/a.ts", "");
    let old = h.manager.find_project(&file, false).await.unwrap().unwrap();

    let renamed = h.path("repo/.config/keystone.json.bak");
    std::fs::rename(&config, &renamed).unwrap();
    let evicted = h
        .manager
        .handle_file_events(&[FileEvent::Renamed {
            from: config,
            to: renamed,
        }])
        .await
        .unwrap();

    assert!(evicted);
    assert!(h.manager.get_project(old.id).is_none());
    assert!(h.manager.get_projects().is_empty());
}

#[tokio::test]
async fn test_event_listener_processes_batches() {
    let h = Harness::new();
    let config = h.write_config("repo", json!({"name": "app"}));
    let file = h.write("repo/a.ts", "");
    let old = h.manager.find_project(&file, false).await.unwrap().unwrap();

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let listener = Arc::clone(&h.manager).spawn_event_listener(rx);

    h.write_config("repo", json!({"name": "app", "lint": true}));
    tx.send(vec![FileEvent::Modified(config)]).unwrap();
    drop(tx);
    listener.await.unwrap();

    let new = h.manager.get_project_from_path(&h.path("repo")).unwrap();
    assert_ne!(new.id, old.id);
    assert_eq!(new.config.extra.get("lint"), Some(&json!(true)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_discovery_during_eviction_sees_new_project() {
    let h = Harness::new();
    let config = h.write_config("repo", json!({"name": "app"}));
    let file = h.write("repo/a.ts", "");
    let old = h.manager.find_project(&file, false).await.unwrap().unwrap();

    *h.loader.delay.lock() = Some(Duration::from_millis(50));
    let evictor = {
        let manager = Arc::clone(&h.manager);
        tokio::spawn(async move { manager.maybe_evict_projects(&[config]).await })
    };
    while !h.fs.processing_lock().is_locked() {
        tokio::task::yield_now().await;
    }

    let found = h.manager.find_project(&file, false).await.unwrap().unwrap();
    assert!(evictor.await.unwrap().unwrap());
    assert_ne!(found.id, old.id);
    assert_eq!(
        h.manager.get_project_from_path(&h.path("repo")).unwrap().id,
        found.id
    );
}
