use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use taskdeck::cache::TaskCache;
use taskdeck::error::StoreError;
use taskdeck::models::{Board, Task, TaskCreate, TaskPatch};
use taskdeck::session::Session;
use taskdeck::store::{Collection, IndexKey, LocalStore};
use taskdeck::tasks::TaskService;

fn temp_db_path(label: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be monotonic enough for tests")
        .as_nanos();
    path.push(format!(
        "taskdeck-{label}-{}-{nanos}",
        std::process::id()
    ));
    std::fs::create_dir_all(&path).expect("temp dir must be creatable");
    path.join("taskdeck.db")
}

fn guest_service(store: LocalStore) -> (TaskService, String) {
    let session = store.guest_session().expect("guest session bootstraps");
    let session_id = session.id.clone();
    let service = TaskService::new(
        Session::Guest {
            session_id: session.id,
        },
        None,
        Some(store),
    );
    (service, session_id)
}

#[test]
fn seeding_runs_exactly_once_across_connections() {
    let db = temp_db_path("seed-once");

    let (store, created) = LocalStore::open(&db).unwrap();
    assert!(created);
    store.seed_guest_defaults().unwrap();
    let boards: Vec<Board> = store.get_all(Collection::Boards, None).unwrap();
    let seeded = boards.len();
    drop(store);

    let (store, created) = LocalStore::open(&db).unwrap();
    assert!(!created);
    if created {
        store.seed_guest_defaults().unwrap();
    }
    let boards: Vec<Board> = store.get_all(Collection::Boards, None).unwrap();
    assert_eq!(boards.len(), seeded);
}

#[tokio::test]
async fn guest_session_and_tasks_survive_reconnect() {
    let db = temp_db_path("reconnect");

    let (store, _) = LocalStore::open(&db).unwrap();
    store.seed_guest_defaults().unwrap();
    let (service, session_id) = guest_service(store);

    let created = service
        .create_task(&TaskCreate {
            title: "Drag Me".into(),
            column: "todo".into(),
            board: Some("board-default".into()),
            project: None,
        })
        .await
        .unwrap();
    drop(service);

    let (store, _) = LocalStore::open(&db).unwrap();
    let session = store.guest_session().unwrap();
    assert_eq!(session.id, session_id);

    let by_board: Vec<Task> = store
        .get_all(Collection::Tasks, Some(IndexKey::Board("board-default")))
        .unwrap();
    assert_eq!(by_board.len(), 1);
    assert_eq!(by_board[0].id, created.id);
    assert_eq!(by_board[0].user, session_id);
    assert_eq!(by_board[0].column, "todo");
}

#[tokio::test]
async fn optimistic_cache_over_guest_backend() {
    let db = temp_db_path("optimistic");

    let (store, _) = LocalStore::open(&db).unwrap();
    store.seed_guest_defaults().unwrap();
    let (service, session_id) = guest_service(store);
    let cache = TaskCache::new(service);

    let created = cache
        .create_task(&TaskCreate {
            title: "Drag Me".into(),
            column: "todo".into(),
            board: Some("board-default".into()),
            project: Some("project-default".into()),
        })
        .await
        .unwrap();

    // Visible immediately via the placeholder, authoritative after refresh.
    let visible = cache.cached("board-default");
    assert_eq!(visible.len(), 1);
    assert!(visible[0].id.starts_with("local-"));

    let refreshed = cache.tasks("board-default").await.unwrap();
    assert_eq!(refreshed.len(), 1);
    assert_eq!(refreshed[0].id, created.id);
    assert_eq!(refreshed[0].user, session_id);

    cache
        .update_task("board-default", &created.id, &TaskPatch::column("done"))
        .await
        .unwrap();
    assert_eq!(cache.tasks("board-default").await.unwrap()[0].column, "done");

    // A mutation the local store rejects rolls the cached list back.
    let before = cache.cached("board-default");
    let err = cache
        .update_task("board-default", "ghost", &TaskPatch::column("todo"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    assert_eq!(cache.cached("board-default"), before);
}
