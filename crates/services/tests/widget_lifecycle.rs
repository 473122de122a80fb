use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use services::{
    AppServices, ChannelRefresher, Clock, RemoteError, RemoteWordSource, WidgetServiceError,
};
use storage::repository::{SheetRepository, Storage, StorageError, WidgetRepository};
use words_core::model::{NewSheet, SheetRemoteId, WidgetId, WordPair};
use words_core::time::fixed_now;

#[derive(Clone)]
enum Reply {
    Csv(&'static str),
    Fail,
    Hang,
    /// Waits for the gate to open, then answers with the body.
    Gated(Arc<Notify>, &'static str),
}

/// Remote source answering from a script keyed by spreadsheet id.
#[derive(Default)]
struct ScriptedRemote {
    replies: Mutex<HashMap<String, Reply>>,
    fetches: Mutex<Vec<SheetRemoteId>>,
}

impl ScriptedRemote {
    fn reply(&self, spreadsheet: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert(spreadsheet.to_owned(), reply);
    }

    fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteWordSource for ScriptedRemote {
    async fn fetch(&self, remote_id: &SheetRemoteId) -> Result<String, RemoteError> {
        self.fetches.lock().unwrap().push(remote_id.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(remote_id.spreadsheet_id())
            .cloned()
            .unwrap_or(Reply::Fail);
        match reply {
            Reply::Csv(body) => Ok(body.to_owned()),
            Reply::Fail => Err(RemoteError::HttpStatus(
                reqwest::StatusCode::SERVICE_UNAVAILABLE,
            )),
            Reply::Hang => std::future::pending().await,
            Reply::Gated(gate, body) => {
                gate.notified().await;
                Ok(body.to_owned())
            }
        }
    }
}

struct Harness {
    storage: Storage,
    remote: Arc<ScriptedRemote>,
    services: AppServices,
    refreshes: tokio::sync::mpsc::UnboundedReceiver<WidgetId>,
}

fn harness() -> Harness {
    harness_with(Storage::in_memory())
}

fn harness_with(storage: Storage) -> Harness {
    let remote = Arc::new(ScriptedRemote::default());
    let (refresher, refreshes) = ChannelRefresher::new();
    let services = AppServices::new(
        &storage,
        remote.clone(),
        Arc::new(refresher),
        Clock::fixed(fixed_now()),
    );
    Harness {
        storage,
        remote,
        services,
        refreshes,
    }
}

fn sheet_spec(spreadsheet: &str) -> NewSheet {
    NewSheet::new(SheetRemoteId::new(spreadsheet, 0).unwrap(), "Spanish").unwrap()
}

#[tokio::test]
async fn widgets_with_same_remote_id_share_one_sheet() {
    let h = harness();
    h.remote.reply("shared", Reply::Csv("hola,hello"));

    let add = h.services.add_widget();
    assert!(add.run(WidgetId::new(1), sheet_spec("shared")).await.unwrap());
    assert!(add.run(WidgetId::new(2), sheet_spec("shared")).await.unwrap());

    let sheets = h.storage.sheets.list_sheets().await.unwrap();
    assert_eq!(sheets.len(), 1);
    let widgets = h.storage.widgets.list_widgets().await.unwrap();
    assert_eq!(widgets.len(), 2);
    assert!(widgets.iter().all(|w| w.sheet_id() == sheets[0].id()));
    assert_eq!(h.remote.fetch_count(), 1);
}

#[tokio::test]
async fn failed_fetch_rolls_back_new_sheet() {
    let h = harness();
    h.remote.reply("broken", Reply::Fail);

    let added = h
        .services
        .add_widget()
        .run(WidgetId::new(1), sheet_spec("broken"))
        .await
        .unwrap();

    assert!(!added);
    assert!(h.storage.sheets.list_sheets().await.unwrap().is_empty());
    assert!(
        h.storage
            .widgets
            .get_widget(WidgetId::new(1))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn successful_add_caches_mapped_words() {
    let h = harness();
    h.remote
        .reply("fresh", Reply::Csv("perro,dog\r\n#VALUE!,#VALUE!\r\n\"si, claro\",sure"));

    assert!(
        h.services
            .add_widget()
            .run(WidgetId::new(7), sheet_spec("fresh"))
            .await
            .unwrap()
    );

    let widget = h
        .storage
        .widgets
        .get_widget(WidgetId::new(7))
        .await
        .unwrap()
        .unwrap();
    let mut words = h.services.words().observe_words(widget.sheet_id());
    assert_eq!(
        words.next().await.unwrap().unwrap(),
        vec![WordPair::new("perro", "dog"), WordPair::new("si, claro", "sure")]
    );
    assert_eq!(h.storage.sheets.list_sheets().await.unwrap().len(), 1);
}

#[tokio::test]
async fn observed_words_follow_synchronize_and_last_delete() {
    let h = harness();
    h.remote.reply("live", Reply::Csv("gato,cat"));
    h.services
        .add_widget()
        .run(WidgetId::new(3), sheet_spec("live"))
        .await
        .unwrap();
    let sheet_id = h.storage.sheets.list_sheets().await.unwrap()[0].id();

    let mut words = h.services.words().observe_words(sheet_id);
    assert_eq!(
        words.next().await.unwrap().unwrap(),
        vec![WordPair::new("gato", "cat")]
    );

    h.remote
        .reply("live", Reply::Csv("pez,fish\r\nave,bird"));
    assert!(
        h.services
            .synchronize_words()
            .run(WidgetId::new(3))
            .await
            .unwrap()
    );
    assert_eq!(
        words.next().await.unwrap().unwrap(),
        vec![WordPair::new("pez", "fish"), WordPair::new("ave", "bird")]
    );

    h.services.delete_widget().run(WidgetId::new(3)).await.unwrap();
    assert_eq!(words.next().await.unwrap().unwrap(), Vec::<WordPair>::new());
}

#[tokio::test]
async fn duplicate_widget_id_propagates_conflict_and_rolls_back() {
    let h = harness();
    h.remote.reply("first", Reply::Csv("a,b"));
    h.remote.reply("second", Reply::Csv("c,d"));
    let add = h.services.add_widget();

    assert!(add.run(WidgetId::new(1), sheet_spec("first")).await.unwrap());
    let err = add
        .run(WidgetId::new(1), sheet_spec("second"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WidgetServiceError::Storage(StorageError::Conflict(_))
    ));
    let sheets = h.storage.sheets.list_sheets().await.unwrap();
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0].remote_id().spreadsheet_id(), "first");
}

#[tokio::test]
async fn abandoned_add_still_rolls_back_new_sheet() {
    let h = harness();
    h.remote.reply("slow", Reply::Hang);

    let add = h.services.add_widget();
    let attempt = tokio::time::timeout(
        Duration::from_millis(20),
        add.run(WidgetId::new(1), sheet_spec("slow")),
    )
    .await;
    assert!(attempt.is_err());

    let mut remaining = usize::MAX;
    for _ in 0..50 {
        remaining = h.storage.sheets.list_sheets().await.unwrap().len();
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(remaining, 0);
    assert!(
        h.storage
            .widgets
            .get_widget(WidgetId::new(1))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn deleting_shared_widget_keeps_sheet_until_last_reference() {
    let h = harness();
    h.remote.reply("shared", Reply::Csv("uno,one"));
    let add = h.services.add_widget();
    add.run(WidgetId::new(1), sheet_spec("shared")).await.unwrap();
    add.run(WidgetId::new(2), sheet_spec("shared")).await.unwrap();
    let sheet_id = h.storage.sheets.list_sheets().await.unwrap()[0].id();

    let delete = h.services.delete_widget();
    delete.run(WidgetId::new(1)).await.unwrap();
    assert!(h.storage.sheets.exists(sheet_id).await.unwrap());
    assert_eq!(
        h.storage
            .widgets
            .count_widgets_for_sheet(sheet_id)
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        h.services.words().current_words(sheet_id).await.unwrap(),
        vec![WordPair::new("uno", "one")]
    );

    delete.run(WidgetId::new(2)).await.unwrap();
    assert!(!h.storage.sheets.exists(sheet_id).await.unwrap());
    assert!(
        h.services
            .words()
            .current_words(sheet_id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn deleting_unknown_widget_is_a_no_op() {
    let h = harness();
    h.services
        .delete_widget()
        .run(WidgetId::new(404))
        .await
        .unwrap();
}

#[tokio::test]
async fn synchronize_refreshes_words_and_timestamp() {
    let mut h = harness();
    h.remote.reply("sync", Reply::Csv("a,b"));
    h.services
        .add_widget()
        .run(WidgetId::new(3), sheet_spec("sync"))
        .await
        .unwrap();

    h.remote.reply("sync", Reply::Csv("c,d\r\ne,f"));
    let mut flag = h.services.sync_state().observe_is_synchronizing(WidgetId::new(3));
    assert_eq!(flag.next().await, Some(false));

    let ok = h
        .services
        .synchronize_words()
        .run(WidgetId::new(3))
        .await
        .unwrap();
    assert!(ok);
    assert_eq!(h.refreshes.recv().await, Some(WidgetId::new(3)));
    assert!(!flag.current());

    let sheet = h.storage.sheets.list_sheets().await.unwrap().remove(0);
    assert_eq!(sheet.last_synchronized_at(), Some(fixed_now()));
    assert_eq!(
        h.services.words().current_words(sheet.id()).await.unwrap(),
        vec![WordPair::new("c", "d"), WordPair::new("e", "f")]
    );
}

#[tokio::test]
async fn failed_synchronize_keeps_cache_and_timestamp() {
    let h = harness();
    h.remote.reply("keep", Reply::Csv("a,b"));
    h.services
        .add_widget()
        .run(WidgetId::new(4), sheet_spec("keep"))
        .await
        .unwrap();

    h.remote.reply("keep", Reply::Fail);
    let ok = h
        .services
        .synchronize_words()
        .run(WidgetId::new(4))
        .await
        .unwrap();

    assert!(!ok);
    let sheet = h.storage.sheets.list_sheets().await.unwrap().remove(0);
    assert_eq!(sheet.last_synchronized_at(), None);
    assert_eq!(
        h.services.words().current_words(sheet.id()).await.unwrap(),
        vec![WordPair::new("a", "b")]
    );
    assert!(!h.services.sync_state().is_synchronizing(WidgetId::new(4)));
}

#[tokio::test]
async fn synchronize_of_zero_rows_empties_cache() {
    let h = harness();
    h.remote.reply("empty", Reply::Csv("a,b"));
    h.services
        .add_widget()
        .run(WidgetId::new(5), sheet_spec("empty"))
        .await
        .unwrap();

    h.remote.reply("empty", Reply::Csv(""));
    assert!(
        h.services
            .synchronize_words()
            .run(WidgetId::new(5))
            .await
            .unwrap()
    );
    let sheet = h.storage.sheets.list_sheets().await.unwrap().remove(0);
    assert!(
        h.services
            .words()
            .current_words(sheet.id())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn synchronize_unknown_widget_returns_false_without_refresh() {
    let mut h = harness();
    let ok = h
        .services
        .synchronize_words()
        .run(WidgetId::new(99))
        .await
        .unwrap();

    assert!(!ok);
    assert!(h.refreshes.try_recv().is_err());
    assert_eq!(h.remote.fetch_count(), 0);
}

#[tokio::test]
async fn synchronize_flag_is_visible_while_fetch_is_in_flight() {
    let h = harness();
    h.remote.reply("busy", Reply::Csv("a,b"));
    h.services
        .add_widget()
        .run(WidgetId::new(6), sheet_spec("busy"))
        .await
        .unwrap();
    h.remote.reply("busy", Reply::Hang);

    let mut flag = h.services.sync_state().observe_is_synchronizing(WidgetId::new(6));
    assert_eq!(flag.next().await, Some(false));

    let sync = h.services.synchronize_words();
    let task = tokio::spawn(async move { sync.run(WidgetId::new(6)).await });
    assert_eq!(flag.next().await, Some(true));

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert_eq!(flag.next().await, Some(false));
}

#[tokio::test]
async fn synchronize_returns_false_when_sheet_is_deleted_mid_fetch() {
    let h = harness();
    h.remote.reply("gone", Reply::Csv("a,b"));
    h.services
        .add_widget()
        .run(WidgetId::new(1), sheet_spec("gone"))
        .await
        .unwrap();
    let gate = Arc::new(Notify::new());
    h.remote.reply("gone", Reply::Gated(gate.clone(), "c,d"));

    let mut flag = h.services.sync_state().observe_is_synchronizing(WidgetId::new(1));
    assert_eq!(flag.next().await, Some(false));

    let sync = h.services.synchronize_words();
    let task = tokio::spawn(async move { sync.run(WidgetId::new(1)).await });
    assert_eq!(flag.next().await, Some(true));

    h.services.delete_widget().run(WidgetId::new(1)).await.unwrap();
    gate.notify_one();

    assert!(!task.await.unwrap().unwrap());
    assert!(h.storage.sheets.list_sheets().await.unwrap().is_empty());
    assert_eq!(flag.next().await, Some(false));
}

#[tokio::test]
async fn run_all_reports_each_widget() {
    let h = harness();
    h.remote.reply("one", Reply::Csv("a,b"));
    h.remote.reply("two", Reply::Csv("c,d"));
    let add = h.services.add_widget();
    add.run(WidgetId::new(1), sheet_spec("one")).await.unwrap();
    add.run(WidgetId::new(2), sheet_spec("two")).await.unwrap();
    h.remote.reply("two", Reply::Fail);

    let outcomes = h.services.synchronize_words().run_all().await.unwrap();
    assert_eq!(
        outcomes,
        vec![(WidgetId::new(1), true), (WidgetId::new(2), false)]
    );
}

#[tokio::test]
async fn sqlite_backend_runs_full_lifecycle() {
    let storage = Storage::sqlite("sqlite:file:memdb_services_lifecycle?mode=memory&cache=shared")
        .await
        .expect("sqlite storage");
    let h = harness_with(storage);
    h.remote.reply("sql", Reply::Csv("haus,house"));

    let add = h.services.add_widget();
    assert!(add.run(WidgetId::new(1), sheet_spec("sql")).await.unwrap());
    assert!(add.run(WidgetId::new(2), sheet_spec("sql")).await.unwrap());
    let sheet_id = h.storage.sheets.list_sheets().await.unwrap()[0].id();

    assert!(
        h.services
            .synchronize_words()
            .run(WidgetId::new(2))
            .await
            .unwrap()
    );

    let delete = h.services.delete_widget();
    delete.run(WidgetId::new(1)).await.unwrap();
    delete.run(WidgetId::new(2)).await.unwrap();
    assert!(h.storage.sheets.list_sheets().await.unwrap().is_empty());
    assert!(
        h.services
            .words()
            .current_words(sheet_id)
            .await
            .unwrap()
            .is_empty()
    );
}
