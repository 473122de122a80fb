use storage::observe::Observation;
use storage::repository::{SheetRepository, StorageError, WidgetRepository, WordRepository};
use storage::sqlite::SqliteRepository;
use words_core::model::{NewSheet, SheetRemoteId, WidgetId, WordPair};
use words_core::time::fixed_now;

async fn open(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn new_sheet(spreadsheet: &str, index: u32) -> NewSheet {
    NewSheet::new(SheetRemoteId::new(spreadsheet, index).unwrap(), "Vocabulary").unwrap()
}

#[tokio::test]
async fn sqlite_sheet_roundtrip_and_unique_remote_id() {
    let repo = open("memdb_sheet_roundtrip").await;

    let sheet = repo.add_sheet(new_sheet("sheet-a", 1)).await.unwrap();
    assert_eq!(sheet.last_synchronized_at(), None);
    assert!(repo.exists(sheet.id()).await.unwrap());

    let by_remote = repo
        .get_by_remote_id(sheet.remote_id())
        .await
        .unwrap()
        .expect("lookup by remote id");
    assert_eq!(by_remote, sheet);

    let other_index = SheetRemoteId::new("sheet-a", 2).unwrap();
    assert!(repo.get_by_remote_id(&other_index).await.unwrap().is_none());

    let dup = repo.add_sheet(new_sheet("sheet-a", 1)).await;
    assert!(matches!(dup, Err(StorageError::Conflict(_))));

    repo.update_last_synchronized_at(sheet.id(), fixed_now())
        .await
        .unwrap();
    let stored = repo.get_sheet(sheet.id()).await.unwrap().unwrap();
    assert_eq!(stored.last_synchronized_at(), Some(fixed_now()));
    assert_eq!(repo.list_sheets().await.unwrap().len(), 1);
}

#[tokio::test]
async fn sqlite_last_widget_delete_cascades_to_sheet_and_words() {
    let repo = open("memdb_widget_cascade").await;

    let sheet = repo.add_sheet(new_sheet("shared", 0)).await.unwrap();
    repo.replace_words(
        sheet.id(),
        &[WordPair::new("perro", "dog"), WordPair::new("gato", "cat")],
    )
    .await
    .unwrap();
    repo.add_widget(WidgetId::new(10), sheet.id()).await.unwrap();
    repo.add_widget(WidgetId::new(11), sheet.id()).await.unwrap();
    assert_eq!(repo.count_widgets_for_sheet(sheet.id()).await.unwrap(), 2);

    repo.delete_widget(WidgetId::new(10)).await.unwrap();
    assert!(repo.exists(sheet.id()).await.unwrap());
    assert_eq!(repo.get_words(sheet.id()).await.unwrap().len(), 2);

    repo.delete_widget(WidgetId::new(11)).await.unwrap();
    assert!(!repo.exists(sheet.id()).await.unwrap());
    assert!(repo.get_words(sheet.id()).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_rejects_duplicate_and_dangling_widgets() {
    let repo = open("memdb_widget_conflicts").await;
    let sheet = repo.add_sheet(new_sheet("x", 0)).await.unwrap();
    repo.add_widget(WidgetId::new(1), sheet.id()).await.unwrap();

    let dup = repo.add_widget(WidgetId::new(1), sheet.id()).await;
    assert!(matches!(dup, Err(StorageError::Conflict(_))));

    let missing = words_core::model::SheetId::new(sheet.id().value() + 100);
    let dangling = repo.add_widget(WidgetId::new(2), missing).await;
    assert!(matches!(dangling, Err(StorageError::Conflict(_))));
}

#[tokio::test]
async fn sqlite_replace_words_keeps_order_and_allows_empty() {
    let repo = open("memdb_replace_words").await;
    let sheet = repo.add_sheet(new_sheet("order", 0)).await.unwrap();

    let words = vec![
        WordPair::new("eins", "one"),
        WordPair::new("zwei", "two"),
        WordPair::new("drei", "three"),
    ];
    repo.replace_words(sheet.id(), &words).await.unwrap();
    assert_eq!(repo.get_words(sheet.id()).await.unwrap(), words);

    repo.replace_words(sheet.id(), &[]).await.unwrap();
    assert!(repo.get_words(sheet.id()).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_replace_words_requires_sheet() {
    let repo = open("memdb_replace_missing").await;
    let err = repo
        .replace_words(words_core::model::SheetId::new(42), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));
}

#[tokio::test]
async fn sqlite_deleting_sheet_drops_words_and_widgets() {
    let repo = open("memdb_delete_sheet").await;
    let sheet = repo.add_sheet(new_sheet("gone", 0)).await.unwrap();
    repo.replace_words(sheet.id(), &[WordPair::new("a", "b")])
        .await
        .unwrap();
    repo.add_widget(WidgetId::new(3), sheet.id()).await.unwrap();

    repo.delete_sheet(sheet.id()).await.unwrap();
    assert!(repo.get_widget(WidgetId::new(3)).await.unwrap().is_none());
    assert!(repo.get_words(sheet.id()).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_widget_observation_sees_cascade_delete() {
    let repo = open("memdb_observe_widget").await;
    let sheet = repo.add_sheet(new_sheet("live", 0)).await.unwrap();
    repo.add_widget(WidgetId::new(5), sheet.id()).await.unwrap();

    let reader = repo.clone();
    let mut obs = Observation::new(WidgetRepository::changes(&repo), move || {
        let reader = reader.clone();
        async move { reader.get_widget(WidgetId::new(5)).await }
    });

    let first = obs.next().await.unwrap().unwrap();
    assert_eq!(first.map(|w| w.sheet_id()), Some(sheet.id()));

    repo.delete_widget(WidgetId::new(5)).await.unwrap();
    let after = obs.next().await.unwrap().unwrap();
    assert!(after.is_none());
}
