use dirnotes::model::{Annotation, Color};
use dirnotes::store::backend::StorageBackend;
use dirnotes::store::fs_backend::FsBackend;
use dirnotes::store::{AnnotationIndex, AnnotationStore, LoadStatus, WriteMode};
use std::fs;
use tempfile::TempDir;

fn setup() -> (TempDir, FsBackend) {
    let _ = env_logger::builder().is_test(true).try_init();
    let data_dir = TempDir::new().unwrap();
    let backend = FsBackend::in_dir(data_dir.path(), "annotations.json");
    (data_dir, backend)
}

fn leftover_tmp_files(dir: &TempDir) -> Vec<String> {
    fs::read_dir(dir.path())
        .unwrap()
        .flatten()
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(|name| name.ends_with(".tmp"))
        .collect()
}

#[test]
fn test_missing_file_loads_as_none() {
    let (_dir, backend) = setup();
    assert!(backend.load_index().unwrap().is_none());

    let store = AnnotationStore::open(&backend);
    assert_eq!(store.load_status(), &LoadStatus::Missing);
    assert!(store.is_empty());
}

#[test]
fn test_save_then_load_index() {
    let (dir, backend) = setup();
    let mut index = AnnotationIndex::new();
    index.insert(
        "a1".to_string(),
        Annotation::new("Scripts", "Logic", Color::rgb(0.4, 0.8, 1.0)),
    );

    backend.save_index(&index).unwrap();
    let loaded = backend.load_index().unwrap().unwrap();
    assert_eq!(loaded, index);
    assert!(leftover_tmp_files(&dir).is_empty());
}

#[test]
fn test_save_creates_data_dir() {
    let root = TempDir::new().unwrap();
    let backend = FsBackend::in_dir(&root.path().join(".dirnotes"), "annotations.json");

    backend.save_index(&AnnotationIndex::new()).unwrap();
    assert!(root.path().join(".dirnotes").join("annotations.json").exists());
}

#[test]
fn test_rich_text_survives_reopen_byte_for_byte() {
    let (_dir, backend) = setup();
    let title = "<b>Rich</b> \u{1F4C1} title";
    let comment = "<color=#FF0000>Red</color>\n\t\"quoted\" \\ back\u{00E9}";
    {
        let mut store = AnnotationStore::open(&backend);
        store.set("a1", title, comment, Color::rgba(1.0, 0.5, 0.25, 0.75)).unwrap();
    }

    let store = AnnotationStore::open(&backend);
    let record = store.get("a1").unwrap();
    assert_eq!(record.title, title);
    assert_eq!(record.comment, comment);
    assert_eq!(record.title_color, Color::rgba(1.0, 0.5, 0.25, 0.75));
    assert_eq!(store.load_status(), &LoadStatus::Loaded(1));
}

#[test]
fn test_corrupt_file_is_quarantined() {
    let (dir, backend) = setup();
    fs::write(backend.data_file(), "{ this is not json").unwrap();

    let mut store = AnnotationStore::open(&backend);
    assert!(matches!(store.load_status(), LoadStatus::Recovered(_)));
    assert!(store.is_empty());
    assert!(!backend.data_file().exists());

    let quarantined: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
        .collect();
    assert_eq!(quarantined.len(), 1);
    assert_eq!(
        fs::read_to_string(quarantined[0].path()).unwrap(),
        "{ this is not json"
    );

    // The store is usable afterwards and writes a fresh file.
    store.set("a1", "Fresh", "", Color::DEFAULT).unwrap();
    drop(store);
    assert_eq!(AnnotationStore::open(&backend).get("a1").unwrap().title, "Fresh");
}

fn quarantined_files(dir: &TempDir) -> Vec<std::path::PathBuf> {
    fs::read_dir(dir.path())
        .unwrap()
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
        .map(|e| e.path())
        .collect()
}

#[test]
fn test_invalid_utf8_is_quarantined_not_overwritten() {
    let (dir, backend) = setup();
    let original: &[u8] = b"{\"a1\":{\"title\":\"keep me \xFF\xFE\"}}";
    fs::write(backend.data_file(), original).unwrap();

    let err = backend.load_index().unwrap_err();
    assert!(err.is_corrupt());

    let mut store = AnnotationStore::open(&backend);
    assert!(matches!(store.load_status(), LoadStatus::Recovered(_)));
    store.set("b", "New", "", Color::DEFAULT).unwrap();

    let quarantined = quarantined_files(&dir);
    assert_eq!(quarantined.len(), 1);
    assert_eq!(fs::read(&quarantined[0]).unwrap(), original);
}

#[test]
fn test_unreadable_data_file_is_moved_aside() {
    let (dir, backend) = setup();
    // A directory where the file should be: reading fails with a plain io error.
    fs::create_dir(backend.data_file()).unwrap();
    fs::write(backend.data_file().join("keep.txt"), "precious").unwrap();

    let mut store = AnnotationStore::open(&backend);
    assert!(matches!(store.load_status(), LoadStatus::Recovered(_)));
    store.set("b", "New", "", Color::DEFAULT).unwrap();

    let quarantined = quarantined_files(&dir);
    assert_eq!(quarantined.len(), 1);
    assert_eq!(
        fs::read_to_string(quarantined[0].join("keep.txt")).unwrap(),
        "precious"
    );
    assert!(backend.data_file().is_file());
}

#[test]
fn test_empty_file_loads_as_missing() {
    let (_dir, backend) = setup();
    fs::write(backend.data_file(), "").unwrap();

    let store = AnnotationStore::open(&backend);
    assert_eq!(store.load_status(), &LoadStatus::Missing);
}

#[test]
fn test_hand_edited_file_with_partial_records() {
    let (_dir, backend) = setup();
    fs::write(
        backend.data_file(),
        r#"{
  "a1": { "title": "Only a title" },
  "a2": { "comment": "no title", "titleColor": [1.0, 0.0, 0.0] },
  "": { "title": "blank id" }
}"#,
    )
    .unwrap();

    let store = AnnotationStore::open(&backend);
    assert_eq!(store.len(), 2);
    assert_eq!(store.get("a1").unwrap().comment, "");
    assert_eq!(store.get("a1").unwrap().title_color, Color::DEFAULT);
    assert_eq!(store.get("a2").unwrap().title_color, Color::rgb(1.0, 0.0, 0.0));
}

#[test]
fn test_deferred_writes_touch_disk_once_on_flush() {
    let (dir, backend) = setup();
    let mut store = AnnotationStore::open_with_mode(&backend, WriteMode::Deferred);

    for i in 0..20 {
        store
            .set(&format!("id{}", i), &format!("Folder {}", i), "", Color::DEFAULT)
            .unwrap();
    }
    assert!(!backend.data_file().exists());

    store.flush().unwrap();
    assert_eq!(backend.load_index().unwrap().unwrap().len(), 20);
    assert!(leftover_tmp_files(&dir).is_empty());
}

#[test]
fn test_remove_persists() {
    let (_dir, backend) = setup();
    {
        let mut store = AnnotationStore::open(&backend);
        store.set("a1", "One", "", Color::DEFAULT).unwrap();
        store.set("a2", "Two", "", Color::DEFAULT).unwrap();
        assert!(store.remove("a1").unwrap());
    }

    let store = AnnotationStore::open(&backend);
    assert!(store.get("a1").is_none());
    assert_eq!(store.get("a2").unwrap().title, "Two");
}
