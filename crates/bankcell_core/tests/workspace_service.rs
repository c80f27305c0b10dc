use bankcell_core::{
    Config, FileBankRepository, OpenOutcome, Paths, ServiceError, WorkspaceService,
};
use std::fs;
use std::path::{Path, PathBuf};

fn service_in(dir: &Path) -> WorkspaceService<FileBankRepository> {
    let paths = Paths::under(dir);
    paths.ensure().expect("create workspace dirs");
    WorkspaceService::with_files(Config::default(), paths)
}

fn root(dir: &Path) -> PathBuf {
    let root = Paths::under(dir).root;
    fs::create_dir_all(&root).expect("create fixture root");
    root
}

#[test]
fn open_creates_missing_bank_titled_by_stem() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut service = service_in(dir.path());

    let outcome = service.open_bank("x00003.txt").expect("open new bank");
    assert!(matches!(outcome, OpenOutcome::Created { id: 3, .. }));
    assert_eq!(
        fs::read_to_string(root(dir.path()).join("x00003.txt")).expect("created file"),
        "x00003\t(x00003){\n}\n"
    );
    assert_eq!(
        service.workspace().bank(3).map(|bank| bank.title.as_str()),
        Some("x00003")
    );
}

#[test]
fn open_reads_existing_file_and_keeps_its_title() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        root(dir.path()).join("x00002.txt"),
        "x00002\t(Groceries){\n\t0001\tmilk\n}\n",
    )
    .expect("write fixture");
    let mut service = service_in(dir.path());

    let outcome = service.open_bank("x00002").expect("open existing bank");
    assert!(matches!(outcome, OpenOutcome::Opened { id: 2, .. }));
    let bank = service.workspace().bank(2).expect("bank loaded");
    assert_eq!(bank.title, "Groceries");
    assert_eq!(bank.get(1, 1), Some("milk"));
    assert_eq!(
        service.workspace().origin(2),
        Some(root(dir.path()).join("x00002.txt").as_path())
    );
}

#[test]
fn open_rejects_malformed_names() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut service = service_in(dir.path());

    let err = service.open_bank("x12ab").expect_err("non-decimal id");
    assert!(matches!(err, ServiceError::InvalidId { .. }));
}

#[test]
fn failed_initial_save_keeps_bank_in_memory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blocked = dir.path().join("blocked");
    fs::write(&blocked, "a regular file, not a directory").expect("write blocker");
    let paths = Paths::from_roots(blocked, dir.path().join("plugins"));
    let mut service = WorkspaceService::with_files(Config::default(), paths);

    let outcome = service.open_bank("x00001").expect("open degrades, not fails");
    assert!(matches!(outcome, OpenOutcome::CreatedUnsaved { id: 1, .. }));
    assert!(service.workspace().contains(1));
    service
        .insert_value(1, 1, 1, "still editable")
        .expect("insert into unsaved bank");
}

#[test]
fn edits_persist_only_after_save() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut service = service_in(dir.path());
    let id = service.open_bank("x00001").expect("create bank").id();

    service.insert_value(id, 1, 1, "one").expect("insert");
    service.insert_value(id, 2, 7, "seven").expect("insert");
    let mut reader = service_in(dir.path());
    reader.ensure_loaded(id).expect("load saved empty bank");
    assert_eq!(reader.workspace().bank(id).map(|bank| bank.cell_count()), Some(0));

    let path = service.save_bank(id).expect("save");
    assert_eq!(
        fs::read_to_string(path).expect("read saved file"),
        "x00001\t(x00001){\n01\n\t0001\tone\n02\n\t0007\tseven\n}\n"
    );

    let mut reader = service_in(dir.path());
    reader.ensure_loaded(id).expect("reload");
    let bank = reader.workspace().bank(id).expect("bank loaded");
    assert_eq!(bank.get(2, 7), Some("seven"));
}

#[test]
fn deleting_last_value_drops_register_and_compacts_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut service = service_in(dir.path());
    let id = service.open_bank("x00001").expect("create bank").id();
    service.insert_value(id, 1, 1, "one").expect("insert");
    service.insert_value(id, 2, 1, "gone soon").expect("insert");

    assert_eq!(
        service.delete_value(id, 2, 1).expect("delete"),
        Some("gone soon".to_string())
    );
    assert_eq!(service.delete_value(id, 2, 1).expect("delete again"), None);
    assert_eq!(
        service.bank_text(id).as_deref(),
        Some("x00001\t(x00001){\n\t0001\tone\n}\n")
    );
}

#[test]
fn edits_require_a_loaded_bank() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut service = service_in(dir.path());

    let err = service.insert_value(4, 1, 1, "v").expect_err("bank not loaded");
    assert!(matches!(err, ServiceError::BankNotLoaded(4)));
    assert!(matches!(
        service.save_bank(4),
        Err(ServiceError::BankNotLoaded(4))
    ));
}

#[test]
fn merge_copies_cells_and_adopts_title_only_when_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let incoming = dir.path().join("incoming.txt");
    fs::write(
        &incoming,
        "x00042\t(Imported){\n01\n\t0001\tnew\n03\n\t0002\textra\n}\n",
    )
    .expect("write incoming");
    fs::write(
        root(dir.path()).join("x00001.txt"),
        "x00001\t(){\n\t0001\told\n\t0005\tkept\n}\n",
    )
    .expect("write target");
    let mut service = service_in(dir.path());
    service.open_bank("x00001").expect("open target");

    let merged = service.merge_file(1, &incoming).expect("merge");
    assert_eq!(merged, 2);
    let bank = service.workspace().bank(1).expect("bank loaded");
    assert_eq!(bank.get(1, 1), Some("new"));
    assert_eq!(bank.get(1, 5), Some("kept"));
    assert_eq!(bank.get(3, 2), Some("extra"));
    // The empty header title was replaced by the stem on open.
    assert_eq!(bank.title, "x00001");
}

#[test]
fn preload_all_loads_every_canonical_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = root(dir.path());
    fs::write(root.join("x00001.txt"), "x00001\t(a){\n}\n").expect("write");
    fs::write(root.join("x00002.txt"), "x00002\t(b){\n\t0001\tv\n}\n").expect("write");
    fs::write(root.join("x00003.txt"), "broken").expect("write");
    fs::write(root.join("notes.txt"), "not a bank name").expect("write");
    let mut service = service_in(dir.path());

    assert_eq!(service.preload_all().expect("preload"), 2);
    assert_eq!(service.workspace().ids(), vec![1, 2]);
}

#[test]
fn header_id_mismatch_is_rejected_and_resolves_as_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        root(dir.path()).join("x00004.txt"),
        "x00005\t(wrong){\n\t0001\tv\n}\n",
    )
    .expect("write");
    let mut service = service_in(dir.path());

    assert!(matches!(
        service.ensure_loaded(4),
        Err(ServiceError::IdMismatch {
            expected: 4,
            found: 5
        })
    ));
    assert_eq!(
        service.resolve_text("x00004.01.0001", 1),
        "[Missing x00004.01.0001]"
    );
}

#[test]
fn exports_write_resolved_text_and_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        root(dir.path()).join("x00001.txt"),
        "x00001\t(Quote \"me\"){\n01\n\t0001\tsay r2.0001\n02\n\t0001\t\"hi\"\n}\n",
    )
    .expect("write");
    let mut service = service_in(dir.path());
    service.open_bank("x00001").expect("open");

    let text_path = service.write_resolved_export(1).expect("text export");
    assert_eq!(
        text_path,
        Paths::under(dir.path()).out_dir.join("x00001.resolved.txt")
    );
    assert_eq!(
        fs::read_to_string(&text_path).expect("read text export"),
        "x00001\t(Quote \"me\"){\n01\n\t0001\tsay \"hi\"\n02\n\t0001\t\"hi\"\n}\n"
    );

    let json_path = service.write_json_export(1).expect("json export");
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(json_path).expect("read json export"))
            .expect("valid json");
    assert_eq!(json["bank"], "x00001");
    assert_eq!(json["title"], "Quote \"me\"");
    assert_eq!(json["registers"][0]["id"], "01");
    assert_eq!(json["registers"][0]["addresses"][0]["id"], "0001");
    assert_eq!(json["registers"][0]["addresses"][0]["value"], "say \"hi\"");
    assert_eq!(json["registers"][1]["id"], "02");
}
