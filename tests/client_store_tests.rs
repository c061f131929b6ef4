//! tests/client_store_tests.rs

mod common;
use common::{memory_store, sample_client, seed_clients};

use std::sync::Arc;

use records_vault::ClientField::*;
use records_vault::{
    Cipher, ClientPatch, ClientRecord, ClientStore, CoreError, FieldCodec, SymmetricKey,
};
use tempfile::tempdir;

fn cipher() -> Arc<Cipher> {
    Arc::new(Cipher::with_keys(vec![SymmetricKey::generate()]).unwrap())
}

#[test]
fn client_round_trips_through_the_codec() {
    common::setup();
    let mut store = memory_store(&cipher());
    let client = ClientRecord::new("Grundschule Nord", "Anna", "Müller")
        .with(Birthday, "2015-03-14")
        .with(Street, "Hauptstraße 1")
        .with(LrstDiagnosis, "iLst")
        .with(KeywordTaet, "lrst");

    let id = store.add_client(&client).unwrap();
    let loaded = store.get_client(id).unwrap();

    assert_eq!(loaded.client_id, Some(id));
    assert_eq!(loaded.school, "Grundschule Nord");
    assert_eq!(loaded.first_name, "Anna");
    assert_eq!(loaded.last_name, "Müller");
    assert_eq!(loaded.birthday.as_deref(), Some("2015-03-14"));
    assert_eq!(loaded.street.as_deref(), Some("Hauptstraße 1"));
    assert_eq!(loaded.lrst_diagnosis.as_deref(), Some("iLst"));
    assert_eq!(loaded.email, None);
    assert!(loaded.created_at.is_some());
    assert_eq!(loaded.created_at, loaded.updated_at);
}

#[test]
fn encrypted_columns_hold_tokens_and_nulls_stay_null() {
    let mut store = memory_store(&cipher());
    let id = store
        .add_client(&ClientRecord::new("S", "Anna", "Müller"))
        .unwrap();

    let (last_name, email): (String, Option<String>) = store
        .connection()
        .query_row(
            "SELECT last_name_encr, email_encr FROM clients WHERE client_id = ?1",
            [id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();

    assert!(!last_name.contains("Müller"));
    assert_eq!(
        store.codec().decode(Some(last_name.as_str())).unwrap().as_deref(),
        Some("Müller")
    );
    assert_eq!(email, None);
}

#[test]
fn explicit_client_id_is_kept() {
    let mut store = memory_store(&cipher());
    let mut client = sample_client(1);
    client.client_id = Some(4711);
    assert_eq!(store.add_client(&client).unwrap(), 4711);
    assert_eq!(store.get_client(4711).unwrap().first_name, "First1");
}

#[test]
fn edit_changes_only_patched_fields() {
    let mut store = memory_store(&cipher());
    let id = store.add_client(&sample_client(2)).unwrap();
    let before = store.get_client(id).unwrap();

    let patch = ClientPatch::new()
        .school("Gymnasium Süd")
        .set(Telephone1, "0221 123456")
        .clear(Email);
    store.edit_client(id, &patch).unwrap();

    let after = store.get_client(id).unwrap();
    assert_eq!(after.school, "Gymnasium Süd");
    assert_eq!(after.telephone1.as_deref(), Some("0221 123456"));
    assert_eq!(after.email, None);
    assert_eq!(after.first_name, before.first_name);
    assert_eq!(after.notes, before.notes);
    assert_eq!(after.created_at, before.created_at);
    assert!(after.updated_at >= before.updated_at);
}

#[test]
fn required_names_cannot_be_cleared() {
    let mut store = memory_store(&cipher());
    let id = store.add_client(&sample_client(1)).unwrap();
    assert!(matches!(
        store.edit_client(id, &ClientPatch::new().clear(LastName)),
        Err(CoreError::Configuration(_))
    ));
    assert_eq!(store.get_client(id).unwrap().last_name, "Last1");
}

#[test]
fn missing_clients_are_reported_by_id() {
    let mut store = memory_store(&cipher());
    for result in [
        store.get_client(99).map(|_| ()),
        store.edit_client(99, &ClientPatch::new().set(City, "x")),
        store.delete_client(99),
    ] {
        match result {
            Err(CoreError::RecordNotFound { table, id }) => {
                assert_eq!(table, "clients");
                assert_eq!(id, 99);
            }
            other => panic!("expected RecordNotFound, got {other:?}"),
        }
    }
}

#[test]
fn list_count_and_delete() {
    let mut store = memory_store(&cipher());
    let ids = seed_clients(&mut store, 5);

    assert_eq!(store.count_clients().unwrap(), 5);
    assert_eq!(store.list_client_ids().unwrap(), ids);

    store.delete_client(ids[2]).unwrap();
    assert_eq!(store.count_clients().unwrap(), 4);
    assert!(!store.list_client_ids().unwrap().contains(&ids[2]));
}

#[test]
fn data_on_disk_needs_the_right_key() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db").join("records.db");
    let key = SymmetricKey::generate();

    let id = {
        let codec = FieldCodec::new(Arc::new(Cipher::with_keys(vec![key.clone()]).unwrap()));
        let mut store = ClientStore::open(&path, codec).unwrap();
        store.add_client(&sample_client(3)).unwrap()
    };

    let codec = FieldCodec::new(Arc::new(Cipher::with_keys(vec![key]).unwrap()));
    let store = ClientStore::open(&path, codec).unwrap();
    assert_eq!(store.get_client(id).unwrap().last_name, "Last3");

    let wrong = FieldCodec::new(Arc::new(
        Cipher::with_keys(vec![SymmetricKey::generate()]).unwrap(),
    ));
    let store = ClientStore::open(&path, wrong).unwrap();
    assert!(matches!(
        store.get_client(id),
        Err(CoreError::Decryption(_))
    ));
}
