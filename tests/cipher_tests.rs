//! tests/cipher_tests.rs

mod common;

use std::sync::Arc;
use std::thread;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use records_vault::{derive_key, Cipher, CoreError, FieldCodec, SymmetricKey};

#[test]
fn encrypt_decrypt_keeps_unicode_intact() {
    common::setup();
    let cipher = Cipher::with_keys(vec![SymmetricKey::generate()]).unwrap();
    for text in ["Müller", "Straße 7, 50667 Köln", "", "🙂 ok"] {
        let token = cipher.encrypt(text).unwrap();
        assert_ne!(token, text);
        assert_eq!(cipher.decrypt(&token).unwrap(), text);
    }
}

#[test]
fn uninitialised_cipher_is_a_configuration_error() {
    let cipher = Cipher::new();
    assert!(!cipher.is_initialized());
    assert!(matches!(
        cipher.encrypt("x"),
        Err(CoreError::Configuration(_))
    ));
    assert!(matches!(
        cipher.decrypt("AQ"),
        Err(CoreError::Configuration(_))
    ));
    assert!(matches!(
        cipher.initialize(Vec::new()),
        Err(CoreError::Configuration(_))
    ));
    assert!(!cipher.is_initialized());
}

#[test]
fn rotation_encrypts_with_new_and_still_reads_old() {
    let old = SymmetricKey::generate();
    let new = SymmetricKey::generate();

    let cipher = Cipher::with_keys(vec![old.clone()]).unwrap();
    let old_token = cipher.encrypt("Mustermann").unwrap();

    cipher.initialize(vec![new.clone(), old.clone()]).unwrap();
    assert_eq!(cipher.key_count(), 2);
    assert_eq!(cipher.primary_fingerprint(), Some(new.fingerprint()));
    assert_eq!(cipher.decrypt(&old_token).unwrap(), "Mustermann");

    // New tokens are bound to the primary only
    let new_token = cipher.encrypt("Mustermann").unwrap();
    let old_only = Cipher::with_keys(vec![old]).unwrap();
    assert!(matches!(
        old_only.decrypt(&new_token),
        Err(CoreError::Decryption(_))
    ));
    let new_only = Cipher::with_keys(vec![new]).unwrap();
    assert_eq!(new_only.decrypt(&new_token).unwrap(), "Mustermann");
}

#[test]
fn foreign_and_malformed_tokens_are_decryption_errors() {
    let cipher = Cipher::with_keys(vec![SymmetricKey::generate()]).unwrap();
    let stranger = Cipher::with_keys(vec![SymmetricKey::generate()]).unwrap();
    let token = stranger.encrypt("secret").unwrap();

    for bad in [token.as_str(), "not base64 at all!", "AQID", ""] {
        assert!(
            matches!(cipher.decrypt(bad), Err(CoreError::Decryption(_))),
            "accepted {bad:?}"
        );
    }
}

#[test]
fn tampered_token_is_rejected() {
    let cipher = Cipher::with_keys(vec![SymmetricKey::generate()]).unwrap();
    let token = cipher.encrypt("Förderbedarf").unwrap();
    let mut raw = URL_SAFE_NO_PAD.decode(&token).unwrap();
    let last = raw.len() - 1;
    raw[last] ^= 0x01;
    let forged = URL_SAFE_NO_PAD.encode(&raw);

    assert!(matches!(
        cipher.decrypt(&forged),
        Err(CoreError::Decryption(_))
    ));
}

#[test]
fn password_derived_keys_interoperate() {
    let salt = [7u8; 16];
    let writer = Cipher::with_keys(vec![derive_key("pw-1", &salt, 1_000).unwrap()]).unwrap();
    let reader = Cipher::with_keys(vec![derive_key("pw-1", &salt, 1_000).unwrap()]).unwrap();
    let other = Cipher::with_keys(vec![derive_key("pw-2", &salt, 1_000).unwrap()]).unwrap();

    let token = writer.encrypt("Notizen").unwrap();
    assert_eq!(reader.decrypt(&token).unwrap(), "Notizen");
    assert!(other.decrypt(&token).is_err());
}

#[test]
fn shared_cipher_is_usable_from_several_threads() {
    let cipher = Arc::new(Cipher::with_keys(vec![SymmetricKey::generate()]).unwrap());
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let cipher = Arc::clone(&cipher);
            thread::spawn(move || {
                let text = format!("client {n}");
                let token = cipher.encrypt(&text).unwrap();
                assert_eq!(cipher.decrypt(&token).unwrap(), text);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn codec_follows_cipher_reinitialisation() {
    let old = SymmetricKey::generate();
    let new = SymmetricKey::generate();
    let cipher = Arc::new(Cipher::with_keys(vec![old.clone()]).unwrap());
    let codec = FieldCodec::new(Arc::clone(&cipher));

    let stored = codec.encode(Some("Bonn")).unwrap();
    cipher.initialize(vec![new, old]).unwrap();

    assert_eq!(codec.decode(stored.as_deref()).unwrap().as_deref(), Some("Bonn"));
    assert_eq!(codec.encode(None).unwrap(), None);
}
