use std::rc::Rc;

use strata::crypto::{self, AesGcmCrypto, CryptoService};
use strata::{saver, Config, Value, ValueFlags};

use crate::helpers;

/// Toy cipher that prefixes text with a marker; good enough to observe
/// which path a value travelled.
struct MarkerCrypto;

impl CryptoService for MarkerCrypto {
    fn encrypt(&self, value: &Value) -> Value {
        Value::Text(format!("##{}", value.as_text_or_empty()))
    }

    fn decrypt(&self, value: &Value) -> Value {
        match value.as_text().and_then(|text| text.strip_prefix("##")) {
            Some(rest) => Value::Text(rest.to_string()),
            None => Value::Null,
        }
    }
}

#[test]
fn test_crypted_values_store_the_encrypted_form() {
    let _env = helpers::setup();
    crypto::install(Rc::new(MarkerCrypto));

    let cfg = Config::open("secrets.json");
    cfg.set_value_with("p", "hi", ValueFlags::Crypted);

    // The stored tree holds the ciphertext.
    let root = cfg.root_value(Value::Null, ValueFlags::Normal);
    assert!(root.as_map().unwrap()["p"] == "##hi");
    assert!(cfg.value("p", "") == "##hi");

    // A crypted read recovers the plaintext.
    assert!(cfg.value_with("p", "", ValueFlags::Crypted) == "hi");
}

#[test]
fn test_plain_values_bypass_the_service() {
    let _env = helpers::setup();
    crypto::install(Rc::new(MarkerCrypto));

    let cfg = Config::open("secrets.json");
    cfg.set_value("p", "hi");
    assert!(cfg.value("p", "") == "hi");
}

#[test]
fn test_missing_crypted_value_yields_default() {
    let _env = helpers::setup();
    crypto::install(Rc::new(MarkerCrypto));

    let cfg = Config::open("secrets.json");
    assert!(cfg.value_with("absent", "d", ValueFlags::Crypted) == "d");
}

#[test]
fn test_no_service_is_identity() {
    let _env = helpers::setup();

    let cfg = Config::open("secrets.json");
    cfg.set_value_with("p", "hi", ValueFlags::Crypted);
    assert!(cfg.value_with("p", "", ValueFlags::Crypted) == "hi");
    assert!(cfg.value("p", "") == "hi");
}

#[test]
fn test_aes_crypted_values_round_trip_through_disk() {
    let env = helpers::setup();
    crypto::install(Rc::new(AesGcmCrypto::new(&[9; 32])));

    {
        let cfg = Config::open("secrets.json");
        cfg.set_value_with("token", "s3cret", ValueFlags::Crypted);
        cfg.sync();
    }
    saver::dispatch_pending();

    // The document on disk never contains the plaintext.
    let raw = std::fs::read_to_string(env.user.path().join("secrets.json")).unwrap();
    assert!(!raw.contains("s3cret"));

    let cfg = Config::open("secrets.json");
    assert!(cfg.value_with("token", "", ValueFlags::Crypted) == "s3cret");
}
