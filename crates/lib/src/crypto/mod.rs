//! Transparent encryption of marked-secret values.
//!
//! Values written or read under [`ValueFlags::Crypted`] pass through the
//! installed [`CryptoService`]; everything else bypasses this module
//! entirely. When no service is installed, encryption and decryption are
//! the identity, so secret-flagged code keeps working (in the clear) on
//! hosts that never configure a cipher.
//!
//! [`ValueFlags::Crypted`]: crate::config::ValueFlags::Crypted

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::Value;

pub mod aes;

pub use aes::AesGcmCrypto;

/// Symmetric cipher over tree values.
pub trait CryptoService {
    /// Encrypts a tree value into its stored form.
    fn encrypt(&self, value: &Value) -> Value;

    /// Decrypts a stored form back into the original tree value. Returns
    /// [`Value::Null`] when the input is not a valid ciphertext.
    fn decrypt(&self, value: &Value) -> Value;
}

thread_local! {
    static SERVICE: RefCell<Option<Rc<dyn CryptoService>>> = const { RefCell::new(None) };
}

/// Installs the process-wide crypto service, replacing any previous one.
pub fn install(service: Rc<dyn CryptoService>) {
    SERVICE.with(|cell| *cell.borrow_mut() = Some(service));
}

/// Encrypts through the installed service; identity when none is installed.
pub fn encrypt(value: &Value) -> Value {
    SERVICE.with(|cell| match &*cell.borrow() {
        Some(service) => service.encrypt(value),
        None => value.clone(),
    })
}

/// Decrypts through the installed service; identity when none is installed.
pub fn decrypt(value: &Value) -> Value {
    SERVICE.with(|cell| match &*cell.borrow() {
        Some(service) => service.decrypt(value),
        None => value.clone(),
    })
}
