//! End-to-end feature flows over a scripted peripheral.

mod common;

use std::sync::Arc;

use common::ScriptedTransport;
use parking_lot::Mutex;
use rand_core::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};

use lockwire::crypto;
use lockwire::features::{
    AutoLockFeature, GuestError, GuestFeature, KeyExchangeError, KeyExchangeFeature, LockError,
    LockFeature, LockState, NameFeature, PasswordError, PasswordFeature, WifiFeature,
};
use lockwire::{
    Handler, MemorySecretStore, Message, MessageCommand, MessageType, SecretStore, Transport,
};

const REQUEST_CHANNEL: &str = "00000001-9f34-11ee-8c90-0242ac120002";

fn handler(transport: Arc<ScriptedTransport>) -> Arc<Handler> {
    Arc::new(Handler::new(
        transport as Arc<dyn Transport>,
        REQUEST_CHANNEL.to_owned(),
    ))
}

fn reply_to(request: &Message, payload: Option<Vec<u8>>) -> Message {
    Message {
        message_type: MessageType::Reply,
        command: request.command,
        encrypted: false,
        payload,
    }
}

#[tokio::test]
async fn key_exchange_derives_and_persists_the_shared_key() {
    let device_secret = StaticSecret::random_from_rng(OsRng);
    let device_public = PublicKey::from(&device_secret);
    let seen_client_key: Arc<Mutex<Option<[u8; 32]>>> = Arc::new(Mutex::new(None));

    let transport = ScriptedTransport::new({
        let seen = Arc::clone(&seen_client_key);
        move |request| {
            assert_eq!(request.command, MessageCommand::KeyExchange);
            assert!(!request.encrypted);
            let payload = request.payload.clone().expect("client public key");
            *seen.lock() = Some(payload.try_into().expect("32-byte key"));
            Some(reply_to(request, Some(device_public.as_bytes().to_vec())))
        }
    });

    let store = MemorySecretStore::new();
    let feature = KeyExchangeFeature::new(handler(transport));
    let key = feature.perform(&store).await.unwrap();

    let client_public = PublicKey::from(seen_client_key.lock().expect("captured key"));
    let expected = crypto::derive_symmetric_key(&device_secret.diffie_hellman(&client_public));
    assert_eq!(key, expected);
    assert_eq!(store.symmetric_key(), Some(expected));
}

#[tokio::test]
async fn key_exchange_rejection_persists_nothing() {
    let transport = ScriptedTransport::new(|request| Some(reply_to(request, None)));
    let store = MemorySecretStore::new();
    let feature = KeyExchangeFeature::new(handler(transport));

    let err = feature.perform(&store).await.unwrap_err();
    assert!(matches!(err, KeyExchangeError::DeviceRejectedRequest));
    assert!(store.symmetric_key().is_none());
}

#[tokio::test]
async fn set_lock_without_a_key_fails_before_sending() {
    let transport = ScriptedTransport::new(|request| Some(reply_to(request, Some(vec![0x01]))));
    let store = MemorySecretStore::new();
    let feature = LockFeature::new(handler(Arc::clone(&transport)));

    let err = feature.set_lock(LockState::Unlocked, &store).await.unwrap_err();
    assert!(matches!(err, LockError::MissingKey));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn set_lock_without_a_password_fails_before_sending() {
    let transport = ScriptedTransport::new(|request| Some(reply_to(request, Some(vec![0x01]))));
    let store = MemorySecretStore::new();
    store.save_symmetric_key(&[0x42; 32]).unwrap();
    let feature = LockFeature::new(handler(Arc::clone(&transport)));

    let err = feature.set_lock(LockState::Unlocked, &store).await.unwrap_err();
    assert!(matches!(err, LockError::MissingPassword));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn set_lock_seals_the_password_behind_the_state_byte() {
    let key = [0x42u8; 32];
    let transport = ScriptedTransport::new(move |request| {
        assert_eq!(request.command, MessageCommand::SetLockState);
        assert!(request.encrypted);
        let payload = request.payload.as_deref().expect("payload");
        assert_eq!(payload[0], LockState::Unlocked as u8);
        let password = crypto::open(&key, &payload[1..]).expect("blob must authenticate");
        assert_eq!(password, b"hunter2");
        Some(reply_to(request, Some(vec![0x01])))
    });

    let store = MemorySecretStore::new();
    store.save_symmetric_key(&key).unwrap();
    store.save_device_password("hunter2").unwrap();

    let feature = LockFeature::new(handler(transport));
    feature.set_lock(LockState::Unlocked, &store).await.unwrap();
}

#[tokio::test]
async fn set_lock_surfaces_a_device_rejection() {
    let transport = ScriptedTransport::new(|request| Some(reply_to(request, Some(vec![0x00]))));
    let store = MemorySecretStore::new();
    store.save_symmetric_key(&[0x42; 32]).unwrap();
    store.save_device_password("hunter2").unwrap();

    let feature = LockFeature::new(handler(transport));
    let err = feature.set_lock(LockState::Locked, &store).await.unwrap_err();
    assert!(matches!(err, LockError::DeviceRejectedPassword));
}

#[tokio::test]
async fn lock_state_decodes_the_reply_byte() {
    let transport = ScriptedTransport::new(|request| Some(reply_to(request, Some(vec![0x01]))));
    let feature = LockFeature::new(handler(transport));
    assert_eq!(feature.lock_state().await.unwrap(), LockState::Unlocked);

    let transport = ScriptedTransport::new(|request| Some(reply_to(request, None)));
    let feature = LockFeature::new(handler(transport));
    assert_eq!(feature.lock_state().await.unwrap(), LockState::Locked);
}

#[tokio::test]
async fn password_is_persisted_only_after_the_device_acknowledges() {
    let key = [0x17u8; 32];
    let accepted: Arc<Mutex<Option<Vec<u8>>>> = Arc::new(Mutex::new(None));
    let transport = ScriptedTransport::new({
        let accepted = Arc::clone(&accepted);
        move |request| {
            assert_eq!(request.command, MessageCommand::SetDevicePassword);
            assert!(request.encrypted);
            let sealed = request.payload.as_deref().expect("sealed password");
            *accepted.lock() = Some(crypto::open(&key, sealed).expect("must authenticate"));
            Some(reply_to(request, Some(vec![0x01])))
        }
    });

    let store = MemorySecretStore::new();
    let feature = PasswordFeature::new(handler(transport));
    let password = feature
        .generate_device_password(Some(key), &store)
        .await
        .unwrap();

    assert_eq!(accepted.lock().as_deref(), Some(password.as_bytes()));
    assert_eq!(store.device_password(), Some(password));
}

#[tokio::test]
async fn rejected_password_is_never_persisted() {
    let transport = ScriptedTransport::new(|request| Some(reply_to(request, Some(vec![0x00]))));
    let store = MemorySecretStore::new();
    let feature = PasswordFeature::new(handler(transport));

    let err = feature
        .generate_device_password(Some([0x17; 32]), &store)
        .await
        .unwrap_err();
    assert!(matches!(err, PasswordError::DeviceRejectedRequest));
    assert!(store.device_password().is_none());
}

#[tokio::test]
async fn password_needs_a_key_from_somewhere() {
    let transport = ScriptedTransport::new(|request| Some(reply_to(request, Some(vec![0x01]))));
    let store = MemorySecretStore::new();
    let feature = PasswordFeature::new(handler(Arc::clone(&transport)));

    let err = feature
        .generate_device_password(None, &store)
        .await
        .unwrap_err();
    assert!(matches!(err, PasswordError::NoSymmetricKey));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn guest_unlock_frames_otp_and_identifier() {
    let transport = ScriptedTransport::new(|request| {
        assert_eq!(request.command, MessageCommand::GuestUnlock);
        let payload = request.payload.as_deref().expect("payload");
        assert_eq!(payload[0], 0x01);
        assert_eq!(&payload[1..], b"123456\x1Fotp-7");
        Some(reply_to(request, Some(vec![0x01])))
    });
    let feature = GuestFeature::new(handler(transport));
    feature.unlock(true, "123456", "otp-7").await.unwrap();
}

#[tokio::test]
async fn guest_unlock_surfaces_otp_rejection() {
    let transport = ScriptedTransport::new(|request| Some(reply_to(request, Some(vec![0x00]))));
    let feature = GuestFeature::new(handler(transport));
    let err = feature.unlock(true, "000000", "otp-1").await.unwrap_err();
    assert!(matches!(err, GuestError::OtpFailed));
}

#[tokio::test]
async fn wifi_survey_splits_on_the_unit_separator() {
    let transport = ScriptedTransport::new(|request| {
        assert_eq!(request.command, MessageCommand::StartNetworkListen);
        Some(reply_to(request, Some(b"home\x1Foffice\x1F".to_vec())))
    });
    let feature = WifiFeature::new(handler(transport));
    let networks = feature.available_networks().await.unwrap();
    assert_eq!(networks, vec!["home".to_owned(), "office".to_owned()]);
}

#[tokio::test]
async fn wifi_connect_joins_ssid_and_password() {
    let transport = ScriptedTransport::new(|request| {
        assert_eq!(request.command, MessageCommand::ConnectToNetwork);
        assert_eq!(request.payload.as_deref(), Some(&b"home\x1Fpass"[..]));
        Some(reply_to(request, None))
    });
    let feature = WifiFeature::new(handler(transport));
    feature.connect("home", "pass").await.unwrap();
}

#[tokio::test]
async fn device_name_is_clipped_to_twenty_characters() {
    let transport = ScriptedTransport::new(|request| {
        assert_eq!(request.command, MessageCommand::SetName);
        assert_eq!(
            request.payload.as_deref(),
            Some(&b"abcdefghijklmnopqrst"[..])
        );
        Some(reply_to(request, None))
    });
    let feature = NameFeature::new(handler(transport));
    feature.set_name("abcdefghijklmnopqrstuvwxyz").await.unwrap();
}

#[tokio::test]
async fn auto_lock_payload_is_one_byte_or_absent() {
    let transport = ScriptedTransport::new(|request| {
        match request.command {
            MessageCommand::SetAutoLock => {
                assert_eq!(request.payload.as_deref(), Some(&[30u8][..]));
            }
            MessageCommand::GetAutoLock => {
                return Some(reply_to(request, Some(vec![30])));
            }
            other => panic!("unexpected command {other:?}"),
        }
        Some(reply_to(request, None))
    });
    let feature = AutoLockFeature::new(handler(Arc::clone(&transport)));
    feature.set_auto_lock(Some(30)).await.unwrap();
    assert_eq!(feature.auto_lock().await.unwrap(), Some(30));

    let transport = ScriptedTransport::new(|request| {
        assert_eq!(request.payload, None);
        Some(reply_to(request, None))
    });
    let feature = AutoLockFeature::new(handler(transport));
    feature.set_auto_lock(None).await.unwrap();
}
