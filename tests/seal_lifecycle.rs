use sealcore::{AutoUnseal, KeyManager, SealState, SealcoreError, UnsealProgress};

#[test]
fn test_full_seal_lifecycle() {
    // Goal: walk the whole state machine through the public surface:
    // init -> seal -> collect shares -> unseal -> data operations.

    let manager = KeyManager::in_memory().unwrap();

    // 1. Init hands out the root token and one share per custodian, once.
    let output = manager.init().unwrap();
    assert_eq!(output.share_tokens.len(), 5);
    assert_eq!(output.root_token.len(), 24);
    assert!(!manager.is_sealed().unwrap());

    // 2. A second init must not regenerate keys or shares.
    assert!(matches!(
        manager.init(),
        Err(SealcoreError::AlreadyInitialized)
    ));

    // 3. Protect data while unsealed.
    let ciphertext = manager.encrypt(b"hello").unwrap();

    // 4. Seal: key material is evicted, data operations refuse.
    manager.seal(&output.root_token).unwrap();
    assert!(manager.is_sealed().unwrap());
    assert_eq!(manager.state().unwrap(), SealState::Sealed);
    assert!(matches!(manager.encrypt(b"x"), Err(SealcoreError::Sealed)));
    assert!(matches!(
        manager.decrypt(&ciphertext),
        Err(SealcoreError::Sealed)
    ));

    // 5. Collect shares: progress below the threshold, unsealed at it.
    assert_eq!(
        manager.unseal(&output.share_tokens[0]).unwrap(),
        UnsealProgress::Waiting {
            collected: 1,
            threshold: 3
        }
    );
    assert_eq!(manager.state().unwrap(), SealState::Unsealing);
    assert!(manager.is_sealed().unwrap());
    assert_eq!(
        manager.unseal(&output.share_tokens[1]).unwrap(),
        UnsealProgress::Waiting {
            collected: 2,
            threshold: 3
        }
    );
    assert_eq!(
        manager.unseal(&output.share_tokens[2]).unwrap(),
        UnsealProgress::Unsealed
    );
    assert!(!manager.is_sealed().unwrap());

    // 6. The encryption key survived the seal cycle: old ciphertext opens.
    assert_eq!(manager.decrypt(&ciphertext).unwrap(), b"hello");

    // 7. Extra shares are ignored once unsealed.
    assert_eq!(
        manager.unseal(&output.share_tokens[3]).unwrap(),
        UnsealProgress::AlreadyUnsealed
    );
}

#[test]
fn test_seal_requires_a_valid_root_token() {
    let manager = KeyManager::in_memory().unwrap();
    let output = manager.init().unwrap();

    // A well-formed but wrong token is rejected and the state is untouched.
    assert!(matches!(
        manager.seal("AAAAAAAAAAAAAAAAAAAAAA=="),
        Err(SealcoreError::InvalidRootKey)
    ));
    assert!(!manager.is_sealed().unwrap());

    // Garbage is rejected the same way.
    assert!(matches!(
        manager.seal("not-a-token"),
        Err(SealcoreError::InvalidRootKey)
    ));

    // The real token seals.
    manager.seal(&output.root_token).unwrap();
    assert!(manager.is_sealed().unwrap());
}

#[test]
fn test_seal_before_init_reports_not_initialized() {
    let manager = KeyManager::in_memory().unwrap();
    assert!(matches!(
        manager.seal("AAAAAAAAAAAAAAAAAAAAAA=="),
        Err(SealcoreError::NotInitialized)
    ));
    // Uninitialized systems report sealed.
    assert!(manager.is_sealed().unwrap());
    assert_eq!(manager.state().unwrap(), SealState::Uninitialized);
}

#[test]
fn test_auto_unseal_with_pre_shared_root_token() {
    let manager = KeyManager::in_memory().unwrap();
    let output = manager.init().unwrap();
    manager.seal(&output.root_token).unwrap();

    // The 24-character trigger bypasses share collection entirely.
    assert_eq!(
        manager.auto_unseal(&output.root_token).unwrap(),
        AutoUnseal::Unsealed
    );
    assert!(!manager.is_sealed().unwrap());
    let ciphertext = manager.encrypt(b"auto").unwrap();
    assert_eq!(manager.decrypt(&ciphertext).unwrap(), b"auto");
}

#[test]
fn test_outcomes_serialize_for_presentation() {
    // Callers render progress and init output; pin the serialized shape.
    let progress = UnsealProgress::Waiting {
        collected: 2,
        threshold: 3,
    };
    let value = serde_json::to_value(&progress).unwrap();
    assert_eq!(value["Waiting"]["collected"], 2);
    assert_eq!(value["Waiting"]["threshold"], 3);

    let sealed = serde_json::to_value(SealState::Sealed).unwrap();
    assert_eq!(sealed, "Sealed");
}
