use layer_mtproto::{EncryptedSession, Message, Session};
use layer_tl_types::Deserializable;

#[test]
fn session_seq_no_increments() {
    let mut s = Session::new();
    let a = s.next_seq_no();
    let b = s.next_seq_no();
    assert!(a & 1 == 1, "content-related seq_no must be odd");
    assert!(b & 1 == 1);
    assert!(b > a, "seq_no must increase");
}

#[test]
fn session_unrelated_seq_no_is_even() {
    let mut s = Session::new();
    let n = s.next_seq_no_unrelated();
    assert_eq!(n & 1, 0, "unrelated seq_no must be even");
}

#[test]
fn message_plaintext_bytes_layout() {
    let mut s = Session::new();
    // Use a zero-length body to inspect the fixed header
    let id = s.next_msg_id();
    let msg = Message::plaintext(id, 1, vec![0xAA, 0xBB]);
    let wire = msg.to_plaintext_bytes();

    // auth_key_id (8 bytes) + msg_id (8 bytes) + length (4 bytes) + body (2 bytes)
    assert_eq!(wire.len(), 8 + 8 + 4 + 2);
    // auth_key_id must be 0 for plaintext
    assert_eq!(&wire[..8], &[0u8; 8]);
    // length field must match body
    assert_eq!(u32::from_le_bytes(wire[16..20].try_into().unwrap()), 2);
    // body is intact
    assert_eq!(&wire[20..], &[0xAA, 0xBB]);
}

// ── EncryptedSession ──────────────────────────────────────────────────────────

#[test]
fn encrypted_roundtrip_preserves_body() {
    let auth_key = [7u8; 256];
    let mut enc = EncryptedSession::new(auth_key, 12345, 0);

    let mut wire = enc.pack_serializable(&layer_tl_types::functions::MsgsAck {
        msg_ids: vec![1, 2, 3],
    });

    let decrypted = enc.unpack(&mut wire).expect("decrypt own message");
    assert_eq!(decrypted.session_id, enc.session_id());

    let mut cursor = layer_tl_types::Cursor::from_slice(&decrypted.body);
    let ack = layer_tl_types::functions::MsgsAck::deserialize(&mut cursor).unwrap();
    assert_eq!(ack.msg_ids, vec![1, 2, 3]);
}

#[test]
fn encrypted_pack_unrelated_uses_even_seq_no() {
    let auth_key = [3u8; 256];
    let mut enc = EncryptedSession::new(auth_key, 1, 0);

    let mut wire = enc.pack_serializable_unrelated(&layer_tl_types::functions::MsgsAck {
        msg_ids: vec![42],
    });

    let decrypted = enc.unpack(&mut wire).unwrap();
    assert_eq!(decrypted.seq_no & 1, 0, "unrelated messages use an even seq_no");
}

#[test]
fn encrypted_msg_id_is_strictly_monotonic() {
    let mut enc = EncryptedSession::new([2u8; 256], 1, 0);
    let mut last = i64::MIN;
    for _ in 0..10_000 {
        let (_, msg_id) = enc.pack_with_msg_id(&layer_tl_types::functions::PingDelayDisconnect {
            ping_id: 0,
            disconnect_delay: 75,
        });
        assert!(msg_id > last, "msg_id must strictly increase");
        assert_ne!(msg_id & 0b11, 0b11, "bottom two bits must never be all-ones");
        last = msg_id;
    }
}

#[test]
fn encrypted_rejects_wrong_session() {
    let mut a = EncryptedSession::new([1u8; 256], 1, 0);
    let b = EncryptedSession::new([1u8; 256], 1, 0);

    let mut wire = a.pack_serializable(&layer_tl_types::functions::MsgsAck { msg_ids: vec![9] });
    // `b` has a different (randomly generated) session_id than `a`.
    let err = b.unpack(&mut wire).unwrap_err();
    assert!(matches!(err, layer_mtproto::encrypted::DecryptError::SessionMismatch));
}
