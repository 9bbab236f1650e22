use std::net::{TcpListener, TcpStream};
use std::sync::{mpsc, Arc};
use std::thread;

use crate::msgs::{MsgType, Packet};
use crate::protocol::{AuthOutcome, ClientSession, ServerSession, SessionKey};
use crate::storage::{CredentialStore, MemoryCredentialStore};
use crate::RampionError;

type ServerResult = Result<(SessionKey, AuthOutcome), RampionError>;

/// Runs one full handshake between a client and a server over loopback
/// TCP, one thread per side.
///
/// The server thread holds a clone of its socket until the client is
/// done; an aborting server must not reset the connection underneath the
/// client's final read.
fn run_pair<C>(
    store: Arc<C>,
    password: &[u8],
    client_id: &[u8],
    server_id: &[u8],
) -> (Result<SessionKey, RampionError>, ServerResult)
where
    C: CredentialStore + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (done_tx, done_rx) = mpsc::channel::<()>();

    let server_id = server_id.to_vec();
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let keeper = stream.try_clone().unwrap();
        let result = ServerSession::new(stream, server_id, store).handshake();
        let _ = done_rx.recv();
        drop(keeper);
        result
    });

    let stream = TcpStream::connect(addr).unwrap();
    let client_result = ClientSession::new(stream, client_id, password).handshake();
    let _ = done_tx.send(());

    (client_result, server.join().unwrap())
}

#[test]
fn matching_secrets_agree_on_the_key() {
    let store = Arc::new(MemoryCredentialStore::new());

    let (client, server) = run_pair(Arc::clone(&store), b"p1", b"alice", b"svc");
    let k_client = client.unwrap();
    let (k_server, outcome) = server.unwrap();
    assert_eq!(k_client.secret(), k_server.secret());
    assert_eq!(outcome, AuthOutcome::Registered);

    // same inputs again: the stored record now matches, and fresh
    // ephemerals give a fresh key
    let (client, server) = run_pair(store, b"p1", b"alice", b"svc");
    let k_client2 = client.unwrap();
    let (k_server2, outcome) = server.unwrap();
    assert_eq!(k_client2.secret(), k_server2.secret());
    assert_eq!(outcome, AuthOutcome::Verified);
    assert_ne!(k_client.secret(), k_client2.secret());
}

#[test]
fn wrong_password_is_rejected_with_close() {
    let store = Arc::new(MemoryCredentialStore::new());

    let (client, server) = run_pair(Arc::clone(&store), b"p1", b"alice", b"svc");
    client.unwrap();
    server.unwrap();

    let (client, server) = run_pair(store, b"p2", b"alice", b"svc");
    assert!(matches!(client, Err(RampionError::PeerClosed)));
    assert!(matches!(server, Err(RampionError::CredentialMismatch)));
}

#[test]
fn different_passwords_never_share_a_key() {
    // two registrations under different identities, then cross-check the
    // derived keys: nothing collides
    let store = Arc::new(MemoryCredentialStore::new());

    let (client_a, server_a) = run_pair(Arc::clone(&store), b"p1", b"alice", b"svc");
    let (client_b, server_b) = run_pair(store, b"p2", b"bob", b"svc");

    let k_a = client_a.unwrap();
    let k_b = client_b.unwrap();
    assert_eq!(k_a.secret(), server_a.unwrap().0.secret());
    assert_eq!(k_b.secret(), server_b.unwrap().0.secret());
    assert_ne!(k_a.secret(), k_b.secret());
}

#[test]
fn server_rejects_out_of_order_messages() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        ServerSession::new(stream, b"svc".to_vec(), MemoryCredentialStore::new()).handshake()
    });

    // open with U instead of HELLO
    let mut stream = TcpStream::connect(addr).unwrap();
    Packet::u(&[0x11; 32]).write_to(&mut stream).unwrap();

    assert!(matches!(
        server.join().unwrap(),
        Err(RampionError::UnexpectedType {
            expected: MsgType::Hello,
            got: MsgType::U,
        })
    ));
}

#[test]
fn client_rejects_a_bad_v() {
    // a fake server that answers U with a V of the wrong length
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let fake_server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        assert_eq!(
            Packet::read_from(&mut stream).unwrap().msg_type,
            MsgType::Hello
        );
        Packet::hello(b"svc").unwrap().write_to(&mut stream).unwrap();
        assert_eq!(
            Packet::read_from(&mut stream).unwrap().msg_type,
            MsgType::Setup
        );
        assert_eq!(Packet::read_from(&mut stream).unwrap().msg_type, MsgType::U);
        Packet::new(MsgType::V, vec![0x11; 31])
            .unwrap()
            .write_to(&mut stream)
            .unwrap();
        // keep the socket until the client has read the short V
        Packet::read_from(&mut stream)
    });

    let stream = TcpStream::connect(addr).unwrap();
    let result = ClientSession::new(stream, &b"alice"[..], b"p1").handshake();
    assert!(matches!(
        result,
        Err(RampionError::BufferSizeMismatch {
            required_size: 32,
            actual_size: 31,
        })
    ));

    // the client hung up without deriving a key
    assert!(matches!(
        fake_server.join().unwrap(),
        Err(RampionError::Transport(_))
    ));
}

#[test]
fn client_rejects_an_invalid_point_in_v() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let fake_server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        Packet::read_from(&mut stream).unwrap();
        Packet::hello(b"svc").unwrap().write_to(&mut stream).unwrap();
        Packet::read_from(&mut stream).unwrap();
        Packet::read_from(&mut stream).unwrap();
        // the identity element is not an acceptable share
        Packet::v(&[0u8; 32]).write_to(&mut stream).unwrap();
        Packet::read_from(&mut stream)
    });

    let stream = TcpStream::connect(addr).unwrap();
    let result = ClientSession::new(stream, &b"alice"[..], b"p1").handshake();
    assert!(matches!(result, Err(RampionError::InvalidPoint)));
    fake_server.join().unwrap().unwrap_err();
}
