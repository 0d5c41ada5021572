use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use prost::Message;

use kvpb_client::messages::{
    Content, CounterUpdateReq, CounterUpdateResp, GetReq, GetResp, ListKeysResp, PutReq, PutResp,
};
use kvpb_client::{
    callbacks, encode_error, Client, ClientConfig, Delivery, KvError, OperationState, Request,
    Response, SyncClient,
};

const TAG_ERROR_RESP: u8 = 0;
const TAG_PING_REQ: u8 = 1;
const TAG_PING_RESP: u8 = 2;
const TAG_GET_REQ: u8 = 9;
const TAG_GET_RESP: u8 = 10;
const TAG_PUT_REQ: u8 = 11;
const TAG_PUT_RESP: u8 = 12;
const TAG_LIST_KEYS_REQ: u8 = 17;
const TAG_LIST_KEYS_RESP: u8 = 18;
const TAG_COUNTER_UPDATE_REQ: u8 = 50;
const TAG_COUNTER_UPDATE_RESP: u8 = 51;

type Handler = fn(usize, u8, Vec<u8>, &mut TcpStream);

fn spawn_server(expected_requests: usize, handler: Handler) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
        for idx in 0..expected_requests {
            let (tag, body) = read_frame(&mut stream).expect("read request");
            handler(idx, tag, body, &mut stream);
        }
    });

    port
}

// Serves every accepted connection until the peer closes it.
fn spawn_echo_server(connections: usize, handler: fn(u8, Vec<u8>, &mut TcpStream)) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();

    thread::spawn(move || {
        for _ in 0..connections {
            let (mut stream, _) = listener.accept().expect("accept");
            thread::spawn(move || {
                while let Ok((tag, body)) = read_frame(&mut stream) {
                    handler(tag, body, &mut stream);
                }
            });
        }
    });

    port
}

fn read_frame(stream: &mut TcpStream) -> std::io::Result<(u8, Vec<u8>)> {
    let mut len = [0u8; 4];
    stream.read_exact(&mut len)?;
    let len = u32::from_be_bytes(len) as usize;
    if len == 0 {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "empty frame"));
    }
    let mut frame = vec![0u8; len];
    stream.read_exact(&mut frame)?;
    let body = frame.split_off(1);
    Ok((frame[0], body))
}

fn frame_bytes(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + body.len());
    out.extend_from_slice(&((body.len() + 1) as u32).to_be_bytes());
    out.push(tag);
    out.extend_from_slice(body);
    out
}

fn write_frame(stream: &mut TcpStream, tag: u8, body: &[u8]) {
    let _ = stream.write_all(&frame_bytes(tag, body));
}

fn keys_frame(keys: &[&'static str], done: bool) -> Vec<u8> {
    let body = ListKeysResp {
        keys: keys.iter().map(|k| Bytes::from_static(k.as_bytes())).collect(),
        done: Some(done),
    }
    .encode_to_vec();
    frame_bytes(TAG_LIST_KEYS_RESP, &body)
}

fn config_for(port: u16) -> ClientConfig {
    ClientConfig {
        max_total: 1,
        ..ClientConfig::single("127.0.0.1", port)
    }
}

async fn client_for(port: u16) -> Client {
    Client::connect(config_for(port)).await.expect("client")
}

#[tokio::test]
async fn ping_round_trip() {
    let port = spawn_server(1, |_, tag, body, stream| {
        assert_eq!(tag, TAG_PING_REQ);
        assert!(body.is_empty());
        write_frame(stream, TAG_PING_RESP, &[]);
    });

    let client = client_for(port).await;
    client.ping().await.expect("ping");
}

#[tokio::test]
async fn connection_is_reused_between_calls() {
    // The server accepts exactly one connection.
    let port = spawn_server(3, |_, _, _, stream| write_frame(stream, TAG_PING_RESP, &[]));

    let client = client_for(port).await;
    for _ in 0..3 {
        client.ping().await.expect("ping");
    }
    let stats = client.pool().stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.available, 1);
}

#[tokio::test]
async fn error_frame_becomes_server_error() {
    let port = spawn_server(2, |idx, tag, _, stream| match idx {
        0 => {
            assert_eq!(tag, TAG_GET_REQ);
            write_frame(stream, TAG_ERROR_RESP, &encode_error(5, "not_found"));
        }
        _ => write_frame(stream, TAG_PING_RESP, &[]),
    });

    let client = client_for(port).await;
    let err = client.get(b"users", b"missing").await.unwrap_err();
    match err {
        KvError::Server(server) => {
            assert_eq!(server.code(), 5);
            assert_eq!(server.message(), b"not_found");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // A server error leaves the connection in sync.
    client.ping().await.expect("ping after server error");
    assert_eq!(client.pool().stats().total, 1);
}

#[tokio::test]
async fn list_keys_merges_fragments() {
    let port = spawn_server(1, |_, tag, _, stream| {
        assert_eq!(tag, TAG_LIST_KEYS_REQ);
        let mut bytes = keys_frame(&["a", "b"], false);
        bytes.extend(keys_frame(&[], false));
        bytes.extend(keys_frame(&["c"], true));
        // Split mid-frame to exercise reassembly across reads.
        let (head, tail) = bytes.split_at(7);
        let _ = stream.write_all(head);
        let _ = stream.flush();
        thread::sleep(Duration::from_millis(20));
        let _ = stream.write_all(tail);
    });

    let client = client_for(port).await;
    let keys = client.list_keys(b"users").await.expect("list keys");
    assert_eq!(keys, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn stream_delivers_each_fragment() {
    let port = spawn_server(1, |_, _, _, stream| {
        let mut bytes = keys_frame(&["a"], false);
        bytes.extend(keys_frame(&["b"], false));
        bytes.extend(keys_frame(&["c"], true));
        let _ = stream.write_all(&bytes);
    });

    let client = client_for(port).await;
    let mut rx = client.stream(Request::list_keys("users"));
    let mut fragments = Vec::new();
    while let Some(item) = rx.recv().await {
        fragments.push(item.expect("fragment"));
    }

    assert_eq!(fragments.len(), 3);
    assert_eq!(
        fragments.iter().map(|f| f.done).collect::<Vec<_>>(),
        vec![false, false, true]
    );
    assert!(matches!(&fragments[1].response, Response::Keys(keys) if keys == &vec!["b"]));
}

#[tokio::test]
async fn handler_sees_exactly_one_outcome() {
    let port = spawn_server(1, |_, _, _, stream| {
        let mut bytes = keys_frame(&["a"], false);
        bytes.extend(keys_frame(&["b"], true));
        let _ = stream.write_all(&bytes);
    });

    let client = client_for(port).await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let ok = seen.clone();
    let err = seen.clone();
    let handler = callbacks(
        move |resp: Response, done| ok.lock().unwrap().push(format!("{}:{}", resp.len(), done)),
        move |e: KvError| err.lock().unwrap().push(format!("error:{}", e)),
    );

    let state = client
        .execute_with(&Request::list_keys("users"), Delivery::Merged, handler)
        .await
        .expect("bound");
    assert_eq!(state, OperationState::Done);
    assert_eq!(*seen.lock().unwrap(), vec!["2:true".to_string()]);
}

#[tokio::test]
async fn peer_close_mid_stream_is_connection_closed() {
    let port = spawn_server(1, |_, _, _, stream| {
        let _ = stream.write_all(&keys_frame(&["a"], false));
        let _ = stream.shutdown(Shutdown::Both);
    });

    let client = client_for(port).await;
    let err = client.list_keys(b"users").await.unwrap_err();
    assert!(matches!(err, KvError::ConnectionClosed));

    // The broken connection is not recycled.
    let stats = client.pool().stats();
    assert_eq!(stats.available, 0);
    assert_eq!(stats.total, 0);
}

#[tokio::test]
async fn stalled_server_times_out() {
    let port = spawn_server(1, |_, _, _, _| thread::sleep(Duration::from_millis(800)));

    let config = ClientConfig {
        operation_timeout_ms: Some(100),
        ..config_for(port)
    };
    let client = Client::connect(config).await.expect("client");
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, KvError::Timeout));
    assert_eq!(client.pool().stats().total, 0);
}

#[tokio::test]
async fn get_put_and_counter() {
    let port = spawn_server(3, |idx, tag, body, stream| match idx {
        0 => {
            assert_eq!(tag, TAG_PUT_REQ);
            let req = PutReq::decode(body.as_slice()).expect("put req");
            assert_eq!(req.bucket, "users");
            assert_eq!(req.key.as_deref(), Some(&b"alice"[..]));
            assert_eq!(req.content.value, "v1");
            let resp = PutResp {
                key: Some(Bytes::from_static(b"alice")),
                ..Default::default()
            };
            write_frame(stream, TAG_PUT_RESP, &resp.encode_to_vec());
        }
        1 => {
            assert_eq!(tag, TAG_GET_REQ);
            let req = GetReq::decode(body.as_slice()).expect("get req");
            assert_eq!(req.key, "alice");
            let resp = GetResp {
                content: vec![Content::from_value("v1")],
                vclock: Some(Bytes::from_static(b"vc")),
                ..Default::default()
            };
            write_frame(stream, TAG_GET_RESP, &resp.encode_to_vec());
        }
        _ => {
            assert_eq!(tag, TAG_COUNTER_UPDATE_REQ);
            let req = CounterUpdateReq::decode(body.as_slice()).expect("counter req");
            assert_eq!(req.amount, -3);
            let resp = CounterUpdateResp { value: Some(7) };
            write_frame(stream, TAG_COUNTER_UPDATE_RESP, &resp.encode_to_vec());
        }
    });

    let client = client_for(port).await;
    let stored = client.put(b"users", b"alice", b"v1").await.expect("put");
    assert_eq!(stored.key.as_deref(), Some(&b"alice"[..]));

    let object = client.get(b"users", b"alice").await.expect("get");
    assert_eq!(object.content.len(), 1);
    assert_eq!(object.content[0].value, "v1");

    let value = client
        .counter_update(b"counters", b"visits", -3)
        .await
        .expect("counter");
    assert_eq!(value, Some(7));
}

#[tokio::test]
async fn closed_client_refuses_calls() {
    let port = spawn_server(1, |_, _, _, stream| write_frame(stream, TAG_PING_RESP, &[]));

    let client = client_for(port).await;
    client.ping().await.expect("ping");
    client.close();
    assert!(matches!(client.ping().await, Err(KvError::PoolExhausted)));
}

#[test]
fn sync_client_ping() {
    let port = spawn_server(2, |_, _, _, stream| write_frame(stream, TAG_PING_RESP, &[]));

    let client = SyncClient::with_config(config_for(port)).expect("client");
    client.ping().expect("ping");
    client.ping().expect("second ping");
}

#[tokio::test]
async fn cancelled_call_does_not_leak_its_response() {
    // Answers each get with the requested key as the value; "slow" waits first.
    let port = spawn_echo_server(2, |tag, body, stream| {
        assert_eq!(tag, TAG_GET_REQ);
        let req = GetReq::decode(body.as_slice()).expect("get req");
        if req.key == "slow" {
            thread::sleep(Duration::from_millis(300));
        }
        let resp = GetResp {
            content: vec![Content::from_value(req.key)],
            ..Default::default()
        };
        write_frame(stream, TAG_GET_RESP, &resp.encode_to_vec());
    });

    let client = client_for(port).await;
    let cancelled =
        tokio::time::timeout(Duration::from_millis(50), client.get(b"users", b"slow")).await;
    assert!(cancelled.is_err());

    // The abandoned connection is closed, not recycled.
    let stats = client.pool().stats();
    assert_eq!(stats.available, 0);
    assert_eq!(stats.total, 0);

    let object = client.get(b"users", b"fast").await.expect("get");
    assert_eq!(object.content[0].value, "fast");
}
