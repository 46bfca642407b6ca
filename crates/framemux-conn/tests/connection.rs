use std::collections::HashSet;
use std::time::Duration;

use bytes::Bytes;
use framemux_conn::{ConnError, Connection, Role, Stream};
use framemux_frame::{Metadata, PATH, STATUS};
use framemux_transport::pair;
use tokio::task::JoinHandle;

struct Peer {
    conn: Connection,
    task: JoinHandle<framemux_conn::Result<()>>,
}

/// Two connections joined by an in-memory socket pair, each with its own
/// receive loop running.
fn connected() -> (Peer, Peer) {
    let (left, right) = pair();
    let client = Connection::new(left.socket, Role::Client);
    let server = Connection::new(right.socket, Role::Server);

    let client_task = {
        let conn = client.clone();
        tokio::spawn(async move { conn.receive_loop(left.inbound).await })
    };
    let server_task = {
        let conn = server.clone();
        tokio::spawn(async move { conn.receive_loop(right.inbound).await })
    };

    (
        Peer {
            conn: client,
            task: client_task,
        },
        Peer {
            conn: server,
            task: server_task,
        },
    )
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition should become true");
}

#[tokio::test]
async fn unary_exchange_closes_both_sides() {
    let (client, server) = connected();
    server.conn.set_handler(|stream: Stream| async move {
        let path = stream.metadata().scalar(PATH).map(str::to_owned);
        let request = stream.receive_data().await.unwrap().unwrap();
        assert_eq!(path.as_deref(), Some("ns/op"));
        assert_eq!(request.as_ref(), b"hello");
        stream
            .send_unary(&Metadata::new().with(STATUS, "200"), "world")
            .unwrap();
    });

    let stream = client.conn.new_stream().unwrap();
    stream
        .send_unary(&Metadata::new().with(PATH, "ns/op"), "hello")
        .unwrap();

    let reply = stream.receive_data().await.unwrap().unwrap();
    assert_eq!(reply.as_ref(), b"world");
    assert_eq!(stream.metadata().get(STATUS), Some(&["200".to_string()][..]));
    assert_eq!(stream.receive_data().await.unwrap(), None);

    assert!(stream.is_closed());
    assert!(!client.conn.contains_stream(stream.stream_id()));
    let server_conn = server.conn.clone();
    wait_until(move || server_conn.stream_count() == 0).await;
}

#[tokio::test]
async fn half_close_then_peer_end_removes_stream() {
    let (client, server) = connected();
    server.conn.set_handler(|stream: Stream| async move {
        while stream.receive_data().await.unwrap().is_some() {}
        stream.close().unwrap();
    });

    let stream = client.conn.new_stream().unwrap();
    stream.send_metadata(&Metadata::new(), false).unwrap();
    stream.send_data("x", true).unwrap();
    assert!(stream.is_self_closed());
    assert!(client.conn.contains_stream(1));

    assert_eq!(stream.receive_data().await.unwrap(), None);
    assert!(stream.is_closed());
    assert!(!client.conn.contains_stream(1));
}

#[tokio::test]
async fn for_each_sees_messages_in_order() {
    let (client, server) = connected();
    let (seen_tx, seen_rx) = tokio::sync::oneshot::channel();
    let seen_tx = std::sync::Mutex::new(Some(seen_tx));
    server.conn.set_handler(move |stream: Stream| {
        let seen_tx = seen_tx.lock().unwrap().take();
        async move {
            let mut seen = Vec::new();
            stream
                .for_each(|data| {
                    seen.push(String::from_utf8(data.to_vec()).unwrap());
                    async {}
                })
                .await
                .unwrap();
            stream.close().unwrap();
            if let Some(tx) = seen_tx {
                let _ = tx.send(seen);
            }
        }
    });

    let stream = client.conn.new_stream().unwrap();
    stream.send_metadata(&Metadata::new(), false).unwrap();
    stream.send_data("a", false).unwrap();
    stream.send_data("b", false).unwrap();
    stream.send_data("c", true).unwrap();

    assert_eq!(seen_rx.await.unwrap(), ["a", "b", "c"]);
}

#[tokio::test]
async fn peers_never_allocate_the_same_id() {
    let (client, server) = connected();
    let mut ids = HashSet::new();
    for _ in 0..16 {
        assert!(ids.insert(client.conn.new_stream().unwrap().stream_id()));
        assert!(ids.insert(server.conn.new_stream().unwrap().stream_id()));
    }
    assert_eq!(ids.len(), 32);
}

#[tokio::test]
async fn streams_may_first_send_out_of_allocation_order() {
    let (client, server) = connected();
    server.conn.set_handler(|stream: Stream| async move {
        while stream.receive_data().await.unwrap().is_some() {}
        stream.close().unwrap();
    });

    let first = client.conn.new_stream().unwrap();
    let second = client.conn.new_stream().unwrap();
    second.send_metadata(&Metadata::new(), false).unwrap();
    first.send_metadata(&Metadata::new(), false).unwrap();
    second.send_data("b", true).unwrap();
    first.send_data("a", true).unwrap();

    assert_eq!(second.receive_data().await.unwrap(), None);
    assert_eq!(first.receive_data().await.unwrap(), None);
    assert!(first.is_closed());
    assert!(second.is_closed());
    assert!(!server.conn.is_shutdown());
    assert!(!server.task.is_finished());
}

#[tokio::test]
async fn many_streams_interleave_independently() {
    let (client, server) = connected();
    server.conn.set_handler(|stream: Stream| async move {
        let mut total = Vec::new();
        stream
            .for_each(|data| {
                total.extend_from_slice(&data);
                async {}
            })
            .await
            .unwrap();
        stream.send_unary(&Metadata::new(), total).unwrap();
    });

    let streams: Vec<Stream> = (0..8).map(|_| client.conn.new_stream().unwrap()).collect();
    for stream in &streams {
        stream.send_metadata(&Metadata::new(), false).unwrap();
    }
    for round in 0..3u8 {
        for stream in &streams {
            let last = round == 2;
            stream
                .send_data(Bytes::from(vec![stream.stream_id() as u8, round]), last)
                .unwrap();
        }
    }

    for stream in &streams {
        let id = stream.stream_id() as u8;
        let reply = stream.receive_data().await.unwrap().unwrap();
        assert_eq!(reply.as_ref(), &[id, 0, id, 1, id, 2]);
    }
}

#[tokio::test]
async fn child_streams_are_opened_from_a_parent() {
    let (client, server) = connected();
    let (parents_tx, mut parents_rx) = tokio::sync::mpsc::unbounded_channel();
    server.conn.set_handler(move |stream: Stream| {
        let parents_tx = parents_tx.clone();
        async move {
            let _ = parents_tx.send(stream.stream_id());
        }
    });

    let parent = client.conn.new_stream().unwrap();
    let child = parent.new_stream().unwrap();
    assert_eq!(child.parent_stream_id(), parent.stream_id());
    child.send_metadata(&Metadata::new(), false).unwrap();

    assert_eq!(parents_rx.recv().await, Some(child.stream_id()));
}

#[tokio::test]
async fn data_before_headers_tears_down_connection() {
    let (left, right) = pair();
    let server = Connection::new(right.socket, Role::Server);
    let raw_client = Connection::new(left.socket, Role::Client);

    // Skip HEADERS: the first frame on the stream is DATA.
    let stream = raw_client.new_stream().unwrap();
    stream.send_data("orphan", false).unwrap();

    let err = server.receive_loop(right.inbound).await.unwrap_err();
    assert!(matches!(err, ConnError::UnknownStream(1)));
    assert!(server.is_shutdown());
}

#[tokio::test]
async fn shutdown_ends_pending_receives() {
    let (client, server) = connected();
    let stream = client.conn.new_stream().unwrap();
    stream.send_metadata(&Metadata::new(), false).unwrap();

    let pending = {
        let stream = stream.clone();
        tokio::spawn(async move { stream.receive_data().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    client.conn.shutdown();
    assert_eq!(pending.await.unwrap().unwrap(), None);
    client.task.await.unwrap().unwrap();
    assert!(matches!(
        client.conn.new_stream(),
        Err(ConnError::ConnectionClosed)
    ));

    server.conn.shutdown();
    server.task.await.unwrap().unwrap();
}
