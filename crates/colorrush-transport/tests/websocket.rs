//! Integration tests for the WebSocket transport.
//!
//! These tests spin up a real listener on an ephemeral port and drive it
//! with a `tokio-tungstenite` client, so frames actually cross a socket.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use colorrush_transport::{
        Connection, Handshake, Transport, WebSocketConnection, WebSocketTransport,
    };
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs =
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

    /// Binds on port 0, connects a client to `path`, and returns both ends.
    async fn pair(path: &str) -> (WebSocketConnection, ClientWs) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address");

        let server_handle = tokio::spawn(async move {
            let pending = transport.accept().await.expect("should accept");
            pending.establish().await.expect("handshake should succeed")
        });

        let url = format!("ws://{addr}{path}");
        let (client, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("client should connect");
        let server_conn = server_handle.await.expect("task should complete");
        (server_conn, client)
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (server_conn, mut client_ws) = pair("/").await;
        assert!(server_conn.id().get() > 0);

        server_conn
            .send(b"hello from server")
            .await
            .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_text(), "utf-8 payloads go out as text frames");
        assert_eq!(msg.into_data().as_ref(), b"hello from server");

        client_ws
            .send(Message::Binary(b"hello from client".to_vec().into()))
            .await
            .unwrap();
        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, b"hello from client");

        client_ws
            .send(Message::Text("{\"type\":\"start_game\"}".into()))
            .await
            .unwrap();
        let received = server_conn.recv().await.unwrap().unwrap();
        assert_eq!(received, br#"{"type":"start_game"}"#);

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_non_utf8_goes_out_as_binary() {
        let (server_conn, mut client_ws) = pair("/").await;

        server_conn.send(&[0xff, 0x00, 0xfe]).await.unwrap();
        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_binary());
        assert_eq!(msg.into_data().as_ref(), &[0xff, 0x00, 0xfe]);
    }

    #[tokio::test]
    async fn test_websocket_request_uri_keeps_query_string() {
        let (server_conn, _client_ws) =
            pair("/?room_id=r1&player_name=Alice&is_host=true").await;

        assert_eq!(
            server_conn.request_uri(),
            Some("/?room_id=r1&player_name=Alice&is_host=true")
        );
    }

    #[tokio::test]
    async fn test_websocket_ping_succeeds_on_open_connection() {
        let (server_conn, _client_ws) = pair("/").await;
        server_conn.ping().await.expect("ping should succeed");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (server_conn, mut client_ws) = pair("/").await;

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_accept_does_not_wait_for_handshake() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap();

        // A raw TCP peer that never sends an upgrade request.
        let _idle = tokio::net::TcpStream::connect(addr).await.unwrap();
        let stalled = tokio::time::timeout(Duration::from_secs(2), transport.accept())
            .await
            .expect("accept should return without a handshake")
            .unwrap();
        assert_eq!(stalled.peer_addr().ip(), addr.ip());

        let url = format!("ws://{addr}/?second");
        let client = tokio::spawn(async move { tokio_tungstenite::connect_async(url).await });
        let pending = tokio::time::timeout(Duration::from_secs(2), transport.accept())
            .await
            .expect("second peer should be accepted while the first is idle")
            .unwrap();
        let conn = pending.establish().await.unwrap();
        assert_eq!(conn.request_uri(), Some("/?second"));
        client.await.unwrap().expect("client should connect");

        let idle_handshake = tokio::time::timeout(Duration::from_millis(100), stalled.establish()).await;
        assert!(idle_handshake.is_err(), "idle peer never completes its upgrade");
    }

    #[tokio::test]
    async fn test_websocket_idle_for_resets_when_peer_answers_ping() {
        let (server_conn, mut client_ws) = pair("/").await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(server_conn.idle_for() >= Duration::from_millis(300));

        server_conn.ping().await.unwrap();
        // Reading lets the client library flush its pong.
        let client_reader = tokio::spawn(async move {
            while let Some(Ok(_)) = client_ws.next().await {}
        });
        let pong = tokio::time::timeout(Duration::from_millis(100), server_conn.recv()).await;
        assert!(pong.is_err(), "a pong is not a data frame");
        assert!(server_conn.idle_for() < Duration::from_millis(250));
        client_reader.abort();
    }
}
