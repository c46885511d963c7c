//! Engine against a real TCP listener on localhost.


use std::time::Duration;

use mock_socket::{canary_frame, value_frame, wait_until, RecordingTarget};
use premise_stream::{subscription_id, PremiseServer, ServerConfig};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Read one header-only request, up to and including the blank line
async fn read_request(stream: &mut BufReader<TcpStream>) -> String {
    let mut request = String::new();
    loop {
        let mut line = String::new();
        let read = stream.read_line(&mut line).await.unwrap();
        if read == 0 || line == "\r\n" {
            return request;
        }
        request.push_str(&line);
    }
}

#[tokio::test]
async fn test_subscription_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let id = subscription_id("sys://Home/Kitchen", "Brightness");

    let premise = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut stream = BufReader::new(stream);

        let canary = read_request(&mut stream).await;
        assert!(canary.starts_with("POST /sys/Home?f??Name HTTP/1.1\r\n"));
        assert!(canary.contains("Host: 127.0.0.1:"));
        stream.get_mut().write_all(canary_frame().as_bytes()).await.unwrap();

        let subscribe = read_request(&mut stream).await;
        assert!(subscribe.contains(&format!("?a?{}??Brightness?{}? HTTP/1.1", id, id)));
        stream
            .get_mut()
            .write_all(value_frame(id, "50%").as_bytes())
            .await
            .unwrap();

        // Hold the connection until the client hangs up
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest).await;
    });

    let server = PremiseServer::new(ServerConfig::for_host("127.0.0.1", port));
    server.connect().await.unwrap();
    server.wait_for_connection(Duration::from_secs(2)).await.unwrap();

    let target = RecordingTarget::new("sys://Home/Kitchen");
    server.subscribe(target.clone(), "Brightness").await.unwrap();

    wait_until(|| !target.applied().is_empty()).await;
    assert_eq!(target.applied(), vec![("Brightness".to_string(), "50%".to_string())]);

    server.stop().await;
    tokio::time::timeout(Duration::from_secs(2), premise)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_connect_refused() {
    // Bind then drop to get a port nothing listens on
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let server = PremiseServer::new(ServerConfig::for_host("127.0.0.1", port));
    let err = server.connect().await.unwrap_err();

    assert!(err.requires_reconnect());
    assert!(!server.is_connected());
    assert!(server.status().error);
}
