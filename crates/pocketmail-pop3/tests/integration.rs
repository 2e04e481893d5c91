//! Scripted POP3 sessions.

#![allow(clippy::unwrap_used)]

use pocketmail_net::LineConnection;
use pocketmail_net::testing::ScriptedStream;
use pocketmail_pop3::Pop3Client;
use tokio_test::io::Builder;

#[tokio::test]
async fn test_stls_session() {
    let mock = Builder::new()
        .read(b"+OK POP3 ready\r\n")
        .write(b"CAPA\r\n")
        .read(b"+OK\r\nSTLS\r\nUIDL\r\n.\r\n")
        .write(b"STLS\r\n")
        .read(b"+OK Begin TLS negotiation\r\n")
        .write(b"USER ann\r\n")
        .read(b"+OK\r\n")
        .write(b"PASS secret\r\n")
        .read(b"+OK maildrop locked and ready\r\n")
        .write(b"STAT\r\n")
        .read(b"+OK 2 640\r\n")
        .write(b"QUIT\r\n")
        .read(b"+OK bye\r\n")
        .build();
    let (stream, log) = ScriptedStream::new(mock);
    let mut client = Pop3Client::new(LineConnection::new(stream));

    client.greeting().await.unwrap();
    client.capa().await.unwrap();
    assert!(client.has_capability("STLS"));

    let mut client = client.stls("pop.example.com").await.unwrap();
    assert!(client.is_tls());
    assert!(client.capabilities().is_empty());

    client.login("ann", "secret").await.unwrap();
    assert_eq!(client.stat().await.unwrap(), 2);
    client.quit().await.unwrap();

    let writes = log.writes();
    let stls = writes.iter().position(|(_, w)| w == b"STLS\r\n").unwrap();
    assert!(writes[..=stls].iter().all(|(tls, _)| !tls));
    assert!(writes[stls + 1..].iter().all(|(tls, _)| *tls));
}

#[tokio::test]
async fn test_headers_then_body_with_stable_numbers() {
    let mock = Builder::new()
        .write(b"STAT\r\n")
        .read(b"+OK 3 900\r\n")
        .write(b"TOP 3 0\r\n")
        .read(b"+OK\r\nFrom: ann@example.com\r\nSubject: third\r\n.\r\n")
        .write(b"DELE 2\r\n")
        .read(b"+OK\r\n")
        .write(b"TOP 3 50\r\n")
        .read(b"+OK\r\nFrom: ann@example.com\r\nSubject: third\r\n\r\nhello\r\n...\r\n.\r\n")
        .write(b"UIDL 3\r\n")
        .read(b"+OK 3 uid-three\r\n")
        .build();
    let mut client = Pop3Client::new(LineConnection::new(mock));

    let count = client.stat().await.unwrap();
    let headers = client.top(count, 0).await.unwrap();
    assert!(headers.ends_with(b"Subject: third\r\n"));

    client.dele(2).await.unwrap();

    // Message 3 is still message 3 after deleting message 2.
    let body = client.top(3, 50).await.unwrap();
    assert!(body.ends_with(b"\r\nhello\r\n..\r\n"));
    assert_eq!(client.uidl(3).await.unwrap().as_deref(), Some("uid-three"));
}
