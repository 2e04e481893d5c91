//! Outgoing mail over SMTP.

use std::time::Duration;

use pocketmail_mime::OutgoingMessage;
use pocketmail_net::{LineConnection, Security, TlsUpgrade, connect};
use pocketmail_smtp::{SessionState, SmtpClient};
use tracing::{debug, info, warn};

use crate::config::SmtpConfig;
use crate::{Error, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends `messages` in one SMTP session.
///
/// The outer result fails only when the session itself does: connect,
/// STARTTLS, authentication, or a connection lost mid-batch. Otherwise
/// there is one result per message, in order, and a rejected message does
/// not stop the ones after it.
///
/// # Errors
///
/// Returns an error if the session cannot be set up or is lost.
pub async fn send_messages(
    config: &SmtpConfig,
    messages: &[OutgoingMessage],
) -> Result<Vec<Result<()>>> {
    info!(
        host = %config.host,
        port = config.port,
        security = ?config.security,
        count = messages.len(),
        "sending mail"
    );
    let conn = connect(&config.connect_options(CONNECT_TIMEOUT)).await?;
    send_messages_over(conn, config, messages).await
}

/// [`send_messages`] over an already open connection.
///
/// # Errors
///
/// Returns an error if the session cannot be set up or is lost.
pub async fn send_messages_over<S: TlsUpgrade>(
    conn: LineConnection<S>,
    config: &SmtpConfig,
    messages: &[OutgoingMessage],
) -> Result<Vec<Result<()>>> {
    let client = SmtpClient::greeting(conn).await?;
    let mut client = client.ehlo(&config.client_name).await?;
    if config.security == Security::StartTls {
        client = client.starttls(&config.host).await?;
    }

    match &config.credentials {
        Some(credentials) => {
            let client = client
                .authenticate(config.mechanism, &credentials.username, &credentials.password)
                .await?;
            deliver(client, messages).await
        }
        None => deliver(client, messages).await,
    }
}

async fn deliver<S: TlsUpgrade, State: SessionState>(
    mut client: SmtpClient<S, State>,
    messages: &[OutgoingMessage],
) -> Result<Vec<Result<()>>> {
    let mut results = Vec::with_capacity(messages.len());
    for message in messages {
        let recipients = message.recipients();
        if recipients.is_empty() {
            warn!(subject = %message.envelope.subject, "message has no recipients");
            results.push(Err(Error::Smtp(pocketmail_smtp::Error::InvalidAddress(
                "no recipients".into(),
            ))));
            continue;
        }

        match client
            .send(message.sender(), &recipients, &message.to_bytes())
            .await
        {
            Ok(()) => {
                debug!(recipients = recipients.len(), "message sent");
                results.push(Ok(()));
            }
            Err(e) if e.is_connection_lost() => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "message rejected");
                results.push(Err(e.into()));
                // A failed transaction does not count as sent, so the next
                // send would skip its own RSET.
                if let Err(e) = client.rset().await {
                    if e.is_connection_lost() {
                        return Err(e.into());
                    }
                    warn!(error = %e, "RSET after rejection failed");
                }
            }
        }
    }

    if let Err(e) = client.quit().await {
        debug!(error = %e, "QUIT failed");
    }
    Ok(results)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pocketmail_mime::Envelope;
    use pocketmail_net::testing::{ScriptedStream, WriteLog};
    use pocketmail_smtp::AuthMechanism;
    use tokio_test::io::Builder;

    use super::*;
    use crate::config::Credentials;

    fn message(to: &[&str], body: &str) -> OutgoingMessage {
        let envelope = Envelope {
            subject: "Hi".into(),
            from: vec!["Ann <ann@example.com>".into()],
            to: to.iter().map(|s| (*s).to_string()).collect(),
            ..Envelope::default()
        };
        OutgoingMessage::text(envelope, body)
    }

    fn connection(mock: tokio_test::io::Mock) -> (LineConnection<ScriptedStream>, WriteLog) {
        let (stream, log) = ScriptedStream::new(mock);
        (LineConnection::new(stream), log)
    }

    fn written(log: &WriteLog) -> String {
        log.writes()
            .into_iter()
            .map(|(_, bytes)| String::from_utf8(bytes).unwrap())
            .collect()
    }

    /// DATA payload as the client puts it on the wire.
    fn data_bytes(message: &OutgoingMessage) -> Vec<u8> {
        let mut bytes = message.to_bytes();
        if !bytes.ends_with(b"\r\n") {
            bytes.extend_from_slice(b"\r\n");
        }
        bytes.extend_from_slice(b".\r\n");
        bytes
    }

    #[tokio::test]
    async fn test_two_messages_with_rset_between() {
        let first = message(&["bob@example.org"], "one");
        let second = message(&["cy@example.org"], "two");
        let mock = Builder::new()
            .read(b"220 mx ESMTP\r\n")
            .write(b"EHLO phone\r\n")
            .read(b"250-mx\r\n250 8BITMIME\r\n")
            .write(b"MAIL FROM:<ann@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<bob@example.org>\r\n")
            .read(b"250 ok\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go\r\n")
            .write(&data_bytes(&first))
            .read(b"250 queued\r\n")
            .write(b"RSET\r\n")
            .read(b"250 ok\r\n")
            .write(b"MAIL FROM:<ann@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<cy@example.org>\r\n")
            .read(b"250 ok\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go\r\n")
            .write(&data_bytes(&second))
            .read(b"250 queued\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();
        let (conn, log) = connection(mock);
        let config = SmtpConfig::new("mx").security(Security::None).client_name("phone");

        let results = send_messages_over(conn, &config, &[first, second])
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Result::is_ok));
        assert!(written(&log).contains("RSET\r\n"));
    }

    #[tokio::test]
    async fn test_rejected_recipient_does_not_stop_batch() {
        let mock = Builder::new()
            .read(b"220 mx ESMTP\r\n")
            .write(b"EHLO phone\r\n")
            .read(b"250 mx\r\n")
            .write(b"AUTH PLAIN\r\n")
            .read(b"334 \r\n")
            .write(b"AGFubgBzZWNyZXQ=\r\n")
            .read(b"235 ok\r\n")
            .write(b"MAIL FROM:<ann@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<nobody@example.org>\r\n")
            .read(b"550 no such user\r\n")
            .write(b"RSET\r\n")
            .read(b"250 ok\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();
        let (conn, _log) = connection(mock);
        let config = SmtpConfig::new("mx")
            .security(Security::None)
            .client_name("phone")
            .credentials(Credentials::new("ann", "secret"), AuthMechanism::Plain);

        let results = send_messages_over(
            conn,
            &config,
            &[message(&["nobody@example.org"], "x"), message(&[], "y")],
        )
        .await
        .unwrap();
        assert!(matches!(
            &results[0],
            Err(Error::Smtp(e)) if e.is_permanent()
        ));
        assert!(matches!(
            &results[1],
            Err(Error::Smtp(pocketmail_smtp::Error::InvalidAddress(_)))
        ));
    }

    #[tokio::test]
    async fn test_auth_failure_aborts() {
        let mock = Builder::new()
            .read(b"220 mx ESMTP\r\n")
            .write(b"EHLO phone\r\n")
            .read(b"250 mx\r\n")
            .write(b"AUTH PLAIN\r\n")
            .read(b"334 \r\n")
            .write(b"AGFubgB3cm9uZw==\r\n")
            .read(b"535 bad credentials\r\n")
            .build();
        let (conn, _log) = connection(mock);
        let config = SmtpConfig::new("mx")
            .security(Security::None)
            .client_name("phone")
            .credentials(Credentials::new("ann", "wrong"), AuthMechanism::Plain);

        let err = send_messages_over(conn, &config, &[message(&["bob@example.org"], "x")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::FailureKind::Auth);
    }

    #[tokio::test]
    async fn test_starttls_before_next_command() {
        let mock = Builder::new()
            .read(b"220 mx ESMTP\r\n")
            .write(b"EHLO phone\r\n")
            .read(b"250-mx\r\n250 STARTTLS\r\n")
            .write(b"STARTTLS\r\n")
            .read(b"220 go ahead\r\n")
            .write(b"EHLO phone\r\n")
            .read(b"250 mx\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();
        let (conn, log) = connection(mock);
        let config = SmtpConfig::new("mx").client_name("phone");
        assert_eq!(config.security, Security::StartTls);

        let results = send_messages_over(conn, &config, &[]).await.unwrap();
        assert!(results.is_empty());

        let writes = log.writes();
        let tls_from = writes
            .iter()
            .position(|(tls, _)| *tls)
            .unwrap();
        assert_eq!(writes[tls_from].1, b"EHLO phone\r\n");
        assert!(writes[..tls_from].iter().all(|(tls, _)| !tls));
    }
}
