//! End-to-end protocol scenarios over real TCP sockets.
//!
//! Each test boots a server on an ephemeral port, drives it with
//! line-framed commands and asserts the literal wire replies.

use std::net::SocketAddr;
use std::time::Duration;

use matchline::{Config, Server};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

async fn start_server() -> SocketAddr {
    start_server_with(Config::default()).await
}

async fn start_server_with(mut config: Config) -> SocketAddr {
    config.port = 0;
    let server = Server::bind(config).await.expect("bind");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(server.run());
    addr
}

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    write: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read, write) = stream.into_split();
        Self {
            lines: BufReader::new(read).lines(),
            write,
        }
    }

    async fn send(&mut self, line: &str) {
        self.write
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("send");
    }

    async fn recv(&mut self) -> String {
        timeout(RECV_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a reply")
            .expect("read failed")
            .expect("connection closed")
    }

    /// True once the server has closed this connection.
    async fn closed(&mut self, wait: Duration) -> bool {
        match timeout(wait, self.lines.next_line()).await {
            Ok(Ok(None)) => true,
            Ok(Err(_)) => true,
            _ => false,
        }
    }

    async fn auth(&mut self, client_id: &str) {
        self.send(&format!("AUTH pawy {client_id}")).await;
        assert_eq!(self.recv().await, "OK AUTH");
    }
}

#[tokio::test]
async fn ping_pong() {
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;

    client.send("PING").await;
    assert_eq!(client.recv().await, "PONG");
}

#[tokio::test]
async fn empty_lines_are_ignored() {
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;

    client.write.write_all(b"\n   \r\n PING \n").await.unwrap();
    assert_eq!(client.recv().await, "PONG");
}

#[tokio::test]
async fn unknown_command() {
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;

    client.send("NOPE").await;
    assert_eq!(client.recv().await, "ERR UNKNOWN_CMD");
}

#[tokio::test]
async fn auth_rejects_bad_passkey() {
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;

    client.send("AUTH wrong X").await;
    assert_eq!(client.recv().await, "ERR BAD_PASSKEY");

    client.send("NEWL BUY TSLA 10 100").await;
    assert_eq!(client.recv().await, "UNAUTHORIZED");
}

#[tokio::test]
async fn resting_order_on_empty_book() {
    // Place into an empty book: acknowledged, no execution report
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;
    client.auth("A").await;

    client.send("NEWL BUY TSLA 10 100").await;
    assert_eq!(client.recv().await, "REQUEST_MADE");

    // PONG arriving next proves no EXEC was queued in between
    client.send("PING").await;
    assert_eq!(client.recv().await, "PONG");
}

#[tokio::test]
async fn immediate_full_cross() {
    let addr = start_server().await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;
    alice.auth("A").await;
    bob.auth("B").await;

    alice.send("NEWL BUY TSLA 10 100").await;
    assert_eq!(alice.recv().await, "REQUEST_MADE");

    bob.send("NEWL SELL TSLA 10 100").await;
    assert_eq!(bob.recv().await, "EXEC TSLA 10@100");
    assert_eq!(bob.recv().await, "REQUEST_MADE");
    assert_eq!(alice.recv().await, "EXEC TSLA 10@100");

    // Both sides empty again: a fresh buy rests without executing
    alice.send("NEWL BUY TSLA 1 100").await;
    assert_eq!(alice.recv().await, "REQUEST_MADE");
    alice.send("PING").await;
    assert_eq!(alice.recv().await, "PONG");
}

#[tokio::test]
async fn partial_cross_fills_at_resting_price() {
    let addr = start_server().await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;
    alice.auth("A").await;
    bob.auth("B").await;

    alice.send("NEWL BUY TSLA 10 100").await;
    assert_eq!(alice.recv().await, "REQUEST_MADE");

    bob.send("NEWL SELL TSLA 4 95").await;
    assert_eq!(bob.recv().await, "EXEC TSLA 4@100");
    assert_eq!(bob.recv().await, "REQUEST_MADE");
    assert_eq!(alice.recv().await, "EXEC TSLA 4@100");
}

#[tokio::test]
async fn price_priority_across_levels() {
    let addr = start_server().await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;
    alice.auth("A").await;
    bob.auth("B").await;

    alice.send("NEWL BUY TSLA 5 101").await;
    assert_eq!(alice.recv().await, "REQUEST_MADE");
    alice.send("NEWL BUY TSLA 5 100").await;
    assert_eq!(alice.recv().await, "REQUEST_MADE");

    bob.send("NEWL SELL TSLA 8 99").await;
    assert_eq!(bob.recv().await, "EXEC TSLA 5@101");
    assert_eq!(bob.recv().await, "EXEC TSLA 3@100");
    assert_eq!(bob.recv().await, "REQUEST_MADE");

    assert_eq!(alice.recv().await, "EXEC TSLA 5@101");
    assert_eq!(alice.recv().await, "EXEC TSLA 3@100");
}

#[tokio::test]
async fn time_priority_within_level() {
    let addr = start_server().await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;
    let mut carol = Client::connect(addr).await;
    alice.auth("A").await;
    bob.auth("B").await;
    carol.auth("C").await;

    alice.send("NEWL BUY TSLA 5 100").await;
    assert_eq!(alice.recv().await, "REQUEST_MADE");
    bob.send("NEWL BUY TSLA 5 100").await;
    assert_eq!(bob.recv().await, "REQUEST_MADE");

    carol.send("NEWL SELL TSLA 5 100").await;
    assert_eq!(carol.recv().await, "EXEC TSLA 5@100");
    assert_eq!(carol.recv().await, "REQUEST_MADE");

    // The earlier order (alice's) filled; bob's is untouched
    assert_eq!(alice.recv().await, "EXEC TSLA 5@100");
    bob.send("PING").await;
    assert_eq!(bob.recv().await, "PONG");
}

#[tokio::test]
async fn supersede_login_closes_old_connection() {
    let addr = start_server().await;
    let mut first = Client::connect(addr).await;
    let mut second = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;

    first.auth("X").await;
    second.auth("X").await;

    assert!(
        first.closed(RECV_TIMEOUT).await,
        "superseded connection must be closed by the server"
    );

    // Traffic for X now lands on the second connection
    second.send("NEWL BUY TSLA 10 100").await;
    assert_eq!(second.recv().await, "REQUEST_MADE");

    bob.auth("B").await;
    bob.send("NEWL SELL TSLA 10 100").await;
    assert_eq!(bob.recv().await, "EXEC TSLA 10@100");
    assert_eq!(bob.recv().await, "REQUEST_MADE");
    assert_eq!(second.recv().await, "EXEC TSLA 10@100");
}

#[tokio::test]
async fn reauth_same_client_is_noop() {
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;

    client.auth("X").await;
    client.send("AUTH pawy X").await;
    assert_eq!(client.recv().await, "OK AUTH");

    client.send("NEWL BUY TSLA 1 100").await;
    assert_eq!(client.recv().await, "REQUEST_MADE");
}

#[tokio::test]
async fn subscribe_and_group_send() {
    let addr = start_server().await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;
    alice.auth("A").await;
    bob.auth("B").await;

    alice.send("SUB chat").await;
    assert_eq!(alice.recv().await, "SUBSCRIBED");

    bob.send("SEND chat hello there world").await;
    assert_eq!(bob.recv().await, "MESSAGE SENT");
    assert_eq!(alice.recv().await, "hello there world");
}

#[tokio::test]
async fn l1_updates_reach_market_data_subscribers() {
    let addr = start_server().await;
    let mut alice = Client::connect(addr).await;
    let mut feed = Client::connect(addr).await;
    alice.auth("A").await;
    feed.auth("MD").await;

    feed.send("SUB F1").await;
    assert_eq!(feed.recv().await, "SUBSCRIBED");

    alice.send("NEWL BUY TSLA 5 100").await;
    assert_eq!(alice.recv().await, "REQUEST_MADE");
    alice.send("NEWL SELL TSLA 5 100").await;
    assert_eq!(alice.recv().await, "EXEC TSLA 5@100");
    assert_eq!(alice.recv().await, "EXEC TSLA 5@100");
    assert_eq!(alice.recv().await, "REQUEST_MADE");

    assert_eq!(feed.recv().await, "F1_UPDATE");
    assert_eq!(feed.recv().await, "LTP: 100");
    assert_eq!(feed.recv().await, "HIGH: 100");
    assert_eq!(feed.recv().await, "LOW: 100");
    assert_eq!(feed.recv().await, "OPEN: 100");
    assert_eq!(feed.recv().await, "CLOSE: 100");
}

#[tokio::test]
async fn order_validation_errors() {
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;
    client.auth("A").await;

    client.send("NEWL UP TSLA 10 100").await;
    assert_eq!(client.recv().await, "ERR BAD_SIDE (expected BUY or SELL)");

    client.send("NEWL BUY GME 10 100").await;
    assert_eq!(client.recv().await, "ERR BAD_SYMBOL");

    client.send("NEWL BUY TSLA -4 100").await;
    assert_eq!(client.recv().await, "ERR BAD_QTY");

    client.send("NEWL BUY TSLA 10 zero").await;
    assert_eq!(client.recv().await, "ERR BAD_PRICE");

    client.send("NEWL BUY TSLA").await;
    assert_eq!(client.recv().await, "ERR BAD_COMMAND");
    assert_eq!(
        client.recv().await,
        "USAGE: NEWL <BUY|SELL> <SYMBOL> <QTY> <PRICE>"
    );
}

#[tokio::test]
async fn debug_surface() {
    let addr = start_server().await;
    let mut client = Client::connect(addr).await;
    client.auth("A").await;

    client.send("DEBUG ORDERS").await;
    assert_eq!(client.recv().await, "UNAUTHORIZED");

    client.send("DEBUG AUTH wrong").await;
    assert_eq!(client.recv().await, "BAD_SECRET");

    client.send("DEBUG AUTH 123456").await;
    assert_eq!(client.recv().await, "AUTHORIZED");

    client.send("NEWL BUY TSLA 5 100").await;
    assert_eq!(client.recv().await, "REQUEST_MADE");

    client.send("DEBUG ORDERS").await;
    assert!(client.recv().await.starts_with("At: "));
    assert_eq!(client.recv().await, "SYM: TSLA");
    assert_eq!(client.recv().await, "    BUY: 100");
    assert_eq!(client.recv().await, "    SELL: ");

    client.send("DEBUG INSTRUMENTS").await;
    assert!(client.recv().await.starts_with("At: "));
    assert_eq!(client.recv().await, "Instruments(1)");
}

#[tokio::test]
async fn multiple_instruments_are_independent() {
    let mut config = Config::default();
    config.symbols = vec!["TSLA".to_string(), "AAPL".to_string()];
    let addr = start_server_with(config).await;

    let mut client = Client::connect(addr).await;
    client.auth("A").await;

    client.send("NEWL BUY TSLA 5 100").await;
    assert_eq!(client.recv().await, "REQUEST_MADE");

    // A crossing sell on the other symbol must not execute
    client.send("NEWL SELL AAPL 5 90").await;
    assert_eq!(client.recv().await, "REQUEST_MADE");
    client.send("PING").await;
    assert_eq!(client.recv().await, "PONG");
}

#[tokio::test]
async fn idle_sessions_are_reaped() {
    let mut config = Config::default();
    config.idle_timeout = Duration::from_millis(200);
    let addr = start_server_with(config).await;

    let mut client = Client::connect(addr).await;
    client.send("PING").await;
    assert_eq!(client.recv().await, "PONG");

    // The sweep runs once a second; well past the timeout the server
    // must have dropped us.
    assert!(client.closed(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn disconnect_leaves_resting_orders() {
    let addr = start_server().await;
    let mut alice = Client::connect(addr).await;
    alice.auth("A").await;
    alice.send("NEWL BUY TSLA 10 100").await;
    assert_eq!(alice.recv().await, "REQUEST_MADE");
    drop(alice);

    // The resting order survives its owner's disconnect and still fills
    let mut bob = Client::connect(addr).await;
    bob.auth("B").await;
    bob.send("NEWL SELL TSLA 10 100").await;
    assert_eq!(bob.recv().await, "EXEC TSLA 10@100");
    assert_eq!(bob.recv().await, "REQUEST_MADE");
}
