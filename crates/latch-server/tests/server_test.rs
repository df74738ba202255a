//! End-to-end tests over TCP.

use std::{path::Path, time::Duration};

use bytes::BytesMut;
use latch_core::{BlessingName, DeviceConfig, DeviceMode};
use latch_proto::{Call, ErrorCode, LockStatus, Reply, Request, Response, decode_frame, encode_frame};
use latch_server::{IDENTITY_FILE, OWNER_FILE, Server, ServerRuntimeConfig, SigningIdentity};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    task::JoinHandle,
};

struct Client {
    stream: TcpStream,
    inbound: BytesMut,
    next_id: u64,
}

impl Client {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        Self { stream, inbound: BytesMut::new(), next_id: 1 }
    }

    async fn call(&mut self, blessings: &[&str], call: Call) -> Result<Reply, ErrorCode> {
        let id = self.next_id;
        self.next_id += 1;

        let request =
            Request { id, blessings: blessings.iter().map(|b| (*b).to_string()).collect(), call };
        let mut buf = BytesMut::new();
        encode_frame(&request, &mut buf).unwrap();
        self.stream.write_all(&buf).await.unwrap();

        let response = self.read_response().await;
        assert_eq!(response.id, id);
        response.result
    }

    async fn read_response(&mut self) -> Response {
        loop {
            if let Some(response) = decode_frame::<Response>(&mut self.inbound).unwrap() {
                return response;
            }
            let n = self.stream.read_buf(&mut self.inbound).await.unwrap();
            assert_ne!(n, 0, "server closed the connection");
        }
    }
}

fn config(state_dir: &Path) -> ServerRuntimeConfig {
    ServerRuntimeConfig {
        bind_address: "127.0.0.1:0".to_string(),
        state_dir: state_dir.to_path_buf(),
        device_name: "device".to_string(),
        device: DeviceConfig {
            actuation_timeout: Duration::from_secs(1),
            status_timeout: Duration::from_secs(1),
        },
        actuator_latency: Duration::ZERO,
        max_connections: 8,
    }
}

async fn start(state_dir: &Path) -> (std::net::SocketAddr, JoinHandle<()>) {
    let server = Server::bind(config(state_dir)).await.unwrap();
    let addr = server.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let _ = server.run().await;
    });
    (addr, handle)
}

#[tokio::test]
async fn claim_then_operate() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, server) = start(dir.path()).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(
        client.call(&[], Call::Describe).await,
        Ok(Reply::Interface(vec!["Claim".to_string()]))
    );
    assert_eq!(client.call(&["device/alice"], Call::Lock).await, Err(ErrorCode::OperationUnavailable));

    let Ok(Reply::Claimed(issued)) = client.call(&[], Call::Claim { name: "alice".into() }).await
    else {
        panic!("claim failed");
    };
    assert_eq!(issued.blessing, "device/alice");
    assert_eq!(issued.pattern, "device/alice");
    assert_eq!(issued.issuer_key.len(), 32);
    assert_eq!(issued.signature.len(), 64);

    assert_eq!(
        client.call(&[], Call::Claim { name: "bob".into() }).await,
        Err(ErrorCode::OperationUnavailable)
    );

    assert_eq!(client.call(&["device/alice/phone"], Call::Lock).await, Ok(Reply::Done));
    assert_eq!(
        client.call(&["device/alice"], Call::Status).await,
        Ok(Reply::Status(LockStatus::Locked))
    );
    assert_eq!(client.call(&["device/mallory"], Call::Unlock).await, Err(ErrorCode::NotAuthorized));
    assert_eq!(client.call(&["device/alicex"], Call::Status).await, Err(ErrorCode::NotAuthorized));
    assert_eq!(
        client.call(&["device/alice"], Call::Status).await,
        Ok(Reply::Status(LockStatus::Locked))
    );

    server.abort();
}

#[tokio::test]
async fn owner_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    let (addr, server) = start(dir.path()).await;
    let mut client = Client::connect(addr).await;
    let Ok(Reply::Claimed(first)) = client.call(&[], Call::Claim { name: "alice".into() }).await
    else {
        panic!("claim failed");
    };
    drop(client);
    server.abort();
    let _ = server.await;

    assert!(dir.path().join(OWNER_FILE).exists());

    let restarted = Server::bind(config(dir.path())).await.unwrap();
    assert_eq!(restarted.device().mode().unwrap(), DeviceMode::Claimed);
    let addr = restarted.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let _ = restarted.run().await;
    });

    let mut client = Client::connect(addr).await;
    assert_eq!(
        client.call(&[], Call::Describe).await,
        Ok(Reply::Interface(vec!["Lock".to_string(), "Unlock".to_string(), "Status".to_string()]))
    );
    assert_eq!(client.call(&["device/alice"], Call::Unlock).await, Ok(Reply::Done));
    assert_eq!(
        client.call(&[], Call::Claim { name: "bob".into() }).await,
        Err(ErrorCode::OperationUnavailable)
    );

    // The identity seed was reused, so the issuer key is unchanged.
    let seed: [u8; 32] = std::fs::read(dir.path().join(IDENTITY_FILE)).unwrap().try_into().unwrap();
    let identity = SigningIdentity::from_seed(BlessingName::parse("device").unwrap(), seed);
    assert_eq!(first.issuer_key, identity.verifying_key().to_bytes().to_vec());

    server.abort();
}

#[tokio::test]
async fn corrupt_owner_record_refuses_to_start() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(OWNER_FILE), b"\xff\x00garbage").unwrap();

    let result = Server::bind(config(dir.path())).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn invalid_device_name_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.device_name = "bad name".to_string();

    let result = Server::bind(config).await;
    assert!(matches!(result, Err(latch_server::ServerError::Config(_))));
}

#[tokio::test]
async fn concurrent_claims_over_tcp_have_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, server) = start(dir.path()).await;

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            tokio::spawn(async move {
                let mut client = Client::connect(addr).await;
                client.call(&[], Call::Claim { name: format!("user{i}") }).await
            })
        })
        .collect();

    let mut winners = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(Reply::Claimed(_)) => winners += 1,
            Err(ErrorCode::AlreadyClaimed | ErrorCode::OperationUnavailable) => {},
            other => panic!("unexpected claim result {other:?}"),
        }
    }
    assert_eq!(winners, 1);

    server.abort();
}
