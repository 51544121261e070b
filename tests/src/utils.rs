use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Pretends to be a set of CozyLife devices behind one listener.
///
/// Connections whose local address is a key of `devices` get an identify
/// response for that serial; everything else gets `{"msg":{}}`.
pub struct DeviceFleet {
    pub port: u16,
    server: JoinHandle<()>,
}

impl DeviceFleet {
    pub async fn spawn(bind: Ipv4Addr, devices: HashMap<Ipv4Addr, String>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind((bind, 0)).await?;
        let port = listener.local_addr()?.port();

        let server = tokio::spawn(async move {
            while let Ok((socket, _peer)) = listener.accept().await {
                let serial = match socket.local_addr().map(|local| local.ip()) {
                    Ok(IpAddr::V4(local)) => devices.get(&local).cloned(),
                    _ => None,
                };
                tokio::spawn(answer(socket, serial));
            }
        });

        Ok(Self { port, server })
    }
}

impl Drop for DeviceFleet {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn answer(mut socket: TcpStream, serial: Option<String>) {
    let mut request = [0u8; 256];
    let Ok(len) = socket.read(&mut request).await else {
        return;
    };
    if !request[..len].ends_with(b"\r\n") {
        return;
    }

    let reply = match serial {
        Some(serial) => format!(
            "{{\"cmd\":0,\"pv\":0,\"sn\":\"1\",\"msg\":{{\"did\":\"{serial}\",\"pid\":\"dj7bvx\",\"mac\":\"a4cf12000001\"}}}}\r\n"
        ),
        None => "{\"msg\":{}}\r\n".to_string(),
    };
    let _ = socket.write_all(reply.as_bytes()).await;
}
