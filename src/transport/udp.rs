use std::{
    io::ErrorKind,
    net::{SocketAddr, UdpSocket},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
    time::Duration,
};

use crate::{
    error::{InfobarError, InfobarResult},
    event::ChannelEvent,
    transport::{EventSlot, MAX_DATAGRAM_BYTES},
};

const RECV_POLL: Duration = Duration::from_millis(200);

/// Background datagram receiver. Dropping the handle stops the thread and
/// closes the socket.
pub struct UdpListener {
    local_addr: SocketAddr,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl UdpListener {
    /// Bind `addr` on the calling thread, then receive on a background thread.
    pub fn spawn(addr: SocketAddr, slot: EventSlot) -> InfobarResult<Self> {
        let socket = UdpSocket::bind(addr)
            .map_err(|e| InfobarError::transport(format!("bind udp {addr}: {e}")))?;
        socket
            .set_read_timeout(Some(RECV_POLL))
            .map_err(|e| InfobarError::transport(format!("udp read timeout: {e}")))?;
        let local_addr = socket.local_addr()?;

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let thread = std::thread::Builder::new()
            .name("infobar-udp".to_string())
            .spawn(move || recv_loop(socket, slot, thread_stop))?;

        tracing::info!(%local_addr, "udp listener started");
        Ok(Self {
            local_addr,
            stop,
            thread: Some(thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for UdpListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn recv_loop(socket: UdpSocket, slot: EventSlot, stop: Arc<AtomicBool>) {
    let mut buf = vec![0u8; MAX_DATAGRAM_BYTES];
    while !stop.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buf) {
            Ok((len, from)) => {
                handle_datagram(&buf[..len], &slot, from);
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                tracing::debug!(error = %e, "udp receive failed");
            }
        }
    }
    tracing::debug!("udp listener stopped");
}

/// Parse one datagram and accept it. Malformed datagrams are dropped.
pub(crate) fn handle_datagram(bytes: &[u8], slot: &EventSlot, from: SocketAddr) -> bool {
    match ChannelEvent::from_slice(bytes) {
        Ok(event) => {
            slot.accept(event);
            true
        }
        Err(e) => {
            tracing::debug!(%from, error = %e, "dropping malformed datagram");
            false
        }
    }
}
