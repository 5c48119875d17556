//! costack TCP echo server
//!
//! Single-threaded echo server: one routine accepts, one routine per
//! connection echoes. All of them interleave on the shared stack and block
//! on epoll readiness through the reactor.
//!
//! Usage:
//!     cargo run --release -p costack-echo -- [port]
//!
//! Test with:
//!     echo "hello" | nc localhost 9999
//!
//! Ctrl-C shuts the server down cleanly: the signal handler writes the
//! reactor's waker eventfd, every blocked routine is released with empty
//! readiness, and each one terminates voluntarily.

use costack::{
    kerror, kinfo, kwarn, CoListener, CoStream, EngineConfig, ReactorError,
};

use std::sync::atomic::{AtomicI32, Ordering};

const BUF_SIZE: usize = 4096;
const DEFAULT_PORT: u16 = 9999;

/// Waker fd for the signal handler; -1 until the reactor exists.
static NOTIFY_FD: AtomicI32 = AtomicI32::new(-1);

/// SIGINT handler: a single write(2) on the eventfd, nothing else.
extern "C" fn on_sigint(_sig: libc::c_int) {
    let fd = NOTIFY_FD.load(Ordering::Relaxed);
    if fd >= 0 {
        let val: u64 = 1;
        unsafe { libc::write(fd, &val as *const u64 as *const libc::c_void, 8) };
    }
}

/// Per-connection routine: echo until EOF or shutdown.
fn serve(stream: CoStream) {
    let mut buf = [0u8; BUF_SIZE];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = stream.write_all(&buf[..n]) {
                    if e != ReactorError::Stopped {
                        kwarn!("write failed on fd {}: {}", stream.fd(), e);
                    }
                    break;
                }
            }
            Err(ReactorError::Stopped) => break,
            Err(e) => {
                kwarn!("read failed on fd {}: {}", stream.fd(), e);
                break;
            }
        }
    }
}

fn main() {
    let port: u16 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let result = costack::run(EngineConfig::from_env(), move |engine, reactor| {
        NOTIFY_FD.store(reactor.notify_fd(), Ordering::Relaxed);
        unsafe {
            libc::signal(libc::SIGINT, on_sigint as libc::sighandler_t);
        }

        let listener = match CoListener::bind(reactor.clone(), port) {
            Ok(l) => l,
            Err(e) => {
                kerror!("bind on port {} failed: {}", port, e);
                return;
            }
        };
        kinfo!("echo server listening on port {}", port);

        loop {
            match listener.accept() {
                Ok(Some(stream)) => {
                    kinfo!("accepted fd {}", stream.fd());
                    if let Err(e) = engine.spawn(move || serve(stream)) {
                        kwarn!("dropping connection: {}", e);
                    }
                }
                // empty wake: the SIGINT kick released the acceptor
                Ok(None) => break,
                Err(e) => {
                    kerror!("accept failed: {}", e);
                    break;
                }
            }
        }

        kinfo!("shutting down");
        reactor.shutdown();
    });

    if let Err(e) = result {
        kerror!("server failed: {}", e);
        std::process::exit(1);
    }
}
