//! # Cooperative TCP sockets
//!
//! `CoListener` and `CoStream` wrap nonblocking fds with the block-on-epoll
//! protocol, giving routine bodies a plain blocking programming model:
//!
//! ```ignore
//! let listener = CoListener::bind(reactor.clone(), 8080)?;
//! while let Some(stream) = listener.accept()? {
//!     let engine = reactor.engine().clone();
//!     engine.spawn(move || handle_connection(stream))?;
//! }
//! ```
//!
//! Every operation loops: try the nonblocking syscall, and on `EAGAIN` hand
//! the descriptor to the reactor and block until it reports readiness. A
//! wake with no readiness bits means the reactor was shut down; `accept`
//! then returns `None` and reads/writes return [`ReactorError::Stopped`].

use crate::error::{ReactorError, ReactorResult};
use crate::reactor::Reactor;

use nix::errno::Errno;
use nix::sys::epoll::EpollFlags;

use std::os::fd::RawFd;
use std::rc::Rc;

/// A nonblocking TCP listener driven by the reactor.
pub struct CoListener {
    fd: RawFd,
    reactor: Rc<Reactor>,
}

impl CoListener {
    /// Bind and listen on a port.
    ///
    /// Pass port 0 to let the kernel pick one; read it back with
    /// [`CoListener::local_port`].
    pub fn bind(reactor: Rc<Reactor>, port: u16) -> ReactorResult<Self> {
        let fd = bind_socket(port)?;
        Ok(Self { fd, reactor })
    }

    /// Wrap an already-listening nonblocking fd.
    pub fn from_raw(fd: RawFd, reactor: Rc<Reactor>) -> Self {
        Self { fd, reactor }
    }

    /// Accept a connection, blocking the calling routine until a client
    /// connects. Returns `None` when the reactor is shut down.
    pub fn accept(&self) -> ReactorResult<Option<CoStream>> {
        loop {
            let mut addr: libc::sockaddr_in = unsafe { std::mem::zeroed() };
            let mut addr_len: libc::socklen_t =
                std::mem::size_of::<libc::sockaddr_in>() as u32;
            let client_fd = unsafe {
                libc::accept4(
                    self.fd,
                    &mut addr as *mut _ as *mut libc::sockaddr,
                    &mut addr_len,
                    libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                )
            };
            if client_fd >= 0 {
                set_nodelay(client_fd);
                return Ok(Some(CoStream {
                    fd: client_fd,
                    reactor: self.reactor.clone(),
                }));
            }
            match Errno::last() {
                Errno::EAGAIN => {
                    if !self.wait_readable()? {
                        return Ok(None);
                    }
                }
                Errno::EINTR | Errno::ECONNABORTED => continue,
                e => return Err(ReactorError::Os(e)),
            }
        }
    }

    /// Port the listener is bound to.
    pub fn local_port(&self) -> ReactorResult<u16> {
        let mut addr: libc::sockaddr_in = unsafe { std::mem::zeroed() };
        let mut addr_len: libc::socklen_t =
            std::mem::size_of::<libc::sockaddr_in>() as u32;
        let ret = unsafe {
            libc::getsockname(
                self.fd,
                &mut addr as *mut _ as *mut libc::sockaddr,
                &mut addr_len,
            )
        };
        if ret != 0 {
            return Err(ReactorError::Os(Errno::last()));
        }
        Ok(u16::from_be(addr.sin_port))
    }

    /// Get the raw fd.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Block until the listening socket is readable; false means the wake
    /// came from shutdown, not from a pending connection.
    fn wait_readable(&self) -> ReactorResult<bool> {
        if !self.reactor.is_running() {
            return Ok(false);
        }
        let bits = self.reactor.block_on(self.fd, EpollFlags::EPOLLIN)?;
        Ok(bits != 0 && self.reactor.is_running())
    }
}

impl Drop for CoListener {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

/// A nonblocking TCP connection driven by the reactor.
pub struct CoStream {
    fd: RawFd,
    reactor: Rc<Reactor>,
}

impl CoStream {
    /// Wrap an already-connected nonblocking fd.
    pub fn from_raw(fd: RawFd, reactor: Rc<Reactor>) -> Self {
        Self { fd, reactor }
    }

    /// Read into `buf`, blocking the calling routine until data arrives.
    /// Returns bytes read, with 0 meaning the peer closed.
    pub fn read(&self, buf: &mut [u8]) -> ReactorResult<usize> {
        loop {
            let ret = unsafe {
                libc::recv(self.fd, buf.as_mut_ptr() as *mut _, buf.len(), 0)
            };
            if ret >= 0 {
                return Ok(ret as usize);
            }
            match Errno::last() {
                Errno::EAGAIN => self.wait_for(EpollFlags::EPOLLIN)?,
                Errno::EINTR => continue,
                e => return Err(ReactorError::Os(e)),
            }
        }
    }

    /// Write the whole of `buf`, blocking as needed.
    pub fn write_all(&self, buf: &[u8]) -> ReactorResult<()> {
        let mut sent = 0;
        while sent < buf.len() {
            sent += self.write(&buf[sent..])?;
        }
        Ok(())
    }

    /// Single send; returns bytes written.
    pub fn write(&self, buf: &[u8]) -> ReactorResult<usize> {
        loop {
            let ret = unsafe {
                libc::send(
                    self.fd,
                    buf.as_ptr() as *const _,
                    buf.len(),
                    libc::MSG_NOSIGNAL,
                )
            };
            if ret >= 0 {
                return Ok(ret as usize);
            }
            match Errno::last() {
                Errno::EAGAIN => self.wait_for(EpollFlags::EPOLLOUT)?,
                Errno::EINTR => continue,
                e => return Err(ReactorError::Os(e)),
            }
        }
    }

    /// Get the raw fd.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    fn wait_for(&self, interest: EpollFlags) -> ReactorResult<()> {
        if !self.reactor.is_running() {
            return Err(ReactorError::Stopped);
        }
        let bits = self.reactor.block_on(self.fd, interest)?;
        if bits == 0 || !self.reactor.is_running() {
            return Err(ReactorError::Stopped);
        }
        Ok(())
    }
}

impl Drop for CoStream {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

/// Common socket setup: create nonblocking, setsockopt, bind, listen.
fn bind_socket(port: u16) -> ReactorResult<RawFd> {
    let fd = unsafe {
        libc::socket(
            libc::AF_INET,
            libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
            0,
        )
    };
    if fd < 0 {
        return Err(ReactorError::Os(Errno::last()));
    }

    unsafe {
        let opt: i32 = 1;
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &opt as *const _ as *const _,
            4,
        );
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEPORT,
            &opt as *const _ as *const _,
            4,
        );
    }

    let mut addr: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    addr.sin_family = libc::AF_INET as u16;
    addr.sin_addr.s_addr = 0; // INADDR_ANY
    addr.sin_port = port.to_be();

    let ret = unsafe {
        libc::bind(
            fd,
            &addr as *const _ as *const libc::sockaddr,
            std::mem::size_of_val(&addr) as u32,
        )
    };
    if ret != 0 {
        let errno = Errno::last();
        unsafe { libc::close(fd) };
        return Err(ReactorError::Os(errno));
    }

    let ret = unsafe { libc::listen(fd, 4096) };
    if ret != 0 {
        let errno = Errno::last();
        unsafe { libc::close(fd) };
        return Err(ReactorError::Os(errno));
    }

    Ok(fd)
}

fn set_nodelay(fd: RawFd) {
    unsafe {
        let opt: i32 = 1;
        libc::setsockopt(
            fd,
            libc::IPPROTO_TCP,
            libc::TCP_NODELAY,
            &opt as *const _ as *const _,
            4,
        );
    }
}
