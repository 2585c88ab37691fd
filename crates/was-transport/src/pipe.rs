use std::io;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use crate::error::{Result, TransportError};

/// Create an anonymous pipe, returning `(read_end, write_end)`.
///
/// Both ends are close-on-exec; [`crate::spawn`] maps the child's ends
/// explicitly.
pub fn pipe() -> Result<(OwnedFd, OwnedFd)> {
    let mut fds: [RawFd; 2] = [-1, -1];

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    // SAFETY: `fds` is a valid writable array of two descriptors.
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    // SAFETY: `fds` is a valid writable array of two descriptors.
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };

    if rc != 0 {
        return Err(TransportError::Create {
            what: "pipe",
            source: io::Error::last_os_error(),
        });
    }

    // SAFETY: pipe() succeeded, so both descriptors are open and exclusively ours.
    let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    {
        set_cloexec(fds[0], true)?;
        set_cloexec(fds[1], true)?;
    }

    Ok((read, write))
}

/// Set or clear `FD_CLOEXEC` on a descriptor.
pub(crate) fn set_cloexec(fd: RawFd, on: bool) -> io::Result<()> {
    // SAFETY: fcntl with F_GETFD/F_SETFD has no memory-safety preconditions.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }
    let flags = if on {
        flags | libc::FD_CLOEXEC
    } else {
        flags & !libc::FD_CLOEXEC
    };
    // SAFETY: see above.
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Returns an error unless `fd` refers to an open descriptor.
pub(crate) fn check_open(fd: RawFd) -> Result<()> {
    // SAFETY: F_GETFD only inspects the descriptor table.
    if unsafe { libc::fcntl(fd, libc::F_GETFD) } == -1 {
        return Err(TransportError::NotOpen {
            fd,
            source: io::Error::last_os_error(),
        });
    }
    Ok(())
}
