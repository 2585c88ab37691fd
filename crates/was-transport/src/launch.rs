use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::pipe::set_cloexec;
use crate::socket::{WasSocket, CONTROL_FD};

/// Launch a WAS application process.
///
/// The child's end of a fresh [`WasSocket::pair`] is mapped onto the
/// conventional descriptors (control on fd 3, request body on stdin,
/// response body on stdout). The returned socket is the client side.
///
/// The command's stdin/stdout settings are replaced; after spawning they
/// are reset so the parent does not keep the child's pipe ends open.
pub fn spawn(command: &mut Command) -> Result<(Child, WasSocket)> {
    let (client, server) = WasSocket::pair()?;
    let (control, input, output) = server.into_parts();
    let control: OwnedFd = control.into();
    let raw_control = control.as_raw_fd();

    command.stdin(Stdio::from(input)).stdout(Stdio::from(output));

    // SAFETY: the closure only calls dup2/fcntl, which are async-signal-safe,
    // and touches no memory shared with the parent.
    unsafe {
        command.pre_exec(move || {
            if raw_control == CONTROL_FD {
                set_cloexec(CONTROL_FD, false)
            } else if libc::dup2(raw_control, CONTROL_FD) == -1 {
                Err(std::io::Error::last_os_error())
            } else {
                Ok(())
            }
        });
    }

    let program = command.get_program().to_string_lossy().into_owned();
    let spawned = command.spawn();
    command.stdin(Stdio::null()).stdout(Stdio::inherit());
    drop(control);

    let child = spawned.map_err(|source| TransportError::Spawn {
        program: program.clone(),
        source,
    })?;
    info!(program, pid = child.id(), "spawned WAS application");
    debug!(
        control = client.control.as_raw_fd(),
        input = client.input.as_raw_fd(),
        output = client.output.as_raw_fd(),
        "client side descriptors"
    );

    Ok((child, client))
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Read;

    use super::*;

    #[test]
    fn child_stdout_is_response_pipe() {
        let mut command = Command::new("/bin/sh");
        command.arg("-c").arg("printf response");

        let (mut child, client) = spawn(&mut command).unwrap();
        let (_control, input, _output) = client.into_parts();

        let mut buf = Vec::new();
        File::from(input).read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"response");
        assert!(child.wait().unwrap().success());
    }

    #[test]
    fn child_fd3_is_control_socket() {
        let mut command = Command::new("/bin/sh");
        command.arg("-c").arg("printf control >&3");

        let (mut child, mut client) = spawn(&mut command).unwrap();
        assert!(child.wait().unwrap().success());

        let mut buf = [0u8; 7];
        client.control.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"control");
    }

    #[test]
    fn missing_program_reports_spawn_error() {
        let mut command = Command::new("/nonexistent/was-application");
        let err = spawn(&mut command).unwrap_err();
        assert!(matches!(err, TransportError::Spawn { .. }));
    }
}
