//! Bounded-timeout byte I/O over an already-open serial descriptor (C1).
//!
//! Opening/closing the device file is an external collaborator's job; this
//! module only configures termios on a descriptor handed to it and performs
//! the buffered, timeout-bounded reads/writes the framer needs.

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use log::trace;
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::termios::{self, BaudRate, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg};
use nix::unistd::{read, write};

use crate::constants::READ_TIMEOUT_US;
use crate::error::TransportError;

/// A byte-stream endpoint the link layer reads frames from and writes frames
/// to. Implemented for real serial descriptors and, in tests, for in-memory
/// buffers.
pub trait Transport {
    /// Waits up to the configured timeout for readable data and returns the
    /// bytes read into `buf`. Returns `Ok(0)` when the wait timed out with no
    /// data available; this is the "no data yet" case, not EOF.
    fn read_ready(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Writes the entirety of `buf`, retrying on interruption. A short write
    /// is reported as a fatal error rather than retried.
    fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError>;
}

/// A real serial line, configured raw 8N1 at 9600 baud on construction.
pub struct SerialTransport {
    fd: OwnedFd,
    device: String,
}

impl SerialTransport {
    /// Takes ownership of an already-open descriptor and configures it for
    /// the Garmin link protocol: raw mode, 8 data bits, no parity, 1 stop
    /// bit, 9600 baud, ignoring parity errors, no controlling terminal
    /// semantics. Flushes pending input/output first.
    pub fn new(fd: OwnedFd, device: impl Into<String>) -> Result<Self, TransportError> {
        let device = device.into();

        termios::tcflush(&fd, termios::FlushArg::TCIOFLUSH).map_err(|errno| {
            TransportError::Io {
                device: device.clone(),
                syscall: "tcflush",
                source: errno.into(),
            }
        })?;

        let mut tio = termios::tcgetattr(&fd).map_err(|errno| TransportError::Io {
            device: device.clone(),
            syscall: "tcgetattr",
            source: errno.into(),
        })?;

        tio.input_flags = InputFlags::IGNPAR;
        tio.output_flags = OutputFlags::empty();
        tio.control_flags = ControlFlags::CLOCAL | ControlFlags::CREAD | ControlFlags::CS8;
        tio.local_flags = LocalFlags::empty();
        termios::cfsetspeed(&mut tio, BaudRate::B9600).map_err(|errno| TransportError::Io {
            device: device.clone(),
            syscall: "cfsetspeed",
            source: errno.into(),
        })?;

        termios::tcsetattr(&fd, SetArg::TCSANOW, &tio).map_err(|errno| TransportError::Io {
            device: device.clone(),
            syscall: "tcsetattr",
            source: errno.into(),
        })?;

        Ok(Self { fd, device })
    }

    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl Transport for SerialTransport {
    fn read_ready(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut fds = [PollFd::new(self.as_fd(), PollFlags::POLLIN)];
        let timeout = PollTimeout::from((READ_TIMEOUT_US / 1000) as u16);

        let rc = loop {
            match poll(&mut fds, timeout) {
                Ok(rc) => break rc,
                Err(Errno::EINTR) => continue,
                Err(errno) => {
                    return Err(TransportError::Io {
                        device: self.device.clone(),
                        syscall: "poll",
                        source: errno.into(),
                    });
                }
            }
        };

        if rc == 0 {
            return Ok(0);
        }

        let n = loop {
            match read(&self.fd, buf) {
                Ok(n) => break n,
                Err(Errno::EINTR) => continue,
                Err(errno) => {
                    return Err(TransportError::Io {
                        device: self.device.clone(),
                        syscall: "read",
                        source: errno.into(),
                    });
                }
            }
        };

        if n == 0 {
            return Err(TransportError::Disconnected {
                device: self.device.clone(),
            });
        }

        trace!("{}: read {} bytes", self.device, n);
        Ok(n)
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        let n = loop {
            match write(&self.fd, buf) {
                Ok(n) => break n,
                Err(Errno::EINTR) => continue,
                Err(errno) => {
                    return Err(TransportError::Io {
                        device: self.device.clone(),
                        syscall: "write",
                        source: errno.into(),
                    });
                }
            }
        };

        if n != buf.len() {
            return Err(TransportError::ShortWrite {
                device: self.device.clone(),
            });
        }

        trace!("{}: wrote {} bytes", self.device, n);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// In-memory transport for exercising the framer/link layers without a
    /// real device. A timeout never occurs: `read_ready` returns whatever is
    /// left in the buffer, or 0 once it is exhausted (clean EOF).
    pub struct MockTransport {
        pub input: Cursor<Vec<u8>>,
        pub output: Vec<u8>,
    }

    impl MockTransport {
        pub fn new(input: Vec<u8>) -> Self {
            Self {
                input: Cursor::new(input),
                output: Vec::new(),
            }
        }
    }

    impl Transport for MockTransport {
        fn read_ready(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            use std::io::Read;
            Ok(self.input.read(buf).expect("in-memory read never fails"))
        }

        fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
            self.output.extend_from_slice(buf);
            Ok(())
        }
    }

    #[test]
    fn mock_read_ready_returns_zero_at_eof() {
        let mut t = MockTransport::new(vec![1, 2, 3]);
        let mut buf = [0u8; 8];
        assert_eq!(t.read_ready(&mut buf).unwrap(), 3);
        assert_eq!(t.read_ready(&mut buf).unwrap(), 0);
    }

    #[test]
    fn mock_write_all_accumulates_output() {
        let mut t = MockTransport::new(vec![]);
        t.write_all(&[1, 2]).unwrap();
        t.write_all(&[3]).unwrap();
        assert_eq!(t.output, vec![1, 2, 3]);
    }
}
