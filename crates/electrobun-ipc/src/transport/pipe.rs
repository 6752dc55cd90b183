//! FIFO plumbing for the named-pipe channel pair.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

use electrobun_common::TransportError;
use tokio::io::AsyncWriteExt;
use tokio::net::unix::pipe;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::stream::{InboundSource, StreamTransport};
use super::{ChannelPaths, Side};

const RELEASE_ATTEMPTS: usize = 200;
const RELEASE_RETRY: Duration = Duration::from_millis(5);

/// Create a FIFO at `path`. An existing file at that path is accepted.
pub fn create_fifo(path: &Path) -> Result<(), TransportError> {
    let setup_error = |source: io::Error| TransportError::ChannelSetup {
        path: path.to_path_buf(),
        source,
    };

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| setup_error(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

    // SAFETY: `c_path` is a valid NUL-terminated string for the whole call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600 as libc::mode_t) };
    if rc == 0 {
        debug!(path = %path.display(), "fifo created");
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::AlreadyExists {
        debug!(path = %path.display(), "fifo already exists");
        return Ok(());
    }
    Err(setup_error(err))
}

/// Open the FIFO we write to without waiting for a reader. Opening read-write
/// keeps the descriptor valid even before the peer shows up.
pub fn open_writer(path: &Path) -> Result<pipe::Sender, TransportError> {
    let setup_error = |source: io::Error| TransportError::ChannelSetup {
        path: path.to_path_buf(),
        source,
    };
    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(setup_error)?;
    pipe::Sender::from_file(file).map_err(setup_error)
}

/// Open the FIFO we read from. Blocks (off the async threads) until the peer
/// opens it for writing, so end-of-data is reported only once that writer
/// goes away.
///
/// Returns `None` if `stop` fires first. The blocking open(2) cannot be
/// interrupted, so the write end is offered until it returns; callers that
/// remove the FIFO must wait for this to finish first.
pub async fn open_reader(
    path: &Path,
    stop: &CancellationToken,
) -> io::Result<Option<pipe::Receiver>> {
    let owned = path.to_path_buf();
    let mut opening = tokio::task::spawn_blocking(move || std::fs::File::open(owned));

    let file = tokio::select! {
        joined = &mut opening => joined.map_err(io::Error::other)??,
        _ = stop.cancelled() => {
            for _ in 0..RELEASE_ATTEMPTS {
                if opening.is_finished() {
                    return Ok(None);
                }
                release_blocked_reader(path);
                tokio::time::sleep(RELEASE_RETRY).await;
            }
            warn!(path = %path.display(), "reader still blocked in open after release");
            return Ok(None);
        }
    };
    pipe::Receiver::from_file(file).map(Some)
}

/// Wake a thread blocked in [`open_reader`] on `path` by briefly opening the
/// write end. Fails silently when nobody is waiting.
pub fn release_blocked_reader(path: &Path) {
    let _ = std::fs::OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path);
}

/// Create (idempotently) and open one side of a channel pair.
///
/// A single newline is written to the outbound pipe straight away: some
/// platforms only wake a blocked reader after the first write.
///
/// If setup fails on the controller side, whatever files were created are
/// removed again.
pub async fn open_channel(paths: &ChannelPaths, side: Side) -> Result<StreamTransport, TransportError> {
    let result = setup_channel(paths, side).await;
    if let Err(e) = &result {
        warn!(prefix = %paths.prefix().display(), error = %e, "pipe channel setup failed");
        if side == Side::Controller {
            remove_pair(paths);
        }
    }
    result
}

async fn setup_channel(paths: &ChannelPaths, side: Side) -> Result<StreamTransport, TransportError> {
    create_fifo(&paths.to_view())?;
    create_fifo(&paths.from_view())?;

    let outbound = paths.outbound(side);
    let mut writer = open_writer(&outbound)?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|source| TransportError::ChannelSetup {
            path: outbound.clone(),
            source,
        })?;

    let inbound = paths.inbound(side);
    info!(
        outbound = %outbound.display(),
        inbound = %inbound.display(),
        ?side,
        "pipe channel opened"
    );

    Ok(StreamTransport::new(
        paths.prefix().display().to_string(),
        writer,
        InboundSource::Fifo(inbound),
    ))
}

/// Remove both FIFO files. Missing files are ignored.
pub fn remove_pair(paths: &ChannelPaths) {
    for path in [paths.to_view(), paths.from_view()] {
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "fifo removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove fifo"),
        }
    }
}
