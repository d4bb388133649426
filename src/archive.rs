//! Writing the daemon's image export into a gzip archive.
//!
//! The export is one docker-save stream covering every resolved image. The
//! async side reads it in chunks and hands them over a bounded channel to a
//! blocking task, which compresses at the best gzip level straight into the
//! output file; nothing is buffered on disk in between.

use crate::daemon::{ImageDaemon, ImageExport};
use crate::error::{ArchiveError, Result};
use flate2::{Compression, write::GzEncoder};
use std::io::{self, Write};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

/// Read buffer size for the export stream (64 KiB)
pub const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Chunks in flight between the export reader and the compressor
const CHUNK_QUEUE_DEPTH: usize = 16;

/// A tar stream holding no entries: two zeroed 512 byte blocks
const EMPTY_TAR: [u8; 1024] = [0u8; 1024];

/// Export `image_ids` from the daemon into a gzip archive at `output`.
///
/// An existing file at `output` is truncated. On failure a partial archive
/// may be left behind.
///
/// # Returns
///
/// * `Ok(size)` - Size of the written archive in bytes
/// * `Err` - Export, file creation or compression failed
pub async fn archive<D: ImageDaemon>(daemon: &D, image_ids: &[String], output: &Path) -> Result<u64> {
    if image_ids.is_empty() {
        return Err(ArchiveError::NoImages.into());
    }

    let export = daemon.save(image_ids).await?;

    log::info!("Writing images to {}", output.display());
    let file = match tokio::fs::File::create(output).await {
        Ok(file) => file.into_std().await,
        Err(source) => {
            if let Err(e) = export.close().await {
                log::debug!("Export stream closed with error: {}", e);
            }
            return Err(ArchiveError::Create {
                path: output.to_path_buf(),
                source,
            }
            .into());
        }
    };

    let file = tokio::fs::File::from_std(archive_into(export, file).await?);
    file.sync_all()
        .await
        .map_err(|source| ArchiveError::Compression { source })?;

    let size = file
        .metadata()
        .await
        .map_err(|source| ArchiveError::Compression { source })?
        .len();
    Ok(size)
}

/// Write an archive holding no images to `output`, truncating any existing
/// file. `docker load` reads it as an empty image set.
pub async fn write_empty(output: &Path) -> Result<u64> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(&EMPTY_TAR)
        .map_err(|source| ArchiveError::Compression { source })?;
    let contents = encoder
        .finish()
        .map_err(|source| ArchiveError::Compression { source })?;

    log::info!("Writing empty archive to {}", output.display());
    tokio::fs::write(output, &contents)
        .await
        .map_err(|source| ArchiveError::Create {
            path: output.to_path_buf(),
            source,
        })?;
    Ok(contents.len() as u64)
}

/// Compress `export` into `sink` and close the export.
///
/// Compression runs on the blocking pool; `sink` is moved there and handed
/// back once the gzip stream is finished. The export is closed whether or
/// not the copy succeeded, and `sink` is dropped on failure. A read failure
/// takes precedence over a compression failure, and both over a close
/// failure.
pub async fn archive_into<E, W>(mut export: E, sink: W) -> Result<W>
where
    E: ImageExport,
    W: Write + Send + 'static,
{
    let (sender, receiver) = mpsc::channel(CHUNK_QUEUE_DEPTH);
    let compressor = tokio::task::spawn_blocking(move || compress(receiver, sink));

    let streamed = stream(&mut export, sender).await;
    let compressed = compressor
        .await
        .map_err(|e| ArchiveError::Compression {
            source: io::Error::other(e),
        })
        .and_then(|result| result);
    let closed = export.close().await;

    streamed?;
    let sink = compressed?;
    closed?;
    Ok(sink)
}

/// Read `reader` to the end, forwarding every chunk to the compressor.
///
/// Stops early, without error, once the compressor has gone away; its own
/// result carries the reason.
async fn stream<R>(reader: &mut R, sender: mpsc::Sender<Vec<u8>>) -> std::result::Result<u64, ArchiveError>
where
    R: AsyncRead + Unpin,
{
    let mut total: u64 = 0;

    loop {
        let mut chunk = vec![0u8; COPY_BUFFER_SIZE];
        let read = reader
            .read(&mut chunk)
            .await
            .map_err(|source| ArchiveError::Stream { source })?;
        if read == 0 {
            break;
        }

        chunk.truncate(read);
        if sender.send(chunk).await.is_err() {
            break;
        }
        total += read as u64;
    }

    log::debug!("Read {} bytes of image data", total);
    Ok(total)
}

/// Blocking side: gzip every received chunk into `sink` until the channel
/// closes, then finish the stream.
fn compress<W: Write>(mut receiver: mpsc::Receiver<Vec<u8>>, sink: W) -> std::result::Result<W, ArchiveError> {
    let mut encoder = GzEncoder::new(sink, Compression::best());

    while let Some(chunk) = receiver.blocking_recv() {
        encoder
            .write_all(&chunk)
            .map_err(|source| ArchiveError::Compression { source })?;
    }

    let mut sink = encoder
        .finish()
        .map_err(|source| ArchiveError::Compression { source })?;
    sink.flush()
        .map_err(|source| ArchiveError::Compression { source })?;
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DaemonError, SatchelError};
    use flate2::read::GzDecoder;
    use std::io::{self, Cursor, Read};
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Export double that can fail after some bytes and records its release
    struct TrackedExport {
        data: Cursor<Vec<u8>>,
        fail_after: Option<u64>,
        close_result: Option<String>,
        closed: Arc<AtomicBool>,
    }

    impl TrackedExport {
        fn new(data: Vec<u8>, closed: Arc<AtomicBool>) -> Self {
            Self {
                data: Cursor::new(data),
                fail_after: None,
                close_result: None,
                closed,
            }
        }
    }

    impl Drop for TrackedExport {
        fn drop(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    impl AsyncRead for TrackedExport {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if let Some(limit) = self.fail_after
                && self.data.position() >= limit
            {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "export interrupted",
                )));
            }
            Pin::new(&mut self.data).poll_read(cx, buf)
        }
    }

    impl ImageExport for TrackedExport {
        async fn close(self) -> std::result::Result<(), DaemonError> {
            self.closed.store(true, Ordering::SeqCst);
            match &self.close_result {
                Some(reason) => Err(DaemonError::Save {
                    reason: reason.clone(),
                }),
                None => Ok(()),
            }
        }
    }

    /// Sink that fails every write once its budget is spent and records its release
    struct TrackedSink {
        written: Vec<u8>,
        budget: usize,
        dropped: Arc<AtomicBool>,
    }

    impl Write for TrackedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written.len() + buf.len() > self.budget {
                return Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Drop for TrackedSink {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    fn payload() -> Vec<u8> {
        (0..200_000u32).flat_map(|i| (i % 251).to_le_bytes()).collect()
    }

    #[tokio::test]
    async fn test_archive_into_round_trips_payload() {
        let closed = Arc::new(AtomicBool::new(false));
        let export = TrackedExport::new(payload(), closed.clone());

        let compressed = archive_into(export, Vec::new()).await.unwrap();
        assert!(closed.load(Ordering::SeqCst));
        assert!(!compressed.is_empty());

        let mut decoded = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, payload());
    }

    #[tokio::test]
    async fn test_stream_failure_releases_export_and_sink() {
        let closed = Arc::new(AtomicBool::new(false));
        let dropped = Arc::new(AtomicBool::new(false));
        let mut export = TrackedExport::new(payload(), closed.clone());
        export.fail_after = Some(COPY_BUFFER_SIZE as u64);
        let sink = TrackedSink {
            written: Vec::new(),
            budget: usize::MAX,
            dropped: dropped.clone(),
        };

        let result = archive_into(export, sink).await;
        assert!(matches!(
            result,
            Err(SatchelError::Archive(ArchiveError::Stream { .. }))
        ));
        assert!(closed.load(Ordering::SeqCst));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_write_failure_releases_export_and_sink() {
        let closed = Arc::new(AtomicBool::new(false));
        let dropped = Arc::new(AtomicBool::new(false));
        let export = TrackedExport::new(payload(), closed.clone());
        let sink = TrackedSink {
            written: Vec::new(),
            budget: 16,
            dropped: dropped.clone(),
        };

        let result = archive_into(export, sink).await;
        assert!(matches!(
            result,
            Err(SatchelError::Archive(ArchiveError::Compression { .. }))
        ));
        assert!(closed.load(Ordering::SeqCst));
        assert!(dropped.load(Ordering::SeqCst));
    }

    /// Sink recording which threads wrote to it
    struct ThreadRecordingSink {
        threads: Arc<Mutex<Vec<std::thread::ThreadId>>>,
    }

    impl Write for ThreadRecordingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.threads
                .lock()
                .unwrap()
                .push(std::thread::current().id());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_compression_runs_off_the_async_thread() {
        let closed = Arc::new(AtomicBool::new(false));
        let threads = Arc::new(Mutex::new(Vec::new()));
        let export = TrackedExport::new(payload(), closed.clone());
        let sink = ThreadRecordingSink {
            threads: threads.clone(),
        };

        archive_into(export, sink).await.unwrap();

        let threads = threads.lock().unwrap();
        assert!(!threads.is_empty());
        assert!(
            threads
                .iter()
                .all(|thread| *thread != std::thread::current().id())
        );
    }

    #[tokio::test]
    async fn test_write_empty_is_a_valid_empty_tar() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("empty.tgz");
        std::fs::write(&path, vec![7u8; 4096]).unwrap();

        let size = write_empty(&path).await.unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), size);

        let file = std::fs::File::open(&path).unwrap();
        let mut tar = tar::Archive::new(GzDecoder::new(file));
        assert_eq!(tar.entries().unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_close_failure_is_reported() {
        let closed = Arc::new(AtomicBool::new(false));
        let mut export = TrackedExport::new(b"partial".to_vec(), closed.clone());
        export.close_result = Some("reference does not exist".to_string());

        let result = archive_into(export, Vec::new()).await;
        assert!(matches!(
            result,
            Err(SatchelError::Daemon(DaemonError::Save { .. }))
        ));
        assert!(closed.load(Ordering::SeqCst));
    }
}
