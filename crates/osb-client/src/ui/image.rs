//! Framed image stream: repeated `{JSON header, "\n\n", color, alpha}`
//! records with double-buffered read/render overlap.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use osb_proto::frame::FRAME_BOUNDARY;
use osb_proto::{FrameError, UiImage, UiImageHeader};

use crate::errors::ClientError;
use crate::listener::SessionListener;

/// Incremental reader over the image stream body.
///
/// Headers may span read boundaries: the reader accumulates until it sees a
/// `"\n"` immediately followed by another `"\n"`, parses the header, then
/// consumes exactly `size - alphaSize` color bytes and `alphaSize` alpha
/// bytes, resuming across short reads. Empty headers are keep-alives.
pub(crate) struct RecordReader<S> {
    stream: S,
    buf: BytesMut,
}

impl<S> RecordReader<S>
where
    S: Stream<Item = Result<Bytes, ClientError>> + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: BytesMut::with_capacity(8192),
        }
    }

    /// Next assembled record; `None` at end of stream.
    pub async fn next_record(&mut self) -> Result<Option<UiImage>, ClientError> {
        loop {
            let Some(boundary) = find_boundary(&self.buf) else {
                if !self.fill().await? {
                    if !self.buf.is_empty() {
                        debug!(
                            leftover = self.buf.len(),
                            "image stream ended inside a header"
                        );
                    }
                    return Ok(None);
                }
                continue;
            };

            let header_bytes = self.buf.split_to(boundary);
            let _ = self.buf.split_to(FRAME_BOUNDARY.len());

            if header_bytes.iter().all(u8::is_ascii_whitespace) {
                // Keep-alive record.
                continue;
            }

            let header: UiImageHeader =
                serde_json::from_slice(&header_bytes).map_err(FrameError::BadHeader)?;

            let total = header.size as usize;
            while self.buf.len() < total {
                if !self.fill().await? {
                    debug!("image stream ended inside a payload");
                    return Ok(None);
                }
            }

            let mut payload = self.buf.split_to(total);
            let img = payload.split_to(header.color_size() as usize).freeze();
            let alpha_img = payload.freeze();
            return Ok(Some(UiImage {
                header,
                img,
                alpha_img,
            }));
        }
    }

    /// Pull one chunk into the buffer; `false` at end of stream.
    async fn fill(&mut self) -> Result<bool, ClientError> {
        match self.stream.next().await {
            Some(Ok(chunk)) => {
                self.buf.extend_from_slice(&chunk);
                Ok(true)
            }
            Some(Err(err)) => Err(err),
            None => Ok(false),
        }
    }
}

fn find_boundary(buf: &[u8]) -> Option<usize> {
    buf.windows(FRAME_BOUNDARY.len())
        .position(|w| w == FRAME_BOUNDARY)
}

/// Deliver records with two-slot ping-pong double buffering: while slot `W`
/// is filled from the network in a child task, the previously-filled slot
/// `R = 1 - W` is handed to the listener; then the indices swap. At most one
/// record is in flight past the network boundary and delivery stays in
/// stream order.
pub(crate) async fn run_image_stream<S>(
    stream: S,
    session_id: &str,
    listener: Arc<dyn SessionListener>,
    cancel: CancellationToken,
) -> Result<(), ClientError>
where
    S: Stream<Item = Result<Bytes, ClientError>> + Unpin + Send + 'static,
{
    let mut reader = RecordReader::new(stream);
    let mut slots: [Option<UiImage>; 2] = [None, None];
    let mut write_idx = 0usize;

    loop {
        let fill_cancel = cancel.clone();
        let fill = tokio::spawn(async move {
            let mut reader = reader;
            let record = tokio::select! {
                () = fill_cancel.cancelled() => Err(ClientError::Interrupted),
                record = reader.next_record() => record,
            };
            (reader, record)
        });

        let read_idx = 1 - write_idx;
        if let Some(image) = slots[read_idx].take() {
            if let Err(err) = listener.on_ui_image_frame(session_id, image).await {
                warn!(session_id, %err, "image frame listener failed");
            }
        }

        let (returned, record) = fill.await.map_err(|_| ClientError::Interrupted)?;
        reader = returned;

        match record {
            Ok(Some(image)) => {
                slots[write_idx] = Some(image);
                write_idx = read_idx;
            }
            Ok(None) => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestListener;
    use futures::stream;

    fn record(header: &str, payload: &[u8]) -> Vec<u8> {
        let mut out = header.as_bytes().to_vec();
        out.extend_from_slice(FRAME_BOUNDARY);
        out.extend_from_slice(payload);
        out
    }

    fn byte_stream(
        chunks: Vec<Vec<u8>>,
    ) -> impl Stream<Item = Result<Bytes, ClientError>> + Unpin + Send + 'static {
        stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
    }

    fn tile(size: u32, alpha: u32, is_frame: i32, fill: u8) -> Vec<u8> {
        record(
            &format!(
                r#"{{"x":0,"y":0,"width":8,"height":8,"size":{size},"alphaSize":{alpha},"isFrame":{is_frame}}}"#
            ),
            &vec![fill; size as usize],
        )
    }

    // ── RecordReader ────────────────────────────────────────────────

    #[tokio::test]
    async fn reads_single_record() {
        let data = tile(6, 2, 1, 0xab);
        let mut reader = RecordReader::new(byte_stream(vec![data]));

        let image = reader.next_record().await.unwrap().unwrap();
        assert_eq!(image.header.size, 6);
        assert_eq!(image.header.alpha_size, 2);
        assert_eq!(image.header.is_frame, 1);
        assert_eq!(image.img.len(), 4);
        assert_eq!(image.alpha_img.len(), 2);
        assert!(reader.next_record().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn header_split_across_reads() {
        let data = tile(3, 0, 0, 0x77);
        let chunks: Vec<Vec<u8>> = data.chunks(5).map(<[u8]>::to_vec).collect();
        let mut reader = RecordReader::new(byte_stream(chunks));

        let image = reader.next_record().await.unwrap().unwrap();
        assert_eq!(image.img.len(), 3);
        assert_eq!(image.alpha_img.len(), 0);
    }

    #[tokio::test]
    async fn short_payload_reads_are_resumed() {
        let mut data = tile(100, 10, 1, 0x01);
        let tail = data.split_off(data.len() - 60);
        let mut reader = RecordReader::new(byte_stream(vec![data, tail]));

        let image = reader.next_record().await.unwrap().unwrap();
        assert_eq!(image.img.len(), 90);
        assert_eq!(image.alpha_img.len(), 10);
    }

    #[tokio::test]
    async fn keep_alive_records_are_skipped() {
        let mut data = FRAME_BOUNDARY.to_vec();
        data.extend(tile(2, 0, 1, 0x42));
        let mut reader = RecordReader::new(byte_stream(vec![data]));

        let image = reader.next_record().await.unwrap().unwrap();
        assert_eq!(image.img.len(), 2);
    }

    #[tokio::test]
    async fn multiple_records_in_order() {
        let mut data = tile(4, 0, 0, 1);
        data.extend(tile(5, 0, 0, 2));
        data.extend(tile(6, 3, 1, 3));
        let mut reader = RecordReader::new(byte_stream(vec![data]));

        let a = reader.next_record().await.unwrap().unwrap();
        let b = reader.next_record().await.unwrap().unwrap();
        let c = reader.next_record().await.unwrap().unwrap();
        assert_eq!((a.img.len(), a.header.is_frame), (4, 0));
        assert_eq!((b.img.len(), b.header.is_frame), (5, 0));
        assert_eq!((c.img.len(), c.header.is_frame), (3, 1));
        assert_eq!(c.alpha_img.len(), 3);
    }

    #[tokio::test]
    async fn bad_header_is_an_error() {
        let data = record("{broken", &[]);
        let mut reader = RecordReader::new(byte_stream(vec![data]));
        let err = reader.next_record().await.unwrap_err();
        assert!(matches!(err, ClientError::Frame(FrameError::BadHeader(_))));
    }

    #[tokio::test]
    async fn truncated_payload_ends_stream() {
        let mut data = tile(50, 0, 1, 0x01);
        data.truncate(data.len() - 10);
        let mut reader = RecordReader::new(byte_stream(vec![data]));
        assert!(reader.next_record().await.unwrap().is_none());
    }

    // ── double-buffered delivery ────────────────────────────────────

    #[tokio::test]
    async fn frame_assembly_delivers_tiles_in_order() {
        // Three tiles; the third completes the frame and carries alpha.
        let mut data = tile(100, 0, 0, 1);
        data.extend(tile(200, 0, 0, 2));
        data.extend(tile(300, 50, 1, 3));

        let listener = Arc::new(TestListener::default());
        run_image_stream(
            byte_stream(vec![data]),
            "s1",
            listener.clone(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let frames = listener.image_frames.lock();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].img.len(), 100);
        assert_eq!(frames[1].img.len(), 200);
        assert_eq!(frames[2].header.is_frame, 1);
        assert_eq!(frames[2].img.len(), 250);
        assert_eq!(frames[2].alpha_img.len(), 50);
        assert_eq!(frames[0].header.is_frame, 0);
        assert_eq!(frames[1].header.is_frame, 0);
    }

    #[tokio::test]
    async fn cancellation_stops_delivery() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        // A stream that would never end on its own.
        let pending = stream::pending::<Result<Bytes, ClientError>>();
        let listener = Arc::new(TestListener::default());
        let err = run_image_stream(pending, "s1", listener.clone(), cancel)
            .await
            .unwrap_err();
        assert!(err.is_interrupted());
        assert!(listener.image_frames.lock().is_empty());
    }

    #[tokio::test]
    async fn listener_failure_does_not_stop_the_stream() {
        let mut data = tile(4, 0, 1, 1);
        data.extend(tile(4, 0, 1, 2));

        let listener = Arc::new(TestListener {
            fail_frames: true,
            ..Default::default()
        });
        run_image_stream(
            byte_stream(vec![data]),
            "s1",
            listener.clone(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(listener.image_frames.lock().len(), 2);
    }
}
