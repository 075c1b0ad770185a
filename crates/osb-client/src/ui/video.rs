//! Video path of the UI stream: MPEG-TS demux → (H.264 Annex-B) → listener.
//!
//! A producer task demuxes the network stream while the consumer delivers
//! frames, coupled by a bounded single-slot channel: at most one frame is in
//! flight past the network boundary and delivery stays in decode order.

use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::errors::ClientError;
use crate::listener::{SessionListener, VideoFrame};

use super::annexb::H264Assembler;
use super::ts::{EsFrame, TsDemuxer, STREAM_TYPE_H264};

pub(crate) async fn run_video_stream<S>(
    stream: S,
    session_id: &str,
    listener: Arc<dyn SessionListener>,
    cancel: CancellationToken,
) -> Result<(), ClientError>
where
    S: Stream<Item = Result<Bytes, ClientError>> + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<VideoFrame>(1);
    let producer = tokio::spawn(demux_loop(stream, tx, cancel.clone()));

    while let Some(frame) = rx.recv().await {
        if let Err(err) = listener.on_ui_video_frame(session_id, frame).await {
            warn!(session_id, %err, "video frame listener failed");
        }
    }

    producer.await.map_err(|_| ClientError::Interrupted)?
}

async fn demux_loop<S>(
    mut stream: S,
    tx: mpsc::Sender<VideoFrame>,
    cancel: CancellationToken,
) -> Result<(), ClientError>
where
    S: Stream<Item = Result<Bytes, ClientError>> + Unpin,
{
    let mut demux = TsDemuxer::new();
    let mut assembler = H264Assembler::new();
    let mut idx = 0u64;
    let mut pending = Vec::new();

    loop {
        let chunk = tokio::select! {
            () = cancel.cancelled() => return Err(ClientError::Interrupted),
            chunk = stream.next() => chunk,
        };

        match chunk {
            Some(Ok(chunk)) => {
                demux.push(&chunk, &mut pending);
            }
            Some(Err(err)) => return Err(err),
            None => {
                demux.finish(&mut pending);
                emit(&demux, &mut assembler, &mut pending, &mut idx, &tx, &cancel).await?;
                return Ok(());
            }
        }

        emit(&demux, &mut assembler, &mut pending, &mut idx, &tx, &cancel).await?;
    }
}

async fn emit(
    demux: &TsDemuxer,
    assembler: &mut H264Assembler,
    pending: &mut Vec<EsFrame>,
    idx: &mut u64,
    tx: &mpsc::Sender<VideoFrame>,
    cancel: &CancellationToken,
) -> Result<(), ClientError> {
    let is_h264 = demux.video_stream_type() == Some(STREAM_TYPE_H264);

    for es in pending.drain(..) {
        if is_h264 {
            let assembled = assembler.assemble(&es.data);
            if let Some(config) = assembled.config {
                send(
                    tx,
                    cancel,
                    VideoFrame {
                        is_codec_config: true,
                        is_key_frame: false,
                        idx: bump(idx),
                        pts: 0,
                        dts: 0,
                        data: config,
                    },
                )
                .await?;
            }
            if let Some(frame) = assembled.frame {
                send(
                    tx,
                    cancel,
                    VideoFrame {
                        is_codec_config: false,
                        is_key_frame: assembled.is_key_frame,
                        idx: bump(idx),
                        pts: es.pts,
                        dts: es.dts,
                        data: frame,
                    },
                )
                .await?;
            }
        } else {
            // Non-H.264 packet data is delivered verbatim.
            send(
                tx,
                cancel,
                VideoFrame {
                    is_codec_config: false,
                    is_key_frame: es.random_access,
                    idx: bump(idx),
                    pts: es.pts,
                    dts: es.dts,
                    data: es.data,
                },
            )
            .await?;
        }
    }
    Ok(())
}

fn bump(idx: &mut u64) -> u64 {
    let current = *idx;
    *idx += 1;
    current
}

async fn send(
    tx: &mpsc::Sender<VideoFrame>,
    cancel: &CancellationToken,
    frame: VideoFrame,
) -> Result<(), ClientError> {
    tokio::select! {
        () = cancel.cancelled() => Err(ClientError::Interrupted),
        sent = tx.send(frame) => sent.map_err(|_| ClientError::Interrupted),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
