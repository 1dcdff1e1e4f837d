//! Runs a decoder on its own thread.
//!
//! Decoding is CPU-bound image processing. `DecodeWorker` moves it off the
//! driver thread while keeping the driver's view strictly sequential: each
//! `decode` call blocks until its own reply arrives, so at most one request
//! is ever in flight.

use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded};
use thiserror::Error;

use super::{DecodeSource, Frame, RawDetection};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The wrapped decoder reported an error.
    #[error("decoder failed: {0}")]
    Decoder(String),
    /// The worker thread has exited.
    #[error("decode worker is not running")]
    Disconnected,
}

type Reply = Result<Vec<RawDetection>, DecodeError>;

/// A [`DecodeSource`] that forwards every frame to a dedicated thread.
pub struct DecodeWorker {
    requests: Option<Sender<Frame>>,
    replies: Receiver<Reply>,
    handle: Option<JoinHandle<()>>,
}

impl DecodeWorker {
    /// Move `decoder` onto a new worker thread.
    pub fn spawn<D>(mut decoder: D) -> io::Result<Self>
    where
        D: DecodeSource + Send + 'static,
    {
        let (request_tx, request_rx) = bounded::<Frame>(1);
        let (reply_tx, reply_rx) = bounded::<Reply>(1);

        let handle = thread::Builder::new()
            .name("qr-decode".into())
            .spawn(move || {
                while let Ok(frame) = request_rx.recv() {
                    let reply = decoder
                        .decode(&frame.pixels, frame.width, frame.height)
                        .map_err(|err| DecodeError::Decoder(err.to_string()));
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }
                log::debug!("decode worker exiting");
            })?;

        Ok(Self {
            requests: Some(request_tx),
            replies: reply_rx,
            handle: Some(handle),
        })
    }

    /// Stop the worker thread and wait for it to exit.
    pub fn shutdown(&mut self) {
        // Closing the request channel ends the worker loop.
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("decode worker panicked");
            }
        }
    }
}

impl DecodeSource for DecodeWorker {
    type Error = DecodeError;

    fn decode(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<RawDetection>, Self::Error> {
        let requests = self.requests.as_ref().ok_or(DecodeError::Disconnected)?;
        requests
            .send(Frame::new(input.to_vec(), width, height))
            .map_err(|_| DecodeError::Disconnected)?;
        self.replies.recv().map_err(|_| DecodeError::Disconnected)?
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::RawDetectionBuilder;

    struct EchoDecoder;

    impl DecodeSource for EchoDecoder {
        type Error = String;

        fn decode(
            &mut self,
            input: &[u8],
            width: u32,
            height: u32,
        ) -> Result<Vec<RawDetection>, Self::Error> {
            if input.is_empty() {
                return Err("empty frame".to_string());
            }
            Ok(vec![
                RawDetectionBuilder::new()
                    .text(format!("{width}x{height}:{}", input.len()))
                    .build(),
            ])
        }
    }

    #[test]
    fn test_worker_round_trip() {
        let mut worker = DecodeWorker::spawn(EchoDecoder).unwrap();

        let results = worker.decode(&[0u8; 12], 4, 3).unwrap();
        assert_eq!(results[0].text, "4x3:12");

        let results = worker.decode(&[1u8; 2], 2, 1).unwrap();
        assert_eq!(results[0].text, "2x1:2");
    }

    #[test]
    fn test_worker_forwards_errors() {
        let mut worker = DecodeWorker::spawn(EchoDecoder).unwrap();
        let err = worker.decode(&[], 0, 0).unwrap_err();
        assert_eq!(err, DecodeError::Decoder("empty frame".to_string()));
    }

    #[test]
    fn test_decode_after_shutdown() {
        let mut worker = DecodeWorker::spawn(EchoDecoder).unwrap();
        worker.shutdown();
        assert_eq!(
            worker.decode(&[0u8; 4], 2, 2).unwrap_err(),
            DecodeError::Disconnected
        );
    }
}
