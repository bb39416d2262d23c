//! scripted in-memory fetcher for tests.

use super::{ByteRange, HeadResponse, RangeFetcher, RangeResponse};
use crate::error::FetchError;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::{StatusCode, Url};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    /// serve every requested range in full.
    Serve,
    /// every ranged request fails at the transport level.
    AlwaysFail,
    /// every ranged request answers with a status other than 206.
    WrongStatus,
    /// serve only the first half (rounded up) of every requested range, then end cleanly.
    HalfThenEof,
    /// fail the first `n` ranged requests, then serve.
    FailFirst(usize),
    /// ignore the end of every requested range and serve up to the end of the data.
    Overlong,
    /// answer 206 with a body that ends immediately.
    EmptyBody,
    /// the first ranged request breaks with a body error after `n` bytes, later ones are served.
    ErrorAfter(usize),
}

#[derive(Debug)]
pub struct FakeFetcher {
    data: Bytes,
    behaviour: Behaviour,
    head_status: StatusCode,
    advertise_length: bool,
    chunk_size: usize,
    head_calls: AtomicUsize,
    requests: Mutex<Vec<ByteRange>>,
}

impl FakeFetcher {
    pub fn new(data: impl Into<Bytes>, behaviour: Behaviour) -> Self {
        Self {
            data: data.into(),
            behaviour,
            head_status: StatusCode::OK,
            advertise_length: true,
            chunk_size: 3000,
            head_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_head_status(mut self, status: StatusCode) -> Self {
        self.head_status = status;
        self
    }

    pub fn without_length(mut self) -> Self {
        self.advertise_length = false;
        self
    }

    pub fn url() -> Url {
        Url::parse("http://fake.invalid/video.mp4").expect("static url")
    }

    pub fn random_data(len: usize) -> Vec<u8> {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        (0..len).map(|_| rng.gen()).collect()
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn head_calls(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ByteRange> {
        self.requests.lock().expect("lock poisoned").clone()
    }

    fn body(&self, range: ByteRange) -> super::BodyStream {
        let slice = self.data.slice(range.start as usize..range.end as usize);
        let chunks: Vec<io::Result<Bytes>> = (0..slice.len())
            .step_by(self.chunk_size)
            .map(|offset| {
                let end = usize::min(offset + self.chunk_size, slice.len());
                Ok(slice.slice(offset..end))
            })
            .collect();
        futures::stream::iter(chunks).boxed()
    }
}

impl RangeFetcher for FakeFetcher {
    async fn head(&self, _url: &Url) -> Result<HeadResponse, FetchError> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        Ok(HeadResponse {
            status: self.head_status,
            content_length: self.advertise_length.then_some(self.data.len() as u64),
        })
    }

    async fn get_range(&self, _url: &Url, range: ByteRange) -> Result<RangeResponse, FetchError> {
        let attempt = {
            let mut requests = self.requests.lock().expect("lock poisoned");
            requests.push(range);
            requests.len()
        };

        match self.behaviour {
            Behaviour::AlwaysFail => Err(FetchError::Transport("connection reset".into())),
            Behaviour::FailFirst(n) if attempt <= n => {
                Err(FetchError::Transport("connection reset".into()))
            }
            Behaviour::WrongStatus => Ok(RangeResponse {
                status: StatusCode::OK,
                body: self.body(range),
            }),
            Behaviour::HalfThenEof => {
                let half = ByteRange::new(range.start, range.start + range.len().div_ceil(2));
                Ok(RangeResponse {
                    status: StatusCode::PARTIAL_CONTENT,
                    body: self.body(half),
                })
            }
            Behaviour::Overlong => {
                let to_end = ByteRange::new(range.start, self.data.len() as u64);
                Ok(RangeResponse {
                    status: StatusCode::PARTIAL_CONTENT,
                    body: self.body(to_end),
                })
            }
            Behaviour::EmptyBody => Ok(RangeResponse {
                status: StatusCode::PARTIAL_CONTENT,
                body: futures::stream::empty::<io::Result<Bytes>>().boxed(),
            }),
            Behaviour::ErrorAfter(n) if attempt == 1 => {
                let end = u64::min(range.start + n as u64, range.end);
                let served = ByteRange::new(range.start, end);
                let reset: io::Result<Bytes> = Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset mid-body",
                ));
                Ok(RangeResponse {
                    status: StatusCode::PARTIAL_CONTENT,
                    body: self.body(served).chain(futures::stream::iter([reset])).boxed(),
                })
            }
            Behaviour::Serve | Behaviour::FailFirst(_) | Behaviour::ErrorAfter(_) => {
                Ok(RangeResponse {
                    status: StatusCode::PARTIAL_CONTENT,
                    body: self.body(range),
                })
            }
        }
    }
}
