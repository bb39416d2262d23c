mod http;

#[cfg(test)]
pub mod fake;

pub use http::HttpFetcher;

use crate::error::FetchError;
use crate::segments::SegmentSpec;
use bytes::Bytes;
use futures::stream::BoxStream;
use reqwest::{StatusCode, Url};
use std::future::Future;
use std::io;

pub type BodyStream = BoxStream<'static, io::Result<Bytes>>;

/// half open byte range `[start, end)` of the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// value for the `Range` request header, http ranges are inclusive on both ends.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end - 1)
    }
}

impl From<SegmentSpec> for ByteRange {
    fn from(segment: SegmentSpec) -> Self {
        Self::new(segment.start, segment.end())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HeadResponse {
    pub status: StatusCode,
    pub content_length: Option<u64>,
}

pub struct RangeResponse {
    pub status: StatusCode,
    pub body: BodyStream,
}

impl std::fmt::Debug for RangeResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// the network side of a download. built once and shared by the supervisor and all workers, so
/// tests can swap in a scripted implementation.
pub trait RangeFetcher: Send + Sync + 'static {
    /// metadata only request for the size of the resource.
    fn head(&self, url: &Url) -> impl Future<Output = Result<HeadResponse, FetchError>> + Send;

    /// request `range` of the resource, status checking is left to the caller.
    fn get_range(
        &self,
        url: &Url,
        range: ByteRange,
    ) -> impl Future<Output = Result<RangeResponse, FetchError>> + Send;
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ByteRange::new(0, 1_000_000), "bytes=0-999999")]
    #[case(ByteRange::new(2_000_000, 2_500_000), "bytes=2000000-2499999")]
    #[case(ByteRange::new(7, 8), "bytes=7-7")]
    fn test_range_header(#[case] range: ByteRange, #[case] expected: &str) {
        assert_eq!(range.header_value(), expected);
    }
}
