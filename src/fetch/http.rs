use super::{ByteRange, HeadResponse, RangeFetcher, RangeResponse};
use crate::error::FetchError;
use crate::prelude::*;
use futures::{StreamExt, TryStreamExt};
use reqwest::{header, Client, Url};
use std::io;

/// [`RangeFetcher`] backed by a single shared reqwest client.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl RangeFetcher for HttpFetcher {
    #[instrument(name = "head request", level = "debug", skip(self, url), fields(%url))]
    async fn head(&self, url: &Url) -> Result<HeadResponse, FetchError> {
        let response = self.client.head(url.clone()).send().await?;

        // reqwest reports the (empty) body size for HEAD responses, read the header instead.
        let content_length = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());

        debug!(status = %response.status(), ?content_length);
        Ok(HeadResponse {
            status: response.status(),
            content_length,
        })
    }

    #[instrument(
        name = "range request",
        level = "debug",
        skip(self, url, range),
        fields(start = range.start, end = range.end)
    )]
    async fn get_range(&self, url: &Url, range: ByteRange) -> Result<RangeResponse, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(header::RANGE, range.header_value())
            .send()
            .await?;

        debug!(status = %response.status());
        Ok(RangeResponse {
            status: response.status(),
            body: response.bytes_stream().map_err(io::Error::other).boxed(),
        })
    }
}
