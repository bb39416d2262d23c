use reqwest::{IntoUrl, Url};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadUrl(Url);

impl DownloadUrl {
    pub fn new(url: impl IntoUrl) -> Result<Self, anyhow::Error> {
        let url = url.into_url()?;

        match url.scheme() {
            "http" | "https" => Ok(DownloadUrl(url)),
            scheme => anyhow::bail!("unsupported scheme {:?}, expected http or https", scheme),
        }
    }

    pub fn into_inner(self) -> Url {
        self.0
    }
}

impl FromStr for DownloadUrl {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<Url> for DownloadUrl {
    fn as_ref(&self) -> &Url {
        &self.0
    }
}
