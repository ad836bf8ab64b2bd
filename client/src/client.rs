use crate::{Error, Result};
use oro_types::{
    api::{LoadResponse, Status, SyncRequest},
    BankBalances, SheetContents, Withdrawal,
};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Timeout for connections and requests
const TIMEOUT: Duration = Duration::from_secs(30);

/// Decodes an API envelope, turning a non-success status into [Error::Failed].
///
/// Failed requests usually carry a `{success:false, message}` body; anything
/// else (e.g. a rate limiter's plain text) is reported verbatim.
async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        let message = match serde_json::from_slice::<Status>(&body) {
            Ok(envelope) => envelope.message,
            Err(_) => Some(String::from_utf8_lossy(&body).into_owned()).filter(|m| !m.is_empty()),
        };
        return Err(Error::Failed { status, message });
    }
    Ok(serde_json::from_slice(&body)?)
}

/// Ledger API client
#[derive(Clone)]
pub struct Client {
    pub base_url: Url,
    pub http_client: HttpClient,
}

impl Client {
    /// Create a new client
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        match base_url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidScheme(scheme.to_string())),
        }

        let http_client = HttpClient::builder().timeout(TIMEOUT).build()?;
        Ok(Self {
            base_url,
            http_client,
        })
    }

    /// Fetches the remote ledger.
    pub async fn load(&self) -> Result<SheetContents> {
        let url = self.base_url.join("load")?;
        debug!(%url, "loading ledger");
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        let body: LoadResponse = read_envelope(response).await?;
        if !body.success {
            return Err(Error::Failed {
                status,
                message: body.message,
            });
        }
        Ok(SheetContents {
            bank: body.bank,
            withdrawals: body.data,
        })
    }

    /// Replaces the remote ledger with `bank` and `withdrawals`.
    pub async fn sync(&self, bank: &BankBalances, withdrawals: &[Withdrawal]) -> Result<()> {
        let url = self.base_url.join("sync")?;
        debug!(%url, withdrawals = withdrawals.len(), "syncing ledger");
        let request = SyncRequest::new(bank.clone(), withdrawals.to_vec());
        let response = self.http_client.post(url).json(&request).send().await?;
        let status = response.status();
        let body: Status = read_envelope(response).await?;
        if !body.success {
            return Err(Error::Failed {
                status,
                message: body.message,
            });
        }
        info!(withdrawals = withdrawals.len(), "synced ledger");
        Ok(())
    }
}
