use crate::{
    credentials::TokenSource, Error, RecordStore, Result, Row, ServiceAccountKey, SHEET_ID_ENV,
};
use oro_types::Cell;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Timeout for token and API requests
const TIMEOUT: Duration = Duration::from_secs(30);

const API_BASE: &str = "https://sheets.googleapis.com/v4/";

/// Title assumed when the spreadsheet reports no sheets.
pub const DEFAULT_SHEET: &str = "Sheet1";

/// Range read and cleared on every call.
pub const DATA_RANGE: &str = "A1:F1000";

/// Range appended to (the API appends after the last non-empty row).
pub const APPEND_RANGE: &str = "A:F";

#[derive(Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    #[serde(default)]
    properties: Option<SheetProperties>,
}

#[derive(Deserialize)]
struct SheetProperties {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Serialize)]
struct AppendBody<'a> {
    values: &'a [Row],
}

/// Quotes a sheet title for use in A1 notation (`'My sheet'!A1:F1000`).
fn a1_range(title: &str, range: &str) -> String {
    format!("'{}'!{range}", title.replace('\'', "''"))
}

/// Google Sheets backend.
///
/// Targets the first sheet of the spreadsheet, whatever it is currently
/// called: the title is looked up on every call.
pub struct Sheets {
    base_url: Url,
    spreadsheet_id: String,
    http_client: HttpClient,
    tokens: TokenSource,
}

impl Sheets {
    pub fn new(spreadsheet_id: impl Into<String>, key: ServiceAccountKey) -> Result<Self> {
        let spreadsheet_id = spreadsheet_id.into();
        if spreadsheet_id.trim().is_empty() {
            return Err(Error::MissingDocumentId(SHEET_ID_ENV));
        }
        let base_url = Url::parse(API_BASE).map_err(|e| Error::InvalidEndpoint(e.to_string()))?;
        let http_client = HttpClient::builder().timeout(TIMEOUT).build()?;

        Ok(Self {
            base_url,
            spreadsheet_id,
            http_client,
            tokens: TokenSource::new(key)?,
        })
    }

    /// Points the backend at a different API root (e.g. a local stand-in).
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| Error::InvalidEndpoint(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidEndpoint(base_url.to_string()));
        }
        self.base_url = base_url;
        Ok(self)
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidEndpoint(self.base_url.to_string()))?
            .pop_if_empty()
            .push("spreadsheets")
            .push(&self.spreadsheet_id)
            .extend(segments);
        Ok(url)
    }

    fn values_url(&self, range: &str) -> Result<Url> {
        self.url(&["values", range])
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let token = self.tokens.token(&self.http_client).await?;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Failed { status, body });
        }
        Ok(response)
    }

    async fn first_sheet_title(&self) -> Result<String> {
        let mut url = self.url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");
        debug!(%url, "resolving first sheet");
        let spreadsheet: Spreadsheet = self
            .send(self.http_client.get(url))
            .await?
            .json()
            .await
            .map_err(|e| Error::UnexpectedResponse(format!("spreadsheet metadata: {e}")))?;

        Ok(spreadsheet
            .sheets
            .into_iter()
            .next()
            .and_then(|sheet| sheet.properties)
            .and_then(|properties| properties.title)
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| DEFAULT_SHEET.to_string()))
    }
}

impl RecordStore for Sheets {
    async fn read_all(&self) -> Result<Vec<Row>> {
        let title = self.first_sheet_title().await?;
        let mut url = self.values_url(&a1_range(&title, DATA_RANGE))?;
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE");
        debug!(%url, "reading rows");

        let range: ValueRange = self
            .send(self.http_client.get(url))
            .await?
            .json()
            .await
            .map_err(|e| Error::UnexpectedResponse(format!("value range: {e}")))?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(Cell::from).collect())
            .collect())
    }

    async fn append_rows(&self, rows: Vec<Row>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let title = self.first_sheet_title().await?;
        let range = format!("{}:append", a1_range(&title, APPEND_RANGE));
        let mut url = self.values_url(&range)?;
        // RAW keeps text cells as text instead of re-parsing them as numbers.
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        debug!(%url, rows = rows.len(), "appending rows");

        self.send(self.http_client.post(url).json(&AppendBody { values: &rows }))
            .await?;
        info!(sheet = %title, rows = rows.len(), "appended rows");
        Ok(())
    }

    async fn clear_range(&self) -> Result<()> {
        let title = self.first_sheet_title().await?;
        let range = format!("{}:clear", a1_range(&title, DATA_RANGE));
        let url = self.values_url(&range)?;
        debug!(%url, "clearing range");

        self.send(self.http_client.post(url).json(&serde_json::json!({})))
            .await?;
        info!(sheet = %title, "cleared range");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a1_range_quotes_title() {
        assert_eq!(a1_range("Sheet1", DATA_RANGE), "'Sheet1'!A1:F1000");
        assert_eq!(a1_range("Oro del grupo", APPEND_RANGE), "'Oro del grupo'!A:F");
        assert_eq!(a1_range("Alan's", APPEND_RANGE), "'Alan''s'!A:F");
    }
}
