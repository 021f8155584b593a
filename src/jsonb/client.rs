use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio_postgres::{Client, Config, NoTls};

use super::params::PgParamStore;
use super::{JsonbClient, Statement};
use crate::errors::ODataError;

#[async_trait]
impl JsonbClient for Client {
    async fn fetch_documents(&self, statement: &Statement) -> Result<Vec<JsonValue>, ODataError> {
        let bindings = PgParamStore::from_params(&statement.params);
        let rows = self.query(statement.sql.as_str(), &bindings.as_refs()).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(row.try_get::<_, JsonValue>(0)?);
        }
        Ok(out)
    }

    async fn fetch_count(&self, statement: &Statement) -> Result<i64, ODataError> {
        let bindings = PgParamStore::from_params(&statement.params);
        let row = self.query_one(statement.sql.as_str(), &bindings.as_refs()).await?;
        Ok(row.try_get::<_, i64>(0)?)
    }
}

/// Opens a plain-TCP connection and drives it on a background task.
///
/// # Errors
/// Returns `Config` for an unparsable URL and `BackendExecution` when the connection fails.
pub async fn connect(url: &str) -> Result<Client, ODataError> {
    let config = url.parse::<Config>().map_err(|e| ODataError::Config(e.to_string()))?;
    let (client, connection) = config.connect(NoTls).await?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            log::error!("postgres connection error: {err}");
        }
    });
    Ok(client)
}
