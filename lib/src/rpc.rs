//! JSON-RPC over HTTP implementation of [`LedgerClient`], speaking the Ethereum `eth_` methods

use crate::ledger::{LedgerClient, TransactionBatch};
use crate::{Config, Error, Operation};
use log::{debug, trace};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const API_KEY_HEADER: &str = "x-api-key";

/// Blocking JSON-RPC client, can be shared between threads
#[derive(Debug)]
pub struct HttpLedger {
    url: Url,
    client: Client,
    next_id: AtomicU64,
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct Response<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct BlockWithTransactions {
    transactions: TransactionBatch,
}

impl HttpLedger {
    pub fn new(url: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self, Error> {
        let url = Url::parse(url)
            .map_err(|e| Error::InvalidConfig(format!("invalid url {:?}: {}", url, e)))?;

        let mut headers = HeaderMap::new();
        if let Some(api_key) = api_key {
            let value = HeaderValue::from_str(api_key)
                .map_err(|e| Error::InvalidConfig(format!("invalid api key: {}", e)))?;
            headers.insert(API_KEY_HEADER, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("cannot build http client: {}", e)))?;

        Ok(HttpLedger {
            url,
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        Self::new(&config.url, config.api_key.as_deref(), config.timeout())
    }

    fn call<T: DeserializeOwned>(
        &self,
        operation: Operation,
        method: &str,
        params: Value,
    ) -> Result<T, Error> {
        let request = Request {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        trace!("request {:?}", request);
        let body = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(|e| Error::network(operation, e))?;
        debug!("{} answered with {} bytes", method, body.len());
        decode_response(operation, &body)
    }
}

impl LedgerClient for HttpLedger {
    fn head_block_number(&self) -> Result<u64, Error> {
        let operation = Operation::HeadLookup;
        let quantity: String = self.call(operation, "eth_blockNumber", json!([]))?;
        parse_quantity(operation, &quantity)
    }

    fn block_transactions(&self, number: u64) -> Result<TransactionBatch, Error> {
        let operation = Operation::BlockFetch(number);
        let block: BlockWithTransactions = self.call(
            operation,
            "eth_getBlockByNumber",
            json!([format!("{:#x}", number), true]),
        )?;
        Ok(block.transactions)
    }
}

fn decode_response<T: DeserializeOwned>(operation: Operation, body: &str) -> Result<T, Error> {
    let response: Response<T> = serde_json::from_str(body)
        .map_err(|e| Error::protocol(operation, format!("undecodable response: {}", e)))?;
    if let Some(error) = response.error {
        return Err(Error::protocol(
            operation,
            format!("rpc error {}: {}", error.code, error.message),
        ));
    }
    response
        .result
        .ok_or_else(|| Error::protocol(operation, "missing or null result"))
}

/// Parse a `0x` prefixed hex quantity as used in the Ethereum JSON-RPC
fn parse_quantity(operation: Operation, quantity: &str) -> Result<u64, Error> {
    let digits = quantity
        .strip_prefix("0x")
        .ok_or_else(|| Error::protocol(operation, format!("{:?} is not hex", quantity)))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| Error::protocol(operation, format!("{:?} is not a quantity: {}", quantity, e)))
}
