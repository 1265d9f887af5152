use std::str::FromStr as _;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use jsonrpsee::types::Params;
use serde::{Deserialize, Serialize};
use tracing::debug;

use argus_core::{
    CancelToken, ContractId, Cursor, CursorRange, DiagnosticEvent, EventKind, LedgerBounds,
    LedgerStore, TransactionView, TxHash,
};

use crate::{Context, DeadlineToken, Error};

#[derive(Deserialize, Debug)]
pub struct GetTransactionParams {
    pub hash: String,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    Failed,
    NotFound,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GetTransactionResponse {
    pub status: TransactionStatus,

    pub latest_ledger: u32,
    pub latest_ledger_close_time: i64,
    pub oldest_ledger: u32,
    pub oldest_ledger_close_time: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_order: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_bump: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub envelope_xdr: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_xdr: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_meta_xdr: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_close_time: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic_events_xdr: Option<Vec<String>>,
}

fn parse_hash(value: &str) -> Result<TxHash, Error> {
    if value.len() != 64 {
        return Err(Error::UnexpectedHashLength(value.len()));
    }

    let bytes = hex::decode(value).map_err(Error::IncorrectHash)?;

    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes);
    Ok(hash)
}

fn parse_contract_id(value: &str) -> Result<ContractId, Error> {
    if value.len() != 64 {
        return Err(Error::UnexpectedContractIdLength(value.len()));
    }

    let bytes = hex::decode(value).map_err(Error::IncorrectContractId)?;

    let mut id = [0u8; 32];
    id.copy_from_slice(&bytes);
    Ok(id)
}

fn not_found(bounds: Option<LedgerBounds>) -> GetTransactionResponse {
    GetTransactionResponse {
        status: TransactionStatus::NotFound,
        latest_ledger: bounds.map(|x| x.latest.sequence).unwrap_or_default(),
        latest_ledger_close_time: bounds.map(|x| x.latest.close_time).unwrap_or_default(),
        oldest_ledger: bounds.map(|x| x.oldest.sequence).unwrap_or_default(),
        oldest_ledger_close_time: bounds.map(|x| x.oldest.close_time).unwrap_or_default(),
        application_order: None,
        fee_bump: None,
        envelope_xdr: None,
        result_xdr: None,
        result_meta_xdr: None,
        ledger: None,
        ledger_close_time: None,
        diagnostic_events_xdr: None,
    }
}

fn found(bounds: LedgerBounds, view: TransactionView) -> GetTransactionResponse {
    let status = if view.successful {
        TransactionStatus::Success
    } else {
        TransactionStatus::Failed
    };

    GetTransactionResponse {
        status,
        latest_ledger: bounds.latest.sequence,
        latest_ledger_close_time: bounds.latest.close_time,
        oldest_ledger: bounds.oldest.sequence,
        oldest_ledger_close_time: bounds.oldest.close_time,
        application_order: Some(view.application_order),
        fee_bump: Some(view.fee_bump),
        envelope_xdr: Some(STANDARD.encode(&view.envelope)),
        result_xdr: Some(STANDARD.encode(&view.result)),
        result_meta_xdr: Some(STANDARD.encode(&view.meta)),
        ledger: Some(view.ledger),
        ledger_close_time: Some(view.close_time),
        diagnostic_events_xdr: Some(view.events.iter().map(|x| STANDARD.encode(x)).collect()),
    }
}

pub async fn get_transaction<S: LedgerStore, C: CancelToken>(
    params: Params<'_>,
    context: Arc<Context<S, C>>,
) -> Result<GetTransactionResponse, Error> {
    let params: GetTransactionParams = params.parse().map_err(Error::JsonRpcError)?;
    let hash = parse_hash(&params.hash)?;

    let bounds = context.store.bounds()?;

    match context.store.get_transaction(&hash)? {
        None => Ok(not_found(bounds)),
        Some(view) => {
            // a hit implies the store holds at least that ledger
            let bounds = bounds.ok_or(Error::NoLedger)?;
            Ok(found(bounds, view))
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GetEventsParams {
    pub start_cursor: String,

    pub end_cursor: Option<String>,

    #[serde(default)]
    pub contract_ids: Vec<String>,

    pub limit: Option<usize>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventEntry {
    pub cursor: String,
    pub ledger: u32,
    pub ledger_close_time: i64,
    pub tx_hash: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,

    #[serde(rename = "type")]
    pub kind: String,

    pub topics_xdr: Vec<String>,
    pub value_xdr: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GetEventsResponse {
    pub events: Vec<EventEntry>,
    pub latest_ledger: u32,

    /// Position to resume from when the limit cut the scan short.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

fn kind_str(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Contract => "contract",
        EventKind::System => "system",
        EventKind::Diagnostic => "diagnostic",
    }
}

fn event_entry(event: &DiagnosticEvent, cursor: Cursor, close_time: i64, tx_hash: &TxHash) -> EventEntry {
    EventEntry {
        cursor: cursor.to_string(),
        ledger: cursor.ledger,
        ledger_close_time: close_time,
        tx_hash: hex::encode(tx_hash),
        contract_id: event.contract_id.map(hex::encode),
        kind: kind_str(event.kind).to_string(),
        topics_xdr: event
            .topics
            .iter()
            .map(|x| STANDARD.encode(x.encode()))
            .collect(),
        value_xdr: STANDARD.encode(event.data.encode()),
    }
}

pub async fn get_events<S: LedgerStore, C: CancelToken>(
    params: Params<'_>,
    context: Arc<Context<S, C>>,
) -> Result<GetEventsResponse, Error> {
    let params: GetEventsParams = params.parse().map_err(Error::JsonRpcError)?;

    let start = Cursor::from_str(&params.start_cursor)?;
    let end = match &params.end_cursor {
        Some(value) => Cursor::from_str(value)?,
        None => Cursor::MAX,
    };
    let range = CursorRange { start, end };

    let contract_ids: Vec<ContractId> = params
        .contract_ids
        .iter()
        .map(|x| parse_contract_id(x))
        .collect::<Result<_, _>>()?;

    let limit = params
        .limit
        .unwrap_or_else(|| context.config.default_events_limit());

    let max = context.config.max_events_limit();
    if limit > max {
        return Err(Error::LimitOutOfRange {
            requested: limit,
            max,
        });
    }

    let cancel = DeadlineToken::new(context.cancel.clone(), context.config.request_timeout());

    let mut events = vec![];
    let mut last_cursor = None;

    context.store.get_events(
        range,
        &contract_ids,
        &cancel,
        &mut |event, cursor, close_time, tx_hash| {
            if events.len() >= limit {
                return false;
            }

            events.push(event_entry(event, cursor, close_time, tx_hash));
            last_cursor = Some(cursor);
            true
        },
    )?;

    debug!(
        start = %range.start,
        count = events.len(),
        "events scan finished"
    );

    let cursor = (events.len() >= limit)
        .then(|| last_cursor.map(|x| x.next().to_string()))
        .flatten();

    let latest_ledger = context
        .store
        .bounds()?
        .map(|x| x.latest.sequence)
        .unwrap_or_default();

    Ok(GetEventsResponse {
        events,
        latest_ledger,
        cursor,
    })
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GetLatestLedgerResponse {
    pub sequence: u32,
    pub close_time: i64,
}

pub async fn get_latest_ledger<S: LedgerStore, C: CancelToken>(
    _params: Params<'_>,
    context: Arc<Context<S, C>>,
) -> Result<GetLatestLedgerResponse, Error> {
    let bounds = context.store.bounds()?.ok_or(Error::NoLedger)?;

    Ok(GetLatestLedgerResponse {
        sequence: bounds.latest.sequence,
        close_time: bounds.latest.close_time,
    })
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GetHealthResponse {
    pub status: String,
    pub latest_ledger: u32,
    pub oldest_ledger: u32,
    pub ledger_retention_window: u32,
}

pub fn get_health<S: LedgerStore, C: CancelToken>(
    context: &Context<S, C>,
) -> Result<GetHealthResponse, Error> {
    let bounds = context.store.bounds()?.ok_or(Error::NoLedger)?;

    Ok(GetHealthResponse {
        status: "healthy".to_string(),
        latest_ledger: bounds.latest.sequence,
        oldest_ledger: bounds.oldest.sequence,
        ledger_retention_window: context.retention_window,
    })
}
