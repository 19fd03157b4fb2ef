//! Brokerage tool catalogue.
//!
//! Each tool is one correlated call: an operation name the worker knows,
//! the parameters it expects, and how long it may take.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::TimeoutConfig;
use crate::mcp::{Arguments, ToolDefinition, ToolError};

/// How long an operation is allowed to run on the worker side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    /// Quick lookups (health, symbol search).
    Lookup,
    /// Account snapshots.
    Standard,
    /// Bulk data pulls that upload to storage.
    Bulk,
}

impl TimeoutClass {
    pub fn duration(self, timeouts: &TimeoutConfig) -> Duration {
        let secs = match self {
            TimeoutClass::Lookup => timeouts.lookup_secs,
            TimeoutClass::Standard => timeouts.standard_secs,
            TimeoutClass::Bulk => timeouts.bulk_secs,
        };
        Duration::from_secs(secs)
    }
}

fn default_sec_type() -> String {
    "STK".to_string()
}

/// One instrument for a custom OHLCV request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub symbol: String,
    pub currency: String,
    #[serde(rename = "secType", default = "default_sec_type")]
    pub sec_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    #[serde(rename = "conId", default, skip_serializing_if = "Option::is_none")]
    pub con_id: Option<i64>,
}

pub const DEFAULT_DURATION: &str = "7 D";
pub const DEFAULT_BAR_SIZE: &str = "1 day";

/// Every tool the brokerage server exposes, with parsed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerageTool {
    Health,
    AccountSummary,
    Positions,
    DailyOhlcv,
    HourlyOhlcv,
    ContractDetails,
    SearchSymbols {
        query: String,
    },
    ContractById {
        contract_id: i64,
        check_ohlcv: bool,
    },
    CustomOhlcv {
        symbols: Vec<SymbolSpec>,
        duration: String,
        bar_size: String,
    },
}

impl BrokerageTool {
    /// Parse a `tools/call` name and arguments.
    pub fn parse(name: &str, arguments: &Value) -> Result<Self, ToolError> {
        let args = Arguments::new(arguments);
        let tool = match name {
            "ibkr_health" => BrokerageTool::Health,
            "ibkr_account_summary" => BrokerageTool::AccountSummary,
            "ibkr_positions" => BrokerageTool::Positions,
            "ibkr_daily_ohlcv" => BrokerageTool::DailyOhlcv,
            "ibkr_hourly_ohlcv" => BrokerageTool::HourlyOhlcv,
            "ibkr_contract_details" => BrokerageTool::ContractDetails,
            "ibkr_search_symbols" => BrokerageTool::SearchSymbols {
                query: args.required_str("query")?.to_string(),
            },
            "ibkr_contract_by_id" => BrokerageTool::ContractById {
                contract_id: args.required_i64("contract_id")?,
                check_ohlcv: args.bool_or("check_ohlcv", false)?,
            },
            "ibkr_custom_ohlcv" => BrokerageTool::CustomOhlcv {
                symbols: parse_symbols(&args)?,
                duration: args
                    .optional_str("duration")?
                    .unwrap_or(DEFAULT_DURATION)
                    .to_string(),
                bar_size: args
                    .optional_str("bar_size")?
                    .unwrap_or(DEFAULT_BAR_SIZE)
                    .to_string(),
            },
            other => return Err(ToolError::UnknownTool(other.to_string())),
        };
        Ok(tool)
    }

    pub fn name(&self) -> &'static str {
        match self {
            BrokerageTool::Health => "ibkr_health",
            BrokerageTool::AccountSummary => "ibkr_account_summary",
            BrokerageTool::Positions => "ibkr_positions",
            BrokerageTool::DailyOhlcv => "ibkr_daily_ohlcv",
            BrokerageTool::HourlyOhlcv => "ibkr_hourly_ohlcv",
            BrokerageTool::ContractDetails => "ibkr_contract_details",
            BrokerageTool::SearchSymbols { .. } => "ibkr_search_symbols",
            BrokerageTool::ContractById { .. } => "ibkr_contract_by_id",
            BrokerageTool::CustomOhlcv { .. } => "ibkr_custom_ohlcv",
        }
    }

    /// Operation name understood by the worker.
    pub fn operation(&self) -> &'static str {
        match self {
            BrokerageTool::Health => "tws_health",
            BrokerageTool::AccountSummary => "account_values",
            BrokerageTool::Positions => "raw_positions",
            BrokerageTool::DailyOhlcv => "daily_ohlcv",
            BrokerageTool::HourlyOhlcv => "hourly_ohlcv",
            BrokerageTool::ContractDetails => "contract_details",
            BrokerageTool::SearchSymbols { .. } => "find_symbols",
            BrokerageTool::ContractById { .. } => "get_contract_details_by_id",
            BrokerageTool::CustomOhlcv { .. } => "ohlcv",
        }
    }

    /// Operation parameters, merged into the request envelope.
    pub fn params(&self) -> Option<Map<String, Value>> {
        let params = match self {
            BrokerageTool::SearchSymbols { query } => json!({ "query": query }),
            BrokerageTool::ContractById {
                contract_id,
                check_ohlcv,
            } => json!({
                "contract_id": contract_id,
                "check_ohlcv_availability": check_ohlcv,
            }),
            BrokerageTool::CustomOhlcv {
                symbols,
                duration,
                bar_size,
            } => json!({
                "symbols": symbols,
                "duration_str": duration,
                "bar_size_setting": bar_size,
            }),
            _ => return None,
        };
        params.as_object().cloned()
    }

    pub fn timeout_class(&self) -> TimeoutClass {
        match self {
            BrokerageTool::Health
            | BrokerageTool::SearchSymbols { .. }
            | BrokerageTool::ContractById { .. } => TimeoutClass::Lookup,
            BrokerageTool::AccountSummary | BrokerageTool::Positions => TimeoutClass::Standard,
            BrokerageTool::DailyOhlcv
            | BrokerageTool::HourlyOhlcv
            | BrokerageTool::ContractDetails
            | BrokerageTool::CustomOhlcv { .. } => TimeoutClass::Bulk,
        }
    }

    /// First line of a successful result.
    pub fn heading(&self) -> String {
        match self {
            BrokerageTool::Health => "TWS Health Check:".to_string(),
            BrokerageTool::AccountSummary => "Account Summary:".to_string(),
            BrokerageTool::Positions => "Positions:".to_string(),
            BrokerageTool::DailyOhlcv => "Daily OHLCV Processing Result:".to_string(),
            BrokerageTool::HourlyOhlcv => "Hourly OHLCV Processing Result:".to_string(),
            BrokerageTool::ContractDetails => "Contract Details Processing Result:".to_string(),
            BrokerageTool::SearchSymbols { query } => format!("Symbol Search Results for '{}':", query),
            BrokerageTool::ContractById { contract_id, .. } => {
                format!("Contract Details for ID {}:", contract_id)
            }
            BrokerageTool::CustomOhlcv { .. } => "Custom OHLCV Result:".to_string(),
        }
    }

    /// Definitions advertised by `tools/list`.
    pub fn definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::no_args(
                "ibkr_health",
                "Check the health of the TWS connection. Returns connection status, server time, and ping duration.",
            ),
            ToolDefinition::no_args(
                "ibkr_account_summary",
                "Get account values including balances, buying power, and P&L. Data is uploaded to S3 and the S3 URI is returned.",
            ),
            ToolDefinition::no_args(
                "ibkr_positions",
                "Get current portfolio positions with quantities, average costs, and exchange rates. Returns S3 URI where positions are stored as Parquet.",
            ),
            ToolDefinition::no_args(
                "ibkr_daily_ohlcv",
                "Get daily OHLCV (Open, High, Low, Close, Volume) data for all tracked symbols. Processes 7 days of daily bars and stores in S3.",
            ),
            ToolDefinition::no_args(
                "ibkr_hourly_ohlcv",
                "Get hourly OHLCV data for all tracked symbols. Processes 7 days of hourly bars and stores in S3.",
            ),
            ToolDefinition::no_args(
                "ibkr_contract_details",
                "Get detailed contract information for all tracked symbols including trading hours, ISIN, and exchange details. Stored in S3.",
            ),
            ToolDefinition::new(
                "ibkr_search_symbols",
                "Search for contracts matching a query string. Useful for finding symbols, contract IDs, and available exchanges.",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Search query (e.g., 'AAPL', 'Apple', 'TSLA')",
                        },
                    },
                    "required": ["query"],
                }),
            ),
            ToolDefinition::new(
                "ibkr_contract_by_id",
                "Get detailed information for a specific contract by its IBKR contract ID (conId).",
                json!({
                    "type": "object",
                    "properties": {
                        "contract_id": {
                            "type": "integer",
                            "description": "IBKR contract ID (conId)",
                        },
                        "check_ohlcv": {
                            "type": "boolean",
                            "description": "If true, also verify OHLCV data availability",
                            "default": false,
                        },
                    },
                    "required": ["contract_id"],
                }),
            ),
            ToolDefinition::new(
                "ibkr_custom_ohlcv",
                "Get OHLCV data for specific symbols (not just tracked ones). Specify symbols with their properties.",
                json!({
                    "type": "object",
                    "properties": {
                        "symbols": {
                            "type": "array",
                            "description": "List of symbol specifications",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "symbol": {"type": "string", "description": "Ticker symbol"},
                                    "currency": {"type": "string", "description": "Currency (e.g., USD, EUR)"},
                                    "secType": {"type": "string", "description": "Security type (STK, IND, CMDTY)", "default": "STK"},
                                    "exchange": {"type": "string", "description": "Exchange (optional)"},
                                    "conId": {"type": "integer", "description": "Contract ID if known (optional)"},
                                },
                                "required": ["symbol", "currency"],
                            },
                        },
                        "duration": {
                            "type": "string",
                            "description": "Duration string (e.g., '7 D', '1 M', '1 Y')",
                            "default": DEFAULT_DURATION,
                        },
                        "bar_size": {
                            "type": "string",
                            "description": "Bar size ('1 day', '1 hour', '5 mins')",
                            "default": DEFAULT_BAR_SIZE,
                        },
                    },
                    "required": ["symbols"],
                }),
            ),
        ]
    }
}

fn parse_symbols(args: &Arguments<'_>) -> Result<Vec<SymbolSpec>, ToolError> {
    let raw = args.raw("symbols").ok_or(ToolError::MissingArgument("symbols"))?;
    let symbols: Vec<SymbolSpec> = serde_json::from_value(raw.clone())
        .map_err(|e| ToolError::invalid("symbols", format!("is malformed: {}", e)))?;

    if symbols.is_empty() {
        return Err(ToolError::invalid("symbols", "must be non-empty"));
    }
    if let Some(bad) = symbols
        .iter()
        .find(|s| s.symbol.trim().is_empty() || s.currency.trim().is_empty())
    {
        return Err(ToolError::invalid(
            "symbols",
            format!("entry {:?} needs both symbol and currency", bad.symbol),
        ));
    }
    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_no_arg_tools() {
        let empty = json!({});
        for (name, operation) in [
            ("ibkr_health", "tws_health"),
            ("ibkr_account_summary", "account_values"),
            ("ibkr_positions", "raw_positions"),
            ("ibkr_daily_ohlcv", "daily_ohlcv"),
            ("ibkr_hourly_ohlcv", "hourly_ohlcv"),
            ("ibkr_contract_details", "contract_details"),
        ] {
            let tool = BrokerageTool::parse(name, &empty).unwrap();
            assert_eq!(tool.operation(), operation);
            assert_eq!(tool.name(), name);
            assert!(tool.params().is_none());
        }
    }

    #[test]
    fn test_search_requires_query() {
        let err = BrokerageTool::parse("ibkr_search_symbols", &json!({})).unwrap_err();
        assert_eq!(err, ToolError::MissingArgument("query"));
        let err = BrokerageTool::parse("ibkr_search_symbols", &json!({"query": ""})).unwrap_err();
        assert_eq!(err, ToolError::MissingArgument("query"));

        let tool = BrokerageTool::parse("ibkr_search_symbols", &json!({"query": "AAPL"})).unwrap();
        assert_eq!(tool.params().unwrap()["query"], "AAPL");
        assert_eq!(tool.heading(), "Symbol Search Results for 'AAPL':");
    }

    #[test]
    fn test_contract_by_id_params() {
        let tool = BrokerageTool::parse("ibkr_contract_by_id", &json!({"contract_id": 265598})).unwrap();
        let params = tool.params().unwrap();
        assert_eq!(params["contract_id"], 265598);
        assert_eq!(params["check_ohlcv_availability"], false);
        assert_eq!(tool.timeout_class(), TimeoutClass::Lookup);

        let err = BrokerageTool::parse("ibkr_contract_by_id", &json!({})).unwrap_err();
        assert_eq!(err, ToolError::MissingArgument("contract_id"));
    }

    #[test]
    fn test_custom_ohlcv_defaults() {
        let tool = BrokerageTool::parse(
            "ibkr_custom_ohlcv",
            &json!({"symbols": [{"symbol": "SAP", "currency": "EUR", "exchange": "IBIS"}]}),
        )
        .unwrap();
        let params = tool.params().unwrap();
        assert_eq!(params["duration_str"], "7 D");
        assert_eq!(params["bar_size_setting"], "1 day");
        assert_eq!(params["symbols"][0]["secType"], "STK");
        assert_eq!(params["symbols"][0]["exchange"], "IBIS");
        assert!(params["symbols"][0].get("conId").is_none());
        assert_eq!(tool.timeout_class(), TimeoutClass::Bulk);
    }

    #[test]
    fn test_custom_ohlcv_rejects_empty_or_incomplete_symbols() {
        let err = BrokerageTool::parse("ibkr_custom_ohlcv", &json!({"symbols": []})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument { name: "symbols", .. }));

        let err = BrokerageTool::parse("ibkr_custom_ohlcv", &json!({})).unwrap_err();
        assert_eq!(err, ToolError::MissingArgument("symbols"));

        let err = BrokerageTool::parse("ibkr_custom_ohlcv", &json!({"symbols": [{"symbol": "AAPL"}]}))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument { name: "symbols", .. }));
    }

    #[test]
    fn test_unknown_tool() {
        let err = BrokerageTool::parse("ibkr_place_order", &json!({})).unwrap_err();
        assert_eq!(err, ToolError::UnknownTool("ibkr_place_order".into()));
    }

    #[test]
    fn test_timeout_classes() {
        let timeouts = TimeoutConfig::default();
        assert_eq!(TimeoutClass::Lookup.duration(&timeouts), Duration::from_secs(120));
        assert_eq!(TimeoutClass::Standard.duration(&timeouts), Duration::from_secs(300));
        assert_eq!(TimeoutClass::Bulk.duration(&timeouts), Duration::from_secs(1200));
        assert_eq!(BrokerageTool::Positions.timeout_class(), TimeoutClass::Standard);
    }

    #[test]
    fn test_definitions_cover_every_tool() {
        let names: Vec<_> = BrokerageTool::definitions().iter().map(|d| d.name).collect();
        assert_eq!(names.len(), 9);
        for name in names {
            let parsed = BrokerageTool::parse(name, &json!({}));
            assert!(!matches!(parsed, Err(ToolError::UnknownTool(_))), "{} not parseable", name);
        }
    }
}
