pub mod api_client;
pub mod api_parse;
pub mod collect;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod form;
pub mod http_cache;
pub mod http_client;
pub mod leagues;
pub mod logging;
pub mod model;
pub mod prediction;
pub mod prediction_store;
pub mod team_report;
