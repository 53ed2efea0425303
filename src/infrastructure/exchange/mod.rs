pub mod http_exchange;

pub use http_exchange::HttpExchangeClient;
