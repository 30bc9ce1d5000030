pub mod config;
pub mod date;
pub mod error;
pub mod events;
pub mod file_config;
pub mod types;

pub use config::AppConfig;
pub use date::{format_date, parse_date, DATE_FORMAT};
pub use error::InvalidDate;
pub use events::{OrderEvent, OrderStatus, StatisticEvent};
pub use types::{DailyAggregate, DailyAnalytic, DailyStatistic};
