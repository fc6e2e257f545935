//! Ledger and settlement engine for shared meal funds.
//!
//! Each group accumulates expenses and one meal count submission per billing
//! period. At period end the engine splits the period's cost per meal,
//! archives the resulting [`Settlement`] and carries the leftover into the
//! next period.
//!
//! The engine holds the whole ledger in memory and hands it to a [`Store`]
//! after every successful mutation.

pub use amount::Amount;
pub use clock::{Clock, ManualClock, SystemClock, ZonedClock};
pub use error::{EngineError, Unsettled};
pub use group::{ArchivedSettlement, Expense, Group, MealSubmission, Member};
pub use ops::{Engine, EngineBuilder, Rotation};
pub use period::{Period, days_left_in_period, following_period, is_period_end, is_reminder_day};
pub use settlement::{Settlement, SettlementLine, Standing};
pub use store::{Groups, JsonFileStore, MemoryStore, SqliteStore, Store, StoreError};
pub use summary::{MemberStats, MemberSummary};

mod amount;
mod clock;
mod error;
mod group;
mod ops;
mod period;
pub mod settlement;
pub mod store;
mod summary;

type ResultEngine<T> = Result<T, EngineError>;
