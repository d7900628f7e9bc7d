//! # pgsift
//!
//! Predicate-driven SQL building, paginated search and transactional
//! mutations for PostgreSQL.
//!
//! ## Features
//!
//! - **Typed predicates**: field/operator/value filters compose as
//!   AND-of-ORs groups and compile to parameterized `$n` SQL
//! - **Paginated search**: one call fetches a page plus its window count and
//!   page count, skipping the count query when the page is empty
//! - **Type-safe mapping**: row to struct via the `FromRow` trait, no
//!   runtime introspection
//! - **Transactional mutations**: insert, batch insert, upsert, update and
//!   delete inside one transaction, rolled back on first failure
//!
//! ## Example
//!
//! ```ignore
//! use pgsift::{select, Direction, Predicate};
//!
//! let page = select("user")
//!     .fields(&["id", "email"])
//!     .filter(Predicate::equals("user.active", true))
//!     .order_by("user.id", Direction::Asc)
//!     .paginate(0, 20)
//!     .search::<User>(&client)
//!     .await?;
//!
//! println!("{} of {} users", page.count, page.total_count);
//! ```

pub mod clause;
pub mod client;
pub mod config;
pub mod error;
pub mod param;
pub mod predicate;
pub mod row;
pub mod select;
pub mod session;
pub mod value;

pub use clause::{Direction, Join, JoinKind, OrderBy, Pagination};
pub use client::{GenericClient, PgTransaction, TxClient};
pub use config::{PgConfig, connect};
pub use error::{SiftError, SiftResult};
pub use param::ParamList;
pub use predicate::{Operator, Predicate, compile_predicates};
pub use row::{FromRow, RowExt};
pub use select::{SearchPage, SelectQuery, select};
pub use session::{Creation, Deletion, Mutation, TransactionSession};
pub use value::{FieldMap, Value};
