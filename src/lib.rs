//! Client-side query execution engine: deserializes a compiled plan shipped
//! by the server and runs it locally as a pipelined iterator tree,
//! interleaving remote page fetches with projection, filtering, arithmetic,
//! sorting, grouping, and deduplication.

pub mod error;
pub mod exec;
pub mod iter;
pub mod plan;
pub mod value;

///
/// Prelude
///
/// The vocabulary a host application needs to run a query end to end:
/// errors, the executor and its RPC facade, and the value type. Iterators
/// and wire-format helpers stay out of the prelude; callers never
/// construct a `PlanIter` directly.
///

pub mod prelude {
    pub use crate::error::{QueryError, QueryErrorKind};
    pub use crate::exec::client::{
        ConsistencyLevel, ExecutorOptions, ExecutorOptionsBuilder, PreparedStatement, QueryClient,
        TopologySnapshot,
    };
    pub use crate::exec::{Executor, Page};
    pub use crate::value::Value;
}
