/*!
 * Request/Reply Multiplexing
 *
 * Correlates asynchronous replies with the requests waiting for them.
 *
 * ## Flow
 *
 * ```text
 * Transaction::open ──▶ id allocated, slot registered
 *        │
 *   send request(id)
 *        │
 * async_wait_for(tag, d) ◀── Multiplexer::fulfill(id, reply) ◀── reader task
 *        │
 *   tag matches? ──no──▶ UnexpectedReply
 *        │yes
 *      reply
 * ```
 */

mod multiplexer;
mod transaction;

pub use multiplexer::{Multiplexer, MultiplexerBuilder};
pub use transaction::Transaction;

use std::fmt::Debug;

/// Replies that carry a discriminant a waiter can check
pub trait Tagged {
    type Tag: PartialEq + Clone + Debug + Send;

    fn tag(&self) -> Self::Tag;
}
