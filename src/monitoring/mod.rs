/*!
 * Monitoring
 * Tracing setup and span helpers
 */

mod tracer;

pub use tracer::{generate_trace_id, init_tracing, operation_span};
