pub mod trace_id;

pub use trace_id::{trace_id_middleware, TraceIdGenerator, TRACE_ID_HEADER};
