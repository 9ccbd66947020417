//! Generation pipeline: key coercion, retry policy, postprocessing, and
//! the batch orchestrator.

pub mod coerce;
pub mod generate;
pub mod postprocess;
pub mod retry;

pub use coerce::coerce_common_keys;
pub use generate::Generator;
pub use postprocess::sanitize_html;
pub use retry::retry_params;
