pub mod batch;
pub mod values;

pub use batch::BatchOperation;
pub use values::{CellData, ValueResult, WriteOperation, WriteReply, WriteSummary};
