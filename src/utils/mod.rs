pub mod loc;

pub use loc::{Loc, LocError, LocRange, Position, SourceId, SourceTable, make_loc};
