//! nestmake wraps GNU Make: it discovers makefiles nested under a
//! root directory, extracts their targets by parsing `make -np`
//! database dumps, and synthesizes a parent makefile whose rules
//! forward target invocations into the correct subdirectory.
//!
//! The extraction core is a lazy pull pipeline: line filters gate the
//! dump down to the file definition section, a paragraph lexer splits
//! it into per-target paragraphs, and a rule lexer/parser pair emits
//! one Target per rule target. Markable stream adapters let the same
//! grammars run either fully buffered or fully streaming.

pub mod data;
pub mod emit;
pub mod error;
pub mod fifo;
pub mod filters;
pub mod gnumake;
pub mod grammar;
pub mod iter;
pub mod line;
pub mod locate;
pub mod pipeline;
pub mod storage;
pub mod stream;

pub use data::{Makefile, Target};
pub use error::PipelineError;
pub use pipeline::{PipelineMode, TargetIterator, target_iterator};
